//! Reply dispatcher: posts completion output back into the channel.

#[path = "outbound_tests.rs"]
mod outbound_tests;

use std::sync::LazyLock;

use anyhow::Result;
use regex::Regex;
use serenity::builder::CreateMessage;
use serenity::http::Http;
use serenity::model::channel::Message;
use serenity::model::id::{ChannelId, MessageId};
use tracing::debug;

use crate::errors;

/// Discord's hard limit on message length.
const MAX_MESSAGE_LEN: usize = 2000;

static BARE_MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<(\d+)>").expect("mention pattern"));

/// Rewrite bare `<123>` id tokens into proper `<@123>` user mentions.
///
/// Models tend to echo the `(ID: …)` attribution from the prompt back in this
/// bare form.
pub fn fix_mentions(content: &str) -> String {
    BARE_MENTION.replace_all(content, "<@$1>").into_owned()
}

/// Split content into Discord-sized chunks, preferring newline boundaries.
pub fn split_message(content: &str) -> Vec<String> {
    if content.len() <= MAX_MESSAGE_LEN {
        return vec![content.to_string()];
    }
    let mut chunks = Vec::new();
    let mut current = String::new();
    for line in content.split_inclusive('\n') {
        if current.len() + line.len() > MAX_MESSAGE_LEN {
            if !current.is_empty() {
                chunks.push(std::mem::take(&mut current));
            }
            let mut rest = line;
            while rest.len() > MAX_MESSAGE_LEN {
                let (head, tail) = split_at_boundary(rest, MAX_MESSAGE_LEN);
                chunks.push(head.to_string());
                rest = tail;
            }
            current.push_str(rest);
        } else {
            current.push_str(line);
        }
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}

fn split_at_boundary(s: &str, max: usize) -> (&str, &str) {
    let mut end = max;
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s.split_at(end)
}

/// Post reply chunks to a channel.
///
/// The first chunk is sent as a reply to the triggering message; any further
/// chunks are plain sends. Returns the sent messages so the caller can record
/// the bot's turn in the conversation store.
pub async fn send_reply(
    http: &Http,
    channel_id: u64,
    reply_to: u64,
    content: &str,
) -> Result<Vec<Message>> {
    let channel = ChannelId::new(channel_id);
    let mut sent = Vec::new();
    for (i, chunk) in split_message(content).into_iter().enumerate() {
        let mut builder = CreateMessage::new().content(&chunk);
        if i == 0 {
            builder = builder.reference_message((channel, MessageId::new(reply_to)));
        }
        match channel.send_message(http, builder).await {
            Ok(msg) => sent.push(msg),
            Err(e) => {
                errors::log_error(
                    "send_message",
                    &format!("Failed to send reply chunk to channel {}", channel_id),
                    &e,
                );
                return Err(e.into());
            }
        }
    }
    Ok(sent)
}

/// Show the typing indicator while the completion is in flight (best effort).
pub async fn broadcast_typing(http: &Http, channel_id: u64) {
    if let Err(e) = http.broadcast_typing(channel_id.into()).await {
        debug!("Failed to broadcast typing in channel {}: {}", channel_id, e);
    }
}
