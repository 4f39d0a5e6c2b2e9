//! Context-id derivation for incoming messages.
//!
//! A context id names one logical conversation thread: the DM channel for
//! direct messages, or a reply chain inside a guild channel. The map of
//! known message ids is maintained by the conversation store so that replies
//! to earlier messages (the user's or the bot's) continue the same thread.

use std::collections::HashMap;

/// Derive the context id for an incoming message.
///
/// - DM channels: `dm-{channel_id}`
/// - Guild replies to a known message: the replied-to message's context id
/// - Any other guild message: a fresh `{channel_id}-{message_id}`
pub fn context_id(
    is_dm: bool,
    channel_id: u64,
    message_id: u64,
    reply_to: Option<u64>,
    known: &HashMap<u64, String>,
) -> String {
    if is_dm {
        return format!("dm-{}", channel_id);
    }
    if let Some(ctx) = reply_to.and_then(|id| known.get(&id)) {
        return ctx.clone();
    }
    format!("{}-{}", channel_id, message_id)
}
