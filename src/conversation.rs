//! Conversation state: per-user contexts, reply-chain reconstruction, and
//! prompt assembly.
//!
//! All state is keyed by the author's Discord user id so that conversation
//! threads and their id maps travel with the user across servers and DMs.
//! Inside one user's state, each context id maps to a set of messages keyed
//! by snowflake id (snowflakes are time-ordered, so a BTreeMap keeps them
//! chronological). The whole store persists to one JSON file.

#[path = "conversation_tests.rs"]
mod conversation_tests;

use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

use crate::llm::ChatTurn;
use crate::session;

/// Upper bound on turns included when walking a reply chain.
pub(crate) const MAX_CONTEXT_TURNS: usize = 30;

/// Messages concatenated into each long-term memory summary.
const SUMMARY_MESSAGES: usize = 3;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One stored message in a conversation thread.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatMessage {
    pub id: u64,
    pub role: Role,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<u64>,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct UserState {
    /// context id → messages, chronological by snowflake id
    contexts: HashMap<String, BTreeMap<u64, ChatMessage>>,
    /// message id → context id (backs the session keyer)
    context_ids: HashMap<u64, String>,
}

/// File-backed store of all conversation state.
pub struct ConversationStore {
    users: RwLock<HashMap<u64, UserState>>,
    path: PathBuf,
}

impl ConversationStore {
    /// Load the store from disk. A missing or unreadable file starts empty.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let users = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Failed to parse conversation file {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            users: RwLock::new(users),
            path,
        }
    }

    /// Resolve the context id for an incoming message.
    pub async fn resolve_context(
        &self,
        user_id: u64,
        is_dm: bool,
        channel_id: u64,
        message_id: u64,
        reply_to: Option<u64>,
    ) -> String {
        let users = self.users.read().await;
        let empty = HashMap::new();
        let known = users
            .get(&user_id)
            .map(|u| &u.context_ids)
            .unwrap_or(&empty);
        session::context_id(is_dm, channel_id, message_id, reply_to, known)
    }

    /// Whether a reply target belongs to a context known for this user.
    pub async fn continues_known_context(&self, user_id: u64, reply_to: Option<u64>) -> bool {
        let Some(id) = reply_to else {
            return false;
        };
        self.users
            .read()
            .await
            .get(&user_id)
            .is_some_and(|u| u.context_ids.contains_key(&id))
    }

    /// Record a message in a context and register its id for chain lookups.
    pub async fn record(&self, user_id: u64, context_id: &str, msg: ChatMessage) {
        let mut users = self.users.write().await;
        let state = users.entry(user_id).or_default();
        state.context_ids.insert(msg.id, context_id.to_string());
        state
            .contexts
            .entry(context_id.to_string())
            .or_default()
            .insert(msg.id, msg);
    }

    /// Walk the reply chain backward from `newest_id` and return the rendered
    /// turns oldest-first, bounded at [`MAX_CONTEXT_TURNS`].
    pub async fn build_turns(
        &self,
        user_id: u64,
        context_id: &str,
        newest_id: u64,
    ) -> Vec<ChatTurn> {
        let users = self.users.read().await;
        let Some(messages) = users
            .get(&user_id)
            .and_then(|u| u.contexts.get(context_id))
        else {
            return Vec::new();
        };

        let mut turns = Vec::new();
        let mut current = Some(newest_id);
        while let Some(id) = current {
            if turns.len() >= MAX_CONTEXT_TURNS {
                break;
            }
            let Some(msg) = messages.get(&id) else {
                break;
            };
            let content = strip_mentions(&msg.content);
            let rendered = match msg.role {
                Role::User => format!(
                    "{} (ID: {}) asked: {}",
                    msg.name,
                    msg.user_id.unwrap_or(0),
                    content
                ),
                Role::Assistant => content,
            };
            turns.push(ChatTurn::new(msg.role.as_str(), rendered));
            current = msg.reply_to;
        }
        turns.reverse();
        turns
    }

    /// Concatenate the last few messages of a context; this is the text that
    /// goes into the user's long-term memory after each exchange.
    pub async fn summary(&self, user_id: u64, context_id: &str) -> String {
        let users = self.users.read().await;
        let Some(messages) = users
            .get(&user_id)
            .and_then(|u| u.contexts.get(context_id))
        else {
            return String::new();
        };
        let mut recent: Vec<&str> = messages
            .values()
            .rev()
            .take(SUMMARY_MESSAGES)
            .map(|m| m.content.as_str())
            .collect();
        recent.reverse();
        recent.join(" ")
    }

    /// Drop all conversation state for a user (backs `/forget`).
    pub async fn clear_user(&self, user_id: u64) {
        self.users.write().await.remove(&user_id);
        self.save().await;
    }

    /// Number of contexts across all users.
    pub async fn active_contexts(&self) -> usize {
        self.users
            .read()
            .await
            .values()
            .map(|u| u.contexts.len())
            .sum()
    }

    /// Persist the whole store; failures are logged and swallowed.
    pub async fn save(&self) {
        let snapshot = self.users.read().await.clone();
        let bytes = match serde_json::to_vec_pretty(&snapshot) {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to serialize conversation store: {}", e);
                return;
            }
        };
        if let Some(parent) = self.path.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                warn!("Failed to create data dir {}: {}", parent.display(), e);
                return;
            }
        }
        if let Err(e) = tokio::fs::write(&self.path, bytes).await {
            warn!(
                "Failed to persist conversations to {}: {}",
                self.path.display(),
                e
            );
        }
    }
}

/// Drop `@` so stored mentions cannot re-ping anyone through the prompt.
fn strip_mentions(content: &str) -> String {
    content.replace('@', "")
}

/// Collapse a Discord username into a prompt-safe name.
pub fn sanitize_username(username: &str) -> String {
    let clean: String = username
        .chars()
        .take(64)
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect();
    if clean.is_empty() {
        "unknown_user".to_string()
    } else {
        clean
    }
}
