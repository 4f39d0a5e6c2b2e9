//! Persistent per-user long-term memory.
//!
//! Append-only log of short natural-language summaries keyed by Discord user
//! id, carried across conversations, servers, and restarts. The whole store
//! is a single JSON file under the data dir; persistence failures are logged
//! and swallowed so a broken disk never takes the bot down.

#[path = "memory_tests.rs"]
mod memory_tests;

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

/// Most recent entries kept per user.
pub(crate) const MAX_ENTRIES_PER_USER: usize = 50;

/// One remembered summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MemoryEntry {
    pub timestamp: DateTime<Utc>,
    pub content: String,
}

impl MemoryEntry {
    pub fn now(content: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            content: content.into(),
        }
    }
}

/// Per-user memory log with file-backed persistence.
pub struct MemoryStore {
    entries: RwLock<HashMap<u64, Vec<MemoryEntry>>>,
    path: PathBuf,
}

impl MemoryStore {
    /// Load the store from disk. A missing or unreadable file starts empty.
    pub async fn load(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Failed to parse memory file {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            entries: RwLock::new(entries),
            path,
        }
    }

    /// Append an entry to a user's log, trim to the retention cap, persist.
    pub async fn append(&self, user_id: u64, entry: MemoryEntry) {
        {
            let mut entries = self.entries.write().await;
            let log = entries.entry(user_id).or_default();
            log.push(entry);
            if log.len() > MAX_ENTRIES_PER_USER {
                let excess = log.len() - MAX_ENTRIES_PER_USER;
                log.drain(..excess);
            }
        }
        self.save().await;
    }

    /// Render the long-term memory preamble for a user, if anything is stored.
    pub async fn preamble(&self, user_id: u64) -> Option<String> {
        let entries = self.entries.read().await;
        let log = entries.get(&user_id)?;
        if log.is_empty() {
            return None;
        }
        let joined = log
            .iter()
            .map(|e| e.content.as_str())
            .collect::<Vec<_>>()
            .join("\n");
        Some(format!("Long-term memory:\n{}", joined))
    }

    /// Forget everything recorded for a user.
    pub async fn clear(&self, user_id: u64) {
        self.entries.write().await.remove(&user_id);
        self.save().await;
    }

    /// Number of users with at least one entry.
    pub async fn user_count(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Total entries across all users.
    pub async fn total_entries(&self) -> usize {
        self.entries.read().await.values().map(Vec::len).sum()
    }

    async fn save(&self) {
        let snapshot = self.entries.read().await.clone();
        let bytes = match serde_json::to_vec_pretty(&snapshot) {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to serialize memory store: {}", e);
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
            warn!("Failed to persist memory to {}: {}", self.path.display(), e);
        }
    }
}
