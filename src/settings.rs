//! Per-guild behavior settings.
//!
//! Each guild can tune its cooldown window and interjection rate via
//! `/config`; everything else falls back to the configured defaults. DMs
//! always use the defaults. Stored alongside the other state files.

use std::collections::HashMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

/// Per-guild knobs, adjustable at runtime.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GuildSettings {
    /// Minimum seconds between handled messages in one context.
    #[serde(default = "default_cooldown_secs")]
    pub cooldown_secs: u64,
    /// Probability in [0, 1] of answering an unsolicited guild message.
    #[serde(default)]
    pub interjection_rate: f64,
}

fn default_cooldown_secs() -> u64 {
    10
}

impl Default for GuildSettings {
    fn default() -> Self {
        Self {
            cooldown_secs: default_cooldown_secs(),
            interjection_rate: 0.0,
        }
    }
}

/// File-backed map of guild id → settings.
pub struct GuildSettingsStore {
    guilds: RwLock<HashMap<u64, GuildSettings>>,
    defaults: GuildSettings,
    path: PathBuf,
}

impl GuildSettingsStore {
    /// Load from disk; a missing or unreadable file starts empty.
    pub async fn load(path: impl Into<PathBuf>, defaults: GuildSettings) -> Self {
        let path = path.into();
        let guilds = match tokio::fs::read(&path).await {
            Ok(bytes) => match serde_json::from_slice(&bytes) {
                Ok(map) => map,
                Err(e) => {
                    warn!("Failed to parse guild settings {}: {}", path.display(), e);
                    HashMap::new()
                }
            },
            Err(_) => HashMap::new(),
        };
        Self {
            guilds: RwLock::new(guilds),
            defaults,
            path,
        }
    }

    /// Settings for a guild; `None` (a DM) gets the defaults.
    pub async fn get(&self, guild_id: Option<u64>) -> GuildSettings {
        match guild_id {
            Some(id) => self
                .guilds
                .read()
                .await
                .get(&id)
                .copied()
                .unwrap_or(self.defaults),
            None => self.defaults,
        }
    }

    pub async fn set_cooldown(&self, guild_id: u64, secs: u64) {
        {
            let mut guilds = self.guilds.write().await;
            let entry = guilds.entry(guild_id).or_insert(self.defaults);
            entry.cooldown_secs = secs;
        }
        self.save().await;
    }

    pub async fn set_interjection_rate(&self, guild_id: u64, rate: f64) {
        let rate = rate.clamp(0.0, 1.0);
        {
            let mut guilds = self.guilds.write().await;
            let entry = guilds.entry(guild_id).or_insert(self.defaults);
            entry.interjection_rate = rate;
        }
        self.save().await;
    }

    async fn save(&self) {
        let snapshot = self.guilds.read().await.clone();
        let bytes = match serde_json::to_vec_pretty(&snapshot) {
            Ok(b) => b,
            Err(e) => {
                warn!("Failed to serialize guild settings: {}", e);
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
                "Failed to persist guild settings to {}: {}",
                self.path.display(),
                e
            );
        }
    }
}
