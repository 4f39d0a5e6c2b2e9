//! Configuration management for persona-bot

#[path = "config_tests.rs"]
mod config_tests;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;

use crate::llm::{OpenAiConfig, OPENAI_BASE_URL};
use crate::settings::GuildSettings;

/// Read access to environment variables, swappable for tests.
pub trait ReadEnv {
    fn var(&self, key: &str) -> Option<String>;
}

/// `std::env`-backed implementation.
pub struct SystemEnv;

impl ReadEnv for SystemEnv {
    fn var(&self, key: &str) -> Option<String> {
        std::env::var(key).ok()
    }
}

/// Complete bot configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub discord: DiscordConfig,
    #[serde(default)]
    pub openai: OpenAiSection,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

/// Discord specific configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Bot token from the Discord developer portal
    pub bot_token: String,
}

/// Completion API section. An empty API key means echo mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiSection {
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

impl Default for OpenAiSection {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model: default_model(),
            base_url: default_base_url(),
            max_tokens: default_max_tokens(),
        }
    }
}

/// Where persisted state lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
        }
    }
}

/// Reply behavior.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BehaviorConfig {
    /// Persona / system prompt override.
    #[serde(default)]
    pub system_prompt: Option<String>,
    /// Defaults for guilds without their own settings, and for DMs.
    #[serde(default)]
    pub defaults: GuildSettings,
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_base_url() -> String {
    OPENAI_BASE_URL.to_string()
}

fn default_max_tokens() -> u32 {
    2000
}

fn default_data_dir() -> String {
    "data".to_string()
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path))?;

        Ok(config)
    }

    /// Load configuration from environment variables
    pub fn from_env<E: ReadEnv>(env: &E) -> Result<Self> {
        let bot_token = env
            .var("DISCORD_BOT_TOKEN")
            .context("DISCORD_BOT_TOKEN not set")?;

        let api_key = env.var("OPENAI_API_KEY").unwrap_or_default();
        let model = env.var("OPENAI_MODEL").unwrap_or_else(default_model);
        let base_url = env.var("OPENAI_BASE_URL").unwrap_or_else(default_base_url);
        let max_tokens = env
            .var("OPENAI_MAX_TOKENS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_max_tokens);

        let data_dir = env.var("BOT_DATA_DIR").unwrap_or_else(default_data_dir);
        let system_prompt = env.var("BOT_SYSTEM_PROMPT").filter(|v| !v.is_empty());

        let mut defaults = GuildSettings::default();
        if let Some(secs) = env.var("BOT_COOLDOWN_SECS").and_then(|v| v.parse().ok()) {
            defaults.cooldown_secs = secs;
        }
        if let Some(rate) = env
            .var("BOT_INTERJECTION_RATE")
            .and_then(|v| v.parse::<f64>().ok())
        {
            defaults.interjection_rate = rate.clamp(0.0, 1.0);
        }

        Ok(Config {
            discord: DiscordConfig { bot_token },
            openai: OpenAiSection {
                api_key,
                model,
                base_url,
                max_tokens,
            },
            storage: StorageConfig { data_dir },
            behavior: BehaviorConfig {
                system_prompt,
                defaults,
            },
        })
    }

    /// Completion-client config from the `[openai]` section.
    ///
    /// `None` when no API key is configured, which puts the bot in echo mode.
    pub fn openai_config(&self) -> Option<OpenAiConfig> {
        if self.openai.api_key.is_empty() {
            return None;
        }
        Some(OpenAiConfig {
            api_key: self.openai.api_key.clone(),
            base_url: self.openai.base_url.clone(),
            model: self.openai.model.clone(),
            max_tokens: self.openai.max_tokens,
            ..OpenAiConfig::default()
        })
    }
}
