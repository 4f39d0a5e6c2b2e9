//! persona-bot: Discord chat bot backed by an LLM completion API.
//!
//! Receives messages, reconstructs a bounded conversation context from reply
//! chains and per-user long-term memory, asks the completion API for a reply,
//! and posts it back. Per-user and per-context state persists across restarts.

mod commands;
mod config;
mod conversation;
mod cooldown;
mod errors;
mod handler;
mod health;
mod llm;
mod memory;
mod outbound;
mod processor;
mod session;
mod settings;

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use serenity::model::gateway::GatewayIntents;
use serenity::prelude::*;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::{Config, SystemEnv};
use crate::conversation::ConversationStore;
use crate::handler::{Handler, ProcessorKey};
use crate::health::AppState;
use crate::llm::OpenAiClient;
use crate::memory::MemoryStore;
use crate::processor::MessageProcessor;
use crate::settings::GuildSettingsStore;

/// Persona bot CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/persona-bot.toml")]
    config: String,

    /// Discord bot token (overrides config file)
    #[arg(long, env = "DISCORD_BOT_TOKEN")]
    bot_token: Option<String>,

    /// Completion API key (overrides config file)
    #[arg(long, env = "OPENAI_API_KEY")]
    openai_api_key: Option<String>,

    /// Data directory for persisted state (overrides config file)
    #[arg(long, env = "BOT_DATA_DIR")]
    data_dir: Option<String>,

    /// Health check server port
    #[arg(long, env = "HEALTH_CHECK_PORT", default_value = "3001")]
    health_port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "persona_bot=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting persona-bot");

    let args = Args::parse();

    let mut config = if Path::new(&args.config).exists() {
        info!("Loading config from file: {}", args.config);
        Config::from_file(&args.config)?
    } else {
        info!("Config file not found, loading from environment");
        Config::from_env(&SystemEnv)?
    };
    if let Some(token) = args.bot_token {
        config.discord.bot_token = token;
    }
    if let Some(key) = args.openai_api_key {
        config.openai.api_key = key;
    }
    if let Some(dir) = args.data_dir {
        config.storage.data_dir = dir;
    }

    // Load persisted state
    let data_dir = Path::new(&config.storage.data_dir);
    let conversations =
        Arc::new(ConversationStore::load(data_dir.join("conversations.json")).await);
    let memory = Arc::new(MemoryStore::load(data_dir.join("memory.json")).await);
    let guild_settings = Arc::new(
        GuildSettingsStore::load(data_dir.join("guilds.json"), config.behavior.defaults).await,
    );
    info!(
        "Loaded {} active context(s), memory for {} user(s)",
        conversations.active_contexts().await,
        memory.user_count().await
    );

    let llm = config.openai_config().map(OpenAiClient::new);
    if llm.is_none() {
        info!("No completion API key configured; running in echo mode");
    }

    let processor = Arc::new(MessageProcessor::new(
        llm,
        conversations.clone(),
        memory,
        guild_settings,
        config.behavior.system_prompt.clone(),
    ));

    let intents = GatewayIntents::GUILDS
        | GatewayIntents::GUILD_MESSAGES
        | GatewayIntents::MESSAGE_CONTENT
        | GatewayIntents::DIRECT_MESSAGES;

    let mut client = Client::builder(&config.discord.bot_token, intents)
        .event_handler(Handler)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Discord client: {}", e))?;

    let health_state = AppState::new(conversations);
    {
        let mut data = client.data.write().await;
        data.insert::<ProcessorKey>(processor);
        data.insert::<AppState>(health_state.clone());
    }

    // Start health check server
    let health_port = args.health_port;
    tokio::spawn(async move {
        if let Err(e) = health::start_health_server(health_state, health_port).await {
            error!("Health server error: {}", e);
        }
    });

    // Graceful shutdown: close all shards on SIGTERM or Ctrl+C.
    let shard_manager = client.shard_manager.clone();
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};
            let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");
            tokio::select! {
                _ = tokio::signal::ctrl_c() => {}
                _ = sigterm.recv() => {}
            }
        }
        #[cfg(not(unix))]
        {
            tokio::signal::ctrl_c().await.ok();
        }
        info!("Shutdown signal received, stopping Discord client...");
        shard_manager.shutdown_all().await;
    });

    info!("Starting Discord gateway connection...");

    // Start the Discord client (blocks until all shards are stopped)
    client
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Discord client error: {}", e))?;

    info!("persona-bot stopped");
    Ok(())
}
