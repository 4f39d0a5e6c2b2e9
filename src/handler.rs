//! Serenity event handler implementation

use std::sync::Arc;

use serenity::async_trait;
use serenity::model::application::Interaction;
use serenity::model::channel::Message;
use serenity::model::gateway::Ready;
use serenity::prelude::*;
use tracing::{error, info, warn};

use crate::commands;
use crate::health::AppState;
use crate::processor::MessageProcessor;

pub struct Handler;

/// TypeMap key for the shared message processor.
pub struct ProcessorKey;

impl TypeMapKey for ProcessorKey {
    type Value = Arc<MessageProcessor>;
}

async fn processor(ctx: &Context) -> Option<Arc<MessageProcessor>> {
    let data = ctx.data.read().await;
    data.get::<ProcessorKey>().cloned()
}

#[async_trait]
impl EventHandler for Handler {
    async fn ready(&self, ctx: Context, ready: Ready) {
        info!("Discord bot connected as {}", ready.user.name);

        if let Some(processor) = processor(&ctx).await {
            processor
                .set_identity(ready.user.id.get(), ready.user.name.clone())
                .await;
        }

        {
            let data = ctx.data.read().await;
            if let Some(state) = data.get::<AppState>() {
                state.set_bot_username(ready.user.name.clone()).await;
            }
        }

        // Keep running without slash commands if registration fails.
        if let Err(e) = commands::register_global(&ctx.http).await {
            warn!("Failed to register slash commands: {}", e);
        }
    }

    async fn message(&self, ctx: Context, msg: Message) {
        // Skip bot messages
        if msg.author.bot {
            return;
        }

        let Some(processor) = processor(&ctx).await else {
            error!("MessageProcessor not found in context data");
            return;
        };

        if let Err(e) = processor.handle_message(&ctx.http, &msg).await {
            error!("Failed to process message {}: {}", msg.id, e);
        }
    }

    async fn interaction_create(&self, ctx: Context, interaction: Interaction) {
        let Interaction::Command(cmd) = interaction else {
            return;
        };

        let Some(processor) = processor(&ctx).await else {
            error!("MessageProcessor not found in context data");
            return;
        };

        if let Err(e) = processor.handle_command(&ctx.http, &cmd).await {
            error!("Failed to execute /{}: {}", cmd.data.name, e);
            let _ = commands::respond(&ctx.http, &cmd, "⚠️ There was an error.", true).await;
        }
    }
}
