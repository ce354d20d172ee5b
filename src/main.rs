mod bot;
mod config;
mod messages;
mod platform;
mod resolver;
mod router;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,blueprintbot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Messages: {}", config.messages.path.display());
    info!("  Triggers: {}", config.triggers.len());
    info!("  Allowed users: {:?}", config.telegram.allowed_user_ids);

    // Message definitions are loaded once and never change afterwards
    let store = messages::loader::load_messages(&config.messages.path).await?;

    let bot = Bot::new(&config.telegram.bot_token);
    let state = Arc::new(AppState::new(config, store));

    info!("Bot is starting...");
    bot::run(state, bot).await?;

    Ok(())
}
