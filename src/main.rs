mod commands;
mod config;
mod http;
mod migration;
mod model;
mod platform;
mod store;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::platform::telegram::{self, AppState};
use crate::store::Store;

#[tokio::main]
async fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    // Initialize logging
    let level = config.logging.level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("{level},groupvault={level}").into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Configuration loaded from: {}", config_path.display());
    info!("  Database: {}", config.database.path.display());
    info!("  Admins: {:?}", config.telegram.admin_user_ids);
    info!(
        "  Migration rate: {} msg/s",
        config.migration.messages_per_second
    );

    let store = Store::open(&config.database.path)?;

    if let Some(http) = config.http.clone() {
        let store = store.clone();
        tokio::spawn(async move {
            if let Err(e) = http::serve(http.listen, store).await {
                error!("Status server stopped: {:#}", e);
            }
        });
    }

    let state = Arc::new(AppState::new(config, store));

    info!("Bot is starting...");
    telegram::run(state).await?;

    Ok(())
}
