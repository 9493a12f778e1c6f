use std::sync::Arc;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::ChatMemberUpdated;
use tracing::{error, info, warn};

use crate::commands;
use crate::config::Config;
use crate::model::ChannelId;
use crate::store::Store;

use super::admin::{self, TargetLocks};
use super::capture;

/// Shared state for the update handlers
pub struct AppState {
    pub config: Config,
    pub store: Store,
    pub target_locks: TargetLocks,
}

impl AppState {
    pub fn new(config: Config, store: Store) -> Self {
        Self {
            config,
            store,
            target_locks: TargetLocks::default(),
        }
    }
}

/// Run the Telegram bot until the dispatcher stops
pub async fn run(state: Arc<AppState>) -> Result<()> {
    let bot = Bot::new(&state.config.telegram.bot_token);

    info!("Starting Telegram platform...");

    let handler = dptree::entry()
        .branch(Update::filter_my_chat_member().endpoint(handle_membership))
        .branch(Update::filter_callback_query().endpoint(admin::handle_callback))
        .branch(Update::filter_message().endpoint(handle_message))
        .branch(Update::filter_edited_message().endpoint(handle_edited));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .default_handler(|upd| async move {
            warn!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_membership(upd: ChatMemberUpdated, state: Arc<AppState>) -> ResponseResult<()> {
    let member = &upd.new_chat_member;
    if !(member.is_member() || member.is_administrator()) {
        return Ok(());
    }
    if !(upd.chat.is_group() || upd.chat.is_supergroup()) {
        return Ok(());
    }

    let title = upd.chat.title();
    match state.store.upsert_channel(ChannelId(upd.chat.id.0), title).await {
        Ok(()) => info!(
            "Bot added to group: {} ({})",
            title.unwrap_or("unnamed group"),
            upd.chat.id.0
        ),
        Err(e) => error!("Failed to register group {}: {:#}", upd.chat.id.0, e),
    }
    Ok(())
}

async fn handle_message(bot: Bot, msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if let Some(text) = msg.text() {
        if let Some(command) = commands::parse_command(text) {
            return admin::handle_command(bot, &msg, state, command).await;
        }
        // Commands meant for other bots are not history.
        if text.starts_with('/') {
            return Ok(());
        }
    }

    match capture::capture_topic_event(&state.store, &msg).await {
        Ok(true) => return Ok(()),
        Ok(false) => {}
        Err(e) => {
            error!("Failed to record topic in {}: {:#}", msg.chat.id.0, e);
            return Ok(());
        }
    }

    if let Err(e) = capture::capture_message(&state.store, &msg).await {
        error!(
            "Failed to capture message {} in {}: {:#}",
            msg.id.0, msg.chat.id.0, e
        );
    }
    Ok(())
}

/// Edits go through the same capture path; an already stored message keeps
/// its original content.
async fn handle_edited(msg: Message, state: Arc<AppState>) -> ResponseResult<()> {
    if msg.text().is_some_and(|t| t.starts_with('/')) {
        return Ok(());
    }
    match capture::capture_message(&state.store, &msg).await {
        Ok(true) => info!("Captured edited message {} in {}", msg.id.0, msg.chat.id.0),
        Ok(false) => {}
        Err(e) => error!(
            "Failed to capture edited message {} in {}: {:#}",
            msg.id.0, msg.chat.id.0, e
        ),
    }
    Ok(())
}
