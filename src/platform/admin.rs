use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, MessageId};
use tracing::{error, info, warn};

use crate::commands::{self, Command, MenuAction, MenuView};
use crate::migration::{Migrator, ProgressReporter};
use crate::model::ChannelId;

use super::telegram::AppState;
use super::transport::TelegramTransport;

/// Targets with a migration in flight. A second run into the same target
/// would interleave with the first.
#[derive(Default)]
pub struct TargetLocks {
    active: Arc<Mutex<HashSet<ChannelId>>>,
}

/// Releases its target when dropped.
pub struct TargetLease {
    active: Arc<Mutex<HashSet<ChannelId>>>,
    target: ChannelId,
}

impl TargetLocks {
    pub fn try_acquire(&self, target: ChannelId) -> Option<TargetLease> {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if !active.insert(target) {
            return None;
        }
        Some(TargetLease {
            active: self.active.clone(),
            target,
        })
    }
}

impl Drop for TargetLease {
    fn drop(&mut self) {
        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        active.remove(&self.target);
    }
}

/// Edits the status message in place as the run advances.
struct StatusMessage {
    bot: Bot,
    chat: ChatId,
    message: MessageId,
}

#[async_trait]
impl ProgressReporter for StatusMessage {
    async fn report(&self, current: usize, total: usize) -> Result<()> {
        self.bot
            .edit_message_text(
                self.chat,
                self.message,
                commands::render_progress(current, total),
            )
            .await?;
        Ok(())
    }
}

fn keyboard(view: &MenuView) -> InlineKeyboardMarkup {
    let rows: Vec<Vec<InlineKeyboardButton>> = view
        .buttons
        .iter()
        .map(|(label, action)| {
            vec![InlineKeyboardButton::callback(
                label.clone(),
                action.to_data(),
            )]
        })
        .collect();
    InlineKeyboardMarkup::new(rows)
}

pub async fn handle_command(
    bot: Bot,
    msg: &Message,
    state: Arc<AppState>,
    command: Result<Command, String>,
) -> ResponseResult<()> {
    let user = msg.from.as_ref();
    let is_admin = user.map(|u| state.config.is_admin(u.id.0)).unwrap_or(false);

    let command = match command {
        Ok(command) => command,
        Err(usage) => {
            if is_admin {
                bot.send_message(msg.chat.id, usage).await?;
            } else {
                bot.send_message(msg.chat.id, commands::NOT_AUTHORIZED).await?;
            }
            return Ok(());
        }
    };

    if command.requires_admin() && !is_admin {
        warn!(
            "Unauthorized {:?} from user {:?}",
            command,
            user.map(|u| u.id.0)
        );
        bot.send_message(msg.chat.id, commands::NOT_AUTHORIZED).await?;
        return Ok(());
    }

    match command {
        Command::ReinitializeMenu => {
            let groups = match state.store.channel_summaries().await {
                Ok(groups) => groups,
                Err(e) => {
                    error!("Failed to list groups: {:#}", e);
                    bot.send_message(msg.chat.id, format!("❌ Error: {}", e)).await?;
                    return Ok(());
                }
            };
            match commands::source_menu(&groups) {
                Ok(view) => {
                    bot.send_message(msg.chat.id, view.text.clone())
                        .reply_markup(keyboard(&view))
                        .await?;
                }
                Err(text) => {
                    bot.send_message(msg.chat.id, text).await?;
                }
            }
        }
        Command::Reinitialize { source, target } => {
            start_migration(bot, state, msg.chat.id, None, source, target).await?;
        }
        command => {
            let reply = reply_for(&state, msg, &command).await.unwrap_or_else(|e| {
                error!("Command {:?} failed: {:#}", command, e);
                format!("❌ Error: {}", e)
            });
            bot.send_message(msg.chat.id, reply).await?;
        }
    }
    Ok(())
}

/// Text reply for the read-only commands.
async fn reply_for(state: &AppState, msg: &Message, command: &Command) -> Result<String> {
    let store = &state.store;
    let text = match command {
        Command::Start => {
            let name = msg
                .from
                .as_ref()
                .map(|u| u.first_name.clone())
                .unwrap_or_default();
            commands::render_start(&name)
        }
        Command::Help => commands::render_help(),
        Command::Status => commands::render_status(&store.database_stats().await?),
        Command::Stats => commands::render_stats(&store.detailed_stats().await?),
        Command::Recent { limit } => {
            commands::render_recent(&store.recent_messages(*limit, None, None).await?)
        }
        Command::ListGroups => commands::render_groups(&store.channel_summaries().await?),
        Command::ListTopics { channel } => match store.get_channel(*channel).await? {
            None => format!("❌ Group {} not found in database.", channel),
            Some(found) => commands::render_topics(
                *channel,
                found.name.as_deref(),
                &store.topic_stats(*channel).await?,
            ),
        },
        Command::Reinitialize { .. } | Command::ReinitializeMenu => {
            anyhow::bail!("reinitialize is not a text command")
        }
    };
    Ok(text)
}

/// Post (or reuse) a status message and run the migration in the
/// background. The update handler returns immediately.
async fn start_migration(
    bot: Bot,
    state: Arc<AppState>,
    chat: ChatId,
    status: Option<MessageId>,
    source: ChannelId,
    target: ChannelId,
) -> ResponseResult<()> {
    let Some(lease) = state.target_locks.try_acquire(target) else {
        let text = format!(
            "⏳ A reinitialization into {} is already running. Try again when it finishes.",
            target
        );
        match status {
            Some(id) => bot.edit_message_text(chat, id, text).await?,
            None => bot.send_message(chat, text).await?,
        };
        return Ok(());
    };

    let started = commands::render_migration_started(source, target);
    let status = match status {
        Some(id) => bot.edit_message_text(chat, id, started).await?.id,
        None => bot.send_message(chat, started).await?.id,
    };

    info!("Reinitialization requested: {} -> {}", source, target);
    tokio::spawn(async move {
        let _lease = lease;
        let transport = TelegramTransport::new(bot.clone());
        let reporter = StatusMessage {
            bot: bot.clone(),
            chat,
            message: status,
        };
        let migrator = Migrator::new(
            &state.store,
            &transport,
            state.config.migration.settings(),
        );

        let text = match migrator.run(source, target, &reporter).await {
            Ok(result) => {
                info!(
                    "Reinitialization completed: {} -> {} ({} sent, {} failed)",
                    source, target, result.sent, result.failed
                );
                commands::render_result(&result, state.config.migration.error_preview)
            }
            Err(e) => {
                error!("Reinitialization {} -> {} failed: {}", source, target, e);
                commands::render_failure(&e)
            }
        };
        if let Err(e) = bot.edit_message_text(chat, status, text).await {
            error!("Failed to post reinitialization summary: {}", e);
        }
    });
    Ok(())
}

pub async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    state: Arc<AppState>,
) -> ResponseResult<()> {
    let Some(action) = q.data.as_deref().and_then(MenuAction::parse) else {
        bot.answer_callback_query(q.id.clone()).await?;
        return Ok(());
    };

    if !state.config.is_admin(q.from.id.0) {
        bot.answer_callback_query(q.id.clone())
            .text("Unauthorized")
            .await?;
        return Ok(());
    }
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(menu) = q.regular_message() else {
        return Ok(());
    };
    let (chat, menu_id) = (menu.chat.id, menu.id);

    let view = match action {
        MenuAction::Cancel => {
            bot.edit_message_text(chat, menu_id, "❌ Reinitialize cancelled.")
                .await?;
            return Ok(());
        }
        MenuAction::Confirm { source, target } => {
            return start_migration(bot, state, chat, Some(menu_id), source, target).await;
        }
        MenuAction::Restart | MenuAction::PickSource(_) | MenuAction::PickTarget { .. } => {
            let groups = match state.store.channel_summaries().await {
                Ok(groups) => groups,
                Err(e) => {
                    error!("Failed to list groups: {:#}", e);
                    bot.edit_message_text(chat, menu_id, format!("❌ Error: {}", e))
                        .await?;
                    return Ok(());
                }
            };
            match action {
                MenuAction::PickSource(source) => commands::target_menu(source, &groups),
                MenuAction::PickTarget { source, target } => {
                    commands::confirm_menu(source, target, &groups)
                }
                _ => commands::source_menu(&groups),
            }
        }
    };

    match view {
        Ok(view) => {
            bot.edit_message_text(chat, menu_id, view.text.clone())
                .reply_markup(keyboard(&view))
                .await?;
        }
        Err(text) => {
            bot.edit_message_text(chat, menu_id, text).await?;
        }
    }
    Ok(())
}
