use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use super::Store;
use crate::model::{CapturedMessage, ChannelId, MessageContent, Sender, TopicId};

/// A captured message together with the names it was captured under.
#[derive(Debug, Clone)]
pub struct RecentMessage {
    pub channel_name: Option<String>,
    pub topic_name: Option<String>,
    pub message: CapturedMessage,
}

const MESSAGE_COLUMNS: &str = "channel_id, message_id, topic_id, sender_id, sender_username,
    sender_first_name, sender_last_name, content_kind, text_content, caption, file_id,
    timestamp, channel_name, topic_name";

impl Store {
    /// Persist a captured message. Returns false when the message was already
    /// stored: captured rows are never rewritten.
    pub async fn save_message(
        &self,
        message: &CapturedMessage,
        channel_name: Option<&str>,
        topic_name: Option<&str>,
    ) -> Result<bool> {
        let (kind, text, caption, file_id) = message.content.to_parts();
        let conn = self.conn.lock().await;
        let inserted = conn
            .execute(
                "INSERT OR IGNORE INTO captured_messages
                 (channel_id, channel_name, message_id, topic_id, topic_name, sender_id,
                  sender_username, sender_first_name, sender_last_name, content_kind,
                  text_content, caption, file_id, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
                rusqlite::params![
                    message.channel_id.0,
                    channel_name,
                    message.message_id,
                    message.topic_id.map(|t| t.0),
                    topic_name,
                    message.sender.id,
                    message.sender.username,
                    message.sender.first_name,
                    message.sender.last_name,
                    kind,
                    text,
                    caption,
                    file_id,
                    message.timestamp.timestamp(),
                ],
            )
            .context("Failed to save message")?;
        Ok(inserted > 0)
    }

    /// All messages of a channel in capture order
    pub async fn messages_for_channel(&self, channel: ChannelId) -> Result<Vec<CapturedMessage>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM captured_messages
             WHERE channel_id = ?1
             ORDER BY timestamp ASC, id ASC",
            MESSAGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let messages = stmt
            .query_map(rusqlite::params![channel.0], parse_message_row)?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load messages")?;
        Ok(messages)
    }

    /// Newest messages first, optionally narrowed to a channel and topic
    pub async fn recent_messages(
        &self,
        limit: usize,
        channel: Option<ChannelId>,
        topic: Option<TopicId>,
    ) -> Result<Vec<RecentMessage>> {
        let conn = self.conn.lock().await;
        let sql = format!(
            "SELECT {} FROM captured_messages
             WHERE (?1 IS NULL OR channel_id = ?1)
               AND (?2 IS NULL OR topic_id = ?2)
             ORDER BY timestamp DESC, id DESC
             LIMIT ?3",
            MESSAGE_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let messages = stmt
            .query_map(
                rusqlite::params![channel.map(|c| c.0), topic.map(|t| t.0), limit as i64],
                |row| {
                    Ok(RecentMessage {
                        message: parse_message_row(row)?,
                        channel_name: row.get(12)?,
                        topic_name: row.get(13)?,
                    })
                },
            )?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load recent messages")?;
        Ok(messages)
    }
}

fn parse_message_row(row: &rusqlite::Row) -> rusqlite::Result<CapturedMessage> {
    let kind: String = row.get(7)?;
    let timestamp: i64 = row.get(11)?;
    Ok(CapturedMessage {
        channel_id: ChannelId(row.get(0)?),
        message_id: row.get(1)?,
        topic_id: row.get::<_, Option<i32>>(2)?.map(TopicId),
        sender: Sender {
            id: row.get(3)?,
            username: row.get(4)?,
            first_name: row.get(5)?,
            last_name: row.get(6)?,
        },
        content: MessageContent::from_parts(&kind, row.get(8)?, row.get(9)?, row.get(10)?),
        timestamp: DateTime::<Utc>::from_timestamp(timestamp, 0).unwrap_or_default(),
    })
}
