use anyhow::{Context, Result};
use serde::Serialize;

use super::Store;
use crate::model::{ChannelId, TopicId};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatabaseStats {
    pub channels: usize,
    /// Falls back to the channel count when no forum topics are known:
    /// every plain group counts as one implicit topic.
    pub topics: usize,
    pub messages: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChannelSummary {
    pub id: ChannelId,
    pub name: Option<String>,
    pub message_count: usize,
    /// At least 1: a group without forum topics has its default topic.
    pub topic_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TopicStat {
    /// `None` for the "General" bucket of topic-less messages.
    pub topic_id: Option<TopicId>,
    pub name: String,
    pub message_count: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetailedStats {
    pub total_messages: usize,
    pub total_channels: usize,
    pub total_topics: usize,
    /// `(content kind, count)`, most common first.
    pub by_kind: Vec<(String, usize)>,
    /// `(channel name, count)` for the five busiest channels.
    pub active_channels: Vec<(Option<String>, usize)>,
    /// `(topic name, channel name, count)` for the five busiest topics.
    pub active_topics: Vec<(Option<String>, Option<String>, usize)>,
}

impl Store {
    pub async fn database_stats(&self) -> Result<DatabaseStats> {
        let conn = self.conn.lock().await;
        let channels: i64 = conn.query_row("SELECT count(*) FROM channels", [], |r| r.get(0))?;
        let topics: i64 = conn.query_row("SELECT count(*) FROM topics", [], |r| r.get(0))?;
        let messages: i64 =
            conn.query_row("SELECT count(*) FROM captured_messages", [], |r| r.get(0))?;

        Ok(DatabaseStats {
            channels: channels as usize,
            topics: (if topics > 0 { topics } else { channels }) as usize,
            messages: messages as usize,
        })
    }

    /// Every monitored channel with message and topic counts
    pub async fn channel_summaries(&self) -> Result<Vec<ChannelSummary>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT c.channel_id, c.name,
                    (SELECT count(*) FROM captured_messages m WHERE m.channel_id = c.channel_id),
                    (SELECT count(*) FROM topics t WHERE t.channel_id = c.channel_id)
             FROM channels c
             ORDER BY c.created_at ASC, c.channel_id ASC",
        )?;
        let summaries = stmt
            .query_map([], |row| {
                let message_count: i64 = row.get(2)?;
                let topic_count: i64 = row.get(3)?;
                Ok(ChannelSummary {
                    id: ChannelId(row.get(0)?),
                    name: row.get(1)?,
                    message_count: message_count as usize,
                    topic_count: topic_count.max(1) as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to list channels")?;
        Ok(summaries)
    }

    /// Message count per topic, led by a "General" bucket when some
    /// messages have no topic.
    pub async fn topic_stats(&self, channel: ChannelId) -> Result<Vec<TopicStat>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT t.topic_id, t.name,
                    (SELECT count(*) FROM captured_messages m
                     WHERE m.channel_id = t.channel_id AND m.topic_id = t.topic_id)
             FROM topics t
             WHERE t.channel_id = ?1
             ORDER BY t.id ASC",
        )?;
        let mut stats = stmt
            .query_map(rusqlite::params![channel.0], |row| {
                let count: i64 = row.get(2)?;
                Ok(TopicStat {
                    topic_id: Some(TopicId(row.get(0)?)),
                    name: row.get(1)?,
                    message_count: count as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load topic stats")?;

        let general: i64 = conn.query_row(
            "SELECT count(*) FROM captured_messages WHERE channel_id = ?1 AND topic_id IS NULL",
            rusqlite::params![channel.0],
            |row| row.get(0),
        )?;
        if general > 0 {
            stats.insert(
                0,
                TopicStat {
                    topic_id: None,
                    name: "General".to_string(),
                    message_count: general as usize,
                },
            );
        }
        Ok(stats)
    }

    pub async fn detailed_stats(&self) -> Result<DetailedStats> {
        let conn = self.conn.lock().await;
        let count = |sql: &str| -> Result<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(n as usize)
        };
        let total_messages = count("SELECT count(*) FROM captured_messages")?;
        let total_channels = count("SELECT count(*) FROM channels")?;
        let total_topics = count("SELECT count(*) FROM topics")?;

        let mut stmt = conn.prepare(
            "SELECT content_kind, count(*) AS n FROM captured_messages
             GROUP BY content_kind
             ORDER BY n DESC, content_kind ASC",
        )?;
        let by_kind = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as usize)))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to count message kinds")?;

        let mut stmt = conn.prepare(
            "SELECT channel_name, count(*) AS n FROM captured_messages
             GROUP BY channel_id, channel_name
             ORDER BY n DESC
             LIMIT 5",
        )?;
        let active_channels = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get::<_, i64>(1)? as usize)))?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to rank channels")?;

        let mut stmt = conn.prepare(
            "SELECT topic_name, channel_name, count(*) AS n FROM captured_messages
             WHERE topic_id IS NOT NULL
             GROUP BY topic_name, channel_name
             ORDER BY n DESC
             LIMIT 5",
        )?;
        let active_topics = stmt
            .query_map([], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get::<_, i64>(2)? as usize))
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to rank topics")?;

        Ok(DetailedStats {
            total_messages,
            total_channels,
            total_topics,
            by_kind,
            active_channels,
            active_topics,
        })
    }
}
