use anyhow::{Context, Result};
use rusqlite::OptionalExtension;
use tracing::info;

use super::Store;
use crate::model::{Channel, ChannelId, Topic, TopicId};

impl Store {
    /// Add a group, or refresh its name if it is already known
    pub async fn upsert_channel(&self, id: ChannelId, name: Option<&str>) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO channels (channel_id, name) VALUES (?1, ?2)
             ON CONFLICT(channel_id) DO UPDATE SET
                name = excluded.name,
                updated_at = datetime('now')",
            rusqlite::params![id.0, name],
        )
        .context("Failed to upsert channel")?;
        Ok(())
    }

    pub async fn get_channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        let conn = self.conn.lock().await;
        let channel = conn
            .query_row(
                "SELECT channel_id, name FROM channels WHERE channel_id = ?1",
                rusqlite::params![id.0],
                |row| {
                    Ok(Channel {
                        id: ChannelId(row.get(0)?),
                        name: row.get(1)?,
                    })
                },
            )
            .optional()
            .context("Failed to load channel")?;
        Ok(channel)
    }

    /// Add a forum topic, renaming it in place when the name changed
    pub async fn upsert_topic(&self, channel: ChannelId, topic: TopicId, name: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        let existing: Option<String> = conn
            .query_row(
                "SELECT name FROM topics WHERE channel_id = ?1 AND topic_id = ?2",
                rusqlite::params![channel.0, topic.0],
                |row| row.get(0),
            )
            .optional()?;

        match existing {
            Some(current) if current == name => {}
            Some(_) => {
                conn.execute(
                    "UPDATE topics SET name = ?3 WHERE channel_id = ?1 AND topic_id = ?2",
                    rusqlite::params![channel.0, topic.0, name],
                )
                .context("Failed to rename topic")?;
                info!("Updated topic name: {} ({}) in group {}", name, topic, channel);
            }
            None => {
                conn.execute(
                    "INSERT INTO topics (channel_id, topic_id, name) VALUES (?1, ?2, ?3)",
                    rusqlite::params![channel.0, topic.0, name],
                )
                .context("Failed to insert topic")?;
                info!("Added topic: {} ({}) in group {}", name, topic, channel);
            }
        }
        Ok(())
    }

    pub async fn topic_name(&self, channel: ChannelId, topic: TopicId) -> Result<Option<String>> {
        let conn = self.conn.lock().await;
        let name = conn
            .query_row(
                "SELECT name FROM topics WHERE channel_id = ?1 AND topic_id = ?2",
                rusqlite::params![channel.0, topic.0],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    pub async fn topics_for_channel(&self, channel: ChannelId) -> Result<Vec<Topic>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(
            "SELECT channel_id, topic_id, name FROM topics
             WHERE channel_id = ?1
             ORDER BY id ASC",
        )?;
        let topics = stmt
            .query_map(rusqlite::params![channel.0], |row| {
                Ok(Topic {
                    channel_id: ChannelId(row.get(0)?),
                    id: TopicId(row.get(1)?),
                    name: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to load topics")?;
        Ok(topics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_upsert_channel_updates_name() {
        let store = Store::open_in_memory().unwrap();
        store
            .upsert_channel(ChannelId(-100), Some("Old"))
            .await
            .unwrap();
        store
            .upsert_channel(ChannelId(-100), Some("New"))
            .await
            .unwrap();

        let channel = store.get_channel(ChannelId(-100)).await.unwrap().unwrap();
        assert_eq!(channel.name.as_deref(), Some("New"));
        assert!(store.get_channel(ChannelId(-1)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_topic_renamed_in_place() {
        let store = Store::open_in_memory().unwrap();
        let channel = ChannelId(-100);
        store.upsert_topic(channel, TopicId(5), "Draft").await.unwrap();
        store.upsert_topic(channel, TopicId(5), "Final").await.unwrap();
        store.upsert_topic(channel, TopicId(5), "Final").await.unwrap();

        let topics = store.topics_for_channel(channel).await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name, "Final");
        assert_eq!(
            store.topic_name(channel, TopicId(5)).await.unwrap().as_deref(),
            Some("Final")
        );
    }

    #[tokio::test]
    async fn test_topic_ids_scoped_per_channel() {
        let store = Store::open_in_memory().unwrap();
        store.upsert_topic(ChannelId(-1), TopicId(2), "A").await.unwrap();
        store.upsert_topic(ChannelId(-2), TopicId(2), "B").await.unwrap();

        let first = store.topics_for_channel(ChannelId(-1)).await.unwrap();
        assert_eq!(first.len(), 1);
        assert_eq!(first[0].name, "A");
        assert_eq!(
            store.topic_name(ChannelId(-2), TopicId(2)).await.unwrap().as_deref(),
            Some("B")
        );
    }
}
