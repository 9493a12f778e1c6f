pub mod channels;
pub mod messages;
pub mod stats;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rusqlite::Connection;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;

use crate::migration::MessageSource;
use crate::model::{CapturedMessage, Channel, ChannelId, Topic};

/// Thread-safe SQLite store for captured groups, topics and messages
#[derive(Clone)]
pub struct Store {
    conn: Arc<Mutex<Connection>>,
}

impl Store {
    /// Open or create the SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;

        // journal_mode PRAGMA always returns the resulting mode, so use query_row
        let _: String = conn.query_row("PRAGMA journal_mode=WAL", [], |row| row.get(0))?;

        // Run migrations on the raw connection before wrapping in Mutex.
        // This avoids blocking_lock() panic when called from async context.
        Self::run_migrations(&conn)?;

        info!("Message store initialized at: {}", path.display());
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory database (for testing)
    #[allow(dead_code)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn run_migrations(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS channels (
                channel_id INTEGER PRIMARY KEY,
                name TEXT,
                created_at TEXT NOT NULL DEFAULT (datetime('now')),
                updated_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE TABLE IF NOT EXISTS topics (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id INTEGER NOT NULL,
                topic_id INTEGER NOT NULL,
                name TEXT NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_topics_channel
                ON topics(channel_id, topic_id);

            CREATE TABLE IF NOT EXISTS captured_messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                channel_id INTEGER NOT NULL,
                channel_name TEXT,
                message_id INTEGER NOT NULL,
                topic_id INTEGER,
                topic_name TEXT,
                sender_id INTEGER,
                sender_username TEXT,
                sender_first_name TEXT,
                sender_last_name TEXT,
                content_kind TEXT NOT NULL,
                text_content TEXT,
                caption TEXT,
                file_id TEXT,
                timestamp INTEGER NOT NULL,
                created_at TEXT NOT NULL DEFAULT (datetime('now'))
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_messages_channel_message
                ON captured_messages(channel_id, message_id);

            CREATE INDEX IF NOT EXISTS idx_messages_channel_time
                ON captured_messages(channel_id, timestamp);
            ",
        )
        .context("Failed to create schema")?;

        Ok(())
    }
}

#[async_trait]
impl MessageSource for Store {
    async fn channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        self.get_channel(id).await
    }

    async fn messages(&self, id: ChannelId) -> Result<Vec<CapturedMessage>> {
        self.messages_for_channel(id).await
    }

    async fn topics(&self, id: ChannelId) -> Result<Vec<Topic>> {
        self.topics_for_channel(id).await
    }
}
