//! Replays the captured history of one channel into another.
//!
//! The engine only talks to its collaborators through [`MessageSource`] and
//! [`Transport`]; the SQLite store and the Telegram bot implement them.

pub mod delivery;
pub mod orchestrator;
pub mod pacer;
pub mod progress;
pub mod remap;
pub mod result;

#[cfg(test)]
pub(crate) mod testing;

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;

use crate::model::{CapturedMessage, Channel, ChannelId, Topic, TopicId};

pub use delivery::{DeliveryLimits, Payload};
pub use orchestrator::{MigrationSettings, Migrator};
#[cfg(test)]
pub use progress::NoProgress;
pub use progress::ProgressReporter;
pub use result::{MessageError, MigrationResult};

/// Read access to captured history.
#[async_trait]
pub trait MessageSource: Send + Sync {
    async fn channel(&self, id: ChannelId) -> Result<Option<Channel>>;

    /// All messages of a channel, ascending by timestamp.
    async fn messages(&self, id: ChannelId) -> Result<Vec<CapturedMessage>>;

    async fn topics(&self, id: ChannelId) -> Result<Vec<Topic>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelMeta {
    pub is_forum: bool,
}

/// Outcome of a failed send.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Flood control; the same request may be retried after `retry_after`.
    #[error("flood control exceeded, retry after {retry_after:?}")]
    Throttled { retry_after: Duration },

    #[error("{0}")]
    Permanent(String),
}

/// The remote messaging service the history is replayed into.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn channel_meta(&self, id: ChannelId) -> Result<ChannelMeta>;

    async fn create_topic(&self, id: ChannelId, name: &str) -> Result<TopicId>;

    async fn send(
        &self,
        id: ChannelId,
        topic: Option<TopicId>,
        payload: &Payload,
    ) -> std::result::Result<(), SendError>;
}

/// Run-level failures. Nothing has been sent when one of these is returned.
#[derive(Debug, thiserror::Error)]
pub enum MigrationError {
    #[error("source group {0} not found in database")]
    NotFound(ChannelId),

    #[error("no messages found for group {0}")]
    EmptySource(ChannelId),

    #[error("failed to read source history: {0:#}")]
    Store(anyhow::Error),
}
