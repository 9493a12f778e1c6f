use std::collections::HashMap;

use tracing::{error, info, warn};

use crate::model::{ChannelId, Topic, TopicId};

use super::Transport;

/// Source topic id -> topic created in the target. Lives for one run only.
#[derive(Debug, Default)]
pub struct TopicMapping {
    map: HashMap<TopicId, TopicId>,
}

impl TopicMapping {
    /// Target topic for a source topic. `None` means "send without topic",
    /// whether the message had no topic or its topic couldn't be recreated.
    pub fn resolve(&self, source: Option<TopicId>) -> Option<TopicId> {
        source.and_then(|id| self.map.get(&id).copied())
    }

    /// Number of topics successfully created in the target.
    pub fn created(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

/// Recreate the source topics in `target` when it is a forum.
///
/// Fails open: unreadable target metadata is treated as "not a forum", and a
/// topic that can't be created is logged and skipped.
pub async fn build_topic_mapping(
    transport: &dyn Transport,
    target: ChannelId,
    topics: &[Topic],
) -> TopicMapping {
    let mut mapping = TopicMapping::default();
    if topics.is_empty() {
        return mapping;
    }

    let is_forum = match transport.channel_meta(target).await {
        Ok(meta) => meta.is_forum,
        Err(e) => {
            warn!("Could not get chat info for {}: {:#}", target, e);
            false
        }
    };
    if !is_forum {
        info!(
            "Target {} is not a forum; {} source topic(s) will be flattened",
            target,
            topics.len()
        );
        return mapping;
    }

    for topic in topics {
        if mapping.map.contains_key(&topic.id) {
            continue;
        }
        match transport.create_topic(target, &topic.name).await {
            Ok(new_id) => {
                info!("Created topic '{}' with ID {}", topic.name, new_id);
                mapping.map.insert(topic.id, new_id);
            }
            Err(e) => {
                error!("Failed to create topic '{}': {:#}", topic.name, e);
            }
        }
    }

    mapping
}
