//! In-memory collaborators for engine tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use tokio::time::Instant;

use crate::model::{CapturedMessage, Channel, ChannelId, MessageContent, Sender, Topic, TopicId};

use super::{ChannelMeta, MessageSource, Payload, SendError, Transport};

#[derive(Default)]
pub struct FakeStore {
    channels: HashMap<ChannelId, Channel>,
    messages: HashMap<ChannelId, Vec<CapturedMessage>>,
    topics: HashMap<ChannelId, Vec<Topic>>,
}

impl FakeStore {
    pub fn with_channel(mut self, id: ChannelId) -> Self {
        self.channels.insert(
            id,
            Channel {
                id,
                name: Some(format!("group {}", id)),
            },
        );
        self
    }

    pub fn with_topic(mut self, channel: ChannelId, topic: i32, name: &str) -> Self {
        self.topics.entry(channel).or_default().push(Topic {
            channel_id: channel,
            id: TopicId(topic),
            name: name.to_string(),
        });
        self
    }

    /// Text messages `msg 1..=count`, message ids `1..=count`.
    pub fn with_texts(self, channel: ChannelId, count: i32, topic: Option<i32>) -> Self {
        let contents = (1..=count)
            .map(|i| MessageContent::Text(format!("msg {}", i)))
            .collect();
        self.with_contents(channel, contents, topic)
    }

    pub fn with_contents(
        mut self,
        channel: ChannelId,
        contents: Vec<MessageContent>,
        topic: Option<i32>,
    ) -> Self {
        let list = self.messages.entry(channel).or_default();
        for content in contents {
            let message_id = list.len() as i32 + 1;
            list.push(CapturedMessage {
                channel_id: channel,
                message_id,
                topic_id: topic.map(TopicId),
                sender: Sender::default(),
                content,
                timestamp: Utc
                    .timestamp_opt(1_700_000_000 + message_id as i64, 0)
                    .unwrap(),
            });
        }
        self
    }
}

#[async_trait]
impl MessageSource for FakeStore {
    async fn channel(&self, id: ChannelId) -> Result<Option<Channel>> {
        Ok(self.channels.get(&id).cloned())
    }

    async fn messages(&self, id: ChannelId) -> Result<Vec<CapturedMessage>> {
        Ok(self.messages.get(&id).cloned().unwrap_or_default())
    }

    async fn topics(&self, id: ChannelId) -> Result<Vec<Topic>> {
        Ok(self.topics.get(&id).cloned().unwrap_or_default())
    }
}

#[derive(Debug, Clone)]
pub enum Scripted {
    Throttle(Duration),
    Permanent(&'static str),
}

#[derive(Debug, Clone)]
pub struct SentRecord {
    pub channel: ChannelId,
    pub topic: Option<TopicId>,
    pub payload: Payload,
    pub at: Instant,
}

#[derive(Default)]
struct TransportState {
    created_topics: Vec<String>,
    meta_lookups: usize,
    attempts: usize,
    sent: Vec<SentRecord>,
    script: HashMap<String, VecDeque<Scripted>>,
}

/// Records every call; send outcomes can be scripted per payload.
#[derive(Default)]
pub struct FakeTransport {
    is_forum: bool,
    meta_error: bool,
    failing_topics: Vec<String>,
    state: Mutex<TransportState>,
}

fn payload_key(payload: &Payload) -> String {
    match payload {
        Payload::Text(text) => text.clone(),
        Payload::Photo(m)
        | Payload::Video(m)
        | Payload::Document(m)
        | Payload::Audio(m)
        | Payload::Voice(m)
        | Payload::Animation(m) => m.file_id.clone(),
        Payload::VideoNote { file_id } | Payload::Sticker { file_id } => file_id.clone(),
    }
}

impl FakeTransport {
    pub fn forum() -> Self {
        Self {
            is_forum: true,
            ..Self::default()
        }
    }

    pub fn with_meta_error(mut self) -> Self {
        self.meta_error = true;
        self
    }

    pub fn failing_topic(mut self, name: &str) -> Self {
        self.failing_topics.push(name.to_string());
        self
    }

    /// Queue failures for the next sends of the payload identified by `key`
    /// (text body, or file id for media).
    pub fn script(self, key: &str, outcomes: Vec<Scripted>) -> Self {
        self.state
            .lock()
            .unwrap()
            .script
            .insert(key.to_string(), outcomes.into());
        self
    }

    pub fn created_topics(&self) -> Vec<String> {
        self.state.lock().unwrap().created_topics.clone()
    }

    pub fn meta_lookups(&self) -> usize {
        self.state.lock().unwrap().meta_lookups
    }

    pub fn attempts(&self) -> usize {
        self.state.lock().unwrap().attempts
    }

    pub fn sent(&self) -> Vec<SentRecord> {
        self.state.lock().unwrap().sent.clone()
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn channel_meta(&self, _id: ChannelId) -> Result<ChannelMeta> {
        self.state.lock().unwrap().meta_lookups += 1;
        if self.meta_error {
            return Err(anyhow!("Bad Request: chat not found"));
        }
        Ok(ChannelMeta {
            is_forum: self.is_forum,
        })
    }

    async fn create_topic(&self, _id: ChannelId, name: &str) -> Result<TopicId> {
        if self.failing_topics.iter().any(|t| t == name) {
            return Err(anyhow!("Bad Request: not enough rights to create a topic"));
        }
        let mut state = self.state.lock().unwrap();
        state.created_topics.push(name.to_string());
        Ok(TopicId(1000 + state.created_topics.len() as i32))
    }

    async fn send(
        &self,
        channel: ChannelId,
        topic: Option<TopicId>,
        payload: &Payload,
    ) -> std::result::Result<(), SendError> {
        let mut state = self.state.lock().unwrap();
        state.attempts += 1;
        let scripted = state
            .script
            .get_mut(&payload_key(payload))
            .and_then(|queue| queue.pop_front());
        match scripted {
            Some(Scripted::Throttle(retry_after)) => Err(SendError::Throttled { retry_after }),
            Some(Scripted::Permanent(msg)) => Err(SendError::Permanent(msg.to_string())),
            None => {
                state.sent.push(SentRecord {
                    channel,
                    topic,
                    payload: payload.clone(),
                    at: Instant::now(),
                });
                Ok(())
            }
        }
    }
}
