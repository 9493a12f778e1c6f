use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::requests::HasPayload;
use teloxide::types::{ChatFullInfoKind, ChatFullInfoPublicKind, FileId, InputFile, MessageId, ThreadId};
use teloxide::RequestError;

use crate::migration::{ChannelMeta, Payload, SendError, Transport};
use crate::model::{ChannelId, TopicId};

/// [`Transport`] over the Telegram Bot API.
#[derive(Clone)]
pub struct TelegramTransport {
    bot: Bot,
}

impl TelegramTransport {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

pub(crate) fn tg_chat(id: ChannelId) -> teloxide::types::ChatId {
    teloxide::types::ChatId(id.0)
}

fn tg_thread(topic: TopicId) -> ThreadId {
    ThreadId(MessageId(topic.0))
}

fn map_err(e: RequestError) -> SendError {
    match e {
        RequestError::RetryAfter(secs) => SendError::Throttled {
            retry_after: secs.duration(),
        },
        other => SendError::Permanent(other.to_string()),
    }
}

#[async_trait]
impl Transport for TelegramTransport {
    async fn channel_meta(&self, id: ChannelId) -> Result<ChannelMeta> {
        let chat = self
            .bot
            .get_chat(tg_chat(id))
            .await
            .with_context(|| format!("Failed to get chat {}", id))?;
        Ok(ChannelMeta {
            is_forum: matches!(
                &chat.kind,
                ChatFullInfoKind::Public(public)
                    if matches!(
                        &public.kind,
                        ChatFullInfoPublicKind::Supergroup(sg) if sg.is_forum
                    )
            ),
        })
    }

    async fn create_topic(&self, id: ChannelId, name: &str) -> Result<TopicId> {
        let topic = self
            .bot
            .create_forum_topic(tg_chat(id), name.to_string())
            .await
            .with_context(|| format!("Failed to create topic '{}' in {}", name, id))?;
        Ok(TopicId(topic.thread_id.0 .0))
    }

    async fn send(
        &self,
        id: ChannelId,
        topic: Option<TopicId>,
        payload: &Payload,
    ) -> std::result::Result<(), SendError> {
        let chat = tg_chat(id);
        let thread = topic.map(tg_thread);

        macro_rules! media {
            ($method:ident, $media:expr) => {{
                let mut req = self
                    .bot
                    .$method(chat, InputFile::file_id(FileId($media.file_id.clone())));
                req.payload_mut().message_thread_id = thread;
                req.payload_mut().caption = $media.caption.clone();
                req.await.map(|_| ())
            }};
        }

        macro_rules! bare {
            ($method:ident, $file_id:expr) => {{
                let mut req = self
                    .bot
                    .$method(chat, InputFile::file_id(FileId($file_id.clone())));
                req.payload_mut().message_thread_id = thread;
                req.await.map(|_| ())
            }};
        }

        let sent = match payload {
            Payload::Text(text) => {
                let mut req = self.bot.send_message(chat, text.clone());
                req.payload_mut().message_thread_id = thread;
                req.await.map(|_| ())
            }
            Payload::Photo(m) => media!(send_photo, m),
            Payload::Video(m) => media!(send_video, m),
            Payload::Document(m) => media!(send_document, m),
            Payload::Audio(m) => media!(send_audio, m),
            Payload::Voice(m) => media!(send_voice, m),
            Payload::Animation(m) => media!(send_animation, m),
            Payload::VideoNote { file_id } => bare!(send_video_note, file_id),
            Payload::Sticker { file_id } => bare!(send_sticker, file_id),
        };

        sent.map_err(map_err)
    }
}
