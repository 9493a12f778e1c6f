use anyhow::Result;
use teloxide::types::{FileId, Message};
use tracing::{debug, info};

use crate::model::{CapturedMessage, ChannelId, Media, MessageContent, Sender, TopicId};
use crate::store::Store;

fn file(id: &FileId) -> String {
    id.0.clone()
}

fn media(id: &FileId, caption: Option<&str>) -> Media {
    Media {
        file_id: file(id),
        caption: caption.map(str::to_string),
    }
}

/// First matching content kind wins; the order matters for messages that
/// carry more than one.
pub fn extract_content(msg: &Message) -> MessageContent {
    let caption = msg.caption();
    if let Some(text) = msg.text() {
        MessageContent::Text(text.to_string())
    } else if let Some(largest) = msg.photo().and_then(|sizes| sizes.last()) {
        MessageContent::Photo(media(&largest.file.id, caption))
    } else if let Some(video) = msg.video() {
        MessageContent::Video(media(&video.file.id, caption))
    } else if let Some(doc) = msg.document() {
        MessageContent::Document(media(&doc.file.id, caption))
    } else if let Some(audio) = msg.audio() {
        MessageContent::Audio(media(&audio.file.id, caption))
    } else if let Some(voice) = msg.voice() {
        MessageContent::Voice(media(&voice.file.id, caption))
    } else if let Some(note) = msg.video_note() {
        MessageContent::VideoNote {
            file_id: file(&note.file.id),
        }
    } else if let Some(sticker) = msg.sticker() {
        MessageContent::Sticker {
            file_id: file(&sticker.file.id),
        }
    } else if let Some(animation) = msg.animation() {
        MessageContent::Animation(media(&animation.file.id, caption))
    } else if let Some(loc) = msg.location() {
        MessageContent::Location {
            text: Some(format!("Location: {}, {}", loc.latitude, loc.longitude)),
        }
    } else if let Some(poll) = msg.poll() {
        MessageContent::Poll {
            text: Some(format!("Poll: {}", poll.question)),
        }
    } else {
        MessageContent::Other {
            tag: "other".to_string(),
            text: None,
        }
    }
}

pub fn sender_of(msg: &Message) -> Sender {
    match msg.from.as_ref() {
        Some(user) => Sender {
            id: Some(user.id.0 as i64),
            username: user.username.clone(),
            first_name: Some(user.first_name.clone()),
            last_name: user.last_name.clone(),
        },
        None => Sender::default(),
    }
}

/// Forum topic of a message, if it was posted inside one.
pub fn topic_of(msg: &Message) -> Option<TopicId> {
    if !msg.is_topic_message {
        return None;
    }
    msg.thread_id.map(|t| TopicId(t.0 .0))
}

pub fn is_group(msg: &Message) -> bool {
    msg.chat.is_group() || msg.chat.is_supergroup()
}

/// Stored name first, then the "topic created" message being replied to,
/// then a placeholder.
async fn resolve_topic_name(
    store: &Store,
    channel: ChannelId,
    topic: TopicId,
    msg: &Message,
) -> Result<String> {
    if let Some(name) = store.topic_name(channel, topic).await? {
        return Ok(name);
    }
    if let Some(created) = msg
        .reply_to_message()
        .and_then(|reply| reply.forum_topic_created())
    {
        return Ok(created.name.clone());
    }
    debug!("Using fallback topic name for topic {}", topic);
    Ok(format!("Topic {}", topic))
}

/// Persist a group message. Returns false for non-group chats and for
/// messages that were already stored.
pub async fn capture_message(store: &Store, msg: &Message) -> Result<bool> {
    if !is_group(msg) {
        return Ok(false);
    }
    let channel = ChannelId(msg.chat.id.0);
    let channel_name = msg.chat.title();
    store.upsert_channel(channel, channel_name).await?;

    let topic = topic_of(msg);
    let topic_name = match topic {
        Some(topic) => {
            let name = resolve_topic_name(store, channel, topic, msg).await?;
            store.upsert_topic(channel, topic, &name).await?;
            Some(name)
        }
        None => None,
    };

    let captured = CapturedMessage {
        channel_id: channel,
        message_id: msg.id.0,
        topic_id: topic,
        sender: sender_of(msg),
        content: extract_content(msg),
        timestamp: msg.date,
    };
    let inserted = store
        .save_message(&captured, channel_name, topic_name.as_deref())
        .await?;

    debug!(
        "Captured {} message from {}",
        captured.content.kind(),
        channel_name.unwrap_or("unnamed group")
    );
    Ok(inserted)
}

/// Record forum topic creation and renames. Returns true when the message
/// was a topic service message.
pub async fn capture_topic_event(store: &Store, msg: &Message) -> Result<bool> {
    let channel = ChannelId(msg.chat.id.0);
    let Some(thread) = msg.thread_id else {
        return Ok(false);
    };
    let topic = TopicId(thread.0 .0);

    if let Some(created) = msg.forum_topic_created() {
        store.upsert_channel(channel, msg.chat.title()).await?;
        store.upsert_topic(channel, topic, &created.name).await?;
        info!(
            "New forum topic created: '{}' (ID: {}) in group {}",
            created.name, topic, channel
        );
        return Ok(true);
    }
    if let Some(edited) = msg.forum_topic_edited() {
        // Icon-only edits carry no name.
        if let Some(name) = &edited.name {
            store.upsert_topic(channel, topic, name).await?;
            info!("Forum topic edited: '{}' (ID: {}) in group {}", name, topic, channel);
        }
        return Ok(true);
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(extra: serde_json::Value) -> Message {
        let mut base = json!({
            "message_id": 10,
            "date": 1_700_000_000,
            "chat": {"id": -100123, "type": "supergroup", "title": "Team"},
            "from": {"id": 7, "is_bot": false, "first_name": "Ada", "username": "ada"}
        });
        if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    fn photo_size(id: &str, width: u32) -> serde_json::Value {
        json!({"file_id": id, "file_unique_id": format!("u{}", id), "width": width, "height": width, "file_size": 100})
    }

    #[test]
    fn test_text_message() {
        let msg = message(json!({"text": "hello"}));
        assert_eq!(extract_content(&msg), MessageContent::Text("hello".into()));
        let sender = sender_of(&msg);
        assert_eq!(sender.id, Some(7));
        assert_eq!(sender.username.as_deref(), Some("ada"));
        assert_eq!(topic_of(&msg), None);
    }

    #[test]
    fn test_photo_keeps_largest_size_and_caption() {
        let msg = message(json!({
            "photo": [photo_size("small", 90), photo_size("large", 1280)],
            "caption": "sunset"
        }));
        assert_eq!(
            extract_content(&msg),
            MessageContent::Photo(Media {
                file_id: "large".into(),
                caption: Some("sunset".into())
            })
        );
    }

    #[test]
    fn test_location_becomes_text() {
        let msg = message(json!({"location": {"latitude": 1.5, "longitude": -2.25}}));
        assert_eq!(
            extract_content(&msg),
            MessageContent::Location {
                text: Some("Location: 1.5, -2.25".into())
            }
        );
    }

    #[tokio::test]
    async fn test_capture_uses_reply_topic_name_then_store() {
        let store = Store::open_in_memory().unwrap();
        let msg = message(json!({
            "text": "in topic",
            "message_thread_id": 55,
            "is_topic_message": true,
            "reply_to_message": {
                "message_id": 55,
                "date": 1_699_999_000,
                "chat": {"id": -100123, "type": "supergroup", "title": "Team"},
                "message_thread_id": 55,
                "forum_topic_created": {"name": "Releases", "icon_color": 7322096}
            }
        }));

        assert!(capture_message(&store, &msg).await.unwrap());
        assert_eq!(
            store
                .topic_name(ChannelId(-100123), TopicId(55))
                .await
                .unwrap()
                .as_deref(),
            Some("Releases")
        );
        // Captured once; a repeat is ignored.
        assert!(!capture_message(&store, &msg).await.unwrap());

        let stored = store.messages_for_channel(ChannelId(-100123)).await.unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].topic_id, Some(TopicId(55)));
    }

    #[tokio::test]
    async fn test_unknown_topic_gets_placeholder_name() {
        let store = Store::open_in_memory().unwrap();
        let msg = message(json!({
            "text": "hi",
            "message_thread_id": 9,
            "is_topic_message": true
        }));
        capture_message(&store, &msg).await.unwrap();
        assert_eq!(
            store
                .topic_name(ChannelId(-100123), TopicId(9))
                .await
                .unwrap()
                .as_deref(),
            Some("Topic 9")
        );
    }

    #[tokio::test]
    async fn test_private_chats_are_not_captured() {
        let store = Store::open_in_memory().unwrap();
        let msg = message(json!({
            "chat": {"id": 7, "type": "private", "first_name": "Ada"},
            "text": "hi"
        }));
        assert!(!capture_message(&store, &msg).await.unwrap());
        assert_eq!(store.database_stats().await.unwrap().messages, 0);
    }

    #[tokio::test]
    async fn test_topic_created_and_renamed() {
        let store = Store::open_in_memory().unwrap();
        let created = message(json!({
            "message_thread_id": 12,
            "forum_topic_created": {"name": "Draft", "icon_color": 7322096}
        }));
        assert!(capture_topic_event(&store, &created).await.unwrap());

        let edited = message(json!({
            "message_thread_id": 12,
            "forum_topic_edited": {"name": "Final"}
        }));
        assert!(capture_topic_event(&store, &edited).await.unwrap());

        let topics = store.topics_for_channel(ChannelId(-100123)).await.unwrap();
        assert_eq!(topics.len(), 1);
        assert_eq!(topics[0].name, "Final");
    }
}
