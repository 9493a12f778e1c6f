use chrono::{DateTime, Utc};
use serde::Serialize;

/// Telegram chat id of a monitored group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelId(pub i64);

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Forum topic (message thread) id, only unique within its channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct TopicId(pub i32);

impl std::fmt::Display for TopicId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Channel {
    pub id: ChannelId,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Topic {
    pub channel_id: ChannelId,
    pub id: TopicId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sender {
    pub id: Option<i64>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
}

impl Sender {
    /// Short label for listings: username, then first name.
    pub fn display_name(&self) -> &str {
        self.username
            .as_deref()
            .or(self.first_name.as_deref())
            .unwrap_or("Unknown")
    }
}

/// Discriminator stored in the `content_kind` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Text,
    Photo,
    Video,
    Document,
    Audio,
    Voice,
    VideoNote,
    Sticker,
    Animation,
    Location,
    Poll,
    Other,
}

impl ContentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ContentKind::Text => "text",
            ContentKind::Photo => "photo",
            ContentKind::Video => "video",
            ContentKind::Document => "document",
            ContentKind::Audio => "audio",
            ContentKind::Voice => "voice",
            ContentKind::VideoNote => "video_note",
            ContentKind::Sticker => "sticker",
            ContentKind::Animation => "animation",
            ContentKind::Location => "location",
            ContentKind::Poll => "poll",
            ContentKind::Other => "other",
        }
    }

    /// Unknown discriminators map to `Other`.
    pub fn parse(s: &str) -> Self {
        match s {
            "text" => ContentKind::Text,
            "photo" => ContentKind::Photo,
            "video" => ContentKind::Video,
            "document" => ContentKind::Document,
            "audio" => ContentKind::Audio,
            "voice" => ContentKind::Voice,
            "video_note" => ContentKind::VideoNote,
            "sticker" => ContentKind::Sticker,
            "animation" => ContentKind::Animation,
            "location" => ContentKind::Location,
            "poll" => ContentKind::Poll,
            _ => ContentKind::Other,
        }
    }
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file reference with an optional caption.
#[derive(Debug, Clone, PartialEq)]
pub struct Media {
    pub file_id: String,
    pub caption: Option<String>,
}

/// Message payload. Each variant carries only the fields that are legal for
/// its kind: stickers and video notes cannot hold a caption, synthesized
/// kinds have no file reference.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageContent {
    Text(String),
    Photo(Media),
    Video(Media),
    Document(Media),
    Audio(Media),
    Voice(Media),
    Animation(Media),
    VideoNote { file_id: String },
    Sticker { file_id: String },
    Location { text: Option<String> },
    Poll { text: Option<String> },
    /// Anything else. `tag` keeps the stored discriminator for the `[TAG]` marker.
    Other { tag: String, text: Option<String> },
}

impl MessageContent {
    /// Rebuild the union from the loosely typed storage columns.
    ///
    /// A media row without a file reference cannot be re-sent as media and
    /// degrades to `Other` with the original kind as its tag.
    pub fn from_parts(
        kind: &str,
        text: Option<String>,
        caption: Option<String>,
        file_id: Option<String>,
    ) -> Self {
        let file_id = file_id.filter(|f| !f.is_empty());
        let media = |file_id: String| Media { file_id, caption };

        match (ContentKind::parse(kind), file_id) {
            (ContentKind::Text, _) => MessageContent::Text(text.unwrap_or_default()),
            (ContentKind::Photo, Some(f)) => MessageContent::Photo(media(f)),
            (ContentKind::Video, Some(f)) => MessageContent::Video(media(f)),
            (ContentKind::Document, Some(f)) => MessageContent::Document(media(f)),
            (ContentKind::Audio, Some(f)) => MessageContent::Audio(media(f)),
            (ContentKind::Voice, Some(f)) => MessageContent::Voice(media(f)),
            (ContentKind::Animation, Some(f)) => MessageContent::Animation(media(f)),
            (ContentKind::VideoNote, Some(f)) => MessageContent::VideoNote { file_id: f },
            (ContentKind::Sticker, Some(f)) => MessageContent::Sticker { file_id: f },
            (ContentKind::Location, _) => MessageContent::Location { text },
            (ContentKind::Poll, _) => MessageContent::Poll { text },
            (_, _) => MessageContent::Other {
                tag: kind.to_string(),
                text,
            },
        }
    }

    pub fn kind(&self) -> ContentKind {
        match self {
            MessageContent::Text(_) => ContentKind::Text,
            MessageContent::Photo(_) => ContentKind::Photo,
            MessageContent::Video(_) => ContentKind::Video,
            MessageContent::Document(_) => ContentKind::Document,
            MessageContent::Audio(_) => ContentKind::Audio,
            MessageContent::Voice(_) => ContentKind::Voice,
            MessageContent::Animation(_) => ContentKind::Animation,
            MessageContent::VideoNote { .. } => ContentKind::VideoNote,
            MessageContent::Sticker { .. } => ContentKind::Sticker,
            MessageContent::Location { .. } => ContentKind::Location,
            MessageContent::Poll { .. } => ContentKind::Poll,
            MessageContent::Other { .. } => ContentKind::Other,
        }
    }

    /// Split back into `(kind, text, caption, file_id)` columns.
    pub fn to_parts(&self) -> (String, Option<&str>, Option<&str>, Option<&str>) {
        let kind = self.kind().as_str().to_string();
        match self {
            MessageContent::Text(text) => (kind, Some(text.as_str()), None, None),
            MessageContent::Photo(m)
            | MessageContent::Video(m)
            | MessageContent::Document(m)
            | MessageContent::Audio(m)
            | MessageContent::Voice(m)
            | MessageContent::Animation(m) => {
                (kind, None, m.caption.as_deref(), Some(m.file_id.as_str()))
            }
            MessageContent::VideoNote { file_id } | MessageContent::Sticker { file_id } => {
                (kind, None, None, Some(file_id.as_str()))
            }
            MessageContent::Location { text } | MessageContent::Poll { text } => {
                (kind, text.as_deref(), None, None)
            }
            MessageContent::Other { tag, text } => (tag.clone(), text.as_deref(), None, None),
        }
    }
}

/// A stored message as read back by the migration engine.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedMessage {
    pub channel_id: ChannelId,
    pub message_id: i32,
    pub topic_id: Option<TopicId>,
    pub sender: Sender,
    pub content: MessageContent,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_kind_parses_as_other() {
        assert_eq!(ContentKind::parse("dice"), ContentKind::Other);
        assert_eq!(ContentKind::parse("video_note"), ContentKind::VideoNote);
    }

    #[test]
    fn test_sticker_row_drops_caption() {
        let content = MessageContent::from_parts(
            "sticker",
            None,
            Some("ignored".to_string()),
            Some("CAAC".to_string()),
        );
        assert_eq!(
            content,
            MessageContent::Sticker {
                file_id: "CAAC".to_string()
            }
        );
    }

    #[test]
    fn test_media_without_file_degrades_to_other() {
        let content =
            MessageContent::from_parts("photo", None, Some("sunset".to_string()), None);
        assert_eq!(
            content,
            MessageContent::Other {
                tag: "photo".to_string(),
                text: None
            }
        );
    }

    #[test]
    fn test_unrecognized_kind_keeps_tag() {
        let content = MessageContent::from_parts("dice", Some("6".to_string()), None, None);
        assert_eq!(content.kind(), ContentKind::Other);
        let (kind, text, _, _) = content.to_parts();
        assert_eq!(kind, "dice");
        assert_eq!(text, Some("6"));
    }

    #[test]
    fn test_sender_display_name_fallbacks() {
        let mut sender = Sender::default();
        assert_eq!(sender.display_name(), "Unknown");
        sender.first_name = Some("Ada".to_string());
        assert_eq!(sender.display_name(), "Ada");
        sender.username = Some("ada_l".to_string());
        assert_eq!(sender.display_name(), "ada_l");
    }
}
