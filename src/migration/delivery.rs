use crate::model::{ChannelId, Media, MessageContent, TopicId};

use super::{SendError, Transport};

/// Telegram's hard limits for message text and media captions.
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryLimits {
    pub max_text_len: usize,
    pub max_caption_len: usize,
    pub ellipsis: String,
}

impl Default for DeliveryLimits {
    fn default() -> Self {
        Self {
            max_text_len: 4096,
            max_caption_len: 1024,
            ellipsis: "...".to_string(),
        }
    }
}

/// What actually goes over the wire for one captured message.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Photo(Media),
    Video(Media),
    Document(Media),
    Audio(Media),
    Voice(Media),
    Animation(Media),
    VideoNote { file_id: String },
    Sticker { file_id: String },
}

/// Cut `text` to at most `max_chars` characters, ending in `ellipsis` when
/// anything was removed. Counts chars, not bytes.
pub fn truncate(text: &str, max_chars: usize, ellipsis: &str) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let keep = max_chars.saturating_sub(ellipsis.chars().count());
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(ellipsis);
    out
}

impl DeliveryLimits {
    fn text(&self, text: &str) -> String {
        truncate(text, self.max_text_len, &self.ellipsis)
    }

    fn media(&self, media: &Media) -> Media {
        Media {
            file_id: media.file_id.clone(),
            caption: media
                .caption
                .as_deref()
                .filter(|c| !c.is_empty())
                .map(|c| truncate(c, self.max_caption_len, &self.ellipsis)),
        }
    }
}

/// Map a stored message onto exactly one outgoing payload.
pub fn prepare(content: &MessageContent, limits: &DeliveryLimits) -> Payload {
    match content {
        MessageContent::Text(text) => Payload::Text(limits.text(text)),
        MessageContent::Photo(m) => Payload::Photo(limits.media(m)),
        MessageContent::Video(m) => Payload::Video(limits.media(m)),
        MessageContent::Document(m) => Payload::Document(limits.media(m)),
        MessageContent::Audio(m) => Payload::Audio(limits.media(m)),
        MessageContent::Voice(m) => Payload::Voice(limits.media(m)),
        MessageContent::Animation(m) => Payload::Animation(limits.media(m)),
        MessageContent::VideoNote { file_id } => Payload::VideoNote {
            file_id: file_id.clone(),
        },
        MessageContent::Sticker { file_id } => Payload::Sticker {
            file_id: file_id.clone(),
        },
        MessageContent::Location { text } => {
            Payload::Text(limits.text(&tagged("location", text.as_deref())))
        }
        MessageContent::Poll { text } => {
            Payload::Text(limits.text(&tagged("poll", text.as_deref())))
        }
        MessageContent::Other { tag, text } => {
            Payload::Text(limits.text(&tagged(tag, text.as_deref())))
        }
    }
}

/// `[KIND]`, followed by the body on the next line when there is one.
fn tagged(kind: &str, body: Option<&str>) -> String {
    let mut text = format!("[{}]", kind.to_uppercase());
    if let Some(body) = body.filter(|b| !b.is_empty()) {
        text.push('\n');
        text.push_str(body);
    }
    text
}

/// Dispatches single messages to the transport.
pub struct DeliveryEngine<'a> {
    transport: &'a dyn Transport,
    limits: &'a DeliveryLimits,
}

impl<'a> DeliveryEngine<'a> {
    pub fn new(transport: &'a dyn Transport, limits: &'a DeliveryLimits) -> Self {
        Self { transport, limits }
    }

    pub fn prepare(&self, content: &MessageContent) -> Payload {
        prepare(content, self.limits)
    }

    pub async fn deliver(
        &self,
        target: ChannelId,
        topic: Option<TopicId>,
        payload: &Payload,
    ) -> Result<(), SendError> {
        self.transport.send(target, topic, payload).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn media(file_id: &str, caption: Option<&str>) -> Media {
        Media {
            file_id: file_id.to_string(),
            caption: caption.map(str::to_string),
        }
    }

    #[test]
    fn test_short_text_untouched() {
        let limits = DeliveryLimits::default();
        let payload = prepare(&MessageContent::Text("hello".to_string()), &limits);
        assert_eq!(payload, Payload::Text("hello".to_string()));
    }

    #[test]
    fn test_text_at_limit_untouched() {
        let limits = DeliveryLimits::default();
        let text = "a".repeat(4096);
        let Payload::Text(sent) = prepare(&MessageContent::Text(text.clone()), &limits) else {
            panic!("expected text payload");
        };
        assert_eq!(sent, text);
        assert!(!sent.ends_with("..."));
    }

    #[test]
    fn test_long_text_truncated_with_ellipsis() {
        let limits = DeliveryLimits::default();
        let text = "b".repeat(5000);
        let Payload::Text(sent) = prepare(&MessageContent::Text(text), &limits) else {
            panic!("expected text payload");
        };
        assert_eq!(sent.chars().count(), 4096);
        assert!(sent.ends_with("..."));
        assert_eq!(&sent[..4093], "b".repeat(4093));
    }

    #[test]
    fn test_truncate_counts_chars_not_bytes() {
        let text = "é".repeat(20);
        let out = truncate(&text, 10, "...");
        assert_eq!(out.chars().count(), 10);
        assert_eq!(out, format!("{}...", "é".repeat(7)));
    }

    #[test]
    fn test_custom_ellipsis_marker() {
        let out = truncate("abcdefghij", 5, "~");
        assert_eq!(out, "abcd~");
    }

    #[test]
    fn test_caption_truncated_to_1024() {
        let limits = DeliveryLimits::default();
        let caption = "c".repeat(2000);
        let payload = prepare(
            &MessageContent::Photo(media("AgAD", Some(&caption))),
            &limits,
        );
        let Payload::Photo(m) = payload else {
            panic!("expected photo payload");
        };
        let sent = m.caption.unwrap();
        assert_eq!(sent.chars().count(), 1024);
        assert!(sent.ends_with("..."));
        assert_eq!(m.file_id, "AgAD");
    }

    #[test]
    fn test_each_caption_kind_keeps_its_variant() {
        let limits = DeliveryLimits::default();
        let m = media("F", Some("cap"));
        assert!(matches!(
            prepare(&MessageContent::Video(m.clone()), &limits),
            Payload::Video(_)
        ));
        assert!(matches!(
            prepare(&MessageContent::Document(m.clone()), &limits),
            Payload::Document(_)
        ));
        assert!(matches!(
            prepare(&MessageContent::Audio(m.clone()), &limits),
            Payload::Audio(_)
        ));
        assert!(matches!(
            prepare(&MessageContent::Voice(m.clone()), &limits),
            Payload::Voice(_)
        ));
        assert!(matches!(
            prepare(&MessageContent::Animation(m), &limits),
            Payload::Animation(_)
        ));
    }

    #[test]
    fn test_empty_caption_not_sent() {
        let limits = DeliveryLimits::default();
        let payload = prepare(&MessageContent::Document(media("D", Some(""))), &limits);
        assert_eq!(payload, Payload::Document(media("D", None)));
    }

    #[test]
    fn test_sticker_and_video_note_are_file_only() {
        let limits = DeliveryLimits::default();
        assert_eq!(
            prepare(
                &MessageContent::Sticker {
                    file_id: "S".to_string()
                },
                &limits
            ),
            Payload::Sticker {
                file_id: "S".to_string()
            }
        );
        assert_eq!(
            prepare(
                &MessageContent::VideoNote {
                    file_id: "V".to_string()
                },
                &limits
            ),
            Payload::VideoNote {
                file_id: "V".to_string()
            }
        );
    }

    #[test]
    fn test_location_synthesized_with_body() {
        let limits = DeliveryLimits::default();
        let payload = prepare(
            &MessageContent::Location {
                text: Some("Location: 1.5, 2.5".to_string()),
            },
            &limits,
        );
        assert_eq!(
            payload,
            Payload::Text("[LOCATION]\nLocation: 1.5, 2.5".to_string())
        );
    }

    #[test]
    fn test_other_without_body_is_just_tag() {
        let limits = DeliveryLimits::default();
        let payload = prepare(
            &MessageContent::Other {
                tag: "other".to_string(),
                text: None,
            },
            &limits,
        );
        assert_eq!(payload, Payload::Text("[OTHER]".to_string()));
    }

    #[test]
    fn test_poll_tag() {
        let limits = DeliveryLimits::default();
        let payload = prepare(
            &MessageContent::Poll {
                text: Some("Poll: lunch?".to_string()),
            },
            &limits,
        );
        assert_eq!(payload, Payload::Text("[POLL]\nPoll: lunch?".to_string()));
    }
}
