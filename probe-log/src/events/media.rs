//! Media payloads.

use serde::{Deserialize, Serialize};

use super::EventMeta;

/// Media content attached to a [`MediaEvent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MediaContent {
    /// Image URL or data URI.
    Image { image: String },
    /// Audio file path, URL or data URI.
    Audio { audio: String, format: String },
    /// Video file path, URL or data URI.
    Video { video: String, format: String },
    /// Rendered markdown.
    Markdown { markdown: String },
}

impl MediaContent {
    /// Content type name (`image`, `audio`, `video` or `markdown`).
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            MediaContent::Image { .. } => "image",
            MediaContent::Audio { .. } => "audio",
            MediaContent::Video { .. } => "video",
            MediaContent::Markdown { .. } => "markdown",
        }
    }
}

/// Image, audio, video or markdown recorded during execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Media content.
    pub content: MediaContent,
    /// Optional caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Optional source (e.g. the tool or agent that produced it).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl MediaEvent {
    pub fn new(content: MediaContent) -> Self {
        Self {
            meta: EventMeta::now(),
            content,
            caption: None,
            source: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_is_tagged_by_type() {
        let content = MediaContent::Video {
            video: "test.mp4".into(),
            format: "mp4".into(),
        };
        let json = serde_json::to_value(&content).unwrap();
        assert_eq!(json["type"], "video");
        assert_eq!(json["format"], "mp4");
        assert_eq!(content.kind(), "video");
    }

    #[test]
    fn media_event_roundtrip_keeps_caption_and_source() {
        let mut event = MediaEvent::new(MediaContent::Audio {
            audio: "test.mp3".into(),
            format: "mp3".into(),
        });
        event.caption = Some("Demo".into());
        event.source = Some("recorder".into());

        let json = serde_json::to_string(&event).unwrap();
        let parsed: MediaEvent = serde_json::from_str(&json).unwrap();

        assert_eq!(parsed, event);
    }

    #[test]
    fn markdown_content_parses() {
        let json = r##"{"type":"markdown","markdown":"# Hello"}"##;
        let content: MediaContent = serde_json::from_str(json).unwrap();
        assert_eq!(
            content,
            MediaContent::Markdown {
                markdown: "# Hello".into()
            }
        );
    }
}
