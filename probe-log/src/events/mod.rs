//! Transcript events.
//!
//! Every thing that happens while a sample runs is recorded as an [`Event`].
//! Events are a closed set of variants discriminated by their `event` tag;
//! every variant carries the same [`EventMeta`] (timestamp, enclosing span,
//! identity). Unknown fields are ignored on decode so older readers keep
//! working against newer transcripts.

mod media;
mod variants;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::DecodeError;
use crate::transcript::current_span_id;
use crate::types::short_uuid;

pub use media::{MediaContent, MediaEvent};
pub use variants::{
    ApprovalDecision, ApprovalEvent, ErrorEvent, InfoEvent, InputEvent, LimitKind, LoggerEvent,
    ModelEvent, SampleInitEvent, SampleLimitEvent, ScoreEvent, SpanBeginEvent, SpanEndEvent,
    SubtaskEvent, ToolEvent,
};

/// Fields shared by every event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventMeta {
    /// When the event was created.
    pub timestamp: DateTime<Utc>,
    /// Enclosing span, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub span_id: Option<String>,
    /// Identity of this event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,
}

impl EventMeta {
    /// Metadata for an event created now, inside the current span.
    pub fn now() -> Self {
        Self {
            timestamp: Utc::now(),
            span_id: current_span_id(),
            uuid: Some(short_uuid()),
        }
    }
}

/// Every `event` tag a transcript may contain.
pub const KINDS: &[&str] = &[
    "sample_init",
    "sample_limit",
    "model",
    "tool",
    "subtask",
    "score",
    "input",
    "approval",
    "info",
    "logger",
    "error",
    "media",
    "span_begin",
    "span_end",
];

/// One recorded occurrence during a sample's execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    SampleInit(SampleInitEvent),
    SampleLimit(SampleLimitEvent),
    Model(ModelEvent),
    Tool(ToolEvent),
    Subtask(SubtaskEvent),
    Score(ScoreEvent),
    Input(InputEvent),
    Approval(ApprovalEvent),
    Info(InfoEvent),
    Logger(LoggerEvent),
    Error(ErrorEvent),
    Media(MediaEvent),
    SpanBegin(SpanBeginEvent),
    SpanEnd(SpanEndEvent),
}

impl Event {
    /// The `event` tag of this variant.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Event::SampleInit(_) => "sample_init",
            Event::SampleLimit(_) => "sample_limit",
            Event::Model(_) => "model",
            Event::Tool(_) => "tool",
            Event::Subtask(_) => "subtask",
            Event::Score(_) => "score",
            Event::Input(_) => "input",
            Event::Approval(_) => "approval",
            Event::Info(_) => "info",
            Event::Logger(_) => "logger",
            Event::Error(_) => "error",
            Event::Media(_) => "media",
            Event::SpanBegin(_) => "span_begin",
            Event::SpanEnd(_) => "span_end",
        }
    }

    /// Shared metadata.
    #[must_use]
    pub fn meta(&self) -> &EventMeta {
        match self {
            Event::SampleInit(e) => &e.meta,
            Event::SampleLimit(e) => &e.meta,
            Event::Model(e) => &e.meta,
            Event::Tool(e) => &e.meta,
            Event::Subtask(e) => &e.meta,
            Event::Score(e) => &e.meta,
            Event::Input(e) => &e.meta,
            Event::Approval(e) => &e.meta,
            Event::Info(e) => &e.meta,
            Event::Logger(e) => &e.meta,
            Event::Error(e) => &e.meta,
            Event::Media(e) => &e.meta,
            Event::SpanBegin(e) => &e.meta,
            Event::SpanEnd(e) => &e.meta,
        }
    }

    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.meta().timestamp
    }

    #[must_use]
    pub fn span_id(&self) -> Option<&str> {
        self.meta().span_id.as_deref()
    }
}

macro_rules! impl_from_variant {
    ($($variant:ident($ty:ty)),* $(,)?) => {
        $(
            impl From<$ty> for Event {
                fn from(event: $ty) -> Self {
                    Event::$variant(event)
                }
            }
        )*
    };
}

impl_from_variant!(
    SampleInit(SampleInitEvent),
    SampleLimit(SampleLimitEvent),
    Model(ModelEvent),
    Tool(ToolEvent),
    Subtask(SubtaskEvent),
    Score(ScoreEvent),
    Input(InputEvent),
    Approval(ApprovalEvent),
    Info(InfoEvent),
    Logger(LoggerEvent),
    Error(ErrorEvent),
    Media(MediaEvent),
    SpanBegin(SpanBeginEvent),
    SpanEnd(SpanEndEvent),
);

/// Decode one raw record found at `position` in a transcript.
///
/// The `event` tag is checked before the payload, so a record with a missing
/// or unknown tag fails with a [`DecodeError`] naming the tag rather than a
/// generic serde message.
pub fn decode_event(value: Value, position: usize) -> Result<Event, DecodeError> {
    let tag = value.get("event").and_then(Value::as_str).map(str::to_string);
    match tag.as_deref() {
        None => Err(DecodeError::record(position, None, "missing event tag")),
        Some(kind) if !KINDS.contains(&kind) => {
            Err(DecodeError::record(position, tag, "unknown event kind"))
        }
        Some(_) => serde_json::from_value(value)
            .map_err(|e| DecodeError::record(position, tag, e.to_string())),
    }
}
