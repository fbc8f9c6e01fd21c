//! Per-sample transcript.
//!
//! A [`Transcript`] is the append-only event log of one sample execution.
//! Appends are serialized by a mutex, and an optional sink receives every
//! event in append order through an unbounded channel, so a slow sink never
//! blocks the sample.

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::debug;

use crate::events::{
    ErrorEvent, Event, EventMeta, InfoEvent, InputEvent, LimitKind, LoggerEvent, MediaContent,
    MediaEvent, SampleInitEvent, SampleLimitEvent, ScoreEvent, SpanBeginEvent, SpanEndEvent,
};
use crate::sample::{Sample, Target};
use crate::types::short_uuid;

tokio::task_local! {
    static SPAN_ID: String;
}

/// The span the calling task is currently inside, if any.
pub fn current_span_id() -> Option<String> {
    SPAN_ID.try_with(Clone::clone).ok()
}

/// Sender half handed to a transcript by its sink.
pub type EventSender = mpsc::UnboundedSender<Arc<Event>>;

/// Append-only event log for one sample.
#[derive(Debug, Default)]
pub struct Transcript {
    inner: Mutex<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    events: Vec<Arc<Event>>,
    sink: Option<EventSender>,
}

impl Transcript {
    /// Create an empty transcript with no sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty transcript that forwards every event to `sink`.
    pub fn with_sink(sink: EventSender) -> Self {
        Self {
            inner: Mutex::new(Inner {
                events: Vec::new(),
                sink: Some(sink),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append an event.
    ///
    /// The sink hand-off happens under the same lock as the append, so the
    /// sink sees events in exactly the transcript's order.
    pub fn append(&self, event: impl Into<Event>) -> Arc<Event> {
        let event = Arc::new(event.into());
        let mut inner = self.lock();
        inner.events.push(Arc::clone(&event));
        if let Some(sink) = &inner.sink {
            if sink.send(Arc::clone(&event)).is_err() {
                debug!(kind = event.kind(), "transcript sink closed, event kept in memory only");
            }
        }
        event
    }

    /// Detach the sink.
    ///
    /// Called when the sample finishes; the sink's forwarder drains what it
    /// has already received and stops.
    pub fn close(&self) {
        self.lock().sink = None;
    }

    /// The events appended so far, in order.
    pub fn events(&self) -> Vec<Arc<Event>> {
        self.lock().events.clone()
    }

    /// Run `f` over the events while holding the append lock.
    pub fn with_events<R>(&self, f: impl FnOnce(&[Arc<Event>]) -> R) -> R {
        f(&self.lock().events)
    }

    pub fn len(&self) -> usize {
        self.lock().events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().events.is_empty()
    }

    // ==================== Convenience constructors ====================

    /// Record the start of the sample.
    pub fn sample_init(&self, sample: Sample, state: Map<String, Value>) -> Arc<Event> {
        self.append(SampleInitEvent {
            meta: EventMeta::now(),
            sample,
            state,
        })
    }

    /// Record that the sample hit a limit.
    pub fn sample_limit(
        &self,
        kind: LimitKind,
        message: impl Into<String>,
        limit: Option<f64>,
    ) -> Arc<Event> {
        self.append(SampleLimitEvent {
            meta: EventMeta::now(),
            kind,
            message: message.into(),
            limit,
        })
    }

    /// Record arbitrary information.
    pub fn info(&self, data: impl Into<Value>, source: Option<&str>) -> Arc<Event> {
        self.append(InfoEvent {
            meta: EventMeta::now(),
            source: source.map(str::to_string),
            data: data.into(),
        })
    }

    /// Record a score.
    pub fn score(
        &self,
        target: Target,
        value: impl Into<Value>,
        explanation: Option<&str>,
    ) -> Arc<Event> {
        self.append(ScoreEvent {
            meta: EventMeta::now(),
            target,
            value: value.into(),
            answer: None,
            explanation: explanation.map(str::to_string),
            intermediate: false,
        })
    }

    /// Record raw console input.
    pub fn input(&self, input: impl Into<String>, input_ansi: impl Into<String>) -> Arc<Event> {
        self.append(InputEvent {
            meta: EventMeta::now(),
            input: input.into(),
            input_ansi: input_ansi.into(),
        })
    }

    /// Record a captured log message.
    pub fn logger(
        &self,
        level: impl Into<String>,
        name: Option<&str>,
        message: impl Into<String>,
    ) -> Arc<Event> {
        self.append(LoggerEvent {
            meta: EventMeta::now(),
            name: name.map(str::to_string),
            level: level.into(),
            message: message.into(),
            filename: None,
            lineno: None,
        })
    }

    /// Record an error and its source chain.
    pub fn error(&self, err: &(dyn std::error::Error + 'static)) -> Arc<Event> {
        self.append(ErrorEvent::from_error(err))
    }

    /// Record any media content.
    pub fn media(
        &self,
        content: MediaContent,
        caption: Option<&str>,
        source: Option<&str>,
    ) -> Arc<Event> {
        self.append(MediaEvent {
            caption: caption.map(str::to_string),
            source: source.map(str::to_string),
            ..MediaEvent::new(content)
        })
    }

    /// Record an image (URL or data URI).
    pub fn image(
        &self,
        image: impl Into<String>,
        caption: Option<&str>,
        source: Option<&str>,
    ) -> Arc<Event> {
        let content = MediaContent::Image {
            image: image.into(),
        };
        self.media(content, caption, source)
    }

    /// Record an audio clip.
    pub fn audio(
        &self,
        audio: impl Into<String>,
        format: impl Into<String>,
        caption: Option<&str>,
        source: Option<&str>,
    ) -> Arc<Event> {
        let content = MediaContent::Audio {
            audio: audio.into(),
            format: format.into(),
        };
        self.media(content, caption, source)
    }

    /// Record a video clip.
    pub fn video(
        &self,
        video: impl Into<String>,
        format: impl Into<String>,
        caption: Option<&str>,
        source: Option<&str>,
    ) -> Arc<Event> {
        let content = MediaContent::Video {
            video: video.into(),
            format: format.into(),
        };
        self.media(content, caption, source)
    }

    /// Record rendered markdown.
    pub fn markdown(
        &self,
        markdown: impl Into<String>,
        caption: Option<&str>,
        source: Option<&str>,
    ) -> Arc<Event> {
        let content = MediaContent::Markdown {
            markdown: markdown.into(),
        };
        self.media(content, caption, source)
    }

    // ==================== Spans ====================

    /// Run `fut` inside a new span.
    ///
    /// `span_begin` is appended before the future starts and `span_end` after
    /// it finishes, is dropped, or panics. Events created inside the future
    /// carry the span id.
    pub async fn span<F: Future>(&self, name: &str, span_type: Option<&str>, fut: F) -> F::Output {
        let id = short_uuid();
        self.append(SpanBeginEvent {
            meta: EventMeta::now(),
            id: id.clone(),
            parent_id: current_span_id(),
            span_type: span_type.map(str::to_string),
            name: name.to_string(),
        });
        let _end = SpanEnd {
            transcript: self,
            id: id.clone(),
        };
        SPAN_ID.scope(id, fut).await
    }
}

struct SpanEnd<'a> {
    transcript: &'a Transcript,
    id: String,
}

impl Drop for SpanEnd<'_> {
    fn drop(&mut self) {
        self.transcript.append(SpanEndEvent {
            meta: EventMeta::now(),
            id: std::mem::take(&mut self.id),
        });
    }
}
