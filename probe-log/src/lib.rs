//! Sample transcripts for probe.
//!
//! This crate records what happens while one sample of an evaluation runs,
//! and lets code anywhere underneath that execution find out which sample it
//! belongs to.
//!
//! # Architecture
//!
//! - **Events** ([`Event`]) are immutable records, one variant per kind of
//!   occurrence, discriminated by their `event` tag
//! - **Transcripts** ([`Transcript`]) are the append-only, ordered event log of
//!   one sample
//! - **Active samples** ([`ActiveSample`]) tie a running sample's identity to
//!   its transcript; [`active::current`] resolves it from any nested call
//! - **Sinks** ([`sink::TranscriptSink`]) persist events off the sample's task
//!
//! ```text
//! sample task ──► Transcript::append ──► Vec<Arc<Event>>
//!                        │
//!                        └──► channel ──► forwarder ──► TranscriptSink
//! ```

pub mod active;
mod error;
pub mod events;
mod lazy;
mod sample;
pub mod sink;
mod transcript;
mod types;

// Error types
pub use error::{DecodeError, Error, Result};

// Events
pub use events::{Event, EventMeta, ModelEvent, decode_event};

// Lazy fields
pub use lazy::Lazy;

// Samples
pub use active::{ActiveSample, InterruptAction, SampleLimits};
pub use sample::{Sample, SampleId, SampleInput, Target};

// Transcripts
pub use transcript::{EventSender, Transcript, current_span_id};

// IDs
pub use types::{SHORT_UUID_LEN, short_uuid};
