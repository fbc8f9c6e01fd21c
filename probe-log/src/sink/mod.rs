//! Transcript persistence.
//!
//! A [`TranscriptSink`] receives every event of a sample, in append order,
//! tagged with a [`RecordHeader`] identifying the sample. Transcripts never
//! call a sink directly: [`spawn_forwarder`] hands them the sending half of an
//! unbounded channel and drains it into the sink on its own task, so a slow
//! sink never blocks sample execution.

mod jsonl;
mod memory;

pub use jsonl::{JsonlSink, TranscriptFile, read_jsonl};
pub use memory::MemorySink;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use crate::active::ActiveSample;
use crate::error::Result;
use crate::events::Event;
use crate::sample::SampleId;
use crate::transcript::EventSender;

/// Identity of the sample a persisted event belongs to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordHeader {
    pub sample_uuid: String,
    pub task: String,
    #[serde(default)]
    pub sample_id: Option<SampleId>,
    pub epoch: u32,
}

impl From<&ActiveSample> for RecordHeader {
    fn from(sample: &ActiveSample) -> Self {
        Self {
            sample_uuid: sample.id.clone(),
            task: sample.task.clone(),
            sample_id: sample.sample_id().cloned(),
            epoch: sample.epoch,
        }
    }
}

/// One persisted line: header plus event.
#[derive(Debug, Serialize)]
pub struct EventRecord<'a> {
    #[serde(flatten)]
    pub header: &'a RecordHeader,
    pub event: &'a Event,
}

/// Durable storage for transcript events.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    /// Persist one event.
    async fn write(&self, header: &RecordHeader, event: &Event) -> Result<()>;

    /// Flush buffered writes.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}

/// Start forwarding a transcript's events to `sink`.
///
/// Returns the sender to build the transcript with and the forwarder task.
/// The task finishes once every sender is gone (see
/// [`Transcript::close`](crate::Transcript::close)), after flushing the sink,
/// and yields the number of events written.
pub fn spawn_forwarder(
    sink: Arc<dyn TranscriptSink>,
    header: RecordHeader,
) -> (EventSender, JoinHandle<u64>) {
    let (tx, rx) = mpsc::unbounded_channel();
    let handle = tokio::spawn(forward(sink, header, rx));
    (tx, handle)
}

#[instrument(skip(sink, rx), fields(sample = %header.sample_uuid, task = %header.task))]
async fn forward(
    sink: Arc<dyn TranscriptSink>,
    header: RecordHeader,
    mut rx: mpsc::UnboundedReceiver<Arc<Event>>,
) -> u64 {
    let mut written = 0u64;
    while let Some(event) = rx.recv().await {
        match sink.write(&header, &event).await {
            Ok(()) => written += 1,
            Err(e) => warn!(error = %e, kind = event.kind(), "failed to persist event"),
        }
    }
    if let Err(e) = sink.flush().await {
        warn!(error = %e, "failed to flush transcript sink");
    }
    debug!(events = written, "transcript forwarder finished");
    written
}
