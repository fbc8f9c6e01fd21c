//! Sample execution scope.
//!
//! [`SampleRunner::run`] creates the transcript and [`ActiveSample`] for one
//! `(task, sample, epoch, model)` execution, registers it for the duration of
//! the body and records how it ended:
//!
//! ```text
//! sample_init ─► body events ... ─► [sample_limit] ─► [error]
//! ```
//!
//! With a sink attached, events are forwarded to it as they are appended.

use std::future::Future;
use std::sync::Arc;

use probe_log::events::{ErrorEvent, LimitKind};
use probe_log::sink::{JsonlSink, RecordHeader, TranscriptSink, spawn_forwarder};
use probe_log::{ActiveSample, Sample, SampleLimits, Transcript, active, short_uuid};
use serde_json::Map;
use tracing::{Instrument, info_span, warn};

use crate::config::ProbeConfig;
use crate::error::{Error, Result};

/// How one sample execution ended.
#[derive(Debug)]
pub struct SampleOutcome<T> {
    /// The sample's process-unique id.
    pub id: String,
    pub result: Result<T>,
    pub transcript: Arc<Transcript>,
    /// Provider retries made during the sample.
    pub retries: u32,
    /// Events the sink accepted, when one was attached.
    pub persisted: Option<u64>,
}

/// Runs samples of one task against one model.
#[derive(Clone)]
pub struct SampleRunner {
    task: String,
    model: String,
    limits: SampleLimits,
    sink: Option<Arc<dyn TranscriptSink>>,
}

impl std::fmt::Debug for SampleRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRunner")
            .field("task", &self.task)
            .field("model", &self.model)
            .field("limits", &self.limits)
            .field("sink", &self.sink.is_some())
            .finish()
    }
}

impl SampleRunner {
    pub fn new(task: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            task: task.into(),
            model: model.into(),
            limits: SampleLimits::default(),
            sink: None,
        }
    }

    /// A runner persisting to the configured `[transcript]` log file, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the log file cannot be opened.
    pub async fn from_config(
        config: &ProbeConfig,
        task: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self> {
        let runner = Self::new(task, model);
        let Some(path) = &config.transcript.log_path else {
            return Ok(runner);
        };
        let sink = JsonlSink::open(path).await?;
        Ok(runner.with_sink(Arc::new(sink)))
    }

    pub fn with_limits(mut self, limits: SampleLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Persist every sample's events to `sink`.
    pub fn with_sink(mut self, sink: Arc<dyn TranscriptSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Execute `body` as `sample` at `epoch`.
    ///
    /// The body runs with the sample as the ambient [`active::current`]
    /// sample. Failures are recorded as an error event and returned in the
    /// outcome; the sample is deregistered on every exit path.
    pub async fn run<T, F, Fut>(&self, sample: Sample, epoch: u32, body: F) -> SampleOutcome<T>
    where
        F: FnOnce(Arc<ActiveSample>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let id = short_uuid();
        let span = info_span!("sample", id = %id, task = %self.task, epoch);

        let header = RecordHeader {
            sample_uuid: id.clone(),
            task: self.task.clone(),
            sample_id: sample.id.clone(),
            epoch,
        };
        let (transcript, forwarder) = match &self.sink {
            Some(sink) => {
                let (tx, handle) = spawn_forwarder(Arc::clone(sink), header);
                (Transcript::with_sink(tx), Some(handle))
            }
            None => (Transcript::new(), None),
        };
        let transcript = Arc::new(transcript);
        transcript.sample_init(sample.clone(), Map::new());

        let active = Arc::new(
            ActiveSample::new(
                self.task.clone(),
                sample,
                epoch,
                self.model.clone(),
                Arc::clone(&transcript),
            )
            .with_id(id.clone())
            .with_limits(self.limits.clone()),
        );

        let result = self
            .execute(Arc::clone(&active), body)
            .instrument(span.clone())
            .await;

        if let Err(err) = &result {
            let _enter = span.enter();
            warn!(error = %err, "sample failed");
            transcript.append(error_event(err));
        }
        active.complete();
        transcript.close();

        let persisted = match forwarder {
            Some(handle) => match handle.await {
                Ok(written) => Some(written),
                Err(e) => {
                    warn!(sample = %id, error = %e, "transcript forwarder failed");
                    None
                }
            },
            None => None,
        };

        SampleOutcome {
            id,
            result,
            transcript,
            retries: active.retries(),
            persisted,
        }
    }

    async fn execute<T, F, Fut>(&self, active: Arc<ActiveSample>, body: F) -> Result<T>
    where
        F: FnOnce(Arc<ActiveSample>) -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let time_limit = active.limits.time;
        let fut = active::scope(Arc::clone(&active), body(Arc::clone(&active)));
        let Some(limit) = time_limit else {
            return fut.await;
        };
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                let message = format!("time limit of {} seconds exceeded", limit.as_secs_f64());
                active.transcript.sample_limit(
                    LimitKind::Time,
                    message.clone(),
                    Some(limit.as_secs_f64()),
                );
                Err(Error::LimitExceeded(message))
            }
        }
    }
}

/// Error event for a failed sample, with provider details when available.
fn error_event(err: &Error) -> ErrorEvent {
    let mut event = ErrorEvent::from_error(err);
    if let Error::Retry(retry) = err {
        event.attempts = Some(retry.attempts());
        if let Some(source) = retry.provider_error() {
            event.class = Some(source.class.clone());
            event.status = source.http_status();
            event.code = source.code.clone();
        }
    }
    event
}
