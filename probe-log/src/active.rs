//! Active sample registry.
//!
//! Code running deep inside a sample's execution (provider clients, retry
//! loops, log formatters) discovers which sample it belongs to through
//! [`current`] instead of having the sample threaded through every call.
//!
//! The association is a tokio task-local, so concurrent samples never see
//! each other. A process-wide map additionally lists every registered sample
//! for display. Both are set up by [`scope`] and torn down when the scope
//! ends, whether the sample finished, failed, panicked or was cancelled.
//!
//! Tasks spawned with `tokio::spawn` do not inherit the task-local; wrap the
//! spawned future in [`scope`] again if it should resolve the sample.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::sample::{Sample, SampleId};
use crate::transcript::Transcript;
use crate::types::short_uuid;

tokio::task_local! {
    static CURRENT_SAMPLE: Arc<ActiveSample>;
}

struct Entry {
    sample: Arc<ActiveSample>,
    depth: usize,
}

static REGISTRY: LazyLock<RwLock<HashMap<String, Entry>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

/// Resource limits applied to a sample.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SampleLimits {
    /// Maximum messages in the conversation.
    pub message: Option<u64>,
    /// Maximum tokens used.
    pub token: Option<u64>,
    /// Maximum wall clock time.
    pub time: Option<Duration>,
    /// Maximum working time (wall clock minus time spent waiting).
    pub working: Option<Duration>,
}

/// How an interrupted sample should finish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterruptAction {
    /// Stop and score what has been produced so far.
    Score,
    /// Stop and record an error.
    Error,
}

/// A sample that is currently executing.
#[derive(Debug)]
pub struct ActiveSample {
    /// Process-unique id.
    pub id: String,
    /// Task name.
    pub task: String,
    /// Sample definition.
    pub sample: Sample,
    /// Epoch number (1-based).
    pub epoch: u32,
    /// Model name (`provider/model`).
    pub model: String,
    /// Event log for this execution.
    pub transcript: Arc<Transcript>,
    /// Limits the sample runs under.
    pub limits: SampleLimits,
    /// When execution started.
    pub started: DateTime<Utc>,
    completed: Mutex<Option<DateTime<Utc>>>,
    waiting: AtomicBool,
    total_messages: AtomicU64,
    total_tokens: AtomicU64,
    retries: AtomicU32,
    interrupt: Mutex<Option<InterruptAction>>,
}

impl ActiveSample {
    pub fn new(
        task: impl Into<String>,
        sample: Sample,
        epoch: u32,
        model: impl Into<String>,
        transcript: Arc<Transcript>,
    ) -> Self {
        Self {
            id: short_uuid(),
            task: task.into(),
            sample,
            epoch,
            model: model.into(),
            transcript,
            limits: SampleLimits::default(),
            started: Utc::now(),
            completed: Mutex::new(None),
            waiting: AtomicBool::new(false),
            total_messages: AtomicU64::new(0),
            total_tokens: AtomicU64::new(0),
            retries: AtomicU32::new(0),
            interrupt: Mutex::new(None),
        }
    }

    /// Use a fixed id instead of a generated one.
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_limits(mut self, limits: SampleLimits) -> Self {
        self.limits = limits;
        self
    }

    /// The dataset id of the sample, if it has one.
    pub fn sample_id(&self) -> Option<&SampleId> {
        self.sample.id.as_ref()
    }

    /// Time since the sample started, or its total time once completed.
    pub fn running_time(&self) -> Duration {
        let end = self.completed().unwrap_or_else(Utc::now);
        (end - self.started).to_std().unwrap_or_default()
    }

    pub fn completed(&self) -> Option<DateTime<Utc>> {
        *self.completed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Mark the sample as finished.
    pub fn complete(&self) {
        let mut completed = self.completed.lock().unwrap_or_else(PoisonError::into_inner);
        completed.get_or_insert_with(Utc::now);
    }

    /// Whether the sample is blocked waiting (e.g. on a rate limit backoff).
    pub fn is_waiting(&self) -> bool {
        self.waiting.load(Ordering::Relaxed)
    }

    pub fn set_waiting(&self, waiting: bool) {
        self.waiting.store(waiting, Ordering::Relaxed);
    }

    pub fn total_messages(&self) -> u64 {
        self.total_messages.load(Ordering::Relaxed)
    }

    pub fn total_tokens(&self) -> u64 {
        self.total_tokens.load(Ordering::Relaxed)
    }

    /// Retries made by provider calls on behalf of this sample.
    pub fn retries(&self) -> u32 {
        self.retries.load(Ordering::Relaxed)
    }

    /// Ask the sample to stop at its next checkpoint.
    pub fn interrupt(&self, action: InterruptAction) {
        *self.interrupt.lock().unwrap_or_else(PoisonError::into_inner) = Some(action);
    }

    pub fn interrupt_action(&self) -> Option<InterruptAction> {
        *self.interrupt.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

// ==================== Registry ====================

/// The sample the calling task belongs to, or `None` outside any sample.
pub fn current() -> Option<Arc<ActiveSample>> {
    CURRENT_SAMPLE.try_with(Arc::clone).ok()
}

/// Every registered sample.
pub fn active_samples() -> Vec<Arc<ActiveSample>> {
    REGISTRY
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .values()
        .map(|entry| Arc::clone(&entry.sample))
        .collect()
}

/// Handle for a registration; deregisters on drop.
#[must_use = "the sample is deregistered when the registration is dropped"]
pub struct Registration {
    id: String,
}

impl Registration {
    /// Deregister now.
    pub fn unregister(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = registry.get_mut(&self.id) {
            entry.depth -= 1;
            if entry.depth == 0 {
                registry.remove(&self.id);
                trace!(sample = %self.id, "sample deregistered");
            }
        }
    }
}

/// Add `sample` to the process-wide listing.
///
/// Registering a sample that is already registered replaces the stored handle
/// and nests: it stays listed until every registration has been dropped.
pub fn register(sample: &Arc<ActiveSample>) -> Registration {
    let mut registry = REGISTRY.write().unwrap_or_else(PoisonError::into_inner);
    registry
        .entry(sample.id.clone())
        .and_modify(|entry| {
            entry.sample = Arc::clone(sample);
            entry.depth += 1;
        })
        .or_insert_with(|| {
            trace!(sample = %sample.id, task = %sample.task, "sample registered");
            Entry {
                sample: Arc::clone(sample),
                depth: 1,
            }
        });
    Registration {
        id: sample.id.clone(),
    }
}

/// Run `fut` as part of `sample`.
pub async fn scope<F: Future>(sample: Arc<ActiveSample>, fut: F) -> F::Output {
    let _registration = register(&sample);
    CURRENT_SAMPLE.scope(sample, fut).await
}

/// Run `f` as part of `sample`, synchronously.
pub fn sync_scope<R>(sample: Arc<ActiveSample>, f: impl FnOnce() -> R) -> R {
    let _registration = register(&sample);
    CURRENT_SAMPLE.sync_scope(sample, f)
}

// ==================== Ambient setters ====================

/// Record the current message count of the active sample.
pub fn set_total_messages(count: u64) {
    if let Some(sample) = current() {
        sample.total_messages.store(count, Ordering::Relaxed);
    }
}

/// Record the current token usage of the active sample.
pub fn set_total_tokens(count: u64) {
    if let Some(sample) = current() {
        sample.total_tokens.store(count, Ordering::Relaxed);
    }
}

/// Add tokens to the active sample's usage.
pub fn add_tokens(count: u64) {
    if let Some(sample) = current() {
        sample.total_tokens.fetch_add(count, Ordering::Relaxed);
    }
}

/// Count one provider retry against the active sample.
pub fn report_retry() {
    if let Some(sample) = current() {
        sample.retries.fetch_add(1, Ordering::Relaxed);
    }
}
