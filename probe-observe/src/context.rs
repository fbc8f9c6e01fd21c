//! Sample context for log lines.
//!
//! Resolves the active sample (if any) into the identity fields attached to
//! log records: `[<uuid> <task>/<sample-id>/<epoch> <model>] `.

use std::fmt;

use probe_log::{ActiveSample, active};
use serde::Serialize;

/// Structured attribute names for JSON log consumers.
pub mod attributes {
    pub const SAMPLE_UUID: &str = "sample_uuid";
    pub const SAMPLE_TASK: &str = "sample_task";
    pub const SAMPLE_ID: &str = "sample_id";
    pub const SAMPLE_EPOCH: &str = "sample_epoch";
    pub const SAMPLE_MODEL: &str = "sample_model";
}

/// Identity of the active sample, as rendered in logs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SampleContext {
    #[serde(rename = "sample_uuid")]
    pub uuid: String,
    #[serde(rename = "sample_task")]
    pub task: String,
    /// Dataset id, or `None` when the sample has none.
    #[serde(rename = "sample_id")]
    pub sample_id: String,
    #[serde(rename = "sample_epoch")]
    pub epoch: u32,
    #[serde(rename = "sample_model")]
    pub model: String,
}

impl From<&ActiveSample> for SampleContext {
    fn from(sample: &ActiveSample) -> Self {
        Self {
            uuid: sample.id.clone(),
            task: sample.task.clone(),
            sample_id: sample
                .sample_id()
                .map_or_else(|| "None".to_string(), ToString::to_string),
            epoch: sample.epoch,
            model: sample.model.clone(),
        }
    }
}

impl fmt::Display for SampleContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{} {}/{}/{} {}]",
            self.uuid, self.task, self.sample_id, self.epoch, self.model
        )
    }
}

/// Context of the sample the calling task belongs to.
pub fn sample_context() -> Option<SampleContext> {
    active::current().map(|sample| SampleContext::from(sample.as_ref()))
}

/// Prefix for a log message: `"[...] "` inside a sample, empty outside.
pub fn sample_context_prefix() -> String {
    sample_context()
        .map(|context| format!("{context} "))
        .unwrap_or_default()
}
