//! Event payloads, one struct per [`Event`](super::Event) variant.

use chrono::{DateTime, Utc};
use probe_models::providers::{GenerateConfig, Message, ModelOutput, Tool, ToolCall};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::EventMeta;
use crate::lazy::Lazy;
use crate::sample::{Sample, Target};

// ==================== Sample ====================

/// Beginning of processing a sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleInitEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// The sample being evaluated.
    pub sample: Sample,
    /// Initial execution state.
    #[serde(default)]
    pub state: Map<String, Value>,
}

/// Resource a sample ran out of.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LimitKind {
    Message,
    Token,
    Time,
    Working,
    Operator,
    Custom,
}

/// A sample hit one of its resource limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampleLimitEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Which limit was hit.
    #[serde(rename = "type")]
    pub kind: LimitKind,
    /// Limit message.
    pub message: String,
    /// The limit value, if numeric.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<f64>,
}

// ==================== Model / Tool ====================

/// A call to a model.
///
/// Recorded once the call has finished (successfully or not), so the event
/// never changes after it is appended. The output is lazily validated when
/// read back from a persisted transcript.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Model name (`provider/model`).
    pub model: String,
    /// Provider name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model input (messages).
    pub input: Vec<Message>,
    /// Tools available to the model.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<Tool>,
    /// Generation config.
    #[serde(default)]
    pub config: GenerateConfig,
    /// Output from the model.
    pub output: Lazy<ModelOutput>,
    /// Retries made before the final attempt.
    #[serde(default)]
    pub retries: u32,
    /// Error summary when the call failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds spent on the call, retries included.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
    /// When the call completed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed: Option<DateTime<Utc>>,
}

/// A call to a tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Tool call id.
    pub id: String,
    /// Tool name.
    pub function: String,
    /// Arguments.
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Result returned by the tool.
    #[serde(default)]
    pub result: Value,
    /// Error raised by the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Seconds spent in the tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

impl ToolEvent {
    /// A tool event for `call` with no result yet.
    pub fn for_call(call: &ToolCall) -> Self {
        Self {
            meta: EventMeta::now(),
            id: call.id.clone(),
            function: call.function.clone(),
            arguments: call.arguments.clone(),
            result: Value::Null,
            error: None,
            time: None,
        }
    }
}

/// A subtask run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubtaskEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Subtask name.
    pub name: String,
    /// Subtask input.
    #[serde(default)]
    pub input: Map<String, Value>,
    /// Subtask result.
    #[serde(default)]
    pub result: Value,
    /// Seconds spent in the subtask.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<f64>,
}

// ==================== Scoring / Input ====================

/// A score computed for the sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Target the sample was scored against.
    #[serde(default)]
    pub target: Target,
    /// Score value.
    pub value: Value,
    /// Answer extracted from the model output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// Explanation of the score.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    /// Whether this is an intermediate score.
    #[serde(default)]
    pub intermediate: bool,
}

/// Raw input captured from the console.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Input as plain text.
    pub input: String,
    /// Input with ANSI escapes for display.
    #[serde(default)]
    pub input_ansi: String,
}

/// Decision made on a tool call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalDecision {
    Approve,
    Modify,
    Reject,
    Escalate,
    Terminate,
}

/// A tool call approval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApprovalEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Message shown to the approver.
    pub message: String,
    /// Call being approved.
    pub call: ToolCall,
    /// Who made the decision.
    pub approver: String,
    /// The decision.
    pub decision: ApprovalDecision,
    /// Why the decision was made.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
}

// ==================== Info / Logging / Errors ====================

/// Arbitrary information recorded by a solver or tool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InfoEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Who recorded it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// String or structured payload.
    pub data: Value,
}

/// A process log record captured while the sample ran.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggerEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Logger target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Level name.
    pub level: String,
    /// Rendered message.
    pub message: String,
    /// Source file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
    /// Source line.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lineno: Option<u32>,
}

/// A failure that ended (or interrupted) the sample.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Error message.
    pub message: String,
    /// Error chain, outermost first.
    #[serde(default)]
    pub traceback: String,
    /// Error class name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    /// HTTP status, if the error came from a provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    /// Provider error code.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    /// Attempts made before giving up.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attempts: Option<u32>,
}

impl ErrorEvent {
    /// An error event built from any error and its source chain.
    pub fn from_error(err: &(dyn std::error::Error + 'static)) -> Self {
        let mut traceback = err.to_string();
        let mut source = err.source();
        while let Some(cause) = source {
            traceback.push_str("\ncaused by: ");
            traceback.push_str(&cause.to_string());
            source = cause.source();
        }
        Self {
            meta: EventMeta::now(),
            message: err.to_string(),
            traceback,
            class: None,
            status: None,
            code: None,
            attempts: None,
        }
    }
}

// ==================== Spans ====================

/// Start of a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanBeginEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Span id.
    pub id: String,
    /// Enclosing span.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Span type (e.g. `tool`, `solver`).
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub span_type: Option<String>,
    /// Span name.
    pub name: String,
}

/// End of a span.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpanEndEvent {
    #[serde(flatten)]
    pub meta: EventMeta,
    /// Span id.
    pub id: String,
}
