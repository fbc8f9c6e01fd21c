//! Sample definitions.
//!
//! A [`Sample`] is produced by dataset loading (outside this crate) and
//! recorded verbatim in the `sample_init` event of its transcript.

use std::fmt;

use probe_models::providers::Message;
use serde::{Deserialize, Serialize};

/// Dataset-assigned sample identifier (integer or string).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleId {
    Int(i64),
    Str(String),
}

impl fmt::Display for SampleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SampleId::Int(n) => write!(f, "{n}"),
            SampleId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for SampleId {
    fn from(n: i64) -> Self {
        Self::Int(n)
    }
}

impl From<&str> for SampleId {
    fn from(s: &str) -> Self {
        Self::Str(s.to_string())
    }
}

impl From<String> for SampleId {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

/// Sample input: a plain prompt or a list of messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SampleInput {
    Text(String),
    Messages(Vec<Message>),
}

impl SampleInput {
    /// Input as chat messages.
    pub fn messages(&self) -> Vec<Message> {
        match self {
            SampleInput::Text(text) => vec![Message::user(text.as_str())],
            SampleInput::Messages(messages) => messages.clone(),
        }
    }
}

/// Ideal target output(s).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Target {
    #[default]
    None,
    One(String),
    Many(Vec<String>),
}

/// A sample for an evaluation task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    /// Unique identifier within the dataset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<SampleId>,
    /// Input to the solver.
    pub input: SampleInput,
    /// Ideal target output.
    #[serde(default, skip_serializing_if = "is_no_target")]
    pub target: Target,
    /// Answer choices for multiple choice samples.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub choices: Option<Vec<String>>,
    /// Arbitrary metadata.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub metadata: serde_json::Map<String, serde_json::Value>,
}

fn is_no_target(target: &Target) -> bool {
    matches!(target, Target::None)
}

impl Sample {
    /// Create a sample with a text input.
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            id: None,
            input: SampleInput::Text(input.into()),
            target: Target::None,
            choices: None,
            metadata: serde_json::Map::new(),
        }
    }

    /// Set the sample id.
    pub fn with_id(mut self, id: impl Into<SampleId>) -> Self {
        self.id = Some(id.into());
        self
    }

    /// Set a single target.
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Target::One(target.into());
        self
    }
}
