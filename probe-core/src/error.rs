//! Error types for probe-core.

use std::path::PathBuf;

use probe_models::ProviderError;
use thiserror::Error;

/// Result type alias for probe-core operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which retry budget ran out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Budget {
    Attempts,
    Time,
}

impl std::fmt::Display for Budget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Budget::Attempts => f.write_str("attempt limit"),
            Budget::Time => f.write_str("retry timeout"),
        }
    }
}

/// A call that did not succeed within the retry orchestrator.
#[derive(Debug, Clone, Error)]
pub enum RetryError {
    /// The error was not retryable.
    #[error("{target} failed after {attempts} attempt(s): {}", .source.summary())]
    Fatal {
        target: String,
        attempts: u32,
        #[source]
        source: ProviderError,
    },

    /// Retries were exhausted.
    #[error("{target} gave up after {attempts} attempt(s) ({budget}): {}", .source.summary())]
    Exhausted {
        target: String,
        attempts: u32,
        budget: Budget,
        #[source]
        source: ProviderError,
    },

    /// The surrounding execution was cancelled.
    #[error("{target} cancelled after {attempts} attempt(s)")]
    Cancelled { target: String, attempts: u32 },
}

impl RetryError {
    /// Attempts made, including the last one.
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Fatal { attempts, .. }
            | RetryError::Exhausted { attempts, .. }
            | RetryError::Cancelled { attempts, .. } => *attempts,
        }
    }

    /// The last provider failure, unless cancelled.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            RetryError::Fatal { source, .. } | RetryError::Exhausted { source, .. } => Some(source),
            RetryError::Cancelled { .. } => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled { .. })
    }
}

/// Errors that can occur in probe-core.
#[derive(Debug, Error)]
pub enum Error {
    /// A model call failed.
    #[error(transparent)]
    Retry(#[from] RetryError),

    /// Transcript persistence failed.
    #[error("transcript error: {0}")]
    Transcript(#[from] probe_log::Error),

    /// The sample hit one of its limits.
    #[error("{0}")]
    LimitExceeded(String),

    /// The configuration file could not be read.
    #[error("cannot read config {path}: {source}")]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is invalid.
    #[error("invalid config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    /// A configuration value is invalid.
    #[error("invalid config value: {0}")]
    ConfigValue(String),
}
