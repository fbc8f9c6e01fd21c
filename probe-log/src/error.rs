//! Error types for transcripts and transcript persistence.

use std::fmt;

use thiserror::Error;

/// Result type for transcript operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while persisting or reading transcripts.
#[derive(Debug, Error)]
pub enum Error {
    /// Filesystem error from a sink.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A persisted event could not be decoded.
    #[error(transparent)]
    Decode(#[from] DecodeError),

    /// The sink task has shut down.
    #[error("transcript sink closed")]
    SinkClosed,
}

/// A persisted event (or lazy event field) that could not be decoded.
///
/// Decoding a transcript never aborts on one of these: the offending record
/// is skipped and the error is reported alongside the decoded events.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct DecodeError {
    /// Zero-based record position within the transcript, when known.
    pub position: Option<usize>,
    /// The `event` tag of the offending record, when present.
    pub tag: Option<String>,
    /// What went wrong.
    pub reason: String,
}

impl DecodeError {
    /// A record-level failure.
    pub fn record(position: usize, tag: Option<String>, reason: impl Into<String>) -> Self {
        Self {
            position: Some(position),
            tag,
            reason: reason.into(),
        }
    }

    /// A failure decoding a single lazy field.
    pub fn field(reason: impl Into<String>) -> Self {
        Self {
            position: None,
            tag: None,
            reason: reason.into(),
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("cannot decode event")?;
        if let Some(position) = self.position {
            write!(f, " at {position}")?;
        }
        if let Some(tag) = &self.tag {
            write!(f, " ({tag})")?;
        }
        write!(f, ": {}", self.reason)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_display_names_position_and_tag() {
        let err = DecodeError::record(3, Some("bogus".into()), "unknown event kind");
        assert_eq!(err.to_string(), "cannot decode event at 3 (bogus): unknown event kind");
    }

    #[test]
    fn field_error_display_is_terse() {
        let err = DecodeError::field("invalid type");
        assert_eq!(err.to_string(), "cannot decode event: invalid type");
    }
}
