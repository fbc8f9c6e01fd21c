//! Log levels, including the HTTP level.
//!
//! `tracing` has a fixed set of levels, so the HTTP level (between INFO and
//! DEBUG) is expressed as a dedicated target, [`HTTP_TARGET`], whose events
//! are emitted at DEBUG. [`LogLevel::Http`] enables everything at INFO plus
//! that target.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Target used for retry attempts and provider wire diagnostics.
pub const HTTP_TARGET: &str = "probe_http";

/// Emit an event at the HTTP level.
///
/// ```ignore
/// probe_observe::http!("POST {url} {status}");
/// ```
#[macro_export]
macro_rules! http {
    ($($arg:tt)+) => {
        $crate::__tracing::debug!(target: $crate::HTTP_TARGET, $($arg)+)
    };
}

/// Application log level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error,
    Warning,
    #[default]
    Info,
    Http,
    Debug,
    Trace,
}

impl LogLevel {
    fn base(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warn",
            LogLevel::Info | LogLevel::Http => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }

    fn http_target(self) -> &'static str {
        match self {
            LogLevel::Http | LogLevel::Debug => "debug",
            other => other.base(),
        }
    }

    /// `EnvFilter` directives for this level.
    ///
    /// `http` sets the level of the HTTP target independently; by default it
    /// follows `self`.
    #[must_use]
    pub fn directives(self, http: Option<LogLevel>) -> String {
        let http = http.unwrap_or(self);
        format!("{},{HTTP_TARGET}={}", self.base(), http.http_target())
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Info => "info",
            LogLevel::Http => "http",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        };
        f.write_str(name)
    }
}

/// Unrecognized log level name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown log level: {0}")]
pub struct ParseLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "info" => Ok(LogLevel::Info),
            "http" => Ok(LogLevel::Http),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            _ => Err(ParseLevelError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_sits_between_info_and_debug() {
        assert!(LogLevel::Info < LogLevel::Http);
        assert!(LogLevel::Http < LogLevel::Debug);
    }

    #[test]
    fn directives_follow_level() {
        assert_eq!(LogLevel::Info.directives(None), "info,probe_http=info");
        assert_eq!(LogLevel::Http.directives(None), "info,probe_http=debug");
        assert_eq!(LogLevel::Debug.directives(None), "debug,probe_http=debug");
        assert_eq!(LogLevel::Trace.directives(None), "trace,probe_http=trace");
    }

    #[test]
    fn http_level_is_independent() {
        assert_eq!(
            LogLevel::Warning.directives(Some(LogLevel::Http)),
            "warn,probe_http=debug"
        );
        assert_eq!(
            LogLevel::Debug.directives(Some(LogLevel::Error)),
            "debug,probe_http=error"
        );
    }

    #[test]
    fn parses_names() {
        assert_eq!("HTTP".parse::<LogLevel>().unwrap(), LogLevel::Http);
        assert_eq!("warn".parse::<LogLevel>().unwrap(), LogLevel::Warning);
        assert!("loud".parse::<LogLevel>().is_err());
        assert_eq!(LogLevel::Warning.to_string(), "warning");
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let level: LogLevel = serde_json::from_str("\"http\"").unwrap();
        assert_eq!(level, LogLevel::Http);
    }
}
