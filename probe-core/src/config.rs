//! TOML configuration.
//!
//! ```toml
//! [retry]
//! max_attempts = 10
//! timeout_secs = 600
//!
//! [logging]
//! level = "http"
//! format = "json"
//!
//! [transcript]
//! log_path = "logs/transcripts.jsonl"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use probe_observe::{LogLevel, TracingConfig};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

/// Environment variable overriding `logging.level`.
pub const LOG_LEVEL_ENV: &str = "PROBE_LOG_LEVEL";

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProbeConfig {
    pub retry: RetryConfig,
    pub logging: TracingConfig,
    pub transcript: TranscriptConfig,
}

/// `[retry]` section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Attempts per call, including the first. `0` disables the limit.
    pub max_attempts: u32,
    /// Wall-clock budget per call.
    pub timeout_secs: Option<u64>,
    pub initial_delay_ms: u64,
    pub max_delay_secs: u64,
    pub jitter_ms: u64,
    pub retry_after_floor_ms: u64,
    pub retry_after_ceiling_secs: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_attempts: policy.max_attempts.unwrap_or(0),
            timeout_secs: policy.timeout.map(|t| t.as_secs()),
            initial_delay_ms: policy.initial_delay.as_millis() as u64,
            max_delay_secs: policy.max_delay.as_secs(),
            jitter_ms: policy.jitter.as_millis() as u64,
            retry_after_floor_ms: policy.retry_after_floor.as_millis() as u64,
            retry_after_ceiling_secs: policy.retry_after_ceiling.as_secs(),
        }
    }
}

impl RetryConfig {
    /// The policy this section describes.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: (self.max_attempts > 0).then_some(self.max_attempts),
            timeout: self.timeout_secs.map(Duration::from_secs),
            initial_delay: Duration::from_millis(self.initial_delay_ms),
            max_delay: Duration::from_secs(self.max_delay_secs),
            jitter: Duration::from_millis(self.jitter_ms),
            retry_after_floor: Duration::from_millis(self.retry_after_floor_ms),
            retry_after_ceiling: Duration::from_secs(self.retry_after_ceiling_secs),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.retry_after_ceiling_secs.saturating_mul(1000) < self.retry_after_floor_ms {
            return Err(Error::ConfigValue(
                "retry.retry_after_ceiling_secs is below retry.retry_after_floor_ms".to_string(),
            ));
        }
        if self.max_delay_secs.saturating_mul(1000) < self.initial_delay_ms {
            return Err(Error::ConfigValue(
                "retry.max_delay_secs is below retry.initial_delay_ms".to_string(),
            ));
        }
        Ok(())
    }
}

/// `[transcript]` section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TranscriptConfig {
    /// JSONL file receiving every sample's events. Unset keeps transcripts in memory only.
    pub log_path: Option<PathBuf>,
}

impl ProbeConfig {
    /// Parse a TOML document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is not valid TOML, has unknown value
    /// types or describes an inconsistent retry policy.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: ProbeConfig = toml::from_str(contents)?;
        config.retry.validate()?;
        Ok(config)
    }

    /// Load from a file, then apply environment overrides.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// `PROBE_LOG_LEVEL` holds an unknown level.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| Error::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config = Self::parse(&contents)?;
        config.apply_env_level(std::env::var(LOG_LEVEL_ENV).ok().as_deref())?;
        Ok(config)
    }

    fn apply_env_level(&mut self, value: Option<&str>) -> Result<()> {
        if let Some(value) = value.filter(|v| !v.trim().is_empty()) {
            self.logging.level = value
                .parse::<LogLevel>()
                .map_err(|e| Error::ConfigValue(format!("{LOG_LEVEL_ENV}: {e}")))?;
        }
        Ok(())
    }
}
