//! Tracing setup and configuration.
//!
//! This module provides:
//! - [`TracingConfig`], the `[logging]` section of the configuration
//! - [`init_tracing`], which installs the global subscriber with sample-context
//!   enrichment

use serde::{Deserialize, Serialize};
use tracing::Subscriber;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::fmt::format::JsonFields;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;

use crate::format::{DEFAULT_NAMESPACES, LogFormat, SampleContextFormat, enrichment};
use crate::level::LogLevel;

/// Configuration for logging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TracingConfig {
    /// General log level.
    pub level: LogLevel,
    /// Level of the HTTP target; follows `level` when unset.
    pub http_level: Option<LogLevel>,
    /// Output shape.
    pub format: LogFormat,
    /// Logger namespaces whose records get the sample-context prefix.
    pub enrich_namespaces: Vec<String>,
    /// Colored text output.
    pub ansi: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            http_level: None,
            format: LogFormat::Text,
            enrich_namespaces: DEFAULT_NAMESPACES.iter().map(|ns| ns.to_string()).collect(),
            ansi: false,
        }
    }
}

impl TracingConfig {
    /// The `EnvFilter` for this configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if a namespace produces an invalid directive.
    pub fn env_filter(&self) -> Result<EnvFilter, TracerError> {
        Ok(EnvFilter::try_new(self.level.directives(self.http_level))?)
    }

    /// The event formatter for this configuration.
    pub fn event_format(&self) -> SampleContextFormat {
        SampleContextFormat::new(self.format).with_namespaces(self.enrich_namespaces.iter().cloned())
    }
}

/// Error type for tracing initialization.
#[derive(Debug, thiserror::Error)]
pub enum TracerError {
    /// Invalid filter directives.
    #[error("invalid log filter: {0}")]
    Filter(#[from] tracing_subscriber::filter::ParseError),

    /// Failed to set global subscriber.
    #[error("failed to set global subscriber: {0}")]
    SetGlobalSubscriber(#[from] tracing_subscriber::util::TryInitError),
}

/// Guard that detaches sample-context enrichment when dropped.
pub struct TracingGuard {
    installed: bool,
}

impl TracingGuard {
    /// Detach enrichment now; records pass through unchanged afterwards.
    pub fn shutdown(&mut self) {
        if std::mem::take(&mut self.installed) {
            enrichment().uninstall();
        }
    }
}

impl Drop for TracingGuard {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Build a subscriber for `config` writing to `writer`.
///
/// Does not touch the enrichment switch.
///
/// # Errors
///
/// Returns an error if the filter directives are invalid.
pub fn build_subscriber<W>(
    config: &TracingConfig,
    writer: W,
) -> Result<impl Subscriber + for<'a> LookupSpan<'a> + Send + Sync + use<W>, TracerError>
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let format = config.event_format();
    let (text, json) = match config.format {
        LogFormat::Text => (
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(config.ansi)
                    .event_format(format)
                    .with_writer(writer),
            ),
            None,
        ),
        LogFormat::Json => (
            None,
            Some(
                tracing_subscriber::fmt::layer()
                    .fmt_fields(JsonFields::new())
                    .event_format(format)
                    .with_writer(writer),
            ),
        ),
    };
    Ok(tracing_subscriber::registry()
        .with(config.env_filter()?)
        .with(text)
        .with(json))
}

/// Initialize the global tracing subscriber with sample-context enrichment.
///
/// Enrichment is installed at most once per process; the returned guard
/// detaches it if this call was the one that installed it.
///
/// # Errors
///
/// Returns an error if the global subscriber has already been set.
pub fn init_tracing(config: &TracingConfig) -> Result<TracingGuard, TracerError> {
    build_subscriber(config, std::io::stderr)?.try_init()?;
    let installed = enrichment().install();
    tracing::debug!(level = %config.level, installed, "tracing initialized");
    Ok(TracingGuard { installed })
}
