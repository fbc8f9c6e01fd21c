//! Logging infrastructure for probe.
//!
//! This crate provides:
//! - The HTTP log level ([`LogLevel::Http`], the [`http!`] macro)
//! - Sample-context prefixes for log lines ([`sample_context_prefix`])
//! - A `tracing-subscriber` formatter that enriches HTTP client records with
//!   the active sample's identity ([`SampleContextFormat`])
//! - Subscriber initialization from configuration ([`init_tracing`])

pub mod context;
pub mod format;
mod level;
pub mod tracer;

#[doc(hidden)]
pub use tracing as __tracing;

pub use context::{SampleContext, sample_context, sample_context_prefix};
pub use format::{Enrichment, LogFormat, SampleContextFormat, enrichment};
pub use level::{HTTP_TARGET, LogLevel, ParseLevelError};
pub use tracer::{TracerError, TracingConfig, TracingGuard, build_subscriber, init_tracing};
