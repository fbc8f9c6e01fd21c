//! Sample execution with retried, logged and recorded model calls.
//!
//! This crate ties the workspace together:
//! - [`Retrier`] retries provider calls with backoff, logging each retry
//!   with the active sample's context
//! - [`Model`] wraps a provider and records every call as a model event
//! - [`SampleRunner`] runs one sample with its transcript, limits and sink
//! - [`ProbeConfig`] loads the TOML configuration
//!
//! # Example
//!
//! ```ignore
//! let config = ProbeConfig::load("probe.toml")?;
//! let _guard = probe_observe::init_tracing(&config.logging)?;
//!
//! let model = Model::new(provider, "gpt-4o")
//!     .with_retrier(Retrier::new(config.retry.policy()));
//! let runner = SampleRunner::new("mmlu", model.name());
//!
//! let outcome = runner
//!     .run(sample, 1, |sample| async move {
//!         model
//!             .generate(sample.sample.input.messages(), vec![], Default::default())
//!             .await
//!     })
//!     .await;
//! ```

pub mod config;
mod error;
mod model;
pub mod retry;
mod sample;

pub use config::{ProbeConfig, RetryConfig, TranscriptConfig};
pub use error::{Budget, Error, Result, RetryError};
pub use model::Model;
pub use retry::{
    Retried, Retrier, RetryPolicy, RetryState, http_retry_message, log_http_retry, retry_message,
};
pub use sample::{SampleOutcome, SampleRunner};
