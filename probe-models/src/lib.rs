//! Model types and provider failure handling for probe.
//!
//! This crate provides:
//! - Canonical chat types ([`Message`](providers::Message), [`ModelOutput`](providers::ModelOutput))
//! - The [`ModelProvider`](providers::ModelProvider) trait wrapped by the retry orchestrator
//! - [`ProviderError`], the normalized form of every provider client failure
//! - Per-provider retry classification ([`retry`])
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────┐
//! │                provider client failure                 │
//! │     (reqwest error, HTTP response, SDK error body)     │
//! └───────────────────────────────────────────────────────┘
//!                           │ normalize
//!                           ▼
//! ┌───────────────────────────────────────────────────────┐
//! │    ProviderError { class, kind, status, code, ... }    │
//! └───────────────────────────────────────────────────────┘
//!                           │ classify
//!                           ▼
//! ┌─────────────┐ ┌─────────────┐ ┌─────────────┐ ┌───────┐
//! │   OpenAI    │ │  Anthropic  │ │   Google    │ │  ...  │
//! │   table     │ │   table     │ │   table     │ │       │
//! └─────────────┘ └─────────────┘ └─────────────┘ └───────┘
//! ```

mod error;
mod types;

pub mod providers;
pub mod retry;

pub use error::{ErrorKind, ProviderError, Result};
pub use retry::{RetryClassifier, classifier_for, is_retryable_http_status};
pub use types::ModelName;
