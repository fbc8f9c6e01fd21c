//! Model provider trait.
//!
//! The [`ModelProvider`] trait is the boundary between probe and provider
//! integration code. Implementations shape requests for one provider's wire
//! format and normalize its failures into [`ProviderError`](crate::ProviderError);
//! retries, logging and transcript recording happen around this call, never
//! inside it.
//!
//! # Example Implementation
//!
//! ```ignore
//! use async_trait::async_trait;
//! use probe_models::providers::{ChatRequest, ModelOutput, ModelProvider};
//! use probe_models::{ProviderError, Result};
//!
//! struct MyProvider {
//!     client: reqwest::Client,
//! }
//!
//! #[async_trait]
//! impl ModelProvider for MyProvider {
//!     fn name(&self) -> &str {
//!         "my-provider"
//!     }
//!
//!     async fn generate(&self, request: &ChatRequest) -> Result<ModelOutput> {
//!         let response = self.client.post("https://...").json(request).send().await?;
//!         if !response.status().is_success() {
//!             return Err(ProviderError::from_response(response).await);
//!         }
//!         Ok(response.json().await?)
//!     }
//! }
//! ```

mod types;

use async_trait::async_trait;

pub use types::*;

use crate::Result;
use crate::retry::{RetryClassifier, classifier_for};

/// Trait for model providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Returns the provider name (e.g., "anthropic", "openai").
    fn name(&self) -> &str;

    /// Perform one generation attempt.
    ///
    /// Failures must be normalized to [`ProviderError`](crate::ProviderError);
    /// the caller decides whether to retry.
    async fn generate(&self, request: &ChatRequest) -> Result<ModelOutput>;

    /// Retry classification for this provider's failures.
    ///
    /// Defaults to the built-in table registered under [`name`](Self::name).
    fn classifier(&self) -> &dyn RetryClassifier {
        classifier_for(self.name())
    }
}
