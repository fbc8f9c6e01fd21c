//! Retry classification for provider failures.
//!
//! A [`RetryClassifier`] decides whether a [`ProviderError`] is transient.
//! The decision is composed from three sources, checked in order:
//!
//! 1. provider-declared transient categories (timeouts, unavailability)
//! 2. the HTTP status, on the error itself or on its nested response
//! 3. a provider catch-all for failures its own client flags as transient
//!
//! Classification is a pure function of the error.

mod tables;

pub use tables::{ANTHROPIC, GOOGLE, HTTP, MISTRAL, OPENAI, ProviderTable, classifier_for};

use crate::ProviderError;

/// 5xx statuses that describe permanent conditions and are never retried.
pub const DEFAULT_EXCLUDED_STATUSES: &[u16] = &[501, 505];

/// Whether an HTTP status is worth retrying.
///
/// Retries 408, 409, 429 and every 5xx except [`DEFAULT_EXCLUDED_STATUSES`].
/// Other 4xx statuses are never retried.
pub fn is_retryable_http_status(status: u16) -> bool {
    retryable_status(status, DEFAULT_EXCLUDED_STATUSES)
}

pub(crate) fn retryable_status(status: u16, excluded: &[u16]) -> bool {
    match status {
        408 | 409 | 429 => true,
        500..=599 => !excluded.contains(&status),
        _ => false,
    }
}

/// Decides whether a provider failure should be retried.
pub trait RetryClassifier: Send + Sync {
    /// Name of the provider this classifier covers.
    fn name(&self) -> &str;

    /// Provider-declared transient categories.
    fn is_transient_category(&self, err: &ProviderError) -> bool;

    /// 5xx statuses this provider uses for permanent failures.
    fn excluded_statuses(&self) -> &[u16] {
        DEFAULT_EXCLUDED_STATUSES
    }

    /// Failures the provider's client already flags as transient.
    fn is_flagged_transient(&self, _err: &ProviderError) -> bool {
        false
    }

    /// Whether `err` should be retried.
    fn should_retry(&self, err: &ProviderError) -> bool {
        if err.is_cancellation() {
            return false;
        }
        if self.is_transient_category(err) {
            return true;
        }
        if let Some(status) = err.http_status() {
            return retryable_status(status, self.excluded_statuses());
        }
        self.is_flagged_transient(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_statuses() {
        for status in [408, 409, 429, 500, 502, 503, 504, 529] {
            assert!(is_retryable_http_status(status), "{status} should retry");
        }
    }

    #[test]
    fn non_retryable_statuses() {
        for status in [200, 301, 400, 401, 403, 404, 410, 422, 501, 505, 600] {
            assert!(!is_retryable_http_status(status), "{status} should not retry");
        }
    }

    struct Strict;

    impl RetryClassifier for Strict {
        fn name(&self) -> &str {
            "strict"
        }

        fn is_transient_category(&self, err: &ProviderError) -> bool {
            err.class == "Flaky"
        }

        fn excluded_statuses(&self) -> &[u16] {
            &[503]
        }

        fn is_flagged_transient(&self, err: &ProviderError) -> bool {
            err.code.as_deref() == Some("try_again")
        }
    }

    #[test]
    fn category_short_circuits_status() {
        let err = ProviderError::status("Flaky", 404, "gone");
        assert!(Strict.should_retry(&err));
    }

    #[test]
    fn status_decides_before_catch_all() {
        let err = ProviderError::status("Exception", 404, "gone").with_code("try_again");
        assert!(!Strict.should_retry(&err));
    }

    #[test]
    fn provider_exclusions_apply() {
        assert!(!Strict.should_retry(&ProviderError::status("Exception", 503, "x")));
        assert!(Strict.should_retry(&ProviderError::status("Exception", 501, "x")));
    }

    #[test]
    fn nested_response_status_is_checked() {
        let err = ProviderError::new("Exception", "x").with_response_status(502);
        assert!(Strict.should_retry(&err));
    }

    #[test]
    fn catch_all_applies_without_status() {
        let err = ProviderError::new("Exception", "x").with_code("try_again");
        assert!(Strict.should_retry(&err));
        assert!(!Strict.should_retry(&ProviderError::new("Exception", "x")));
    }

    #[test]
    fn cancellation_is_never_retried() {
        let err = ProviderError::cancelled().with_code("try_again");
        assert!(!Strict.should_retry(&err));
    }
}
