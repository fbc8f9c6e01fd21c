//! Normalized provider failures.
//!
//! Provider client libraries report failures in different shapes: some put
//! the HTTP status on the error itself, some on a nested response, some only
//! carry a provider error code in the body. [`ProviderError`] is the single
//! canonical shape every adapter produces, so retry classification and retry
//! logging never have to probe ad hoc.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for provider calls.
pub type Result<T> = std::result::Result<T, ProviderError>;

/// Broad category of a provider failure.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Could not establish or keep a connection.
    Connection,
    /// The request timed out.
    Timeout,
    /// The provider answered with a non-success HTTP status.
    Status,
    /// The provider answered with an error body but no usable status.
    Api,
    /// The surrounding execution was cancelled.
    Cancelled,
    /// Anything else.
    #[default]
    Other,
}

/// A provider failure normalized to `(class, status, code)`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{class}: {message}")]
pub struct ProviderError {
    /// Client-library error class name (e.g. `RateLimitError`).
    pub class: String,
    /// Broad category.
    pub kind: ErrorKind,
    /// Human readable message.
    pub message: String,
    /// HTTP status attached directly to the error.
    pub status_code: Option<u16>,
    /// HTTP status attached to a nested response object.
    pub response_status: Option<u16>,
    /// Provider error code (e.g. `rate_limit_exceeded`).
    pub code: Option<String>,
    /// Provider "retry after" hint.
    pub retry_after: Option<Duration>,
}

impl ProviderError {
    /// Create an error of kind [`ErrorKind::Other`].
    pub fn new(class: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class: class.into(),
            kind: ErrorKind::Other,
            message: message.into(),
            status_code: None,
            response_status: None,
            code: None,
            retry_after: None,
        }
    }

    /// A connection failure.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::new("ConnectionError", message).with_kind(ErrorKind::Connection)
    }

    /// A request timeout.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new("TimeoutError", message).with_kind(ErrorKind::Timeout)
    }

    /// A cancellation of the surrounding execution.
    pub fn cancelled() -> Self {
        Self::new("CancelledError", "operation cancelled").with_kind(ErrorKind::Cancelled)
    }

    /// An HTTP status failure with the status on the error itself.
    pub fn status(class: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        let mut err = Self::new(class, message).with_kind(ErrorKind::Status);
        err.status_code = Some(status);
        err
    }

    /// Set the error kind.
    pub fn with_kind(mut self, kind: ErrorKind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the provider error code.
    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    /// Set the status found on a nested response object.
    pub fn with_response_status(mut self, status: u16) -> Self {
        self.response_status = Some(status);
        if self.kind == ErrorKind::Other {
            self.kind = ErrorKind::Status;
        }
        self
    }

    /// Set the provider retry hint.
    pub fn with_retry_after(mut self, delay: Duration) -> Self {
        self.retry_after = Some(delay);
        self
    }

    /// The HTTP status: the error's own first, then the nested response's.
    pub fn http_status(&self) -> Option<u16> {
        self.status_code.or(self.response_status)
    }

    /// Whether this represents cancellation rather than a provider failure.
    pub fn is_cancellation(&self) -> bool {
        self.kind == ErrorKind::Cancelled
    }

    /// One-line diagnostic summary: `<class> [<status>] [<code>]`.
    pub fn summary(&self) -> String {
        let mut parts = vec![self.class.clone()];
        if let Some(status) = self.http_status() {
            parts.push(status.to_string());
        }
        if let Some(code) = &self.code {
            parts.push(code.clone());
        }
        parts.join(" ")
    }

    /// Build an error from the parts of a failed HTTP response.
    ///
    /// `retry_after` is the raw `Retry-After` header (seconds) and
    /// `retry_after_ms` the raw `retry-after-ms` header, which wins when both
    /// are present. The body is searched for the common
    /// `{"error": {"code" | "status" | "type", "message"}}` shapes.
    pub fn from_parts(
        status: u16,
        retry_after: Option<&str>,
        retry_after_ms: Option<&str>,
        body: &str,
    ) -> Self {
        let detail = ErrorBody::parse(body);
        let message = detail
            .message
            .unwrap_or_else(|| format!("HTTP status {status}"));

        let mut err = Self::status(status_class(status), status, message);
        err.code = detail.code;

        let hint = retry_after_ms
            .and_then(|v| v.trim().parse::<f64>().ok())
            .map(|ms| ms / 1000.0)
            .or_else(|| retry_after.and_then(|v| v.trim().parse::<f64>().ok()));
        err.retry_after = hint.and_then(|secs| Duration::try_from_secs_f64(secs).ok());
        err
    }

    /// Normalize a failed `reqwest` response.
    ///
    /// Consumes the response body. Successful responses should not be passed here.
    pub async fn from_response(response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let retry_after = header("retry-after");
        let retry_after_ms = header("retry-after-ms");
        let body = response.text().await.unwrap_or_default();
        Self::from_parts(
            status,
            retry_after.as_deref(),
            retry_after_ms.as_deref(),
            &body,
        )
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_timeout() {
            return Self::timeout(message);
        }
        if err.is_connect() {
            return Self::connection(message);
        }
        // reqwest attaches the status to the response it came from
        if let Some(status) = err.status() {
            return Self::new(status_class(status.as_u16()), message)
                .with_response_status(status.as_u16());
        }
        if err.is_request() {
            return Self::connection(message);
        }
        Self::new("HTTPError", message)
    }
}

impl From<serde_json::Error> for ProviderError {
    fn from(err: serde_json::Error) -> Self {
        Self::new("DecodeError", err.to_string())
    }
}

/// Conventional client-library class name for an HTTP status.
fn status_class(status: u16) -> &'static str {
    match status {
        400 => "BadRequestError",
        401 => "AuthenticationError",
        403 => "PermissionDeniedError",
        404 => "NotFoundError",
        408 => "RequestTimeoutError",
        409 => "ConflictError",
        422 => "UnprocessableEntityError",
        429 => "RateLimitError",
        529 => "OverloadedError",
        500..=599 => "InternalServerError",
        _ => "APIStatusError",
    }
}

#[derive(Debug, Default)]
struct ErrorBody {
    message: Option<String>,
    code: Option<String>,
}

impl ErrorBody {
    fn parse(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            return Self::default();
        };
        let error = value.get("error").unwrap_or(&value);
        let text = |key: &str| error.get(key).and_then(|v| v.as_str()).map(str::to_string);

        Self {
            message: text("message"),
            // numeric codes (google) duplicate the HTTP status; prefer symbolic ones
            code: text("code").or_else(|| text("status")).or_else(|| text("type")),
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ErrorKind::Connection => "connection",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Status => "status",
            ErrorKind::Api => "api",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Other => "other",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formats_correctly() {
        let err = ProviderError::new("RateLimitError", "slow down");
        assert_eq!(err.to_string(), "RateLimitError: slow down");
    }

    #[test]
    fn http_status_prefers_error_over_response() {
        let err = ProviderError::status("Exception", 429, "x").with_response_status(502);
        assert_eq!(err.http_status(), Some(429));

        let nested = ProviderError::new("Exception", "x").with_response_status(502);
        assert_eq!(nested.http_status(), Some(502));
        assert_eq!(nested.kind, ErrorKind::Status);
    }

    // ==================== Summary Tests ====================

    #[test]
    fn summary_with_status_and_code() {
        let err = ProviderError::status("Exception", 429, "rate limited")
            .with_code("rate_limit_exceeded");
        assert_eq!(err.summary(), "Exception 429 rate_limit_exceeded");
    }

    #[test]
    fn summary_with_status_only() {
        let err = ProviderError::status("Exception", 503, "server error");
        assert_eq!(err.summary(), "Exception 503");
    }

    #[test]
    fn summary_with_code_only() {
        let err = ProviderError::new("Exception", "bad").with_code("server_error");
        assert_eq!(err.summary(), "Exception server_error");
    }

    #[test]
    fn summary_with_status_on_response() {
        let err = ProviderError::new("Exception", "error").with_response_status(502);
        assert_eq!(err.summary(), "Exception 502");
    }

    #[test]
    fn summary_plain_class() {
        assert_eq!(ProviderError::connection("refused").summary(), "ConnectionError");
        assert_eq!(ProviderError::timeout("timed out").summary(), "TimeoutError");
    }

    // ==================== Response Parsing Tests ====================

    #[test]
    fn from_parts_reads_openai_error_body() {
        let body = r#"{"error": {"message": "Rate limit exceeded", "type": "requests", "code": "rate_limit_exceeded"}}"#;
        let err = ProviderError::from_parts(429, Some("1"), None, body);

        assert_eq!(err.class, "RateLimitError");
        assert_eq!(err.status_code, Some(429));
        assert_eq!(err.code.as_deref(), Some("rate_limit_exceeded"));
        assert_eq!(err.message, "Rate limit exceeded");
        assert_eq!(err.retry_after, Some(Duration::from_secs(1)));
    }

    #[test]
    fn from_parts_reads_anthropic_error_type() {
        let body = r#"{"type": "error", "error": {"type": "overloaded_error", "message": "Overloaded"}}"#;
        let err = ProviderError::from_parts(529, None, None, body);

        assert_eq!(err.class, "OverloadedError");
        assert_eq!(err.status_code, Some(529));
        assert_eq!(err.code.as_deref(), Some("overloaded_error"));
    }

    #[test]
    fn from_parts_reads_google_status() {
        let body = r#"{"error": {"code": 429, "message": "Quota", "status": "RESOURCE_EXHAUSTED"}}"#;
        let err = ProviderError::from_parts(429, None, None, body);
        assert_eq!(err.code.as_deref(), Some("RESOURCE_EXHAUSTED"));
    }

    #[test]
    fn from_parts_prefers_retry_after_ms() {
        let err = ProviderError::from_parts(429, Some("5"), Some("250"), "");
        assert_eq!(err.retry_after, Some(Duration::from_millis(250)));
    }

    #[test]
    fn from_parts_ignores_unrepresentable_hints() {
        assert!(ProviderError::from_parts(429, Some("-1"), None, "").retry_after.is_none());
        assert!(ProviderError::from_parts(429, Some("1e40"), None, "").retry_after.is_none());
        assert!(ProviderError::from_parts(429, Some("NaN"), None, "").retry_after.is_none());
    }

    #[test]
    fn from_parts_tolerates_garbage() {
        let err = ProviderError::from_parts(500, Some("soon"), None, "<html>oops</html>");
        assert_eq!(err.class, "InternalServerError");
        assert_eq!(err.message, "HTTP status 500");
        assert!(err.code.is_none());
        assert!(err.retry_after.is_none());
    }

    #[test]
    fn error_from_serde_json() {
        let json_err = serde_json::from_str::<String>("invalid").unwrap_err();
        let err: ProviderError = json_err.into();
        assert_eq!(err.class, "DecodeError");
        assert_eq!(err.kind, ErrorKind::Other);
    }
}
