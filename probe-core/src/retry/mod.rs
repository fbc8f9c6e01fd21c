//! Retry orchestration for model and HTTP calls.
//!
//! [`Retrier::run`] drives one call through
//! `attempt -> (success | retryable failure -> wait -> attempt | fatal)`:
//!
//! - failures are classified by the provider's [`RetryClassifier`]
//! - waits follow the [`RetryPolicy`] (exponential backoff with jitter, or
//!   the provider's "retry after" hint)
//! - every attempt's outcome is logged on the HTTP level with the active
//!   sample's context; retries are counted against the sample
//! - cancellation aborts the current attempt or wait immediately and is
//!   never retried

mod backoff;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use probe_log::{ActiveSample, active};
use probe_models::retry::HTTP;
use probe_models::{ProviderError, RetryClassifier};
use probe_observe::sample_context_prefix;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

pub use backoff::RetryPolicy;

use crate::error::{Budget, RetryError};

/// A successful call and how many attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
    pub value: T,
    /// Attempts made, including the successful one.
    pub attempts: u32,
    /// Time spent on the call, waits included.
    pub elapsed: Duration,
}

impl<T> Retried<T> {
    /// Retries made before the successful attempt.
    pub fn retries(&self) -> u32 {
        self.attempts.saturating_sub(1)
    }
}

/// Progress of one retried call. Owned by the task running it.
#[derive(Debug, Clone, Copy)]
pub struct RetryState {
    /// Attempts started so far.
    pub attempt: u32,
    /// When the first attempt started.
    pub started: Instant,
    /// Time spent waiting between attempts.
    pub waited: Duration,
}

impl RetryState {
    fn new() -> Self {
        Self {
            attempt: 0,
            started: Instant::now(),
            waited: Duration::ZERO,
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// How retry lines name the call.
#[derive(Debug, Clone, Copy)]
enum LineStyle {
    Model,
    Connection,
}

impl LineStyle {
    /// What a line starts with: the sample prefix, or `-> ` for model calls
    /// made outside a sample.
    fn lead(self, prefix: &str) -> &str {
        match self {
            LineStyle::Model if prefix.is_empty() => "-> ",
            _ => prefix,
        }
    }
}

/// Runs calls under a [`RetryPolicy`].
#[derive(Debug, Clone, Default)]
pub struct Retrier {
    policy: RetryPolicy,
    cancel: CancellationToken,
}

impl Retrier {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            cancel: CancellationToken::new(),
        }
    }

    /// Abort attempts and waits when `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Run a model call, retrying failures `classifier` deems transient.
    ///
    /// `target` names the call in log lines (usually `provider/model`).
    ///
    /// # Errors
    ///
    /// Returns [`RetryError::Fatal`] for non-retryable failures,
    /// [`RetryError::Exhausted`] once the attempt or time budget runs out and
    /// [`RetryError::Cancelled`] if the call was cancelled.
    pub async fn run<T, F, Fut>(
        &self,
        target: &str,
        classifier: &dyn RetryClassifier,
        call: F,
    ) -> Result<Retried<T>, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.drive(target, classifier, LineStyle::Model, call).await
    }

    /// Run a plain HTTP request to `url` with the generic HTTP classifier.
    ///
    /// # Errors
    ///
    /// As [`run`](Self::run).
    pub async fn run_http<T, F, Fut>(&self, url: &str, call: F) -> Result<Retried<T>, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        self.drive(url, &HTTP, LineStyle::Connection, call).await
    }

    async fn drive<T, F, Fut>(
        &self,
        target: &str,
        classifier: &dyn RetryClassifier,
        style: LineStyle,
        mut call: F,
    ) -> Result<Retried<T>, RetryError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut state = RetryState::new();
        loop {
            state.attempt += 1;
            let outcome = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancelled(target, &state)),
                outcome = call() => outcome,
            };

            let err = match outcome {
                Ok(value) => {
                    let prefix = sample_context_prefix();
                    probe_observe::http!(
                        attempt = state.attempt,
                        "{}{target} attempt {} succeeded",
                        style.lead(&prefix),
                        state.attempt
                    );
                    return Ok(Retried {
                        value,
                        attempts: state.attempt,
                        elapsed: state.elapsed(),
                    });
                }
                Err(err) => err,
            };

            if err.is_cancellation() {
                return Err(cancelled(target, &state));
            }
            if !classifier.should_retry(&err) {
                let prefix = sample_context_prefix();
                let line = fatal_message(style.lead(&prefix), target, state.attempt, &err);
                probe_observe::http!(
                    attempt = state.attempt,
                    provider = classifier.name(),
                    "{line}"
                );
                return Err(RetryError::Fatal {
                    target: target.to_string(),
                    attempts: state.attempt,
                    source: err,
                });
            }
            if self.policy.attempts_exhausted(state.attempt) {
                return Err(self.give_up(target, style, &state, Budget::Attempts, err));
            }

            let wait = self.policy.delay(state.attempt, err.retry_after);
            let overruns = self
                .policy
                .timeout
                .is_some_and(|timeout| state.elapsed().saturating_add(wait) > timeout);
            if overruns {
                return Err(self.give_up(target, style, &state, Budget::Time, err));
            }

            let prefix = sample_context_prefix();
            let line = match style {
                LineStyle::Model => retry_message(&prefix, target, state.attempt, wait, &err),
                LineStyle::Connection => {
                    http_retry_message(&prefix, target, state.attempt, wait, &err)
                }
            };
            probe_observe::http!(attempt = state.attempt, "{line}");
            active::report_retry();

            let _waiting = Waiting::start(active::current());
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(cancelled(target, &state)),
                _ = tokio::time::sleep(wait) => {}
            }
            state.waited += wait;
        }
    }

    fn give_up(
        &self,
        target: &str,
        style: LineStyle,
        state: &RetryState,
        budget: Budget,
        err: ProviderError,
    ) -> RetryError {
        let prefix = sample_context_prefix();
        let line = give_up_message(style.lead(&prefix), target, state.attempt, budget, &err);
        probe_observe::http!(attempt = state.attempt, "{line}");
        RetryError::Exhausted {
            target: target.to_string(),
            attempts: state.attempt,
            budget,
            source: err,
        }
    }
}

/// Marks the active sample as waiting until dropped.
struct Waiting(Option<Arc<ActiveSample>>);

impl Waiting {
    fn start(sample: Option<Arc<ActiveSample>>) -> Self {
        if let Some(sample) = &sample {
            sample.set_waiting(true);
        }
        Self(sample)
    }
}

impl Drop for Waiting {
    fn drop(&mut self) {
        if let Some(sample) = &self.0 {
            sample.set_waiting(false);
        }
    }
}

fn cancelled(target: &str, state: &RetryState) -> RetryError {
    RetryError::Cancelled {
        target: target.to_string(),
        attempts: state.attempt,
    }
}


// ==================== Log lines ====================

/// Retry line for a model call.
///
/// `prefix` is the sample-context prefix; outside a sample the line starts
/// with `-> ` instead.
pub fn retry_message(
    prefix: &str,
    target: &str,
    attempt: u32,
    wait: Duration,
    err: &ProviderError,
) -> String {
    let lead = LineStyle::Model.lead(prefix);
    format!(
        "{lead}{target} retry {attempt} (retrying in {} seconds) [{}]",
        format_seconds(wait),
        err.summary()
    )
}

/// Retry line for a plain HTTP connection.
pub fn http_retry_message(
    prefix: &str,
    url: &str,
    attempt: u32,
    wait: Duration,
    err: &ProviderError,
) -> String {
    format!(
        "{prefix}{url} connection retry {attempt} (retrying in {} seconds) [{}]",
        format_seconds(wait),
        err.summary()
    )
}

fn fatal_message(lead: &str, target: &str, attempt: u32, err: &ProviderError) -> String {
    format!("{lead}{target} attempt {attempt} failed, not retrying [{}]", err.summary())
}

fn give_up_message(
    lead: &str,
    target: &str,
    attempts: u32,
    budget: Budget,
    err: &ProviderError,
) -> String {
    let noun = if attempts == 1 { "attempt" } else { "attempts" };
    format!(
        "{lead}{target} giving up after {attempts} {noun} ({budget}) [{}]",
        err.summary()
    )
}

/// Log a connection retry made by an HTTP client outside [`Retrier`].
pub fn log_http_retry(url: &str, attempt: u32, wait: Duration, err: &ProviderError) {
    let line = http_retry_message(&sample_context_prefix(), url, attempt, wait, err);
    probe_observe::http!(attempt, "{line}");
}

/// Whole seconds with thousands separators.
fn format_seconds(wait: Duration) -> String {
    let digits = (wait.as_secs_f64().round() as u64).to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}
