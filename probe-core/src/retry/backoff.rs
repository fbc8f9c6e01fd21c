//! Backoff policy for retried calls.

use std::time::Duration;

/// Bounds and delays for retrying one call.
///
/// The delay before attempt `n + 1` is `initial_delay * 2^(n-1)` plus up to
/// `jitter`, capped at `max_delay`. A provider "retry after" hint replaces
/// the computed delay, clamped to `[retry_after_floor, retry_after_ceiling]`.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Attempts allowed, including the first. `None` means unbounded.
    pub max_attempts: Option<u32>,
    /// Wall-clock budget for the whole call. `None` means unbounded.
    pub timeout: Option<Duration>,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub jitter: Duration,
    pub retry_after_floor: Duration,
    pub retry_after_ceiling: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: Some(10),
            timeout: None,
            initial_delay: Duration::from_secs(3),
            max_delay: Duration::from_secs(30 * 60),
            jitter: Duration::from_secs(3),
            retry_after_floor: Duration::from_secs(1),
            retry_after_ceiling: Duration::from_secs(30 * 60),
        }
    }
}

impl RetryPolicy {
    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: Duration) -> Self {
        self.jitter = jitter;
        self
    }

    /// Whether `attempts` calls use up the attempt budget.
    pub fn attempts_exhausted(&self, attempts: u32) -> bool {
        self.max_attempts.is_some_and(|max| attempts >= max)
    }

    /// Delay after failed attempt `attempt` (1-based), without jitter.
    pub fn base_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(63) as i32;
        let secs = self.initial_delay.as_secs_f64() * 2f64.powi(exponent);
        Duration::try_from_secs_f64(secs)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Delay after failed attempt `attempt` (1-based).
    ///
    /// `hint` is the provider's "retry after" value, which takes precedence.
    pub fn delay(&self, attempt: u32, hint: Option<Duration>) -> Duration {
        if let Some(hint) = hint {
            return self.clamp_hint(hint);
        }
        self.base_delay(attempt)
            .saturating_add(random_jitter(self.jitter))
            .min(self.max_delay)
    }

    fn clamp_hint(&self, hint: Duration) -> Duration {
        let ceiling = self.retry_after_ceiling.max(self.retry_after_floor);
        hint.clamp(self.retry_after_floor, ceiling)
    }
}

/// A uniformly random duration in `[0, max]`.
///
/// Falls back to no jitter if the system RNG is unavailable.
fn random_jitter(max: Duration) -> Duration {
    if max.is_zero() {
        return Duration::ZERO;
    }
    let mut buf = [0u8; 8];
    if getrandom::fill(&mut buf).is_err() {
        return Duration::ZERO;
    }
    let fraction = (u64::from_le_bytes(buf) >> 11) as f64 / (1u64 << 53) as f64;
    max.mul_f64(fraction)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_jitter() -> RetryPolicy {
        RetryPolicy::default().with_jitter(Duration::ZERO)
    }

    #[test]
    fn delays_double_from_initial() {
        let policy = no_jitter();
        assert_eq!(policy.delay(1, None), Duration::from_secs(3));
        assert_eq!(policy.delay(2, None), Duration::from_secs(6));
        assert_eq!(policy.delay(3, None), Duration::from_secs(12));
    }

    #[test]
    fn delays_are_capped() {
        let policy = no_jitter().with_max_delay(Duration::from_secs(20));
        assert_eq!(policy.delay(4, None), Duration::from_secs(20));
        assert_eq!(policy.delay(u32::MAX, None), Duration::from_secs(20));
    }

    #[test]
    fn jitter_stays_within_bounds() {
        let policy = RetryPolicy::default();
        for _ in 0..100 {
            let delay = policy.delay(1, None);
            assert!(delay >= Duration::from_secs(3), "{delay:?}");
            assert!(delay <= Duration::from_secs(6), "{delay:?}");
        }
    }

    #[test]
    fn jitter_never_exceeds_max_delay() {
        let policy = RetryPolicy::default().with_max_delay(Duration::from_secs(4));
        for _ in 0..100 {
            assert!(policy.delay(10, None) <= Duration::from_secs(4));
        }
    }

    // ==================== Retry-After ====================

    #[test]
    fn retry_after_hint_wins() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay(5, Some(Duration::from_secs(2))),
            Duration::from_secs(2)
        );
    }

    #[test]
    fn retry_after_hint_is_clamped() {
        let policy = RetryPolicy::default();
        assert_eq!(
            policy.delay(1, Some(Duration::from_millis(200))),
            Duration::from_secs(1)
        );
        assert_eq!(
            policy.delay(1, Some(Duration::from_secs(7200))),
            Duration::from_secs(1800)
        );
    }

    #[test]
    fn attempt_budget() {
        let policy = RetryPolicy::default().with_max_attempts(Some(3));
        assert!(!policy.attempts_exhausted(2));
        assert!(policy.attempts_exhausted(3));
        assert!(!RetryPolicy::default().with_max_attempts(None).attempts_exhausted(u32::MAX));
    }
}
