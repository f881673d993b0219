//! Deterministic exponential backoff.

use std::time::Duration;

/// Backoff policy for failed sync attempts.
///
/// `delay_for` is a pure function of the retry count:
/// `min(base_delay * 2^retry_count, max_delay)`. No jitter, no clock reads,
/// so it is independently testable and reproducible across devices.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackoffPolicy {
    /// Delay before the first retry.
    pub base_delay: Duration,
    /// Upper bound on any computed delay.
    pub max_delay: Duration,
    /// Attempts after which a record is permanently failed.
    pub max_retries: u32,
}

impl BackoffPolicy {
    /// Creates a policy with the given bounds.
    pub fn new(base_delay: Duration, max_delay: Duration, max_retries: u32) -> Self {
        Self {
            base_delay,
            max_delay,
            max_retries,
        }
    }

    /// Computes the wait before the attempt following `retry_count` failures.
    ///
    /// Saturates at `max_delay`; never overflows for any `retry_count`.
    pub fn delay_for(&self, retry_count: u32) -> Duration {
        let base = self.base_delay.as_millis();
        let cap = self.max_delay.as_millis();

        let scaled = if retry_count >= 64 {
            None
        } else {
            base.checked_mul(1u128 << retry_count)
        };
        let millis = scaled.map_or(cap, |m| m.min(cap));

        // Duration::from_millis takes u64; the cap keeps real configs far
        // below this, but clamp anyway.
        Duration::from_millis(u64::try_from(millis).unwrap_or(u64::MAX))
    }

    /// Returns true once `retry_count` failures exhaust the retry budget.
    pub fn is_exhausted(&self, retry_count: u32) -> bool {
        retry_count >= self.max_retries
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(60_000),
            max_retries: 5,
        }
    }
}
