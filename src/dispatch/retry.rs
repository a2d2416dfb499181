//! Bounded retry policy for origin calls.

use std::time::Duration;

use rand::Rng;

/// Explicit retry policy: attempt budget, backoff schedule and the predicate
/// deciding what is worth retrying.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts including the first one. 1 disables retries.
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay: Duration::from_secs(5),
        }
    }

    /// Exponential backoff with up to 20% jitter. `attempt` is 1-based and
    /// names the attempt that just failed.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(10);
        let base = self.base_delay.saturating_mul(1u32 << exp);
        let capped = base.min(self.max_delay);
        let jitter = rand::rng().random_range(0.0..0.2);
        capped.mul_f64(1.0 + jitter)
    }

    /// Origin status codes worth retrying: server-side failures only.
    /// Client errors (4xx) indicate a request that will not get better.
    pub fn is_retryable_status(status: u16) -> bool {
        status >= 500
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(250))
    }
}
