//! Exponential backoff for transient fetch failures

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Retry policy for one page request.
///
/// `max_retries` counts retries, so a page gets at most `max_retries + 1`
/// attempts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_retries: u32,
    /// Delay before the first retry (milliseconds)
    pub base_delay_ms: u64,
    /// Upper bound for any single delay (milliseconds)
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    /// Extra delay as a fraction of the backoff, scaled by the jitter sample
    pub jitter_ratio: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_ratio: 0.5,
        }
    }
}

impl RetryPolicy {
    /// Whether another attempt is allowed after `retries_done` retries
    pub fn should_retry(&self, retries_done: u32) -> bool {
        retries_done < self.max_retries
    }

    /// Delay before retry number `retry` (1-based) for a jitter sample in `[0, 1)`.
    ///
    /// Pure: the same inputs always give the same delay, and for a fixed
    /// jitter the delay never decreases as `retry` grows.
    pub fn delay_for(&self, retry: u32, jitter: f64) -> Duration {
        let exponent = retry.saturating_sub(1).min(62) as i32;
        let exponential = self.base_delay_ms as f64 * self.backoff_multiplier.max(1.0).powi(exponent);
        let capped = exponential.min(self.max_delay_ms as f64);

        let jitter = if jitter.is_finite() { jitter.clamp(0.0, 1.0) } else { 0.0 };
        let with_jitter = capped * (1.0 + self.jitter_ratio.max(0.0) * jitter);
        let bounded = with_jitter.min(self.max_delay_ms as f64).max(0.0);

        Duration::from_millis(bounded.round() as u64)
    }
}
