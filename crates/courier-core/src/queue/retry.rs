//! Retry policy: decides backoff delays.

use std::time::Duration;

/// Exponential backoff for failed tasks.
///
/// delay = base_delay * multiplier^(attempts - 1), capped at `max_delay`.
///
/// Example with base_delay=2s, multiplier=2.0:
/// - attempt 1 (first failure): 2s
/// - attempt 2: 4s
/// - attempt 3: 8s
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub multiplier: f64,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(2),
            multiplier: 2.0,
            max_delay: Duration::from_secs(600),
        }
    }
}

impl RetryPolicy {
    /// `attempts` is the number of attempts already made (1-indexed).
    pub fn next_delay(&self, attempts: u32) -> Duration {
        let exponent = attempts.saturating_sub(1).min(i32::MAX as u32) as i32;
        let delay_secs = self.base_delay.as_secs_f64() * self.multiplier.powi(exponent);
        if !delay_secs.is_finite() || delay_secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(delay_secs.max(0.0))
    }
}
