//! Retry policy for a node's Exec step.
//!
//! Only Exec is ever retried. Delay between attempt `i` and `i+1` is
//! `min(initial_delay * multiplier^(i-1), max_delay)`.

use std::time::Duration;

/// Configuration for retrying a node's Exec step.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first (must be `>= 1`).
    pub max_attempts: usize,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
    /// Upper clamp on the computed delay.
    pub max_delay: Duration,
}

impl RetryPolicy {
    /// A policy that never retries: a single attempt, no delay.
    pub fn none() -> Self {
        RetryPolicy {
            max_attempts: 1,
            initial_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    pub fn new(max_attempts: usize) -> Self {
        assert!(max_attempts >= 1, "max_attempts must be at least 1");
        RetryPolicy {
            max_attempts,
            ..RetryPolicy::none()
        }
    }

    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Delay before retry attempt number `attempt` (1-based: the delay
    /// waited before making attempt 2 is `delay_for(1)`).
    pub fn delay_for(&self, attempt: usize) -> Duration {
        if self.initial_delay.is_zero() {
            return Duration::ZERO;
        }
        let exponent = (attempt.saturating_sub(1)) as i32;
        let secs = self.initial_delay.as_secs_f64() * self.multiplier.powi(exponent);
        let capped = if self.max_delay.is_zero() {
            secs
        } else {
            secs.min(self.max_delay.as_secs_f64())
        };
        Duration::from_secs_f64(capped.max(0.0))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::none()
    }
}
