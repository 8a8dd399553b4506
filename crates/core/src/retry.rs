//! Exponential-backoff retry policy for queued work items.
//!
//! The queue engine the original deployment delegated retries to is gone;
//! the schedule is explicit here instead: 3 attempts, exponential backoff
//! starting at 1 second. The worker loop consults this policy whenever a
//! claimed work item fails with a transient error.

use std::time::Duration;

/// Tunable parameters for the work-item retry schedule.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total number of attempts a work item gets, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Factor by which the delay grows after each failed attempt.
    pub multiplier: f64,
    /// Upper bound on the delay between attempts.
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_secs(1),
            multiplier: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given 1-based attempt fails.
    ///
    /// Attempt 1 waits `initial_delay`, attempt 2 waits
    /// `initial_delay * multiplier`, and so on, clamped to `max_delay`.
    pub fn delay_after_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        let millis = self.initial_delay.as_millis() as f64 * self.multiplier.powi(exponent as i32);
        Duration::from_millis(millis as u64).min(self.max_delay)
    }

    /// Whether a work item that has made `attempts` attempts is out of
    /// retries.
    pub fn is_exhausted(&self, attempts: u32) -> bool {
        attempts >= self.max_attempts
    }
}
