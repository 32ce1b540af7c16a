//! Retry policy for optimistic-concurrency conflicts

use std::time::Duration;

use rand::Rng;

/// How often, and how patiently, to re-run an engine call that lost a
/// concurrent-modification race.
///
/// # Example
///
/// ```
/// use hr_workflow::RetryPolicy;
/// use std::time::Duration;
///
/// let policy = RetryPolicy::conflict()
///     .with_max_attempts(3)
///     .with_initial_interval(Duration::from_millis(20));
///
/// assert!(policy.has_attempts_remaining(2));
/// assert!(!policy.has_attempts_remaining(3));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// Maximum number of attempts (including initial)
    pub max_attempts: u32,

    /// Delay before the first retry
    pub initial_interval: Duration,

    /// Upper bound for any single delay
    pub max_interval: Duration,

    /// Backoff multiplier (e.g., 2.0 for exponential)
    pub backoff_coefficient: f64,

    /// Jitter factor (0.0-1.0); 0.2 means ±20%
    pub jitter: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::conflict()
    }
}

impl RetryPolicy {
    /// One retry after a short, jittered pause
    pub fn conflict() -> Self {
        Self {
            max_attempts: 2,
            initial_interval: Duration::from_millis(10),
            max_interval: Duration::from_millis(200),
            backoff_coefficient: 2.0,
            jitter: 0.2,
        }
    }

    /// Create a policy that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            initial_interval: Duration::ZERO,
            max_interval: Duration::ZERO,
            backoff_coefficient: 1.0,
            jitter: 0.0,
        }
    }

    /// Set the maximum number of attempts (at least one)
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_initial_interval(mut self, interval: Duration) -> Self {
        self.initial_interval = interval;
        self
    }

    pub fn with_max_interval(mut self, interval: Duration) -> Self {
        self.max_interval = interval;
        self
    }

    /// Set the jitter factor (0.0-1.0)
    pub fn with_jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    /// Calculate delay for a given attempt number (1-based)
    ///
    /// Returns the duration to wait before that attempt.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt <= 1 {
            return Duration::ZERO;
        }

        let retry_num = attempt - 1;
        let base = self.initial_interval.as_secs_f64()
            * self.backoff_coefficient.powi(retry_num as i32 - 1);
        let capped = base.min(self.max_interval.as_secs_f64());

        let jittered = if self.jitter > 0.0 && capped > 0.0 {
            let jitter_range = capped * self.jitter;
            let offset = rand::thread_rng().gen_range(-jitter_range..jitter_range);
            (capped + offset).max(0.0)
        } else {
            capped
        };

        Duration::from_secs_f64(jittered)
    }

    /// Check if there are remaining attempts
    pub fn has_attempts_remaining(&self, current_attempt: u32) -> bool {
        current_attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_defaults_allow_one_retry() {
        let policy = RetryPolicy::conflict();
        assert!(policy.has_attempts_remaining(1));
        assert!(!policy.has_attempts_remaining(2));
    }

    #[test]
    fn test_no_retry() {
        let policy = RetryPolicy::no_retry();
        assert!(!policy.has_attempts_remaining(1));
        assert_eq!(policy.delay_for_attempt(2), Duration::ZERO);
    }

    #[test]
    fn test_zero_attempts_clamped() {
        let policy = RetryPolicy::conflict().with_max_attempts(0);
        assert_eq!(policy.max_attempts, 1);
    }

    #[test]
    fn test_delay_grows_and_caps() {
        let policy = RetryPolicy::conflict()
            .with_max_attempts(6)
            .with_initial_interval(Duration::from_millis(10))
            .with_max_interval(Duration::from_millis(35))
            .with_jitter(0.0);

        assert_eq!(policy.delay_for_attempt(1), Duration::ZERO);
        assert_eq!(policy.delay_for_attempt(2), Duration::from_millis(10));
        assert_eq!(policy.delay_for_attempt(3), Duration::from_millis(20));
        assert_eq!(policy.delay_for_attempt(4), Duration::from_millis(35));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let policy = RetryPolicy::conflict().with_jitter(0.5);
        for _ in 0..50 {
            let delay = policy.delay_for_attempt(2);
            assert!(delay >= Duration::from_millis(4));
            assert!(delay <= Duration::from_millis(16));
        }
    }
}
