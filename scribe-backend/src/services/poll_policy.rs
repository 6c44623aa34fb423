//! Stage polling policy
//!
//! Interval, backoff and bounds used by `ServiceClient::wait_for_completion`.

use std::time::Duration;

/// Poll scheduling for one stage job
#[derive(Debug, Clone, PartialEq)]
pub struct PollPolicy {
    /// Delay before the second poll
    pub interval: Duration,
    /// Upper bound for the backed-off delay
    pub max_interval: Duration,
    /// Multiplier applied per poll; 1.0 polls at a fixed interval
    pub backoff_factor: f64,
    /// Give up once a job has been polled this long; `None` waits forever
    pub max_wait: Option<Duration>,
    /// Consecutive failed polls tolerated before the stage fails
    pub max_consecutive_failures: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            max_interval: Duration::from_secs(5),
            backoff_factor: 1.0,
            max_wait: Some(Duration::from_secs(6 * 60 * 60)),
            max_consecutive_failures: 3,
        }
    }
}

impl PollPolicy {
    /// Fixed-interval policy with no wait bound
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            max_interval: interval,
            backoff_factor: 1.0,
            max_wait: None,
            ..Self::default()
        }
    }

    pub fn with_max_wait(mut self, max_wait: Option<Duration>) -> Self {
        self.max_wait = max_wait;
        self
    }

    pub fn with_backoff(mut self, factor: f64, max_interval: Duration) -> Self {
        self.backoff_factor = factor;
        self.max_interval = max_interval;
        self
    }

    pub fn with_max_consecutive_failures(mut self, failures: u32) -> Self {
        self.max_consecutive_failures = failures;
        self
    }

    /// Delay to sleep after poll number `attempt` (0-based)
    ///
    /// `min(interval × factor^attempt, max_interval)`, never below `interval`.
    pub fn delay(&self, attempt: u32) -> Duration {
        let factor = self.backoff_factor.max(1.0);
        let exponent = attempt.min(64) as i32;
        let scaled = self.interval.as_secs_f64() * factor.powi(exponent);
        let capped = scaled.min(self.max_interval.as_secs_f64().max(self.interval.as_secs_f64()));
        Duration::from_secs_f64(capped)
    }
}
