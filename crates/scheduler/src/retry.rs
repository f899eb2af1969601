use std::time::Duration;

use oncall_core::config::SchedulerConfig;

/// Capped exponential backoff for transient store failures.
///
/// The delay doubles per consecutive failure, stops growing after five
/// doublings and never exceeds `max`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base: Duration,
    pub max: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base: Duration::from_millis(500),
            max: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn from_config(config: &SchedulerConfig) -> Self {
        Self {
            base: Duration::from_millis(config.retry_base_ms.max(1)),
            max: Duration::from_millis(config.retry_max_ms.max(config.retry_base_ms.max(1))),
        }
    }

    /// Delay before retry number `attempt` (zero-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base
            .saturating_mul(2u32.pow(attempt.min(5)))
            .min(self.max)
    }
}
