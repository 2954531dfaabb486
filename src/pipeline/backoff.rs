// src/pipeline/backoff.rs

//! Retry delay after failed feed fetches.
//!
//! Every consecutive failure doubles the wait, starting from the poll
//! interval, until it reaches the ceiling. A success restores the poll
//! interval. Failures never give up.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    ceiling: Duration,
    failures: u32,
}

impl Backoff {
    /// `ceiling` below `base` is raised to `base`.
    pub fn new(base: Duration, ceiling: Duration) -> Self {
        Self {
            base,
            ceiling: ceiling.max(base),
            failures: 0,
        }
    }

    /// Consecutive failures since the last success.
    pub fn failures(&self) -> u32 {
        self.failures
    }

    pub fn is_backing_off(&self) -> bool {
        self.failures > 0
    }

    /// Wait before the next fetch given the current failure streak.
    pub fn delay(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.failures);
        self.base.saturating_mul(factor).min(self.ceiling)
    }

    /// Count a failed fetch and return the wait before retrying.
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        self.delay()
    }

    /// Clear the failure streak and return the regular poll interval.
    pub fn record_success(&mut self) -> Duration {
        self.failures = 0;
        self.delay()
    }
}
