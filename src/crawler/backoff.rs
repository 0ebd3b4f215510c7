//! Exponential retry delays with jitter

use rand::Rng;
use std::time::Duration;

/// Tracks consecutive failures and hands out the delay before the next attempt
///
/// The first failure waits `floor`; each further failure doubles the base
/// delay up to `cap`. Up to a quarter of the base is added as random jitter,
/// and the result never leaves the `[floor, cap]` range.
#[derive(Debug, Clone)]
pub struct RetryBackoff {
    floor: Duration,
    cap: Duration,
    failures: u32,
}

impl RetryBackoff {
    pub fn new(floor: Duration, cap: Duration) -> Self {
        Self {
            floor,
            cap: cap.max(floor),
            failures: 0,
        }
    }

    /// Registers a failure and returns how long to wait before retrying
    pub fn record_failure(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);
        let base = self.base_delay();

        let jitter_ms = (base.as_millis() / 4) as u64;
        let jitter = if jitter_ms > 0 {
            Duration::from_millis(rand::rng().random_range(0..=jitter_ms))
        } else {
            Duration::ZERO
        };

        (base + jitter).min(self.cap)
    }

    /// Forgets previous failures after a success
    pub fn reset(&mut self) {
        self.failures = 0;
    }

    pub fn failures(&self) -> u32 {
        self.failures
    }

    /// Delay for the current failure count, without jitter
    pub fn base_delay(&self) -> Duration {
        if self.failures == 0 {
            return self.floor;
        }
        let exponent = (self.failures - 1).min(16);
        self.floor
            .checked_mul(1u32 << exponent)
            .unwrap_or(self.cap)
            .min(self.cap)
    }
}
