//! Reconnect backoff policy.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with a cap and a bounded attempt budget.
///
/// Delays double per consecutive failure, starting at `base_delay` and
/// capped at `max_delay`. A ±20% jitter is applied so a fleet of clients
/// does not reconnect in lockstep. A successful connection resets the
/// failure count (the caller owns that counter).
#[derive(Clone, Debug)]
pub struct BackoffPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Consecutive failures tolerated before giving up entirely.
    pub max_attempts: u32,
    pub jitter: bool,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 5,
            jitter: true,
        }
    }
}

impl BackoffPolicy {
    /// The delay before retry number `attempt` (1-based).
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(31);
        let unjittered = self
            .base_delay
            .saturating_mul(2u32.saturating_pow(exponent))
            .min(self.max_delay);
        if !self.jitter {
            return unjittered;
        }
        let millis = unjittered.as_millis() as u64;
        let spread = millis / 5; // ±20%
        if spread == 0 {
            return unjittered;
        }
        let jittered = rand::rng().random_range(millis - spread..=millis + spread);
        Duration::from_millis(jittered)
    }

    /// Whether the failure budget is spent after `failures` consecutive
    /// connection errors.
    #[must_use]
    pub fn exhausted(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}
