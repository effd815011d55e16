//! Backoff policy for timed-out transfers.

use std::time::Duration;

use rand::Rng;

use crate::constants::DEFAULT_MAX_RETRIES;

/// Bounded exponential backoff.
///
/// The retry budget applies to consecutive attempts that make no progress; a
/// retry that writes at least one byte resets it.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_multiplier: f64,
    /// Stretch each delay by a random factor in `[1, 2]`.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Delay following `delay`, capped at `max_delay`.
    #[must_use]
    pub fn next_delay(&self, delay: Duration) -> Duration {
        Duration::from_secs_f64(delay.as_secs_f64() * self.backoff_multiplier).min(self.max_delay)
    }

    /// The actual sleep for a nominal `delay`.
    #[must_use]
    pub fn sleep_for(&self, delay: Duration) -> Duration {
        if !self.jitter {
            return delay;
        }
        let factor: f64 = rand::thread_rng().gen_range(0.0..=1.0);
        Duration::from_secs_f64(delay.as_secs_f64() * (1.0 + factor))
    }
}
