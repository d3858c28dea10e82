//! Delay policy between failed connection attempts.

use std::time::Duration;

/// Smallest delay ever returned, so retries are always spaced.
pub const MIN_DELAY: Duration = Duration::from_millis(1);

/// Capped exponential backoff without jitter.
///
/// `delay_for_attempt` is a pure function of the attempt number: the same
/// attempt always yields the same delay, and delays never decrease as the
/// attempt number grows.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Delay after the first failed attempt.
    pub initial_delay: Duration,
    /// Maximum delay between attempts (backoff cap).
    pub max_delay: Duration,
    /// Multiplier for each subsequent attempt. Values below 1.0 are treated
    /// as 1.0.
    pub backoff_factor: f64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
        }
    }
}

impl BackoffPolicy {
    /// Fixed spacing: every attempt waits `delay`.
    pub fn fixed(delay: Duration) -> Self {
        Self {
            initial_delay: delay,
            max_delay: delay,
            backoff_factor: 1.0,
        }
    }

    /// Calculates the delay for a given attempt number (1-based; 0 is
    /// treated like 1).
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(63) as i32;
        let factor = self.backoff_factor.max(1.0);
        let ceiling = self.max_delay.max(MIN_DELAY).as_secs_f64();
        let secs = self.initial_delay.as_secs_f64() * factor.powi(exp);
        // `min` also folds NaN/inf products onto the ceiling.
        let capped = secs.min(ceiling);
        Duration::from_secs_f64(capped).max(MIN_DELAY)
    }
}
