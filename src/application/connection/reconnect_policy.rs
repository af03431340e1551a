//! Delay schedule between reconnection attempts.

use std::time::Duration;

/// Capped exponential backoff. A multiplier of `1.0` gives a flat delay.
///
/// The attempt counter lives in the connection manager and resets once a
/// link opens; the policy itself is stateless.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconnectPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(3000),
            max_delay: Duration::from_millis(30_000),
            multiplier: 2.0,
        }
    }
}

impl ReconnectPolicy {
    pub fn new(initial_delay: Duration, max_delay: Duration, multiplier: f64) -> Self {
        Self {
            initial_delay,
            max_delay,
            multiplier,
        }
    }

    /// Same delay before every attempt.
    pub fn flat(delay: Duration) -> Self {
        Self::new(delay, delay, 1.0)
    }

    /// Delay before reconnect attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let multiplier = if self.multiplier.is_finite() {
            self.multiplier.max(1.0)
        } else {
            1.0
        };
        let exponent = attempt.min(i32::MAX as u32) as i32;
        let initial = self.initial_delay.as_millis() as f64;
        let cap = self.max_delay.as_millis() as f64;

        let millis = (initial * multiplier.powi(exponent)).min(cap);
        Duration::from_millis(millis as u64)
    }
}
