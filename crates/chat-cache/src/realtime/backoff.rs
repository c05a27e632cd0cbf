//! Reconnect backoff for the realtime listener loop.

use rand::Rng;
use std::time::Duration;

/// Exponential backoff with "equal jitter": half of each delay is fixed,
/// the other half random.
#[derive(Debug, Clone)]
pub struct ReconnectBackoff {
    base: Duration,
    max: Duration,
    attempt: u32,
}

impl ReconnectBackoff {
    /// Create a backoff starting at `base` and never exceeding `max`
    #[must_use]
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max: max.max(base),
            attempt: 0,
        }
    }

    /// Number of delays handed out since the last reset
    #[must_use]
    pub fn attempts(&self) -> u32 {
        self.attempt
    }

    /// Upper bound of the delay for the current attempt
    #[must_use]
    pub fn ceiling(&self) -> Duration {
        let factor = 2u32.saturating_pow(self.attempt.min(16));
        self.base.saturating_mul(factor).min(self.max)
    }

    /// Delay before the next reconnect attempt
    pub fn next_delay(&mut self) -> Duration {
        let ceiling = self.ceiling();
        self.attempt = self.attempt.saturating_add(1);

        let ceiling_ms = u64::try_from(ceiling.as_millis()).unwrap_or(u64::MAX);
        let half = ceiling_ms / 2;
        let jitter = rand::thread_rng().gen_range(0..=ceiling_ms - half);
        Duration::from_millis(half + jitter)
    }

    /// Forget previous failures after a successful connect
    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

impl From<&chat_common::ClientConfig> for ReconnectBackoff {
    fn from(config: &chat_common::ClientConfig) -> Self {
        Self::new(config.reconnect_base, config.reconnect_max)
    }
}
