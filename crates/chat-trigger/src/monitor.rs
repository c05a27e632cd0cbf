//! Connection status tracking: burst suppression and error counting.

use chat_common::TriggerTimings;
use chat_core::{StatusCategory, StatusEvent};
use tokio::time::Instant;

/// What a status event means for the subscription
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StatusOutcome {
    /// Dropped by burst suppression
    Suppressed,
    /// Connection (re)established
    Connected,
    /// Connection lost; the grace period should start
    Disconnected,
    /// Error to surface; `lost` once the consecutive limit is reached
    Error { message: String, lost: bool },
    /// Nothing to do
    Informational,
}

/// Status counters for one subscription
#[derive(Debug, Clone)]
pub struct ConnectionMonitor {
    window: std::time::Duration,
    burst_limit: u32,
    max_consecutive_errors: u32,
    window_start: Option<Instant>,
    window_count: u32,
    consecutive_errors: u32,
    reconnect_attempts: u32,
}

impl ConnectionMonitor {
    #[must_use]
    pub fn new(timings: &TriggerTimings) -> Self {
        Self {
            window: timings.status_burst_window,
            burst_limit: timings.status_burst_limit,
            max_consecutive_errors: timings.max_consecutive_errors,
            window_start: None,
            window_count: 0,
            consecutive_errors: 0,
            reconnect_attempts: 0,
        }
    }

    /// Reconnect attempts since the last successful connection
    #[must_use]
    pub fn reconnect_attempts(&self) -> u32 {
        self.reconnect_attempts
    }

    /// Consecutive error statuses
    #[must_use]
    pub fn consecutive_errors(&self) -> u32 {
        self.consecutive_errors
    }

    /// Forget all counters and the burst window
    pub fn reset(&mut self) {
        self.window_start = None;
        self.window_count = 0;
        self.consecutive_errors = 0;
        self.reconnect_attempts = 0;
    }

    /// Classify a status event received at `now`
    ///
    /// Recovery events count toward the burst window but are never
    /// suppressed, otherwise a pending disconnect grace period would run out
    /// on a live connection.
    pub fn observe(&mut self, status: &StatusEvent, now: Instant) -> StatusOutcome {
        let admitted = self.admit(now);
        if !admitted && !status.category.is_recovery() {
            return StatusOutcome::Suppressed;
        }

        match status.category {
            StatusCategory::Connected | StatusCategory::Reconnected => {
                self.consecutive_errors = 0;
                self.reconnect_attempts = 0;
                StatusOutcome::Connected
            }
            StatusCategory::Disconnected | StatusCategory::NetworkDown => {
                self.reconnect_attempts += 1;
                StatusOutcome::Disconnected
            }
            StatusCategory::NetworkUp => StatusOutcome::Informational,
            category => {
                self.consecutive_errors += 1;
                let message = category
                    .user_message()
                    .unwrap_or("Notification service error")
                    .to_string();
                StatusOutcome::Error {
                    message,
                    lost: self.consecutive_errors >= self.max_consecutive_errors,
                }
            }
        }
    }

    fn admit(&mut self, now: Instant) -> bool {
        match self.window_start {
            Some(start) if now.duration_since(start) <= self.window => {
                self.window_count += 1;
                self.window_count <= self.burst_limit
            }
            _ => {
                self.window_start = Some(now);
                self.window_count = 1;
                true
            }
        }
    }
}
