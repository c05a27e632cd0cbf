//! Observable subscription state

use chat_core::MessageEnvelope;
use std::sync::Arc;

/// Visible state of the trigger
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TriggerState {
    /// Subscribed and not considered lost
    pub is_subscribed: bool,
    /// User-facing error, if any
    pub error: Option<String>,
    /// Most recent non-typing message
    pub last_message: Option<Arc<MessageEnvelope>>,
    /// Disconnects since the last successful connection
    pub reconnect_attempts: u32,
}

/// Shown when subscribing fails
pub const SUBSCRIBE_FAILED: &str = "Failed to set up notification service";

/// Shown when a disconnect outlasts the grace period
pub const CONNECTION_LOST: &str = "Connection lost. Reconnecting...";
