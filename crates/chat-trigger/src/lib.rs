//! # chat-trigger
//!
//! Realtime trigger: keeps one channel subscription alive for the local
//! user, routes messages and typing indicators to callbacks, and derives
//! debounced contact presence and a noise-tolerant subscription status.

pub mod classify;
pub mod error;
pub mod monitor;
pub mod options;
pub mod presence;
pub mod state;
pub mod timers;
pub mod trigger;
mod worker;

pub use error::{TriggerError, TriggerResult};
pub use options::{MessageCallback, TriggerOptions, TypingCallback};
pub use presence::{PresenceSnapshot, PresenceStore, PresenceView};
pub use state::{TriggerState, CONNECTION_LOST, SUBSCRIBE_FAILED};
pub use trigger::RealtimeTrigger;
