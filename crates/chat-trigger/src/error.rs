//! Trigger errors

use thiserror::Error;

/// Errors returned by the trigger handle
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TriggerError {
    #[error("Realtime trigger has shut down")]
    Closed,
}

/// Result type for trigger operations
pub type TriggerResult<T> = Result<T, TriggerError>;
