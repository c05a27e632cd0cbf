//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::traits::{RealtimeError, StorageError};
use crate::value_objects::IdParseError;

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Invalid user id: {0}")]
    InvalidUserId(IdParseError),

    #[error("Invalid channel name: {0}")]
    InvalidChannelName(IdParseError),

    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("No active session")]
    SessionNotFound,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Realtime(#[from] RealtimeError),
}

impl DomainError {
    /// Get the error code for API-style reporting
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidUserId(_) => "INVALID_USER_ID",
            Self::InvalidChannelName(_) => "INVALID_CHANNEL_NAME",
            Self::InvalidPayload(_) => "INVALID_PAYLOAD",
            Self::SessionNotFound => "SESSION_NOT_FOUND",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Realtime(_) => "REALTIME_ERROR",
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::SessionNotFound)
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            Self::InvalidUserId(_) | Self::InvalidChannelName(_) | Self::InvalidPayload(_)
        )
    }
}
