//! Key-value storage port for client-persisted state

use async_trait::async_trait;

/// Errors from a storage backend
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// String key-value storage
#[async_trait]
pub trait KeyValueStorage: Send + Sync {
    /// Read a value
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Write a value, replacing any previous one
    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Remove a value; returns whether it existed
    async fn remove(&self, key: &str) -> StorageResult<bool>;
}
