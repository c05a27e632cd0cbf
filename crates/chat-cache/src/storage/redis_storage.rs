//! Key-value storage in Redis, namespaced per client.

use crate::pool::{RedisPool, RedisPoolError};
use async_trait::async_trait;
use chat_core::{KeyValueStorage, StorageError, StorageResult};

/// Default key namespace
const DEFAULT_PREFIX: &str = "client_storage:";

fn backend(err: RedisPoolError) -> StorageError {
    StorageError::Backend(err.to_string())
}

/// Redis-backed key-value storage
#[derive(Clone)]
pub struct RedisStorage {
    pool: RedisPool,
    prefix: String,
}

impl RedisStorage {
    /// Create storage under the default namespace
    #[must_use]
    pub fn new(pool: RedisPool) -> Self {
        Self::with_prefix(pool, DEFAULT_PREFIX)
    }

    /// Create storage under a custom namespace (e.g. one per device)
    #[must_use]
    pub fn with_prefix(pool: RedisPool, prefix: impl Into<String>) -> Self {
        Self {
            pool,
            prefix: prefix.into(),
        }
    }

    /// Generate the Redis key for a storage key
    fn key(&self, key: &str) -> String {
        format!("{}{key}", self.prefix)
    }
}

#[async_trait]
impl KeyValueStorage for RedisStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        self.pool.get_raw(&self.key(key)).await.map_err(backend)
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.pool.set_raw(&self.key(key), value).await.map_err(backend)?;
        tracing::trace!(key = %key, "Stored client value");
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<bool> {
        self.pool.delete(&self.key(key)).await.map_err(backend)
    }
}
