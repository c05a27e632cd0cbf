//! # chat-cache
//!
//! Redis infrastructure for the realtime chat client.
//!
//! ## Features
//!
//! - **Connection Pool**: Managed Redis connection pool with deadpool
//! - **Realtime Client**: Pub/Sub message and presence delivery with reconnect backoff
//! - **Storage**: In-memory and Redis key-value backends
//! - **Sessions**: Signed-in session and "remember me" persistence
//!
//! ## Example
//!
//! ```ignore
//! use chat_cache::{RedisPool, RedisPoolConfig, RedisRealtimeClient, ReconnectBackoff};
//!
//! let config = RedisPoolConfig::default();
//! let pool = RedisPool::new(config.clone())?;
//!
//! let backoff = ReconnectBackoff::new(Duration::from_millis(500), Duration::from_secs(30));
//! let client = RedisRealtimeClient::connect(pool, config.url, backoff);
//!
//! client.publish_message(&channel, json!({"type": "NEW_MESSAGE", "text": "hi"}), &me).await?;
//! ```

pub mod pool;
pub mod realtime;
pub mod session;
pub mod storage;

// Re-export pool types
pub use pool::{RedisPool, RedisPoolConfig, RedisPoolError, RedisResult};

// Re-export realtime types
pub use realtime::{
    parse_wire_channel, presence_set, wire_channel, ReconnectBackoff, RedisRealtimeClient,
    PRESENCE_SET_PREFIX, REALTIME_CHANNEL_PREFIX,
};

// Re-export storage and session types
pub use session::SessionStore;
pub use storage::{MemoryStorage, RedisStorage};
