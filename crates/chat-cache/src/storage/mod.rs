//! Key-value storage backends.

mod memory;
mod redis_storage;

pub use memory::MemoryStorage;
pub use redis_storage::RedisStorage;
