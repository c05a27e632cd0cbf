//! Ports implemented by the infrastructure layer

mod realtime;
mod storage;

pub use realtime::{Listener, ListenerId, RealtimeClient, RealtimeError, RealtimeResult};
pub use storage::{KeyValueStorage, StorageError, StorageResult};
