//! # chat-core
//!
//! Domain layer for the realtime chat client: identifiers, presence and
//! session entities, the inbound realtime event union, and the ports
//! (realtime client, key-value storage) the infrastructure implements.
//! This crate has no dependency on Redis or any transport.

pub mod entities;
pub mod error;
pub mod events;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    PresenceInfo, RememberedCredentials, Session, SessionUser, REMEMBERED_CREDENTIALS_KEY,
    SESSION_KEY,
};
pub use error::DomainError;
pub use events::{
    MessageEnvelope, MessageKind, PresenceAction, PresenceEvent, RealtimeEvent, StatusCategory,
    StatusEvent, TypingIndicator, NEW_MESSAGE_TYPE, TYPING_INDICATOR_TYPE,
};
pub use traits::{
    KeyValueStorage, Listener, ListenerId, RealtimeClient, RealtimeError, RealtimeResult,
    StorageError, StorageResult,
};
pub use value_objects::{ChannelName, IdParseError, UserId, MAX_CHANNEL_NAME_LEN};
