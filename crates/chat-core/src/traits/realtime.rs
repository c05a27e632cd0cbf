//! Realtime client port
//!
//! The realtime pub/sub service is an external collaborator. The domain
//! only needs three calls from it: subscribe, unsubscribe and a presence
//! snapshot. Callbacks from the service are delivered as [`RealtimeEvent`]s
//! through a [`Listener`].

use async_trait::async_trait;
use std::fmt;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::events::RealtimeEvent;
use crate::value_objects::{ChannelName, UserId};

/// Errors reported by a realtime client
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RealtimeError {
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Failed to subscribe to {channel}: {reason}")]
    Subscribe { channel: ChannelName, reason: String },

    #[error("Presence query failed: {0}")]
    Presence(String),

    #[error("Not subscribed to {0}")]
    NotSubscribed(ChannelName),

    #[error("Client shut down")]
    Closed,
}

/// Result type for realtime client operations
pub type RealtimeResult<T> = Result<T, RealtimeError>;

/// Identity of a registered listener
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(Uuid);

impl ListenerId {
    /// Generate a fresh listener id
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ListenerId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ListenerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Callback sink handed to the realtime client
#[derive(Debug, Clone)]
pub struct Listener {
    id: ListenerId,
    sender: mpsc::UnboundedSender<RealtimeEvent>,
}

impl Listener {
    /// Create a listener and the receiving end of its events
    #[must_use]
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<RealtimeEvent>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (
            Self {
                id: ListenerId::new(),
                sender,
            },
            receiver,
        )
    }

    /// Listener id
    #[must_use]
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Deliver an event; returns false once the receiving side is gone
    pub fn deliver(&self, event: RealtimeEvent) -> bool {
        self.sender.send(event).is_ok()
    }

    /// Check if the receiving side has been dropped
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// Realtime pub/sub client
#[async_trait]
pub trait RealtimeClient: Send + Sync {
    /// Subscribe `uuid` to `channel`, delivering callbacks to `listener`
    async fn subscribe(
        &self,
        channel: &ChannelName,
        listener: Listener,
        uuid: &UserId,
    ) -> RealtimeResult<()>;

    /// Remove `listener_id` from `channel`
    async fn unsubscribe(
        &self,
        channel: &ChannelName,
        listener_id: ListenerId,
        uuid: &UserId,
    ) -> RealtimeResult<()>;

    /// Current occupants of `channel`
    async fn here_now(&self, channel: &ChannelName, uuid: &UserId) -> RealtimeResult<Vec<UserId>>;
}
