//! Inbound realtime events
//!
//! The realtime service delivers three kinds of callbacks: published
//! messages, presence changes and connection status changes. They are
//! modelled as one tagged union so a single consumer can process them in
//! delivery order.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::value_objects::{ChannelName, UserId};

/// Payload `type` of typing indicators
pub const TYPING_INDICATOR_TYPE: &str = "typing_indicator";
/// Payload `type` of chat messages
pub const NEW_MESSAGE_TYPE: &str = "NEW_MESSAGE";

/// Any event delivered by the realtime service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RealtimeEvent {
    Message(MessageEnvelope),
    Presence(PresenceEvent),
    Status(StatusEvent),
}

impl RealtimeEvent {
    /// Short name for logging
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Message(_) => "message",
            Self::Presence(_) => "presence",
            Self::Status(_) => "status",
        }
    }
}

// ============================================================================
// Messages
// ============================================================================

/// Classification of a message payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// `type == "typing_indicator"`
    TypingIndicator,
    /// `type == "NEW_MESSAGE"`
    NewMessage,
    /// Anything else (forwarded like a chat message)
    Other,
}

/// A published message as received on a channel
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEnvelope {
    pub channel: ChannelName,
    pub message: Value,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<UserId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timetoken: Option<String>,
}

impl MessageEnvelope {
    /// Create an envelope without publisher metadata
    pub fn new(channel: ChannelName, message: Value) -> Self {
        Self {
            channel,
            message,
            publisher: None,
            timetoken: None,
        }
    }

    /// Set the publisher
    #[must_use]
    pub fn with_publisher(mut self, publisher: UserId) -> Self {
        self.publisher = Some(publisher);
        self
    }

    /// Set the timetoken
    #[must_use]
    pub fn with_timetoken(mut self, timetoken: impl Into<String>) -> Self {
        self.timetoken = Some(timetoken.into());
        self
    }

    /// Value of the payload's `type` field, if it is a string
    pub fn payload_type(&self) -> Option<&str> {
        self.message.get("type").and_then(Value::as_str)
    }

    /// Classify the payload by its `type` field
    pub fn kind(&self) -> MessageKind {
        match self.payload_type() {
            Some(TYPING_INDICATOR_TYPE) => MessageKind::TypingIndicator,
            Some(NEW_MESSAGE_TYPE) => MessageKind::NewMessage,
            _ => MessageKind::Other,
        }
    }

    /// Parse a typing indicator out of the payload.
    ///
    /// The typing user falls back to the envelope publisher when the payload
    /// does not name one.
    pub fn typing_indicator(&self) -> Option<TypingIndicator> {
        if self.kind() != MessageKind::TypingIndicator {
            return None;
        }

        let user_id = ["userId", "senderId", "user_id"]
            .iter()
            .find_map(|key| self.message.get(*key))
            .and_then(|v| serde_json::from_value::<UserId>(v.clone()).ok())
            .or_else(|| self.publisher.clone())?;

        let is_typing = self
            .message
            .get("isTyping")
            .and_then(Value::as_bool)
            .unwrap_or(true);

        Some(TypingIndicator {
            channel: self.channel.clone(),
            user_id,
            is_typing,
        })
    }
}

/// Someone started or stopped typing on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypingIndicator {
    pub channel: ChannelName,
    pub user_id: UserId,
    pub is_typing: bool,
}

// ============================================================================
// Presence
// ============================================================================

/// What happened to a participant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PresenceAction {
    Join,
    Leave,
    Timeout,
    Interval,
    StateChange,
}

impl PresenceAction {
    /// Online state this action implies, if any
    #[must_use]
    pub fn implied_online(self) -> Option<bool> {
        match self {
            Self::Join => Some(true),
            Self::Leave | Self::Timeout => Some(false),
            Self::Interval | Self::StateChange => None,
        }
    }
}

impl fmt::Display for PresenceAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Join => "join",
            Self::Leave => "leave",
            Self::Timeout => "timeout",
            Self::Interval => "interval",
            Self::StateChange => "state-change",
        };
        f.write_str(s)
    }
}

/// A participant joined, left or timed out on a channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PresenceEvent {
    pub action: PresenceAction,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<UserId>,
    pub channel: ChannelName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub occupancy: Option<u32>,
    /// Unix epoch seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl PresenceEvent {
    /// Create a presence event for a user
    pub fn new(action: PresenceAction, uuid: UserId, channel: ChannelName) -> Self {
        Self {
            action,
            uuid: Some(uuid),
            channel,
            occupancy: None,
            timestamp: Some(chrono::Utc::now().timestamp()),
        }
    }

    /// Set the occupancy count
    #[must_use]
    pub fn with_occupancy(mut self, occupancy: u32) -> Self {
        self.occupancy = Some(occupancy);
        self
    }
}

// ============================================================================
// Connection status
// ============================================================================

/// Connection status categories reported by the realtime service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum StatusCategory {
    Connected,
    Reconnected,
    Disconnected,
    NetworkIssues,
    NetworkDown,
    NetworkUp,
    Timeout,
    BadRequest,
    AccessDenied,
    Unknown,
}

impl StatusCategory {
    /// Vendor wire name
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connected => "PNConnectedCategory",
            Self::Reconnected => "PNReconnectedCategory",
            Self::Disconnected => "PNDisconnectedCategory",
            Self::NetworkIssues => "PNNetworkIssuesCategory",
            Self::NetworkDown => "PNNetworkDownCategory",
            Self::NetworkUp => "PNNetworkUpCategory",
            Self::Timeout => "PNTimeoutCategory",
            Self::BadRequest => "PNBadRequestCategory",
            Self::AccessDenied => "PNAccessDeniedCategory",
            Self::Unknown => "PNUnknownCategory",
        }
    }

    /// Parse a vendor category name; unrecognised names map to `Unknown`
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s {
            "PNConnectedCategory" => Self::Connected,
            "PNReconnectedCategory" => Self::Reconnected,
            "PNDisconnectedCategory" => Self::Disconnected,
            "PNNetworkIssuesCategory" => Self::NetworkIssues,
            "PNNetworkDownCategory" => Self::NetworkDown,
            "PNNetworkUpCategory" => Self::NetworkUp,
            "PNTimeoutCategory" => Self::Timeout,
            "PNBadRequestCategory" => Self::BadRequest,
            "PNAccessDeniedCategory" => Self::AccessDenied,
            _ => Self::Unknown,
        }
    }

    /// Categories that count towards the consecutive-error threshold
    #[must_use]
    pub const fn is_error(self) -> bool {
        matches!(
            self,
            Self::NetworkIssues
                | Self::Timeout
                | Self::BadRequest
                | Self::AccessDenied
                | Self::Unknown
        )
    }

    /// Connection (re)established
    #[must_use]
    pub const fn is_recovery(self) -> bool {
        matches!(self, Self::Connected | Self::Reconnected)
    }

    /// Message shown to the user for error categories
    #[must_use]
    pub const fn user_message(self) -> Option<&'static str> {
        match self {
            Self::NetworkIssues => Some("Network issues detected. Retrying..."),
            Self::Timeout => Some("Connection to notification service timed out"),
            Self::BadRequest => Some("Notification service rejected the request"),
            Self::AccessDenied => Some("Access to notification channel denied"),
            Self::Unknown => Some("Unknown notification service error"),
            _ => None,
        }
    }
}

impl From<String> for StatusCategory {
    fn from(s: String) -> Self {
        Self::parse(&s)
    }
}

impl From<StatusCategory> for String {
    fn from(category: StatusCategory) -> Self {
        category.as_str().to_string()
    }
}

impl fmt::Display for StatusCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Connection status change
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusEvent {
    pub category: StatusCategory,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl StatusEvent {
    /// Create a status event without details
    #[must_use]
    pub fn new(category: StatusCategory) -> Self {
        Self {
            category,
            error_message: None,
        }
    }

    /// Attach an error detail
    #[must_use]
    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}
