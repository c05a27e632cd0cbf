//! Realtime events delivered by the pub/sub service

mod realtime_event;

pub use realtime_event::{
    MessageEnvelope, MessageKind, PresenceAction, PresenceEvent, RealtimeEvent, StatusCategory,
    StatusEvent, TypingIndicator, NEW_MESSAGE_TYPE, TYPING_INDICATOR_TYPE,
};
