//! Routing of inbound message envelopes.

use chat_core::{MessageEnvelope, MessageKind, TypingIndicator, UserId};

/// Where an inbound message goes
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    /// Typing callback only
    Typing(TypingIndicator),
    /// Message callback and last message
    Message,
    /// Nowhere
    Drop,
}

/// Decide where a message goes, given the local user.
///
/// Typing indicators never reach the message path. The local user's own
/// typing indicators and ones that name no user are dropped.
#[must_use]
pub fn route(envelope: &MessageEnvelope, local_user: Option<&UserId>) -> Route {
    match envelope.kind() {
        MessageKind::TypingIndicator => match envelope.typing_indicator() {
            Some(typing) if Some(&typing.user_id) == local_user => Route::Drop,
            Some(typing) => Route::Typing(typing),
            None => Route::Drop,
        },
        MessageKind::NewMessage | MessageKind::Other => Route::Message,
    }
}
