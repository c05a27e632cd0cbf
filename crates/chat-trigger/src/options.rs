//! Trigger inputs: initial channel/user, callbacks and timings.

use chat_common::TriggerTimings;
use chat_core::{ChannelName, MessageEnvelope, TypingIndicator, UserId};
use std::fmt;
use std::sync::Arc;

/// Called for every non-typing message on the subscribed channel
pub type MessageCallback = Arc<dyn Fn(&MessageEnvelope) + Send + Sync>;

/// Called for typing indicators from other users
pub type TypingCallback = Arc<dyn Fn(&TypingIndicator) + Send + Sync>;

/// Options for [`crate::RealtimeTrigger::spawn`].
///
/// Callbacks run on the trigger task and should return quickly.
#[derive(Clone, Default)]
pub struct TriggerOptions {
    pub(crate) channel: Option<ChannelName>,
    pub(crate) user: Option<UserId>,
    pub(crate) timings: TriggerTimings,
    pub(crate) on_message: Option<MessageCallback>,
    pub(crate) on_typing: Option<TypingCallback>,
}

impl TriggerOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Initial channel
    #[must_use]
    pub fn channel(mut self, channel: Option<ChannelName>) -> Self {
        self.channel = channel;
        self
    }

    /// Initial local user
    #[must_use]
    pub fn user(mut self, user: Option<UserId>) -> Self {
        self.user = user;
        self
    }

    #[must_use]
    pub fn timings(mut self, timings: TriggerTimings) -> Self {
        self.timings = timings;
        self
    }

    /// Set the message callback
    #[must_use]
    pub fn on_message<F>(mut self, f: F) -> Self
    where
        F: Fn(&MessageEnvelope) + Send + Sync + 'static,
    {
        self.on_message = Some(Arc::new(f));
        self
    }

    /// Set the typing callback
    #[must_use]
    pub fn on_typing<F>(mut self, f: F) -> Self
    where
        F: Fn(&TypingIndicator) + Send + Sync + 'static,
    {
        self.on_typing = Some(Arc::new(f));
        self
    }
}

impl fmt::Debug for TriggerOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TriggerOptions")
            .field("channel", &self.channel)
            .field("user", &self.user)
            .field("timings", &self.timings)
            .field("on_message", &self.on_message.is_some())
            .field("on_typing", &self.on_typing.is_some())
            .finish()
    }
}
