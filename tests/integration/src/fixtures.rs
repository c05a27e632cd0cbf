//! Test fixtures and data generators
//!
//! Provides reusable channels, users and trigger setups.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chat_common::TriggerTimings;
use chat_core::{ChannelName, UserId};
use chat_trigger::{RealtimeTrigger, TriggerOptions};
use serde_json::{json, Value};

use crate::helpers::{Recorded, ScriptedClient};

/// Counter for unique test data
static COUNTER: AtomicU64 = AtomicU64::new(1);

/// Get a unique suffix for test data
pub fn unique_suffix() -> u64 {
    COUNTER.fetch_add(1, Ordering::SeqCst)
}

/// Channel by name
pub fn channel(name: &str) -> ChannelName {
    ChannelName::parse(name).unwrap()
}

/// Channel with a unique name
pub fn unique_channel() -> ChannelName {
    channel(&format!("test-{}", unique_suffix()))
}

/// User by numeric id
pub fn user(id: u64) -> UserId {
    UserId::from(id)
}

/// Chat message payload
pub fn new_message(text: &str) -> Value {
    json!({ "type": "NEW_MESSAGE", "text": text })
}

/// Typing indicator payload
pub fn typing(user_id: &UserId, is_typing: bool) -> Value {
    json!({ "type": "typing_indicator", "userId": user_id.as_str(), "isTyping": is_typing })
}

/// A trigger on the scripted client, with its callback output
pub struct Harness {
    pub client: Arc<ScriptedClient>,
    pub trigger: RealtimeTrigger,
    pub recorded: Recorded,
}

impl Harness {
    /// Spawn a trigger for `channel` as `local_user` with default timings
    pub fn spawn(channel: &ChannelName, local_user: &UserId) -> Self {
        Self::spawn_with(Arc::new(ScriptedClient::new()), channel, local_user)
    }

    /// Spawn on a prepared client
    pub fn spawn_with(
        client: Arc<ScriptedClient>,
        channel: &ChannelName,
        local_user: &UserId,
    ) -> Self {
        let recorded = Recorded::default();
        let on_message = recorded.clone();
        let on_typing = recorded.clone();

        let options = TriggerOptions::new()
            .channel(Some(channel.clone()))
            .user(Some(local_user.clone()))
            .timings(TriggerTimings::default())
            .on_message(move |envelope| on_message.record_message(envelope))
            .on_typing(move |indicator| on_typing.record_typing(indicator));

        let trigger = RealtimeTrigger::spawn(client.clone(), options);

        Self {
            client,
            trigger,
            recorded,
        }
    }
}
