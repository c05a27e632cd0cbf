//! Test helpers for integration tests
//!
//! Provides a scripted realtime client that records every call and lets a
//! test push events to the trigger, plus recorders for trigger output.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use chat_common::AppConfig;
use chat_core::{
    ChannelName, Listener, MessageEnvelope, PresenceAction, PresenceEvent, RealtimeClient,
    RealtimeError, RealtimeEvent, RealtimeResult, StatusCategory, StatusEvent, TypingIndicator,
    UserId,
};
use chat_trigger::TriggerState;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// A call made to the scripted client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Subscribe { channel: String, uuid: String },
    Unsubscribe { channel: String, uuid: String },
    HereNow { channel: String },
}

#[derive(Default)]
struct Script {
    calls: Vec<Call>,
    listeners: HashMap<ChannelName, Listener>,
    occupants: HashMap<ChannelName, Vec<UserId>>,
    here_now_delay: HashMap<ChannelName, Duration>,
    fail_subscribe: bool,
}

/// In-memory realtime client driven by the test
#[derive(Clone, Default)]
pub struct ScriptedClient {
    script: Arc<Mutex<Script>>,
}

impl ScriptedClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Occupants returned by `here_now` for a channel
    pub fn set_occupants(&self, channel: &ChannelName, users: Vec<UserId>) {
        self.script.lock().occupants.insert(channel.clone(), users);
    }

    /// Delay `here_now` for a channel
    pub fn delay_here_now(&self, channel: &ChannelName, delay: Duration) {
        self.script.lock().here_now_delay.insert(channel.clone(), delay);
    }

    /// Make subsequent subscribe calls fail
    pub fn fail_subscribe(&self, fail: bool) {
        self.script.lock().fail_subscribe = fail;
    }

    /// Every call so far, in order
    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().calls.clone()
    }

    pub fn subscribe_count(&self, channel: &str) -> usize {
        self.count(|call| matches!(call, Call::Subscribe { channel: c, .. } if c == channel))
    }

    pub fn unsubscribe_count(&self, channel: &str) -> usize {
        self.count(|call| matches!(call, Call::Unsubscribe { channel: c, .. } if c == channel))
    }

    pub fn here_now_count(&self, channel: &str) -> usize {
        self.count(|call| matches!(call, Call::HereNow { channel: c } if c == channel))
    }

    /// Check if a listener is registered for a channel
    pub fn is_listening(&self, channel: &ChannelName) -> bool {
        self.script.lock().listeners.contains_key(channel)
    }

    /// Deliver an event to the listener of a channel; returns whether one took it
    pub fn emit_on(&self, channel: &ChannelName, event: RealtimeEvent) -> bool {
        let listener = self.script.lock().listeners.get(channel).cloned();
        listener.is_some_and(|l| l.deliver(event))
    }

    /// Deliver an event to every listener
    pub fn broadcast(&self, event: &RealtimeEvent) {
        let listeners: Vec<Listener> = self.script.lock().listeners.values().cloned().collect();
        for listener in listeners {
            listener.deliver(event.clone());
        }
    }

    /// Publish a message payload
    pub fn message(&self, channel: &ChannelName, payload: Value) -> bool {
        self.emit_on(
            channel,
            RealtimeEvent::Message(MessageEnvelope::new(channel.clone(), payload)),
        )
    }

    /// Announce a presence action
    pub fn presence(&self, channel: &ChannelName, action: PresenceAction, uuid: &UserId) -> bool {
        self.emit_on(
            channel,
            RealtimeEvent::Presence(PresenceEvent::new(action, uuid.clone(), channel.clone())),
        )
    }

    /// Report a connection status
    pub fn status(&self, category: StatusCategory) {
        self.broadcast(&RealtimeEvent::Status(StatusEvent::new(category)));
    }

    fn count<F: Fn(&Call) -> bool>(&self, f: F) -> usize {
        self.script.lock().calls.iter().filter(|call| f(call)).count()
    }
}

#[async_trait]
impl RealtimeClient for ScriptedClient {
    async fn subscribe(
        &self,
        channel: &ChannelName,
        listener: Listener,
        uuid: &UserId,
    ) -> RealtimeResult<()> {
        let mut script = self.script.lock();
        script.calls.push(Call::Subscribe {
            channel: channel.to_string(),
            uuid: uuid.to_string(),
        });

        if script.fail_subscribe {
            return Err(RealtimeError::Subscribe {
                channel: channel.clone(),
                reason: "scripted failure".to_string(),
            });
        }

        script.listeners.insert(channel.clone(), listener);
        Ok(())
    }

    async fn unsubscribe(
        &self,
        channel: &ChannelName,
        _listener: chat_core::ListenerId,
        uuid: &UserId,
    ) -> RealtimeResult<()> {
        let mut script = self.script.lock();
        script.calls.push(Call::Unsubscribe {
            channel: channel.to_string(),
            uuid: uuid.to_string(),
        });

        match script.listeners.remove(channel) {
            Some(_) => Ok(()),
            None => Err(RealtimeError::NotSubscribed(channel.clone())),
        }
    }

    async fn here_now(&self, channel: &ChannelName, _uuid: &UserId) -> RealtimeResult<Vec<UserId>> {
        let delay = {
            let mut script = self.script.lock();
            script.calls.push(Call::HereNow {
                channel: channel.to_string(),
            });
            script.here_now_delay.get(channel).copied()
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        Ok(self
            .script
            .lock()
            .occupants
            .get(channel)
            .cloned()
            .unwrap_or_default())
    }
}

/// Messages and typing indicators passed to the trigger callbacks
#[derive(Clone, Default)]
pub struct Recorded {
    messages: Arc<Mutex<Vec<MessageEnvelope>>>,
    typing: Arc<Mutex<Vec<TypingIndicator>>>,
}

impl Recorded {
    pub fn record_message(&self, envelope: &MessageEnvelope) {
        self.messages.lock().push(envelope.clone());
    }

    pub fn record_typing(&self, typing: &TypingIndicator) {
        self.typing.lock().push(typing.clone());
    }

    pub fn messages(&self) -> Vec<MessageEnvelope> {
        self.messages.lock().clone()
    }

    pub fn typing(&self) -> Vec<TypingIndicator> {
        self.typing.lock().clone()
    }
}

/// Collects every `is_subscribed` value the trigger publishes
pub struct SubscriptionHistory {
    values: Arc<Mutex<Vec<bool>>>,
    _task: JoinHandle<()>,
}

impl SubscriptionHistory {
    pub fn watch(mut rx: watch::Receiver<TriggerState>) -> Self {
        let values = Arc::new(Mutex::new(vec![rx.borrow().is_subscribed]));
        let sink = Arc::clone(&values);
        let task = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let subscribed = rx.borrow_and_update().is_subscribed;
                sink.lock().push(subscribed);
            }
        });
        Self {
            values,
            _task: task,
        }
    }

    pub fn values(&self) -> Vec<bool> {
        self.values.lock().clone()
    }
}

/// Let the trigger task drain everything that is ready
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Advance the paused clock
pub async fn advance(duration: Duration) {
    tokio::time::sleep(duration).await;
}

/// Create a test configuration
pub fn test_config() -> Result<AppConfig> {
    // Load from environment or use defaults
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    Ok(config)
}

/// Helper to check if a Redis server is available for tests
pub fn check_test_env() -> bool {
    dotenvy::dotenv().ok();

    if std::env::var("REDIS_URL").is_err() {
        eprintln!("Skipping test: REDIS_URL not set");
        return false;
    }

    true
}
