//! Redis-backed realtime client.
//!
//! Implements [`RealtimeClient`] on Redis Pub/Sub. Messages and presence
//! events travel as JSON [`RealtimeEvent`]s on `rt:<channel>`; channel
//! occupancy is a Redis set. A background loop owns the Pub/Sub connection,
//! fans received events out to registered listeners, and reports connection
//! status changes to every listener.

use crate::pool::{RedisPool, RedisPoolError};
use crate::realtime::backoff::ReconnectBackoff;
use crate::realtime::channels::{parse_wire_channel, presence_set, wire_channel};
use async_trait::async_trait;
use chat_core::{
    ChannelName, Listener, ListenerId, MessageEnvelope, PresenceAction, PresenceEvent,
    RealtimeClient, RealtimeError, RealtimeEvent, RealtimeResult, StatusCategory, StatusEvent,
    UserId,
};
use dashmap::DashMap;
use futures_util::StreamExt;
use redis::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};

/// How long `subscribe` waits for the Pub/Sub connection to confirm
const SUBSCRIBE_ACK_TIMEOUT: Duration = Duration::from_secs(5);

/// Commands for subscription management
#[derive(Debug)]
enum ClientCommand {
    /// Subscribe and report the outcome once Redis has confirmed it
    Subscribe(String, oneshot::Sender<Result<(), String>>),
    Unsubscribe(String),
    Shutdown,
}

/// Listeners keyed by Redis Pub/Sub channel name
type ListenerRegistry = Arc<DashMap<String, Vec<Listener>>>;

/// Add a listener to a channel, replacing one with the same id.
/// Returns true if the channel had no listeners before.
fn register(listeners: &ListenerRegistry, wire: &str, listener: Listener) -> bool {
    let mut entry = listeners.entry(wire.to_string()).or_default();
    let id = listener.id();
    entry.retain(|l| l.id() != id);
    entry.push(listener);
    entry.len() == 1
}

/// Remove a listener from a channel, dropping the entry once empty.
/// Returns `None` if the listener was not registered, otherwise whether
/// the channel is now without listeners.
fn deregister(listeners: &ListenerRegistry, wire: &str, listener_id: ListenerId) -> Option<bool> {
    let (found, now_empty) = {
        let mut entry = listeners.get_mut(wire)?;
        let before = entry.len();
        entry.retain(|l| l.id() != listener_id);
        (entry.len() != before, entry.is_empty())
    };

    if now_empty {
        listeners.remove_if(wire, |_, registered| registered.is_empty());
    }
    found.then_some(now_empty)
}

impl From<RedisPoolError> for RealtimeError {
    fn from(err: RedisPoolError) -> Self {
        Self::Connection(err.to_string())
    }
}

/// Realtime client on top of Redis Pub/Sub
pub struct RedisRealtimeClient {
    pool: RedisPool,
    listeners: ListenerRegistry,
    control_tx: mpsc::Sender<ClientCommand>,
}

impl RedisRealtimeClient {
    /// Create the client and start the background listener
    #[must_use]
    pub fn connect(pool: RedisPool, redis_url: impl Into<String>, backoff: ReconnectBackoff) -> Self {
        let (control_tx, control_rx) = mpsc::channel(32);
        let listeners: ListenerRegistry = Arc::new(DashMap::new());

        tokio::spawn(Self::listener_loop(
            redis_url.into(),
            backoff,
            listeners.clone(),
            control_rx,
        ));

        Self {
            pool,
            listeners,
            control_tx,
        }
    }

    /// Background listener loop
    async fn listener_loop(
        redis_url: String,
        mut backoff: ReconnectBackoff,
        listeners: ListenerRegistry,
        mut control_rx: mpsc::Receiver<ClientCommand>,
    ) {
        let mut connected_before = false;

        loop {
            match Self::run_listener(&redis_url, &listeners, &mut control_rx, &mut backoff, &mut connected_before)
                .await
            {
                Ok(true) => {
                    tracing::info!("Realtime client shutting down");
                    break;
                }
                Ok(false) => {
                    Self::report_lost(&listeners, "Pub/Sub stream ended");
                }
                Err(e) => {
                    tracing::error!(error = %e, "Realtime listener error, reconnecting...");
                    Self::report_lost(&listeners, &e.to_string());
                }
            }

            let delay = backoff.next_delay();
            tracing::debug!(
                attempt = backoff.attempts(),
                delay_ms = delay.as_millis() as u64,
                "Waiting before reconnect"
            );
            tokio::time::sleep(delay).await;
        }
    }

    /// Run the listener until error or shutdown; `Ok(true)` means shutdown
    async fn run_listener(
        redis_url: &str,
        listeners: &ListenerRegistry,
        control_rx: &mut mpsc::Receiver<ClientCommand>,
        backoff: &mut ReconnectBackoff,
        connected_before: &mut bool,
    ) -> Result<bool, redis::RedisError> {
        let client = Client::open(redis_url)?;
        let mut pubsub = client.get_async_pubsub().await?;

        // Subscribe to channels registered while disconnected
        let channels: Vec<String> = listeners.iter().map(|entry| entry.key().clone()).collect();
        for channel in &channels {
            pubsub.subscribe(channel).await?;
        }

        backoff.reset();
        let category = if *connected_before {
            StatusCategory::Reconnected
        } else {
            StatusCategory::Connected
        };
        *connected_before = true;
        Self::broadcast_status(listeners, &StatusEvent::new(category));

        tracing::info!(channels = channels.len(), "Realtime client connected to Redis");

        let mut stream = pubsub.on_message();

        loop {
            tokio::select! {
                // Handle incoming messages
                msg = stream.next() => {
                    match msg {
                        Some(msg) => {
                            let channel_name: String = msg.get_channel_name().to_string();
                            let payload: String = msg.get_payload().unwrap_or_default();
                            Self::dispatch(listeners, &channel_name, &payload);
                        }
                        None => {
                            tracing::warn!("Pub/Sub stream ended");
                            return Ok(false);
                        }
                    }
                }

                // Handle control commands
                cmd = control_rx.recv() => {
                    match cmd {
                        Some(ClientCommand::Subscribe(channel, ack)) => {
                            // Need to drop stream to access pubsub
                            drop(stream);
                            if let Err(e) = pubsub.subscribe(&channel).await {
                                tracing::error!(channel = %channel, error = %e, "Failed to subscribe");
                                let _ = ack.send(Err(e.to_string()));
                                return Err(e);
                            }
                            tracing::debug!(channel = %channel, "Subscribed to channel");
                            let _ = ack.send(Ok(()));
                            stream = pubsub.on_message();
                        }
                        Some(ClientCommand::Unsubscribe(channel)) => {
                            drop(stream);
                            if let Err(e) = pubsub.unsubscribe(&channel).await {
                                tracing::error!(channel = %channel, error = %e, "Failed to unsubscribe");
                            } else {
                                tracing::debug!(channel = %channel, "Unsubscribed from channel");
                            }
                            stream = pubsub.on_message();
                        }
                        Some(ClientCommand::Shutdown) => {
                            return Ok(true);
                        }
                        None => {
                            tracing::warn!("Control channel closed");
                            return Ok(true);
                        }
                    }
                }
            }
        }
    }

    /// Deliver a raw Pub/Sub payload to the channel's listeners
    fn dispatch(listeners: &ListenerRegistry, channel_name: &str, payload: &str) {
        if parse_wire_channel(channel_name).is_none() {
            tracing::trace!(channel = %channel_name, "Ignoring non-realtime channel");
            return;
        }

        let event = match serde_json::from_str::<RealtimeEvent>(payload) {
            Ok(RealtimeEvent::Status(_)) => {
                tracing::warn!(channel = %channel_name, "Dropping status event published on the wire");
                return;
            }
            Ok(event) => event,
            Err(e) => {
                tracing::warn!(channel = %channel_name, error = %e, "Malformed realtime payload");
                return;
            }
        };

        if let Some(mut entry) = listeners.get_mut(channel_name) {
            entry.retain(|listener| listener.deliver(event.clone()));
            tracing::trace!(
                channel = %channel_name,
                kind = event.kind(),
                listeners = entry.len(),
                "Delivered realtime event"
            );
        }
    }

    /// Deliver a status event to every listener on every channel
    fn broadcast_status(listeners: &ListenerRegistry, status: &StatusEvent) {
        for mut entry in listeners.iter_mut() {
            entry.retain(|listener| listener.deliver(RealtimeEvent::Status(status.clone())));
        }
    }

    fn report_lost(listeners: &ListenerRegistry, reason: &str) {
        Self::broadcast_status(listeners, &StatusEvent::new(StatusCategory::Disconnected));
        Self::broadcast_status(
            listeners,
            &StatusEvent::new(StatusCategory::NetworkIssues).with_error(reason),
        );
    }

    async fn send_command(&self, command: ClientCommand) -> RealtimeResult<()> {
        self.control_tx
            .send(command)
            .await
            .map_err(|_| RealtimeError::Closed)
    }

    /// Subscribe the Pub/Sub connection to `wire` and wait for Redis to confirm
    async fn subscribe_wire(&self, channel: &ChannelName, wire: &str) -> RealtimeResult<()> {
        let failed = |reason: String| RealtimeError::Subscribe {
            channel: channel.clone(),
            reason,
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        self.send_command(ClientCommand::Subscribe(wire.to_string(), ack_tx))
            .await?;

        match tokio::time::timeout(SUBSCRIBE_ACK_TIMEOUT, ack_rx).await {
            Ok(Ok(result)) => result.map_err(failed),
            Ok(Err(_)) => Err(failed("listener stopped before confirming".to_string())),
            Err(_) => Err(failed("timed out waiting for Redis".to_string())),
        }
    }

    /// Everything `subscribe` does after the listener is registered
    async fn join(
        &self,
        channel: &ChannelName,
        wire: &str,
        first: bool,
        uuid: &UserId,
    ) -> RealtimeResult<()> {
        if first {
            self.subscribe_wire(channel, wire).await?;
        }

        let presence_key = presence_set(channel);
        self.pool
            .add_member(&presence_key, uuid.as_str())
            .await
            .map_err(|e| RealtimeError::Subscribe {
                channel: channel.clone(),
                reason: e.to_string(),
            })?;

        if let Err(e) = self.announce(PresenceAction::Join, channel, uuid).await {
            if let Err(cleanup) = self.pool.remove_member(&presence_key, uuid.as_str()).await {
                tracing::warn!(channel = %channel, error = %cleanup, "Failed to clear occupancy");
            }
            return Err(e);
        }
        Ok(())
    }

    async fn publish_event(&self, channel: &ChannelName, event: &RealtimeEvent) -> RealtimeResult<u32> {
        let payload = serde_json::to_string(event)
            .map_err(|e| RealtimeError::Connection(e.to_string()))?;
        let wire = wire_channel(channel);
        let receivers = self.pool.publish(&wire, &payload).await?;

        tracing::debug!(
            channel = %wire,
            kind = event.kind(),
            receivers = receivers,
            "Published realtime event"
        );

        Ok(receivers)
    }

    async fn announce(&self, action: PresenceAction, channel: &ChannelName, uuid: &UserId) -> RealtimeResult<()> {
        let occupancy = self.pool.member_count(&presence_set(channel)).await?;
        let event = PresenceEvent::new(action, uuid.clone(), channel.clone())
            .with_occupancy(u32::try_from(occupancy).unwrap_or(u32::MAX));
        self.publish_event(channel, &RealtimeEvent::Presence(event)).await?;
        Ok(())
    }

    /// Publish a chat or typing payload on a channel
    pub async fn publish_message(
        &self,
        channel: &ChannelName,
        message: serde_json::Value,
        publisher: &UserId,
    ) -> RealtimeResult<u32> {
        let timetoken = chrono::Utc::now()
            .timestamp_nanos_opt()
            .map(|ns| (ns / 100).to_string())
            .unwrap_or_default();
        let envelope = MessageEnvelope::new(channel.clone(), message)
            .with_publisher(publisher.clone())
            .with_timetoken(timetoken);

        self.publish_event(channel, &RealtimeEvent::Message(envelope)).await
    }

    /// Channels with at least one registered listener
    #[must_use]
    pub fn subscribed_channels(&self) -> Vec<String> {
        self.listeners.iter().map(|entry| entry.key().clone()).collect()
    }

    /// Stop the background listener
    pub async fn shutdown(&self) -> RealtimeResult<()> {
        self.send_command(ClientCommand::Shutdown).await
    }
}

#[async_trait]
impl RealtimeClient for RedisRealtimeClient {
    async fn subscribe(
        &self,
        channel: &ChannelName,
        listener: Listener,
        uuid: &UserId,
    ) -> RealtimeResult<()> {
        let wire = wire_channel(channel);
        let listener_id = listener.id();
        let first = register(&self.listeners, &wire, listener);

        if let Err(e) = self.join(channel, &wire, first, uuid).await {
            tracing::warn!(channel = %channel, error = %e, "Subscribe failed, releasing listener");
            if deregister(&self.listeners, &wire, listener_id) == Some(true) {
                if let Err(send_err) = self.send_command(ClientCommand::Unsubscribe(wire)).await {
                    tracing::debug!(error = %send_err, "Listener loop already stopped");
                }
            }
            return Err(e);
        }

        tracing::info!(channel = %channel, uuid = %uuid, "Subscribed");
        Ok(())
    }

    async fn unsubscribe(
        &self,
        channel: &ChannelName,
        listener_id: ListenerId,
        uuid: &UserId,
    ) -> RealtimeResult<()> {
        let wire = wire_channel(channel);
        let Some(now_empty) = deregister(&self.listeners, &wire, listener_id) else {
            return Err(RealtimeError::NotSubscribed(channel.clone()));
        };

        if now_empty {
            self.send_command(ClientCommand::Unsubscribe(wire)).await?;
        }

        self.pool
            .remove_member(&presence_set(channel), uuid.as_str())
            .await?;
        self.announce(PresenceAction::Leave, channel, uuid).await?;

        tracing::info!(channel = %channel, uuid = %uuid, "Unsubscribed");
        Ok(())
    }

    async fn here_now(&self, channel: &ChannelName, uuid: &UserId) -> RealtimeResult<Vec<UserId>> {
        let members = self
            .pool
            .members(&presence_set(channel))
            .await
            .map_err(|e| RealtimeError::Presence(e.to_string()))?;

        let occupants: Vec<UserId> = members
            .iter()
            .filter_map(|m| UserId::parse(m).ok())
            .collect();

        tracing::debug!(
            channel = %channel,
            requested_by = %uuid,
            occupancy = occupants.len(),
            "Fetched presence snapshot"
        );

        Ok(occupants)
    }
}
