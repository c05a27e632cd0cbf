//! The trigger task.
//!
//! One task owns the subscription, presence records, status counters and
//! timers. Commands from the handle, realtime events, timer expiries and
//! presence snapshots arrive on channels and are handled one at a time.

use crate::classify::{route, Route};
use crate::monitor::{ConnectionMonitor, StatusOutcome};
use crate::options::{MessageCallback, TriggerOptions, TypingCallback};
use crate::presence::{PresenceStore, PresenceView};
use crate::state::{TriggerState, CONNECTION_LOST, SUBSCRIBE_FAILED};
use crate::timers::{Expired, TimerTable};
use chat_common::TriggerTimings;
use chat_core::{
    ChannelName, Listener, MessageEnvelope, PresenceEvent, RealtimeClient, RealtimeEvent,
    RealtimeResult, StatusEvent, UserId,
};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

/// Requests from the handle
#[derive(Debug)]
pub(crate) enum Command {
    SetChannel(Option<ChannelName>),
    SetUser(Option<UserId>),
    Shutdown(oneshot::Sender<()>),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum TimerKey {
    Subscribe,
    DisconnectGrace,
    Presence(UserId),
}

/// The subscription currently held with the realtime client
#[derive(Debug)]
struct Subscription {
    channel: ChannelName,
    uuid: UserId,
}

/// Result of the occupant query made after subscribing
struct Snapshot {
    epoch: u64,
    result: RealtimeResult<Vec<UserId>>,
}

struct Inbox {
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::UnboundedReceiver<RealtimeEvent>,
    timers: mpsc::UnboundedReceiver<Expired<TimerKey>>,
    snapshots: mpsc::UnboundedReceiver<Snapshot>,
}

/// Channels connecting a spawned worker to its handle
pub(crate) struct Spawned {
    pub commands: mpsc::UnboundedSender<Command>,
    pub state: watch::Receiver<TriggerState>,
    pub presence: watch::Receiver<PresenceView>,
    pub task: JoinHandle<()>,
}

pub(crate) struct TriggerWorker {
    client: Arc<dyn RealtimeClient>,
    timings: TriggerTimings,
    on_message: Option<MessageCallback>,
    on_typing: Option<TypingCallback>,

    channel: Option<ChannelName>,
    user: Option<UserId>,
    /// Also the guard against subscribing twice
    subscription: Option<Subscription>,
    /// Bumped whenever the subscription is torn down
    epoch: u64,
    listener: Listener,

    timers: TimerTable<TimerKey>,
    /// Debounced presence targets, committed when their timer fires
    pending_presence: HashMap<UserId, bool>,
    presence: PresenceStore,
    monitor: ConnectionMonitor,

    state: watch::Sender<TriggerState>,
    snapshot_tx: mpsc::UnboundedSender<Snapshot>,
}

impl TriggerWorker {
    /// Spawn the worker on the current runtime
    pub(crate) fn spawn(client: Arc<dyn RealtimeClient>, options: TriggerOptions) -> Spawned {
        let (commands_tx, commands) = mpsc::unbounded_channel();
        let (listener, events) = Listener::channel();
        let (timers, timers_rx) = TimerTable::new();
        let (presence, presence_rx) = PresenceStore::new();
        let (state_tx, state_rx) = watch::channel(TriggerState::default());
        let (snapshot_tx, snapshots) = mpsc::unbounded_channel();

        let TriggerOptions {
            channel,
            user,
            timings,
            on_message,
            on_typing,
        } = options;

        let worker = Self {
            client,
            timings,
            on_message,
            on_typing,
            channel,
            user,
            subscription: None,
            epoch: 0,
            listener,
            timers,
            pending_presence: HashMap::new(),
            presence,
            monitor: ConnectionMonitor::new(&timings),
            state: state_tx,
            snapshot_tx,
        };

        let inbox = Inbox {
            commands,
            events,
            timers: timers_rx,
            snapshots,
        };

        Spawned {
            commands: commands_tx,
            state: state_rx,
            presence: presence_rx,
            task: tokio::spawn(worker.run(inbox)),
        }
    }

    async fn run(mut self, mut inbox: Inbox) {
        tracing::debug!(listener_id = %self.listener.id(), "Realtime trigger started");
        self.schedule_subscribe();

        loop {
            tokio::select! {
                command = inbox.commands.recv() => match command {
                    Some(Command::SetChannel(channel)) => self.set_channel(channel).await,
                    Some(Command::SetUser(user)) => self.set_user(user).await,
                    Some(Command::Shutdown(done)) => {
                        self.stop().await;
                        let _ = done.send(());
                        return;
                    }
                    // Handle dropped without shutdown
                    None => {
                        self.stop().await;
                        return;
                    }
                },
                Some(event) = inbox.events.recv() => self.handle_event(event),
                Some(expired) = inbox.timers.recv() => self.handle_timer(expired).await,
                Some(snapshot) = inbox.snapshots.recv() => self.apply_snapshot(snapshot),
            }
        }
    }

    // ------------------------------------------------------------------
    // Subscription lifecycle
    // ------------------------------------------------------------------

    async fn set_channel(&mut self, channel: Option<ChannelName>) {
        if channel == self.channel {
            return;
        }

        tracing::info!(from = ?self.channel, to = ?channel, "Channel changed");
        self.leave().await;
        self.channel = channel;
        self.schedule_subscribe();
    }

    async fn set_user(&mut self, user: Option<UserId>) {
        if user == self.user {
            return;
        }

        tracing::debug!(user_id = ?user, "Local user changed");
        // The held subscription announces the old uuid
        if self.subscription.is_some() {
            self.leave().await;
        }
        self.user = user;
        self.schedule_subscribe();
    }

    /// Arm the subscribe timer if there is something to subscribe to
    fn schedule_subscribe(&mut self) {
        if self.subscription.is_some() {
            return;
        }

        if self.channel.is_some() && self.user.is_some() {
            self.timers
                .arm(TimerKey::Subscribe, self.timings.subscribe_debounce);
        } else {
            self.timers.cancel(&TimerKey::Subscribe);
        }
    }

    async fn subscribe(&mut self) {
        let (Some(channel), Some(uuid)) = (self.channel.clone(), self.user.clone()) else {
            return;
        };
        if self.subscription.is_some() {
            tracing::debug!(channel = %channel, "Already subscribed");
            return;
        }

        match self
            .client
            .subscribe(&channel, self.listener.clone(), &uuid)
            .await
        {
            Ok(()) => {
                tracing::info!(channel = %channel, user_id = %uuid, "Subscribed");
                self.subscription = Some(Subscription {
                    channel: channel.clone(),
                    uuid: uuid.clone(),
                });
                self.update_state(|s| {
                    s.is_subscribed = true;
                    s.error = None;
                });
                self.fetch_occupants(channel, uuid);
            }
            Err(e) => {
                tracing::error!(channel = %channel, error = %e, "Failed to subscribe");
                self.update_state(|s| {
                    s.is_subscribed = false;
                    s.error = Some(SUBSCRIBE_FAILED.to_string());
                });
            }
        }
    }

    /// Tear down the current subscription and everything tied to it
    async fn leave(&mut self) {
        self.epoch += 1;
        self.timers.cancel(&TimerKey::Subscribe);
        self.timers.cancel(&TimerKey::DisconnectGrace);
        let dropped = self
            .timers
            .cancel_where(|key| matches!(key, TimerKey::Presence(_)));
        self.pending_presence.clear();
        self.monitor.reset();

        if let Some(sub) = self.subscription.take() {
            match self
                .client
                .unsubscribe(&sub.channel, self.listener.id(), &sub.uuid)
                .await
            {
                Ok(()) => {
                    tracing::info!(channel = %sub.channel, dropped, "Unsubscribed");
                }
                Err(e) => {
                    tracing::warn!(channel = %sub.channel, error = %e, "Failed to unsubscribe");
                }
            }
        }

        self.update_state(|s| {
            s.is_subscribed = false;
            s.error = None;
            s.reconnect_attempts = 0;
        });
    }

    async fn stop(&mut self) {
        self.leave().await;
        self.timers.cancel_all();
        tracing::debug!("Realtime trigger stopped");
    }

    // ------------------------------------------------------------------
    // Presence
    // ------------------------------------------------------------------

    /// Query current occupants in the background
    fn fetch_occupants(&self, channel: ChannelName, uuid: UserId) {
        let client = Arc::clone(&self.client);
        let tx = self.snapshot_tx.clone();
        let epoch = self.epoch;

        tokio::spawn(async move {
            let result = client.here_now(&channel, &uuid).await;
            let _ = tx.send(Snapshot { epoch, result });
        });
    }

    fn apply_snapshot(&mut self, snapshot: Snapshot) {
        if snapshot.epoch != self.epoch {
            tracing::debug!(
                epoch = snapshot.epoch,
                current = self.epoch,
                "Discarding occupants of a previous subscription"
            );
            return;
        }

        match snapshot.result {
            Ok(occupants) => {
                // A pending debounced event is newer than the snapshot
                let fresh: Vec<UserId> = occupants
                    .into_iter()
                    .filter(|user_id| !self.pending_presence.contains_key(user_id))
                    .collect();
                let count = fresh.len();
                let changed = self.presence.merge_online(fresh, Utc::now());
                tracing::debug!(occupants = count, changed, "Merged initial presence");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to fetch channel occupants");
            }
        }
    }

    fn handle_presence(&mut self, event: PresenceEvent) {
        if !self.on_current_channel(&event.channel) {
            tracing::trace!(channel = %event.channel, "Dropping presence for another channel");
            return;
        }
        let Some(online) = event.action.implied_online() else {
            tracing::trace!(action = %event.action, "Ignoring presence action");
            return;
        };
        let Some(user_id) = event.uuid else {
            return;
        };

        if self.user.as_ref() == Some(&user_id) {
            if online {
                self.timers.cancel(&TimerKey::Presence(user_id.clone()));
                self.pending_presence.remove(&user_id);
                self.presence.set(user_id, true, Utc::now());
            } else {
                tracing::debug!(action = %event.action, "Ignoring departure of the local user");
            }
            return;
        }

        self.pending_presence.insert(user_id.clone(), online);
        self.timers
            .arm(TimerKey::Presence(user_id), self.timings.presence_debounce);
    }

    fn commit_presence(&mut self, user_id: UserId) {
        if let Some(online) = self.pending_presence.remove(&user_id) {
            let changed = self.presence.set(user_id.clone(), online, Utc::now());
            tracing::debug!(user_id = %user_id, online, changed, "Committed presence");
        }
    }

    // ------------------------------------------------------------------
    // Events
    // ------------------------------------------------------------------

    fn handle_event(&mut self, event: RealtimeEvent) {
        match event {
            RealtimeEvent::Message(envelope) => self.handle_message(envelope),
            RealtimeEvent::Presence(presence) => self.handle_presence(presence),
            RealtimeEvent::Status(status) => self.handle_status(&status),
        }
    }

    fn on_current_channel(&self, channel: &ChannelName) -> bool {
        self.subscription
            .as_ref()
            .is_some_and(|sub| &sub.channel == channel)
    }

    fn handle_message(&mut self, envelope: MessageEnvelope) {
        if !self.on_current_channel(&envelope.channel) {
            tracing::trace!(channel = %envelope.channel, "Dropping message for another channel");
            return;
        }

        match route(&envelope, self.user.as_ref()) {
            Route::Typing(typing) => {
                if let Some(on_typing) = &self.on_typing {
                    on_typing(&typing);
                }
            }
            Route::Message => {
                let envelope = Arc::new(envelope);
                self.update_state(|s| s.last_message = Some(Arc::clone(&envelope)));
                if let Some(on_message) = &self.on_message {
                    on_message(&envelope);
                }
            }
            Route::Drop => {
                tracing::trace!("Dropping own typing indicator");
            }
        }
    }

    fn handle_status(&mut self, status: &StatusEvent) {
        if self.subscription.is_none() {
            return;
        }

        match self.monitor.observe(status, Instant::now()) {
            StatusOutcome::Suppressed => {
                tracing::trace!(category = %status.category, "Suppressed status burst");
            }
            StatusOutcome::Connected => {
                self.timers.cancel(&TimerKey::DisconnectGrace);
                self.update_state(|s| {
                    s.is_subscribed = true;
                    s.error = None;
                    s.reconnect_attempts = 0;
                });
            }
            StatusOutcome::Disconnected => {
                if !self.timers.is_armed(&TimerKey::DisconnectGrace) {
                    self.timers
                        .arm(TimerKey::DisconnectGrace, self.timings.disconnect_grace);
                }
                let attempts = self.monitor.reconnect_attempts();
                tracing::info!(category = %status.category, attempts, "Connection interrupted");
                self.update_state(|s| s.reconnect_attempts = attempts);
            }
            StatusOutcome::Error { message, lost } => {
                tracing::warn!(
                    category = %status.category,
                    detail = ?status.error_message,
                    consecutive = self.monitor.consecutive_errors(),
                    "Realtime status error"
                );
                self.update_state(|s| {
                    s.error = Some(message);
                    if lost {
                        s.is_subscribed = false;
                    }
                });
            }
            StatusOutcome::Informational => {
                tracing::trace!(category = %status.category, "Status");
            }
        }
    }

    // ------------------------------------------------------------------
    // Timers
    // ------------------------------------------------------------------

    async fn handle_timer(&mut self, expired: Expired<TimerKey>) {
        if !self.timers.accept(&expired) {
            return;
        }

        match expired.key {
            TimerKey::Subscribe => self.subscribe().await,
            TimerKey::DisconnectGrace => {
                tracing::warn!(
                    grace_ms = self.timings.disconnect_grace.as_millis(),
                    "Disconnect outlasted grace period"
                );
                self.update_state(|s| {
                    s.is_subscribed = false;
                    s.error = Some(CONNECTION_LOST.to_string());
                });
            }
            TimerKey::Presence(user_id) => self.commit_presence(user_id),
        }
    }

    /// Apply a change; watchers are notified only if something differs
    fn update_state<F>(&self, f: F)
    where
        F: FnOnce(&mut TriggerState),
    {
        self.state.send_if_modified(|state| {
            let before = state.clone();
            f(state);
            *state != before
        });
    }
}
