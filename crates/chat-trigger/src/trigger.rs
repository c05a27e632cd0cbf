//! Handle to a running realtime trigger.

use crate::error::{TriggerError, TriggerResult};
use crate::options::TriggerOptions;
use crate::presence::{PresenceSnapshot, PresenceView};
use crate::state::TriggerState;
use crate::worker::{Command, TriggerWorker};
use chat_core::{ChannelName, MessageEnvelope, PresenceInfo, RealtimeClient, UserId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Subscribes to one channel at a time and keeps subscription state,
/// the latest message and contact presence up to date.
///
/// Dropping the handle stops the trigger and unsubscribes in the
/// background; [`RealtimeTrigger::shutdown`] does the same and waits.
#[derive(Debug)]
pub struct RealtimeTrigger {
    commands: mpsc::UnboundedSender<Command>,
    state: watch::Receiver<TriggerState>,
    presence: watch::Receiver<PresenceView>,
    task: JoinHandle<()>,
}

impl RealtimeTrigger {
    /// Start a trigger on the current tokio runtime
    #[must_use]
    pub fn spawn(client: Arc<dyn RealtimeClient>, options: TriggerOptions) -> Self {
        let spawned = TriggerWorker::spawn(client, options);
        Self {
            commands: spawned.commands,
            state: spawned.state,
            presence: spawned.presence,
            task: spawned.task,
        }
    }

    /// Switch to another channel, or to none
    pub fn set_channel(&self, channel: Option<ChannelName>) -> TriggerResult<()> {
        self.send(Command::SetChannel(channel))
    }

    /// Change the local user
    pub fn set_user(&self, user: Option<UserId>) -> TriggerResult<()> {
        self.send(Command::SetUser(user))
    }

    /// Check if subscribed and not considered lost
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state.borrow().is_subscribed
    }

    /// Current user-facing error
    #[must_use]
    pub fn error(&self) -> Option<String> {
        self.state.borrow().error.clone()
    }

    /// Most recent non-typing message
    #[must_use]
    pub fn last_message(&self) -> Option<Arc<MessageEnvelope>> {
        self.state.borrow().last_message.clone()
    }

    /// Snapshot of the whole state
    #[must_use]
    pub fn state(&self) -> TriggerState {
        self.state.borrow().clone()
    }

    /// Presence of one contact; unknown contacts are offline
    #[must_use]
    pub fn contact_presence(&self, user_id: &UserId) -> PresenceInfo {
        self.presence.borrow().get(user_id)
    }

    /// All known presence records.
    ///
    /// The same `Arc` is returned until presence actually changes.
    #[must_use]
    pub fn presence_data(&self) -> Arc<PresenceSnapshot> {
        Arc::clone(&self.presence.borrow().data)
    }

    /// Incremented on every presence change
    #[must_use]
    pub fn presence_version(&self) -> u64 {
        self.presence.borrow().version
    }

    /// Receiver notified on every state change
    #[must_use]
    pub fn watch_state(&self) -> watch::Receiver<TriggerState> {
        self.state.clone()
    }

    /// Receiver notified on every presence change
    #[must_use]
    pub fn watch_presence(&self) -> watch::Receiver<PresenceView> {
        self.presence.clone()
    }

    /// Cancel all timers, unsubscribe and wait for the trigger to stop
    pub async fn shutdown(self) -> TriggerResult<()> {
        let (done_tx, done_rx) = oneshot::channel();
        self.send(Command::Shutdown(done_tx))?;
        done_rx.await.map_err(|_| TriggerError::Closed)?;

        if let Err(e) = self.task.await {
            tracing::warn!(error = %e, "Realtime trigger task ended abnormally");
        }
        Ok(())
    }

    fn send(&self, command: Command) -> TriggerResult<()> {
        self.commands.send(command).map_err(|_| TriggerError::Closed)
    }
}
