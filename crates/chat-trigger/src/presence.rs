//! Versioned presence records.
//!
//! Every mutation goes through [`PresenceStore`], which bumps the version
//! and publishes a fresh snapshot only when a record actually changed.

use chat_core::{PresenceInfo, UserId};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// Presence of every contact seen so far
pub type PresenceSnapshot = HashMap<UserId, PresenceInfo>;

/// Published presence: the snapshot and the version it was taken at
#[derive(Debug, Clone, Default)]
pub struct PresenceView {
    pub version: u64,
    pub data: Arc<PresenceSnapshot>,
}

impl PresenceView {
    /// Presence of one contact; unknown contacts are offline
    #[must_use]
    pub fn get(&self, user_id: &UserId) -> PresenceInfo {
        self.data.get(user_id).copied().unwrap_or_default()
    }
}

/// Owner of the presence records
#[derive(Debug)]
pub struct PresenceStore {
    records: PresenceSnapshot,
    version: u64,
    published: watch::Sender<PresenceView>,
}

impl PresenceStore {
    /// Create an empty store and a receiver for its snapshots
    #[must_use]
    pub fn new() -> (Self, watch::Receiver<PresenceView>) {
        let (published, rx) = watch::channel(PresenceView::default());
        (
            Self {
                records: HashMap::new(),
                version: 0,
                published,
            },
            rx,
        )
    }

    /// Current version
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Presence of one contact; unknown contacts are offline
    #[must_use]
    pub fn get(&self, user_id: &UserId) -> PresenceInfo {
        self.records.get(user_id).copied().unwrap_or_default()
    }

    /// Commit one contact's online state.
    ///
    /// Returns whether the record changed.
    pub fn set(&mut self, user_id: UserId, is_online: bool, at: DateTime<Utc>) -> bool {
        let changed = self.write(user_id, is_online, at);
        if changed {
            self.publish();
        }
        changed
    }

    /// Mark several contacts online at once, with at most one version bump.
    ///
    /// Returns whether anything changed.
    pub fn merge_online<I>(&mut self, users: I, at: DateTime<Utc>) -> bool
    where
        I: IntoIterator<Item = UserId>,
    {
        let mut changed = false;
        for user_id in users {
            changed |= self.write(user_id, true, at);
        }
        if changed {
            self.publish();
        }
        changed
    }

    fn write(&mut self, user_id: UserId, is_online: bool, at: DateTime<Utc>) -> bool {
        match self.records.get(&user_id) {
            Some(existing) if existing.is_online == is_online => false,
            _ => {
                let info = if is_online {
                    PresenceInfo::online_at(at)
                } else {
                    PresenceInfo::offline_at(at)
                };
                self.records.insert(user_id, info);
                true
            }
        }
    }

    fn publish(&mut self) {
        self.version += 1;
        let view = PresenceView {
            version: self.version,
            data: Arc::new(self.records.clone()),
        };
        tracing::trace!(version = view.version, contacts = view.data.len(), "Presence changed");
        self.published.send_replace(view);
    }
}
