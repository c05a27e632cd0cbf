//! Keyed, cancellable timers.
//!
//! Each key has at most one pending timer. Arming a key again replaces its
//! timer; cancelling aborts it. Expiries are delivered on a channel so the
//! owning task handles them in order with everything else it receives.
//! Timers run on `tokio::time`, so a paused runtime drives them
//! deterministically.

use std::collections::HashMap;
use std::hash::Hash;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

/// A timer that fired
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expired<K> {
    pub key: K,
    generation: u64,
}

/// Table of pending timers, one per key
#[derive(Debug)]
pub struct TimerTable<K> {
    pending: HashMap<K, (u64, AbortHandle)>,
    next_generation: u64,
    expired_tx: mpsc::UnboundedSender<Expired<K>>,
}

impl<K> TimerTable<K>
where
    K: Eq + Hash + Clone + Send + 'static,
{
    /// Create a table and the receiver its expiries arrive on
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Expired<K>>) {
        let (expired_tx, expired_rx) = mpsc::unbounded_channel();
        (
            Self {
                pending: HashMap::new(),
                next_generation: 0,
                expired_tx,
            },
            expired_rx,
        )
    }

    /// Fire `key` after `after`, replacing any pending timer for it
    pub fn arm(&mut self, key: K, after: Duration) {
        self.next_generation += 1;
        let generation = self.next_generation;
        let tx = self.expired_tx.clone();
        let fired = key.clone();

        let handle = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            let _ = tx.send(Expired {
                key: fired,
                generation,
            });
        });

        if let Some((_, previous)) = self.pending.insert(key, (generation, handle.abort_handle())) {
            previous.abort();
        }
    }

    /// Cancel the timer for `key`; returns whether one was pending
    pub fn cancel(&mut self, key: &K) -> bool {
        match self.pending.remove(key) {
            Some((_, handle)) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Cancel every timer whose key matches; returns how many were pending
    pub fn cancel_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&K) -> bool,
    {
        let mut cancelled = 0;
        self.pending.retain(|key, (_, handle)| {
            if predicate(key) {
                handle.abort();
                cancelled += 1;
                false
            } else {
                true
            }
        });
        cancelled
    }

    /// Cancel everything
    pub fn cancel_all(&mut self) -> usize {
        self.cancel_where(|_| true)
    }

    /// Check if a timer is pending for `key`
    #[must_use]
    pub fn is_armed(&self, key: &K) -> bool {
        self.pending.contains_key(key)
    }

    /// Number of pending timers
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Check if no timer is pending
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Claim an expiry.
    ///
    /// Returns false for expiries of timers that were cancelled or re-armed
    /// after they fired but before the expiry was handled.
    pub fn accept(&mut self, expired: &Expired<K>) -> bool {
        match self.pending.get(&expired.key) {
            Some((generation, _)) if *generation == expired.generation => {
                self.pending.remove(&expired.key);
                true
            }
            _ => false,
        }
    }
}

impl<K> Drop for TimerTable<K> {
    fn drop(&mut self) {
        for (_, handle) in self.pending.values() {
            handle.abort();
        }
    }
}
