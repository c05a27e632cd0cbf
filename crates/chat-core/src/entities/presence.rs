//! Presence entity - derived online/last-seen state of a contact

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Online state of one contact as seen by the local client
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceInfo {
    pub is_online: bool,
    pub last_seen: Option<DateTime<Utc>>,
}

impl PresenceInfo {
    /// Presence for a contact we know nothing about
    #[must_use]
    pub const fn offline() -> Self {
        Self {
            is_online: false,
            last_seen: None,
        }
    }

    /// Online as of `at`
    #[must_use]
    pub const fn online_at(at: DateTime<Utc>) -> Self {
        Self {
            is_online: true,
            last_seen: Some(at),
        }
    }

    /// Offline, last seen at `at`
    #[must_use]
    pub const fn offline_at(at: DateTime<Utc>) -> Self {
        Self {
            is_online: false,
            last_seen: Some(at),
        }
    }
}
