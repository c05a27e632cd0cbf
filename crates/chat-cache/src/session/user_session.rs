//! Signed-in session persistence.
//!
//! Stores the session under `userSession` and the "remember me" username
//! under `rememberedCredentials`, on any [`KeyValueStorage`].

use chat_core::{
    KeyValueStorage, RememberedCredentials, Session, StorageResult, REMEMBERED_CREDENTIALS_KEY,
    SESSION_KEY,
};
use serde::de::DeserializeOwned;

/// Session store over a key-value backend
#[derive(Debug, Clone)]
pub struct SessionStore<S> {
    storage: S,
}

impl<S: KeyValueStorage> SessionStore<S> {
    /// Create a session store
    #[must_use]
    pub fn new(storage: S) -> Self {
        Self { storage }
    }

    /// Persist the session (login, or overwrite after a profile edit)
    pub async fn save(&self, session: &Session) -> StorageResult<()> {
        let json = serde_json::to_string(session)?;
        self.storage.set(SESSION_KEY, &json).await?;

        tracing::debug!(user_id = %session.user.id, "Saved session");
        Ok(())
    }

    /// Load the stored session, if any
    pub async fn load(&self) -> StorageResult<Option<Session>> {
        self.read_json(SESSION_KEY).await
    }

    /// Remove the session (logout); returns whether one existed
    pub async fn clear(&self) -> StorageResult<bool> {
        let removed = self.storage.remove(SESSION_KEY).await?;
        tracing::debug!(removed, "Cleared session");
        Ok(removed)
    }

    /// Remember the username for the next login
    pub async fn remember(&self, username: &str) -> StorageResult<()> {
        let creds = RememberedCredentials {
            username: username.to_string(),
        };
        let json = serde_json::to_string(&creds)?;
        self.storage.set(REMEMBERED_CREDENTIALS_KEY, &json).await
    }

    /// Remembered credentials, if any
    pub async fn remembered(&self) -> StorageResult<Option<RememberedCredentials>> {
        self.read_json(REMEMBERED_CREDENTIALS_KEY).await
    }

    /// Forget remembered credentials
    pub async fn forget(&self) -> StorageResult<bool> {
        self.storage.remove(REMEMBERED_CREDENTIALS_KEY).await
    }

    /// Read a JSON value; corrupt entries are removed and treated as absent
    async fn read_json<T: DeserializeOwned>(&self, key: &str) -> StorageResult<Option<T>> {
        let Some(raw) = self.storage.get(key).await? else {
            return Ok(None);
        };

        match serde_json::from_str(&raw) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Discarding corrupt stored value");
                self.storage.remove(key).await?;
                Ok(None)
            }
        }
    }
}
