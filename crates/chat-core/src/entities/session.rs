//! Session entity - the signed-in user as persisted on the client
//!
//! Created on login, overwritten on profile edit, deleted on logout.
//! Passwords are never part of a persisted session.

use serde::{Deserialize, Serialize};

use crate::value_objects::UserId;

/// Storage key of the signed-in session
pub const SESSION_KEY: &str = "userSession";
/// Storage key of the "remember me" credentials
pub const REMEMBERED_CREDENTIALS_KEY: &str = "rememberedCredentials";

/// Profile of the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionUser {
    pub id: UserId,
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub mobile: Option<String>,
}

impl SessionUser {
    /// Display name, falling back to the username
    pub fn display_name(&self) -> String {
        let full = format!("{} {}", self.first_name.trim(), self.last_name.trim());
        let full = full.trim();
        if full.is_empty() {
            self.username.clone()
        } else {
            full.to_string()
        }
    }
}

/// Bearer token plus profile
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user: SessionUser,
}

impl Session {
    /// Create a new session
    pub fn new(token: impl Into<String>, user: SessionUser) -> Self {
        Self {
            token: token.into(),
            user,
        }
    }

    /// Value of the `Authorization` header for REST calls
    pub fn bearer_header(&self) -> String {
        format!("Bearer {}", self.token)
    }

    /// Replace the profile after a successful edit, keeping the token
    pub fn with_user(mut self, user: SessionUser) -> Self {
        self.user = user;
        self
    }
}

/// Credentials kept by "remember me" (username only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RememberedCredentials {
    pub username: String,
}
