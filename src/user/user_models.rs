//! User data models

use serde::Serialize;
use std::time::SystemTime;

/// Full user record as persisted. Never serialized to API responses
/// because it carries the password hash and the session refresh token.
#[derive(Debug, Clone)]
pub struct User {
    pub id: usize,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub password_salt: String,
    pub hasher: super::auth::VidstreamHasher,
    pub avatar: String,
    pub cover_image: Option<String>,
    /// The single active session credential. `None` means no live session.
    pub refresh_token: Option<String>,
    pub created: SystemTime,
    pub updated: SystemTime,
}

/// Public view of a user, safe to attach to responses and request context.
#[derive(Debug, Clone, Serialize)]
pub struct UserProfile {
    pub id: usize,
    pub username: String,
    pub email: String,
    pub avatar: String,
    #[serde(rename = "coverImage")]
    pub cover_image: Option<String>,
    /// Ordered most-recent-first sequence of watched video ids.
    #[serde(rename = "watchHistory")]
    pub watch_history: Vec<String>,
}

impl User {
    pub fn profile(&self, watch_history: Vec<String>) -> UserProfile {
        UserProfile {
            id: self.id,
            username: self.username.clone(),
            email: self.email.clone(),
            avatar: self.avatar.clone(),
            cover_image: self.cover_image.clone(),
            watch_history,
        }
    }
}

/// Fields accepted at registration beyond the credentials themselves.
#[derive(Debug, Clone)]
pub struct ProfileFields {
    pub avatar: String,
    pub cover_image: Option<String>,
}
