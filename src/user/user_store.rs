use super::auth::VidstreamHasher;
use super::user_models::{ProfileFields, User, UserProfile};
use anyhow::Result;

/// Outcome of the compare-and-swap refresh token rotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshSwapOutcome {
    /// The presented token matched the stored one and was replaced.
    Swapped,
    /// The stored token did not match (already rotated, or session revoked).
    Mismatch,
    /// No such user.
    NoSuchUser,
}

pub trait UserStore: Send + Sync {
    /// Creates a new user and returns the user id.
    /// Returns Err if the username or email is already taken.
    fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        salt: &str,
        hasher: &VidstreamHasher,
        profile: &ProfileFields,
    ) -> Result<usize>;

    /// Returns the full user record by id.
    /// Returns Ok(None) if the user does not exist.
    fn get_user(&self, user_id: usize) -> Result<Option<User>>;

    /// Returns the full user record matching the handle as either a
    /// username or an email address.
    /// Returns Ok(None) if no user matches.
    fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>>;

    /// Returns true if a user with the given username already exists.
    fn username_exists(&self, username: &str) -> Result<bool>;

    /// Returns true if a user with the given email already exists.
    fn email_exists(&self, email: &str) -> Result<bool>;

    /// Returns the public profile for a user, with watch history attached.
    /// Returns Ok(None) if the user does not exist.
    fn get_user_profile(&self, user_id: usize) -> Result<Option<UserProfile>>;

    /// Unconditionally stores a new refresh token for the user, replacing
    /// whatever session was live before. Used at login.
    fn set_refresh_token(&self, user_id: usize, token: &str) -> Result<()>;

    /// Atomically replaces the stored refresh token with `new_token`, but
    /// only if the stored value still equals `presented`. The row update is
    /// the arbiter: exactly one of any concurrent callers presenting the
    /// same token observes `Swapped`.
    fn swap_refresh_token(
        &self,
        user_id: usize,
        presented: &str,
        new_token: &str,
    ) -> Result<RefreshSwapOutcome>;

    /// Clears the stored refresh token, ending the user's session.
    /// Idempotent: clearing an already-cleared session is not an error.
    fn clear_refresh_token(&self, user_id: usize) -> Result<()>;

    /// Replaces the stored password hash and salt.
    fn update_password(
        &self,
        user_id: usize,
        password_hash: &str,
        salt: &str,
        hasher: &VidstreamHasher,
    ) -> Result<()>;

    /// Appends a video id to the user's watch history (most recent first
    /// when read back).
    fn record_watch(&self, user_id: usize, video_id: &str) -> Result<()>;

    /// Returns the user's watch history, most recent first.
    fn get_watch_history(&self, user_id: usize) -> Result<Vec<String>>;
}
