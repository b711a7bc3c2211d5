use super::auth::{VidstreamHasher, MAX_PASSWORD_LENGTH};
use super::user_models::{ProfileFields, User, UserProfile};
use super::user_store::{RefreshSwapOutcome, UserStore};
use anyhow::Result;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{0}")]
    Validation(String),
    #[error("A user with this username already exists")]
    DuplicateUsername,
    #[error("A user with this email already exists")]
    DuplicateEmail,
    /// Unknown handle and wrong password collapse to the same error so the
    /// response does not leak which accounts exist.
    #[error("Invalid credentials")]
    InvalidCredentials,
    /// The presented refresh token is not the stored one: either it was
    /// already rotated (replay) or the session was revoked by logout.
    #[error("Refresh token is expired or has been used")]
    RefreshRejected,
    #[error("User not found")]
    UnknownUser,
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub struct UserManager {
    user_store: Arc<dyn UserStore>,
    hasher: VidstreamHasher,
}

impl UserManager {
    pub fn new(user_store: Arc<dyn UserStore>) -> Self {
        Self {
            user_store,
            hasher: VidstreamHasher::Argon2,
        }
    }

    /// Creates a user with a freshly salted password hash. Username and
    /// email collisions are checked up front so the caller gets a specific
    /// error, with the unique constraints as the durable backstop.
    pub fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
        profile: ProfileFields,
    ) -> Result<UserProfile, AuthError> {
        let username = username.trim();
        let email = email.trim();
        if username.is_empty() {
            return Err(AuthError::Validation("The username cannot be empty".into()));
        }
        if email.is_empty() || !email.contains('@') {
            return Err(AuthError::Validation("Invalid email address".into()));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("The password cannot be empty".into()));
        }
        if password.len() > MAX_PASSWORD_LENGTH {
            return Err(AuthError::Validation("The password is too long".into()));
        }

        if self.user_store.username_exists(username)? {
            return Err(AuthError::DuplicateUsername);
        }
        if self.user_store.email_exists(email)? {
            return Err(AuthError::DuplicateEmail);
        }

        let salt = self.hasher.generate_b64_salt();
        let hash = self.hasher.hash(password, &salt)?;
        let user_id = self
            .user_store
            .create_user(username, email, &hash, &salt, &self.hasher, &profile)?;

        self.user_store
            .get_user_profile(user_id)?
            .ok_or(AuthError::UnknownUser)
    }

    /// Checks a handle (username or email) and password pair, returning the
    /// matching user on success.
    pub fn verify_password(&self, handle: &str, password: &str) -> Result<User, AuthError> {
        let user = match self.user_store.get_user_by_handle(handle)? {
            Some(user) => user,
            None => return Err(AuthError::InvalidCredentials),
        };
        if user.hasher.verify(password, &user.password_hash)? {
            Ok(user)
        } else {
            Err(AuthError::InvalidCredentials)
        }
    }

    /// Stores `refresh_token` as the user's single live session credential,
    /// replacing any previous session.
    pub fn start_session(&self, user_id: usize, refresh_token: &str) -> Result<(), AuthError> {
        self.user_store.set_refresh_token(user_id, refresh_token)?;
        Ok(())
    }

    /// Rotates the stored refresh token: `presented` must still be the live
    /// one, and exactly one of any concurrent callers wins the swap.
    pub fn rotate_session(
        &self,
        user_id: usize,
        presented: &str,
        new_token: &str,
    ) -> Result<(), AuthError> {
        match self
            .user_store
            .swap_refresh_token(user_id, presented, new_token)?
        {
            RefreshSwapOutcome::Swapped => Ok(()),
            RefreshSwapOutcome::Mismatch => {
                warn!("Rejected replayed or revoked refresh token for user {}", user_id);
                Err(AuthError::RefreshRejected)
            }
            RefreshSwapOutcome::NoSuchUser => Err(AuthError::RefreshRejected),
        }
    }

    /// Ends the user's session. Every outstanding refresh token becomes
    /// unusable immediately.
    pub fn end_session(&self, user_id: usize) -> Result<(), AuthError> {
        self.user_store.clear_refresh_token(user_id)?;
        Ok(())
    }

    /// Verifies the old password, stores a new hash and revokes the session
    /// so existing refresh tokens stop working.
    pub fn change_password(
        &self,
        user_id: usize,
        old_password: &str,
        new_password: &str,
    ) -> Result<(), AuthError> {
        if new_password.is_empty() {
            return Err(AuthError::Validation("The password cannot be empty".into()));
        }
        if new_password.len() > MAX_PASSWORD_LENGTH {
            return Err(AuthError::Validation("The password is too long".into()));
        }
        let user = self
            .user_store
            .get_user(user_id)?
            .ok_or(AuthError::UnknownUser)?;
        if !user.hasher.verify(old_password, &user.password_hash)? {
            return Err(AuthError::InvalidCredentials);
        }

        let salt = self.hasher.generate_b64_salt();
        let hash = self.hasher.hash(new_password, &salt)?;
        self.user_store
            .update_password(user_id, &hash, &salt, &self.hasher)?;
        self.user_store.clear_refresh_token(user_id)?;
        Ok(())
    }

    pub fn get_profile(&self, user_id: usize) -> Result<Option<UserProfile>, AuthError> {
        Ok(self.user_store.get_user_profile(user_id)?)
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::user::sqlite_user_store::SqliteUserStore;
    use tempfile::TempDir;

    fn new_manager() -> (TempDir, UserManager) {
        let dir = TempDir::new().unwrap();
        let store = SqliteUserStore::new(dir.path().join("user.db")).unwrap();
        (dir, UserManager::new(Arc::new(store)))
    }

    fn default_profile() -> ProfileFields {
        ProfileFields {
            avatar: "https://cdn.example.com/avatar.png".to_string(),
            cover_image: None,
        }
    }

    #[test]
    fn register_then_login() {
        let (_dir, manager) = new_manager();
        let profile = manager
            .register("alice", "alice@example.com", "Secret123!", default_profile())
            .unwrap();
        assert_eq!(profile.username, "alice");

        let by_username = manager.verify_password("alice", "Secret123!").unwrap();
        assert_eq!(by_username.id, profile.id);
        let by_email = manager
            .verify_password("alice@example.com", "Secret123!")
            .unwrap();
        assert_eq!(by_email.id, profile.id);
    }

    #[test]
    fn register_rejects_duplicates() {
        let (_dir, manager) = new_manager();
        manager
            .register("alice", "alice@example.com", "Secret123!", default_profile())
            .unwrap();

        let same_username =
            manager.register("alice", "other@example.com", "pw1234", default_profile());
        assert!(matches!(same_username, Err(AuthError::DuplicateUsername)));

        let same_email =
            manager.register("alice2", "alice@example.com", "pw1234", default_profile());
        assert!(matches!(same_email, Err(AuthError::DuplicateEmail)));
    }

    #[test]
    fn wrong_password_and_unknown_user_are_indistinguishable() {
        let (_dir, manager) = new_manager();
        manager
            .register("alice", "alice@example.com", "Secret123!", default_profile())
            .unwrap();

        let wrong_pw = manager.verify_password("alice", "nope").unwrap_err();
        let no_user = manager.verify_password("bob", "nope").unwrap_err();
        assert_eq!(wrong_pw.to_string(), no_user.to_string());
    }

    #[test]
    fn rotation_rejects_replayed_token() {
        let (_dir, manager) = new_manager();
        let profile = manager
            .register("alice", "alice@example.com", "Secret123!", default_profile())
            .unwrap();

        manager.start_session(profile.id, "first").unwrap();
        manager.rotate_session(profile.id, "first", "second").unwrap();

        let replay = manager.rotate_session(profile.id, "first", "third");
        assert!(matches!(replay, Err(AuthError::RefreshRejected)));
    }

    #[test]
    fn logout_revokes_outstanding_refresh_tokens() {
        let (_dir, manager) = new_manager();
        let profile = manager
            .register("alice", "alice@example.com", "Secret123!", default_profile())
            .unwrap();

        manager.start_session(profile.id, "first").unwrap();
        manager.end_session(profile.id).unwrap();

        let rotate = manager.rotate_session(profile.id, "first", "second");
        assert!(matches!(rotate, Err(AuthError::RefreshRejected)));
    }

    #[test]
    fn change_password_revokes_session() {
        let (_dir, manager) = new_manager();
        let profile = manager
            .register("alice", "alice@example.com", "Secret123!", default_profile())
            .unwrap();
        manager.start_session(profile.id, "first").unwrap();

        let bad_old = manager.change_password(profile.id, "wrong", "NewSecret1!");
        assert!(matches!(bad_old, Err(AuthError::InvalidCredentials)));

        manager
            .change_password(profile.id, "Secret123!", "NewSecret1!")
            .unwrap();
        assert!(manager.verify_password("alice", "Secret123!").is_err());
        manager.verify_password("alice", "NewSecret1!").unwrap();

        let rotate = manager.rotate_session(profile.id, "first", "second");
        assert!(matches!(rotate, Err(AuthError::RefreshRejected)));
    }
}
