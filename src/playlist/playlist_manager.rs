use super::models::{Playlist, PlaylistError, ShareLink, ShareLinkError};
use super::playlist_store::{AdmissionOutcome, PlaylistStore};
use crate::ownership::authorize_owner;
use std::sync::Arc;
use std::time::SystemTime;
use tracing::info;

pub struct PlaylistManager {
    playlist_store: Arc<dyn PlaylistStore>,
}

impl PlaylistManager {
    pub fn new(playlist_store: Arc<dyn PlaylistStore>) -> Self {
        Self { playlist_store }
    }

    /// Creates a playlist with a freshly generated share link.
    pub fn create_playlist(
        &self,
        owner_id: usize,
        name: &str,
        description: &str,
    ) -> Result<Playlist, PlaylistError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PlaylistError::Validation(
                "The playlist name cannot be empty".into(),
            ));
        }
        if self.playlist_store.playlist_name_exists(owner_id, name)? {
            return Err(PlaylistError::DuplicateName);
        }

        let share_link = ShareLink::generate();
        let playlist_id =
            self.playlist_store
                .create_playlist(owner_id, name, description, &share_link)?;
        self.playlist_store
            .get_playlist(&playlist_id)?
            .ok_or(PlaylistError::NotFound)
    }

    /// Returns a playlist for an authenticated reader: the owner or a
    /// collaborator.
    pub fn get_for_user(
        &self,
        playlist_id: &str,
        user_id: usize,
    ) -> Result<Playlist, PlaylistError> {
        let playlist = self
            .playlist_store
            .get_playlist(playlist_id)?
            .ok_or(PlaylistError::NotFound)?;
        if playlist.owner_id != user_id && !playlist.collaborators.contains(&user_id) {
            return Err(PlaylistError::Forbidden);
        }
        Ok(playlist)
    }

    /// Resolves a share token to its playlist view without consuming a use.
    /// Only admission spends invite capacity, so viewing stays retry-safe.
    pub fn view_by_share_token(&self, token: &str) -> Result<Playlist, PlaylistError> {
        let playlist = self
            .playlist_store
            .get_playlist_by_share_token(token)?
            .ok_or(PlaylistError::NotFound)?;
        playlist.share_link.validate(SystemTime::now())?;
        Ok(playlist)
    }

    /// Admits an authenticated user as collaborator through a share token.
    /// Consuming a use and adding the collaborator happen in one store
    /// transaction.
    pub fn join_by_share_token(
        &self,
        token: &str,
        user_id: usize,
    ) -> Result<Playlist, PlaylistError> {
        let playlist = self
            .playlist_store
            .get_playlist_by_share_token(token)?
            .ok_or(PlaylistError::NotFound)?;
        playlist.share_link.validate(SystemTime::now())?;

        if playlist.owner_id == user_id || playlist.collaborators.contains(&user_id) {
            return Err(PlaylistError::AlreadyMember);
        }

        match self
            .playlist_store
            .admit_collaborator(&playlist.id, user_id)?
        {
            AdmissionOutcome::Admitted => {
                info!("User {} joined playlist {}", user_id, playlist.id);
                self.playlist_store
                    .get_playlist(&playlist.id)?
                    .ok_or(PlaylistError::NotFound)
            }
            AdmissionOutcome::AlreadyMember => Err(PlaylistError::AlreadyMember),
            // The guarded consume refused between our validation and the
            // transaction; re-read the link to report the precise kind.
            AdmissionOutcome::NotConsumable => Err(self.classify_unconsumable(&playlist.id)?),
        }
    }

    /// Owner-only: replaces the share link wholesale. The previous token
    /// becomes un-lookupable.
    pub fn regenerate_share_link(
        &self,
        playlist_id: &str,
        requester_id: usize,
    ) -> Result<Playlist, PlaylistError> {
        let playlist = authorize_owner(
            self.playlist_store.get_playlist(playlist_id)?,
            requester_id,
        )?;

        let share_link = ShareLink::generate();
        self.playlist_store
            .regenerate_share_link(&playlist.id, &share_link)?;
        self.playlist_store
            .get_playlist(&playlist.id)?
            .ok_or(PlaylistError::NotFound)
    }

    fn classify_unconsumable(&self, playlist_id: &str) -> Result<PlaylistError, PlaylistError> {
        let playlist = self
            .playlist_store
            .get_playlist(playlist_id)?
            .ok_or(PlaylistError::NotFound)?;
        match playlist.share_link.validate(SystemTime::now()) {
            Err(kind) => Ok(kind.into()),
            // The link became consumable again (e.g. a concurrent
            // regenerate); ask the caller to retry with a fresh token.
            Ok(()) => Ok(ShareLinkError::Exhausted.into()),
        }
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use crate::playlist::sqlite_playlist_store::SqlitePlaylistStore;
    use tempfile::TempDir;

    const OWNER: usize = 1;
    const JOINER: usize = 2;

    fn new_manager() -> (TempDir, PlaylistManager) {
        let dir = TempDir::new().unwrap();
        let store = SqlitePlaylistStore::new(dir.path().join("playlist.db")).unwrap();
        (dir, PlaylistManager::new(Arc::new(store)))
    }

    #[test]
    fn create_rejects_duplicate_name_for_same_owner() {
        let (_dir, manager) = new_manager();
        manager.create_playlist(OWNER, "Favorites", "").unwrap();

        let dup = manager.create_playlist(OWNER, "Favorites", "");
        assert!(matches!(dup, Err(PlaylistError::DuplicateName)));

        manager.create_playlist(JOINER, "Favorites", "").unwrap();
    }

    #[test]
    fn full_share_scenario() {
        let (_dir, manager) = new_manager();
        let playlist = manager
            .create_playlist(OWNER, "Favorites", "good stuff")
            .unwrap();
        assert_eq!(playlist.share_link.uses, 0);
        assert!(playlist.share_link.active);

        let token = playlist.share_link.token.clone();
        let viewed = manager.view_by_share_token(&token).unwrap();
        // Viewing does not spend invite capacity.
        assert_eq!(viewed.share_link.uses, 0);

        let joined = manager.join_by_share_token(&token, JOINER).unwrap();
        assert_eq!(joined.collaborators, vec![JOINER]);
        assert_eq!(joined.share_link.uses, 1);

        let again = manager.join_by_share_token(&token, JOINER);
        assert!(matches!(again, Err(PlaylistError::AlreadyMember)));
    }

    #[test]
    fn owner_cannot_join_own_playlist() {
        let (_dir, manager) = new_manager();
        let playlist = manager.create_playlist(OWNER, "Favorites", "").unwrap();

        let joined = manager.join_by_share_token(&playlist.share_link.token, OWNER);
        assert!(matches!(joined, Err(PlaylistError::AlreadyMember)));
    }

    #[test]
    fn unknown_token_is_not_found() {
        let (_dir, manager) = new_manager();
        assert!(matches!(
            manager.view_by_share_token("nope"),
            Err(PlaylistError::NotFound)
        ));
        assert!(matches!(
            manager.join_by_share_token("nope", JOINER),
            Err(PlaylistError::NotFound)
        ));
    }

    #[test]
    fn regenerate_is_owner_only_and_invalidates_old_token() {
        let (_dir, manager) = new_manager();
        let playlist = manager.create_playlist(OWNER, "Favorites", "").unwrap();
        let old_token = playlist.share_link.token.clone();

        let denied = manager.regenerate_share_link(&playlist.id, JOINER);
        assert!(matches!(denied, Err(PlaylistError::Forbidden)));
        // The denied attempt changed nothing.
        manager.view_by_share_token(&old_token).unwrap();

        let regenerated = manager.regenerate_share_link(&playlist.id, OWNER).unwrap();
        assert_ne!(regenerated.share_link.token, old_token);

        assert!(matches!(
            manager.view_by_share_token(&old_token),
            Err(PlaylistError::NotFound)
        ));
    }

    #[test]
    fn get_for_user_restricts_to_owner_and_collaborators() {
        let (_dir, manager) = new_manager();
        let playlist = manager.create_playlist(OWNER, "Favorites", "").unwrap();

        manager.get_for_user(&playlist.id, OWNER).unwrap();
        let denied = manager.get_for_user(&playlist.id, JOINER);
        assert!(matches!(denied, Err(PlaylistError::Forbidden)));

        manager
            .join_by_share_token(&playlist.share_link.token, JOINER)
            .unwrap();
        manager.get_for_user(&playlist.id, JOINER).unwrap();

        assert!(matches!(
            manager.get_for_user("nope", OWNER),
            Err(PlaylistError::NotFound)
        ));
    }

    #[test]
    fn exhausted_link_reports_its_kind() {
        let (_dir, manager) = new_manager();
        let playlist = manager.create_playlist(OWNER, "Favorites", "").unwrap();
        let token = playlist.share_link.token.clone();

        // Cap the link at a single use, keeping the same token.
        let mut capped = ShareLink::generate();
        capped.max_uses = 1;
        capped.token = token.clone();
        manager
            .playlist_store
            .regenerate_share_link(&playlist.id, &capped)
            .unwrap();

        manager.join_by_share_token(&token, JOINER).unwrap();
        let third = manager.join_by_share_token(&token, 3);
        assert!(matches!(
            third,
            Err(PlaylistError::Link(ShareLinkError::Exhausted))
        ));
    }
}
