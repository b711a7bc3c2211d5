use super::models::{Playlist, ShareLink};
use anyhow::Result;

/// Result of the transactional consume-and-admit operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionOutcome {
    /// One use consumed and the user added as collaborator.
    Admitted,
    /// The user was already a collaborator; nothing consumed.
    AlreadyMember,
    /// The conditional consume did not apply (inactive, expired or
    /// exhausted); nothing changed.
    NotConsumable,
}

pub trait PlaylistStore: Send + Sync {
    /// Creates a playlist with the given share link and returns its id.
    fn create_playlist(
        &self,
        owner_id: usize,
        name: &str,
        description: &str,
        share_link: &ShareLink,
    ) -> Result<String>;

    /// Returns true if the owner already has a playlist with this name.
    fn playlist_name_exists(&self, owner_id: usize, name: &str) -> Result<bool>;

    /// Returns the playlist with videos and collaborators attached.
    /// Returns Ok(None) if the playlist does not exist.
    fn get_playlist(&self, playlist_id: &str) -> Result<Option<Playlist>>;

    /// Resolves a playlist by its current share token.
    /// Returns Ok(None) if no playlist carries this token; a regenerated
    /// link's previous token resolves to nothing.
    fn get_playlist_by_share_token(&self, token: &str) -> Result<Option<Playlist>>;

    /// Replaces the playlist's share link wholesale with `share_link`.
    fn regenerate_share_link(&self, playlist_id: &str, share_link: &ShareLink) -> Result<()>;

    /// Atomically consumes one share-link use and adds the user as a
    /// collaborator, in a single transaction. A failed collaborator insert
    /// never leaves a consumed use, and vice versa.
    fn admit_collaborator(&self, playlist_id: &str, user_id: usize) -> Result<AdmissionOutcome>;

    /// Returns true if the user is a collaborator on the playlist.
    fn is_collaborator(&self, playlist_id: &str, user_id: usize) -> Result<bool>;

    /// Appends a video to the playlist.
    fn add_video(&self, playlist_id: &str, video_id: &str, added_by: usize) -> Result<()>;
}
