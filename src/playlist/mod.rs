mod models;
mod playlist_manager;
mod playlist_store;
mod sqlite_playlist_store;

pub use models::{
    Playlist, PlaylistError, PlaylistVideo, ShareLink, ShareLinkError, SHARE_LINK_MAX_USES,
    SHARE_LINK_TTL, SHARE_TOKEN_LENGTH,
};
pub use playlist_manager::PlaylistManager;
pub use playlist_store::{AdmissionOutcome, PlaylistStore};
pub use sqlite_playlist_store::SqlitePlaylistStore;
