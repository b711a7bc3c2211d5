//! Vidstream identity & authorization server library
//!
//! Exposes the internal modules for testing and reuse.

pub mod ownership;
pub mod playlist;
pub mod server;
pub mod sqlite_persistence;
pub mod token;
pub mod user;

pub use playlist::{PlaylistManager, PlaylistStore, SqlitePlaylistStore};
pub use server::{run_server, RequestsLoggingLevel};
pub use token::TokenIssuer;
pub use user::{SqliteUserStore, UserManager, UserStore};
