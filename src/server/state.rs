use axum::extract::FromRef;

use crate::playlist::PlaylistManager;
use crate::token::TokenIssuer;
use crate::user::UserManager;
use std::sync::Arc;
use std::time::Instant;

use super::ServerConfig;

pub type GuardedUserManager = Arc<UserManager>;
pub type GuardedPlaylistManager = Arc<PlaylistManager>;
pub type GuardedTokenIssuer = Arc<TokenIssuer>;

#[derive(Clone)]
pub struct ServerState {
    pub config: ServerConfig,
    pub start_time: Instant,
    pub user_manager: GuardedUserManager,
    pub playlist_manager: GuardedPlaylistManager,
    pub token_issuer: GuardedTokenIssuer,
    pub hash: String,
}

impl FromRef<ServerState> for GuardedUserManager {
    fn from_ref(input: &ServerState) -> Self {
        input.user_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedPlaylistManager {
    fn from_ref(input: &ServerState) -> Self {
        input.playlist_manager.clone()
    }
}

impl FromRef<ServerState> for GuardedTokenIssuer {
    fn from_ref(input: &ServerState) -> Self {
        input.token_issuer.clone()
    }
}

impl FromRef<ServerState> for ServerConfig {
    fn from_ref(input: &ServerState) -> Self {
        input.config.clone()
    }
}
