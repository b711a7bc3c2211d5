use super::error::ApiError;
use super::state::ServerState;
use crate::user::UserProfile;

use axum::{extract::FromRequestParts, http::request::Parts};
use axum_extra::extract::cookie::{Cookie, CookieJar};
use tracing::debug;

pub const COOKIE_ACCESS_TOKEN_KEY: &str = "accessToken";
pub const COOKIE_REFRESH_TOKEN_KEY: &str = "refreshToken";
pub const AUTHORIZATION_HEADER: &str = "Authorization";
const BEARER_PREFIX: &str = "Bearer ";

/// Authenticated request identity: the verified user id plus the loaded
/// profile (never the password hash or refresh token).
#[derive(Debug)]
pub struct Session {
    pub user_id: usize,
    pub profile: UserProfile,
}

async fn extract_access_token_from_cookies(
    parts: &mut Parts,
    ctx: &ServerState,
) -> Option<String> {
    CookieJar::from_request_parts(parts, ctx)
        .await
        .ok()?
        .get(COOKIE_ACCESS_TOKEN_KEY)
        .map(Cookie::value)
        .map(|s| s.to_string())
}

fn extract_access_token_from_headers(parts: &mut Parts) -> Option<String> {
    let value = parts.headers.get(AUTHORIZATION_HEADER)?.to_str().ok()?;
    Some(value.strip_prefix(BEARER_PREFIX).unwrap_or(value).to_string())
}

async fn extract_session_from_request_parts(
    parts: &mut Parts,
    ctx: &ServerState,
) -> Option<Session> {
    let token = match extract_access_token_from_cookies(parts, ctx)
        .await
        .or_else(|| extract_access_token_from_headers(parts))
    {
        None => {
            debug!("No access token in cookies nor headers.");
            return None;
        }
        Some(x) => x,
    };

    let user_id = match ctx.token_issuer.verify_access(&token) {
        Ok(user_id) => user_id,
        Err(err) => {
            debug!("Access token rejected: {}", err);
            return None;
        }
    };

    match ctx.user_manager.get_profile(user_id) {
        Ok(Some(profile)) => Some(Session { user_id, profile }),
        Ok(None) => {
            debug!("Access token subject {} no longer exists", user_id);
            None
        }
        Err(err) => {
            debug!("Failed to load user {}: {}", user_id, err);
            None
        }
    }
}

impl FromRequestParts<ServerState> for Session {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        ctx: &ServerState,
    ) -> Result<Self, Self::Rejection> {
        extract_session_from_request_parts(parts, ctx)
            .await
            .ok_or(ApiError::Unauthenticated)
    }
}
