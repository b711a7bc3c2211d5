//! Single rendering boundary for all API failures

use crate::playlist::{PlaylistError, ShareLinkError};
use crate::token::TokenError;
use crate::user::AuthError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;

#[derive(Debug)]
pub enum ApiError {
    Validation(String),
    /// Every token-verification failure cause (absent, expired, malformed,
    /// wrong signature, user vanished, replayed refresh) renders the same
    /// way, so responses never act as a verification oracle.
    Unauthenticated,
    Forbidden,
    NotFound(String),
    Conflict(String),
    LinkInactive,
    LinkExpired,
    LinkExhausted,
    Internal(anyhow::Error),
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, String) {
        match self {
            ApiError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::Unauthenticated => {
                (StatusCode::UNAUTHORIZED, "Unauthenticated".to_string())
            }
            ApiError::Forbidden => (StatusCode::FORBIDDEN, "Forbidden".to_string()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone()),
            ApiError::LinkInactive => (
                StatusCode::FORBIDDEN,
                ShareLinkError::Inactive.to_string(),
            ),
            ApiError::LinkExpired => {
                (StatusCode::FORBIDDEN, ShareLinkError::Expired.to_string())
            }
            ApiError::LinkExhausted => (
                StatusCode::FORBIDDEN,
                ShareLinkError::Exhausted.to_string(),
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref err) = self {
            error!("Internal error: {:#}", err);
        }
        let (status, message) = self.status_and_message();
        let body = json!({
            "success": false,
            "statusCode": status.as_u16(),
            "message": message,
        });
        (status, Json(body)).into_response()
    }
}

impl From<anyhow::Error> for ApiError {
    fn from(err: anyhow::Error) -> Self {
        ApiError::Internal(err)
    }
}

impl From<TokenError> for ApiError {
    fn from(_: TokenError) -> Self {
        ApiError::Unauthenticated
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(msg) => ApiError::Validation(msg),
            AuthError::DuplicateUsername | AuthError::DuplicateEmail => {
                ApiError::Conflict(err.to_string())
            }
            AuthError::InvalidCredentials
            | AuthError::RefreshRejected
            | AuthError::UnknownUser => ApiError::Unauthenticated,
            AuthError::Internal(e) => ApiError::Internal(e),
        }
    }
}

impl From<PlaylistError> for ApiError {
    fn from(err: PlaylistError) -> Self {
        match err {
            PlaylistError::Validation(msg) => ApiError::Validation(msg),
            PlaylistError::NotFound => ApiError::NotFound(err.to_string()),
            PlaylistError::Forbidden => ApiError::Forbidden,
            PlaylistError::DuplicateName | PlaylistError::AlreadyMember => {
                ApiError::Conflict(err.to_string())
            }
            PlaylistError::Link(ShareLinkError::Inactive) => ApiError::LinkInactive,
            PlaylistError::Link(ShareLinkError::Expired) => ApiError::LinkExpired,
            PlaylistError::Link(ShareLinkError::Exhausted) => ApiError::LinkExhausted,
            PlaylistError::Internal(e) => ApiError::Internal(e),
        }
    }
}
