//! Signed access/refresh token pairs

use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

/// Short-lived, stateless credential attached to every authenticated request.
pub const ACCESS_TOKEN_TTL: Duration = Duration::from_secs(15 * 60);
/// Long-lived credential, persisted as the user's session-of-record.
pub const REFRESH_TOKEN_TTL: Duration = Duration::from_secs(10 * 24 * 60 * 60);

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token has expired")]
    Expired,
    #[error("Invalid token")]
    Invalid,
}

/// Minimal claims: who, when minted, when dead. Everything else lives in
/// the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenClaims {
    pub sub: String,
    pub iat: u64,
    pub exp: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct TokenPair {
    #[serde(rename = "accessToken")]
    pub access_token: String,
    #[serde(rename = "refreshToken")]
    pub refresh_token: String,
}

/// Mints and verifies the two token families with distinct secrets, so a
/// refresh token can never pass as an access token or vice versa.
pub struct TokenIssuer {
    access_encoding: EncodingKey,
    access_decoding: DecodingKey,
    refresh_encoding: EncodingKey,
    refresh_decoding: DecodingKey,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

fn now_epoch() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs()
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = true;
    // Default leeway would keep a token alive past its expiry.
    validation.leeway = 0;
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation
}

impl TokenIssuer {
    pub fn new(access_secret: &str, refresh_secret: &str) -> Self {
        Self::with_ttls(
            access_secret,
            refresh_secret,
            ACCESS_TOKEN_TTL,
            REFRESH_TOKEN_TTL,
        )
    }

    pub fn with_ttls(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> Self {
        Self {
            access_encoding: EncodingKey::from_secret(access_secret.as_bytes()),
            access_decoding: DecodingKey::from_secret(access_secret.as_bytes()),
            refresh_encoding: EncodingKey::from_secret(refresh_secret.as_bytes()),
            refresh_decoding: DecodingKey::from_secret(refresh_secret.as_bytes()),
            access_ttl,
            refresh_ttl,
        }
    }

    /// Mints a fresh access+refresh pair for the user. The caller is
    /// responsible for persisting the refresh token as the session-of-record.
    pub fn issue(&self, user_id: usize) -> anyhow::Result<TokenPair> {
        let now = now_epoch();
        let access = self.sign(user_id, now, self.access_ttl, &self.access_encoding)?;
        let refresh = self.sign(user_id, now, self.refresh_ttl, &self.refresh_encoding)?;
        Ok(TokenPair {
            access_token: access,
            refresh_token: refresh,
        })
    }

    fn sign(
        &self,
        user_id: usize,
        now: u64,
        ttl: Duration,
        key: &EncodingKey,
    ) -> anyhow::Result<String> {
        let claims = TokenClaims {
            sub: user_id.to_string(),
            iat: now,
            exp: now + ttl.as_secs(),
        };
        Ok(encode(&Header::new(Algorithm::HS256), &claims, key)?)
    }

    /// Verifies an access token and returns the subject user id.
    pub fn verify_access(&self, token: &str) -> Result<usize, TokenError> {
        Self::verify(token, &self.access_decoding)
    }

    /// Verifies a refresh token's signature and expiry. Whether it is still
    /// the live session credential is a separate, store-backed check.
    pub fn verify_refresh(&self, token: &str) -> Result<usize, TokenError> {
        Self::verify(token, &self.refresh_decoding)
    }

    fn verify(token: &str, key: &DecodingKey) -> Result<usize, TokenError> {
        let data = decode::<TokenClaims>(token, key, &validation()).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid,
        })?;
        data.claims.sub.parse().map_err(|_| TokenError::Invalid)
    }
}
