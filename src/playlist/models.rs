use crate::ownership::Owned;
use rand::{rng, Rng};
use rand_distr::Alphanumeric;
use serde::Serialize;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use thiserror::Error;

pub const SHARE_TOKEN_LENGTH: usize = 16;
pub const SHARE_LINK_TTL: Duration = Duration::from_secs(30 * 24 * 60 * 60);
pub const SHARE_LINK_MAX_USES: u32 = 100;

/// A random A-z0-9 string
pub(crate) fn random_string(len: usize) -> String {
    let bytes = rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .collect::<Vec<u8>>();
    String::from_utf8_lossy(&bytes).to_string()
}

/// The three ways a resolvable share link can still refuse admission.
/// Distinct kinds, checked in a fixed order: inactive, then expired,
/// then exhausted.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ShareLinkError {
    #[error("This share link has been deactivated")]
    Inactive,
    #[error("This share link has expired")]
    Expired,
    #[error("This share link has reached its usage limit")]
    Exhausted,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShareLink {
    pub token: String,
    #[serde(rename = "expiresAt", serialize_with = "serialize_epoch")]
    pub expires_at: SystemTime,
    #[serde(rename = "maxUses")]
    pub max_uses: u32,
    pub uses: u32,
    pub active: bool,
}

fn serialize_epoch<S: serde::Serializer>(
    time: &SystemTime,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    let secs = time
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs();
    serializer.serialize_u64(secs)
}

impl ShareLink {
    /// A fresh link: cryptographically random token, 30-day expiry, usage
    /// cap of 100, zero uses, active.
    pub fn generate() -> Self {
        Self {
            token: random_string(SHARE_TOKEN_LENGTH),
            expires_at: SystemTime::now() + SHARE_LINK_TTL,
            max_uses: SHARE_LINK_MAX_USES,
            uses: 0,
            active: true,
        }
    }

    pub fn validate(&self, now: SystemTime) -> Result<(), ShareLinkError> {
        if !self.active {
            return Err(ShareLinkError::Inactive);
        }
        if now >= self.expires_at {
            return Err(ShareLinkError::Expired);
        }
        if self.uses >= self.max_uses {
            return Err(ShareLinkError::Exhausted);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PlaylistVideo {
    #[serde(rename = "videoId")]
    pub video_id: String,
    #[serde(rename = "addedBy")]
    pub added_by: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct Playlist {
    pub id: String,
    #[serde(rename = "ownerId")]
    pub owner_id: usize,
    pub name: String,
    pub description: String,
    pub videos: Vec<PlaylistVideo>,
    pub collaborators: Vec<usize>,
    #[serde(rename = "shareLink")]
    pub share_link: ShareLink,
    #[serde(skip)]
    pub created: SystemTime,
}

impl Owned for Playlist {
    fn owner_id(&self) -> usize {
        self.owner_id
    }
}

impl Owned for &Playlist {
    fn owner_id(&self) -> usize {
        self.owner_id
    }
}

#[derive(Debug, Error)]
pub enum PlaylistError {
    #[error("{0}")]
    Validation(String),
    #[error("Playlist not found")]
    NotFound,
    #[error("You do not have access to this playlist")]
    Forbidden,
    #[error("A playlist with this name already exists")]
    DuplicateName,
    #[error("Already a collaborator on this playlist")]
    AlreadyMember,
    #[error(transparent)]
    Link(#[from] ShareLinkError),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl From<crate::ownership::OwnershipError> for PlaylistError {
    fn from(err: crate::ownership::OwnershipError) -> Self {
        match err {
            crate::ownership::OwnershipError::NotFound => PlaylistError::NotFound,
            crate::ownership::OwnershipError::Forbidden => PlaylistError::Forbidden,
        }
    }
}
