use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned_db, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
    DEFAULT_TIMESTAMP,
};
use super::models::{random_string, Playlist, PlaylistVideo, ShareLink};
use super::playlist_store::{AdmissionOutcome, PlaylistStore};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::{
    path::Path,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

const PLAYLIST_ID_LENGTH: usize = 16;

/// V 0
const PLAYLIST_TABLE_V_0: Table = Table {
    name: "playlist",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Text,
            is_primary_key = true,
            non_null = true,
            is_unique = true
        ),
        sqlite_column!("owner_id", &SqlType::Integer, non_null = true),
        sqlite_column!("name", &SqlType::Text, non_null = true),
        sqlite_column!("description", &SqlType::Text, non_null = true),
        sqlite_column!(
            "share_token",
            &SqlType::Text,
            non_null = true,
            is_unique = true
        ),
        sqlite_column!("share_expires_at", &SqlType::Integer, non_null = true),
        sqlite_column!("share_max_uses", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "share_uses",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("0")
        ),
        sqlite_column!(
            "share_active",
            &SqlType::Integer,
            non_null = true,
            default_value = Some("1")
        ),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[&["owner_id", "name"]],
    indices: &[("idx_playlist_share_token", "share_token")],
};

const PLAYLIST_VIDEO_TABLE_V_0: Table = Table {
    name: "playlist_video",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!(
            "playlist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "playlist",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("video_id", &SqlType::Text, non_null = true),
        sqlite_column!("added_by", &SqlType::Integer, non_null = true),
        sqlite_column!("position", &SqlType::Integer, non_null = true),
    ],
    unique_constraints: &[],
    indices: &[("idx_playlist_video_playlist_id", "playlist_id")],
};

const PLAYLIST_COLLABORATOR_TABLE_V_0: Table = Table {
    name: "playlist_collaborator",
    columns: &[
        sqlite_column!(
            "playlist_id",
            &SqlType::Text,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "playlist",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("user_id", &SqlType::Integer, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[&["playlist_id", "user_id"]],
    indices: &[("idx_playlist_collaborator_playlist_id", "playlist_id")],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[
        PLAYLIST_TABLE_V_0,
        PLAYLIST_VIDEO_TABLE_V_0,
        PLAYLIST_COLLABORATOR_TABLE_V_0,
    ],
    migration: None,
}];

fn epoch_secs(time: SystemTime) -> i64 {
    time.duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_secs() as i64
}

fn from_epoch_secs(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

#[derive(Clone)]
pub struct SqlitePlaylistStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqlitePlaylistStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, VERSIONED_SCHEMAS)?;
        Ok(SqlitePlaylistStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn load_playlist(conn: &Connection, where_clause: &str, param: &str) -> Result<Option<Playlist>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT id, owner_id, name, description, share_token, share_expires_at, \
             share_max_uses, share_uses, share_active, created \
             FROM {} WHERE {}",
            PLAYLIST_TABLE_V_0.name, where_clause
        ))?;
        let found = stmt
            .query_row(params![param], |row| {
                Ok(Playlist {
                    id: row.get(0)?,
                    owner_id: row.get(1)?,
                    name: row.get(2)?,
                    description: row.get(3)?,
                    videos: vec![],
                    collaborators: vec![],
                    share_link: ShareLink {
                        token: row.get(4)?,
                        expires_at: from_epoch_secs(row.get(5)?),
                        max_uses: row.get(6)?,
                        uses: row.get(7)?,
                        active: row.get::<_, i64>(8)? != 0,
                    },
                    created: from_epoch_secs(row.get(9)?),
                })
            })
            .optional()
            .context("Failed to query playlist")?;

        let mut playlist = match found {
            Some(playlist) => playlist,
            None => return Ok(None),
        };

        let mut videos_stmt = conn.prepare(&format!(
            "SELECT video_id, added_by FROM {} WHERE playlist_id = ?1 ORDER BY position",
            PLAYLIST_VIDEO_TABLE_V_0.name
        ))?;
        playlist.videos = videos_stmt
            .query_map(params![playlist.id], |row| {
                Ok(PlaylistVideo {
                    video_id: row.get(0)?,
                    added_by: row.get(1)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut collab_stmt = conn.prepare(&format!(
            "SELECT user_id FROM {} WHERE playlist_id = ?1 ORDER BY created, user_id",
            PLAYLIST_COLLABORATOR_TABLE_V_0.name
        ))?;
        playlist.collaborators = collab_stmt
            .query_map(params![playlist.id], |row| row.get(0))?
            .collect::<Result<Vec<usize>, _>>()?;

        Ok(Some(playlist))
    }
}

impl PlaylistStore for SqlitePlaylistStore {
    fn create_playlist(
        &self,
        owner_id: usize,
        name: &str,
        description: &str,
        share_link: &ShareLink,
    ) -> Result<String> {
        let conn = self.conn.lock().unwrap();
        let playlist_id = random_string(PLAYLIST_ID_LENGTH);
        conn.execute(
            &format!(
                "INSERT INTO {} (id, owner_id, name, description, share_token, \
                 share_expires_at, share_max_uses, share_uses, share_active) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                PLAYLIST_TABLE_V_0.name
            ),
            params![
                playlist_id,
                owner_id as i64,
                name,
                description,
                share_link.token,
                epoch_secs(share_link.expires_at),
                share_link.max_uses,
                share_link.uses,
                share_link.active as i64,
            ],
        )
        .with_context(|| format!("Failed to create playlist {}", name))?;
        Ok(playlist_id)
    }

    fn playlist_name_exists(&self, owner_id: usize, name: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!(
                "SELECT count(*) FROM {} WHERE owner_id = ?1 AND name = ?2",
                PLAYLIST_TABLE_V_0.name
            ),
            params![owner_id as i64, name],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_playlist(&self, playlist_id: &str) -> Result<Option<Playlist>> {
        let conn = self.conn.lock().unwrap();
        Self::load_playlist(&conn, "id = ?1", playlist_id)
    }

    fn get_playlist_by_share_token(&self, token: &str) -> Result<Option<Playlist>> {
        let conn = self.conn.lock().unwrap();
        Self::load_playlist(&conn, "share_token = ?1", token)
    }

    fn regenerate_share_link(&self, playlist_id: &str, share_link: &ShareLink) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        // Wholesale replacement: the previous token stops resolving entirely.
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET share_token = ?1, share_expires_at = ?2, \
                 share_max_uses = ?3, share_uses = ?4, share_active = ?5 WHERE id = ?6",
                PLAYLIST_TABLE_V_0.name
            ),
            params![
                share_link.token,
                epoch_secs(share_link.expires_at),
                share_link.max_uses,
                share_link.uses,
                share_link.active as i64,
                playlist_id,
            ],
        )?;
        if changed == 0 {
            anyhow::bail!("No playlist with id {}", playlist_id);
        }
        Ok(())
    }

    fn admit_collaborator(&self, playlist_id: &str, user_id: usize) -> Result<AdmissionOutcome> {
        let mut conn = self.conn.lock().unwrap();
        let tx = conn.transaction()?;

        // The guarded increment is the arbiter: concurrent admissions can
        // never jointly push uses past max_uses.
        let consumed = tx.execute(
            &format!(
                "UPDATE {} SET share_uses = share_uses + 1 \
                 WHERE id = ?1 AND share_active = 1 \
                 AND share_uses < share_max_uses AND ?2 < share_expires_at",
                PLAYLIST_TABLE_V_0.name
            ),
            params![playlist_id, epoch_secs(SystemTime::now())],
        )?;
        if consumed == 0 {
            tx.rollback()?;
            return Ok(AdmissionOutcome::NotConsumable);
        }

        let inserted = tx.execute(
            &format!(
                "INSERT INTO {} (playlist_id, user_id) VALUES (?1, ?2)",
                PLAYLIST_COLLABORATOR_TABLE_V_0.name
            ),
            params![playlist_id, user_id as i64],
        );
        match inserted {
            Ok(_) => {
                tx.commit()?;
                Ok(AdmissionOutcome::Admitted)
            }
            // Rolling back un-consumes the use taken above.
            Err(ref err) if is_unique_violation(err) => {
                tx.rollback()?;
                Ok(AdmissionOutcome::AlreadyMember)
            }
            Err(err) => {
                tx.rollback()?;
                Err(err.into())
            }
        }
    }

    fn is_collaborator(&self, playlist_id: &str, user_id: usize) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!(
                "SELECT count(*) FROM {} WHERE playlist_id = ?1 AND user_id = ?2",
                PLAYLIST_COLLABORATOR_TABLE_V_0.name
            ),
            params![playlist_id, user_id as i64],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn add_video(&self, playlist_id: &str, video_id: &str, added_by: usize) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (playlist_id, video_id, added_by, position) \
                 VALUES (?1, ?2, ?3, \
                 (SELECT count(*) FROM {} WHERE playlist_id = ?1))",
                PLAYLIST_VIDEO_TABLE_V_0.name, PLAYLIST_VIDEO_TABLE_V_0.name
            ),
            params![playlist_id, video_id, added_by as i64],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {

    use super::*;
    use tempfile::TempDir;

    fn new_store() -> (TempDir, SqlitePlaylistStore) {
        let dir = TempDir::new().unwrap();
        let store = SqlitePlaylistStore::new(dir.path().join("playlist.db")).unwrap();
        (dir, store)
    }

    fn add_playlist(store: &SqlitePlaylistStore, owner_id: usize, name: &str) -> Playlist {
        let link = ShareLink::generate();
        let id = store
            .create_playlist(owner_id, name, "a test playlist", &link)
            .unwrap();
        store.get_playlist(&id).unwrap().unwrap()
    }

    #[test]
    fn create_and_fetch_playlist() {
        let (_dir, store) = new_store();
        let playlist = add_playlist(&store, 1, "Favorites");

        assert_eq!(playlist.owner_id, 1);
        assert_eq!(playlist.name, "Favorites");
        assert_eq!(playlist.share_link.uses, 0);
        assert!(playlist.share_link.active);
        assert!(playlist.videos.is_empty());
        assert!(playlist.collaborators.is_empty());

        assert!(store.get_playlist("nope").unwrap().is_none());
        assert!(store.playlist_name_exists(1, "Favorites").unwrap());
        assert!(!store.playlist_name_exists(2, "Favorites").unwrap());
    }

    #[test]
    fn duplicate_name_per_owner_rejected() {
        let (_dir, store) = new_store();
        add_playlist(&store, 1, "Favorites");

        let link = ShareLink::generate();
        let dup = store.create_playlist(1, "Favorites", "again", &link);
        assert!(dup.is_err());

        // Same name under a different owner is fine.
        add_playlist(&store, 2, "Favorites");
    }

    #[test]
    fn share_token_resolves_until_regenerated() {
        let (_dir, store) = new_store();
        let playlist = add_playlist(&store, 1, "Favorites");
        let old_token = playlist.share_link.token.clone();

        let resolved = store.get_playlist_by_share_token(&old_token).unwrap();
        assert_eq!(resolved.unwrap().id, playlist.id);

        let new_link = ShareLink::generate();
        store.regenerate_share_link(&playlist.id, &new_link).unwrap();

        // The old token no longer maps to anything.
        assert!(store.get_playlist_by_share_token(&old_token).unwrap().is_none());
        let resolved = store.get_playlist_by_share_token(&new_link.token).unwrap();
        assert_eq!(resolved.unwrap().id, playlist.id);
    }

    #[test]
    fn regenerate_resets_usage() {
        let (_dir, store) = new_store();
        let playlist = add_playlist(&store, 1, "Favorites");
        store.admit_collaborator(&playlist.id, 2).unwrap();

        store
            .regenerate_share_link(&playlist.id, &ShareLink::generate())
            .unwrap();
        let refreshed = store.get_playlist(&playlist.id).unwrap().unwrap();
        assert_eq!(refreshed.share_link.uses, 0);
        // Collaborators admitted through the old link stay.
        assert_eq!(refreshed.collaborators, vec![2]);
    }

    #[test]
    fn admission_consumes_one_use() {
        let (_dir, store) = new_store();
        let playlist = add_playlist(&store, 1, "Favorites");

        let outcome = store.admit_collaborator(&playlist.id, 2).unwrap();
        assert_eq!(outcome, AdmissionOutcome::Admitted);

        let refreshed = store.get_playlist(&playlist.id).unwrap().unwrap();
        assert_eq!(refreshed.share_link.uses, 1);
        assert_eq!(refreshed.collaborators, vec![2]);
        assert!(store.is_collaborator(&playlist.id, 2).unwrap());
    }

    #[test]
    fn duplicate_admission_does_not_consume() {
        let (_dir, store) = new_store();
        let playlist = add_playlist(&store, 1, "Favorites");

        store.admit_collaborator(&playlist.id, 2).unwrap();
        let second = store.admit_collaborator(&playlist.id, 2).unwrap();
        assert_eq!(second, AdmissionOutcome::AlreadyMember);

        // The rolled-back transaction left the counter untouched.
        let refreshed = store.get_playlist(&playlist.id).unwrap().unwrap();
        assert_eq!(refreshed.share_link.uses, 1);
        assert_eq!(refreshed.collaborators, vec![2]);
    }

    #[test]
    fn inactive_or_expired_link_is_not_consumable() {
        let (_dir, store) = new_store();
        let playlist = add_playlist(&store, 1, "Favorites");

        let mut inactive = ShareLink::generate();
        inactive.active = false;
        store.regenerate_share_link(&playlist.id, &inactive).unwrap();
        assert_eq!(
            store.admit_collaborator(&playlist.id, 2).unwrap(),
            AdmissionOutcome::NotConsumable
        );

        let mut expired = ShareLink::generate();
        expired.expires_at = SystemTime::now() - Duration::from_secs(60);
        store.regenerate_share_link(&playlist.id, &expired).unwrap();
        assert_eq!(
            store.admit_collaborator(&playlist.id, 2).unwrap(),
            AdmissionOutcome::NotConsumable
        );

        let refreshed = store.get_playlist(&playlist.id).unwrap().unwrap();
        assert!(refreshed.collaborators.is_empty());
    }

    #[test]
    fn concurrent_admissions_never_exceed_max_uses() {
        let (_dir, store) = new_store();
        let playlist = add_playlist(&store, 1, "Favorites");

        let mut capped = ShareLink::generate();
        capped.max_uses = 2;
        store.regenerate_share_link(&playlist.id, &capped).unwrap();

        let mut handles = Vec::new();
        for user_id in 2..5 {
            let store = store.clone();
            let playlist_id = playlist.id.clone();
            handles.push(std::thread::spawn(move || {
                store.admit_collaborator(&playlist_id, user_id).unwrap()
            }));
        }
        let outcomes = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .collect::<Vec<_>>();

        let admitted = outcomes
            .iter()
            .filter(|o| **o == AdmissionOutcome::Admitted)
            .count();
        assert_eq!(admitted, 2);

        let refreshed = store.get_playlist(&playlist.id).unwrap().unwrap();
        assert_eq!(refreshed.share_link.uses, 2);
        assert_eq!(refreshed.collaborators.len(), 2);
    }

    #[test]
    fn videos_keep_insertion_order() {
        let (_dir, store) = new_store();
        let playlist = add_playlist(&store, 1, "Favorites");

        store.add_video(&playlist.id, "video-a", 1).unwrap();
        store.add_video(&playlist.id, "video-b", 1).unwrap();

        let refreshed = store.get_playlist(&playlist.id).unwrap().unwrap();
        let ids = refreshed
            .videos
            .iter()
            .map(|v| v.video_id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(ids, vec!["video-a", "video-b"]);
    }
}
