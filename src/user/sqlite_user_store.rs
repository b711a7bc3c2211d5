use crate::sqlite_column;
use crate::sqlite_persistence::{
    open_versioned_db, Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema,
    DEFAULT_TIMESTAMP,
};
use crate::user::auth::VidstreamHasher;
use crate::user::user_models::{ProfileFields, User, UserProfile};
use crate::user::user_store::{RefreshSwapOutcome, UserStore};
use anyhow::{Context, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::{
    path::Path,
    str::FromStr,
    sync::{Arc, Mutex},
    time::{Duration, SystemTime, UNIX_EPOCH},
};

/// V 0
const USER_TABLE_V_0: Table = Table {
    name: "user",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!("username", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("email", &SqlType::Text, non_null = true, is_unique = true),
        sqlite_column!("password_hash", &SqlType::Text, non_null = true),
        sqlite_column!("salt", &SqlType::Text, non_null = true),
        sqlite_column!("hasher", &SqlType::Text, non_null = true),
        sqlite_column!("avatar", &SqlType::Text, non_null = true),
        sqlite_column!("cover_image", &SqlType::Text),
        // NULL means no live session.
        sqlite_column!("refresh_token", &SqlType::Text),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
        sqlite_column!(
            "updated",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[
        ("idx_user_username", "username"),
        ("idx_user_email", "email"),
    ],
};

const WATCH_HISTORY_TABLE_V_0: Table = Table {
    name: "watch_history",
    columns: &[
        sqlite_column!(
            "id",
            &SqlType::Integer,
            is_primary_key = true,
            is_unique = true
        ),
        sqlite_column!(
            "user_id",
            &SqlType::Integer,
            non_null = true,
            foreign_key = Some(&ForeignKey {
                foreign_table: "user",
                foreign_column: "id",
                on_delete: ForeignKeyOnChange::Cascade,
            })
        ),
        sqlite_column!("video_id", &SqlType::Text, non_null = true),
        sqlite_column!(
            "created",
            &SqlType::Integer,
            default_value = Some(DEFAULT_TIMESTAMP)
        ),
    ],
    unique_constraints: &[],
    indices: &[("idx_watch_history_user_id", "user_id")],
};

pub const VERSIONED_SCHEMAS: &[VersionedSchema] = &[VersionedSchema {
    version: 0,
    tables: &[USER_TABLE_V_0, WATCH_HISTORY_TABLE_V_0],
    migration: None,
}];

fn epoch_to_system_time(secs: i64) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(secs.max(0) as u64)
}

fn row_to_user(row: &rusqlite::Row) -> rusqlite::Result<(User, String)> {
    let hasher_name: String = row.get(5)?;
    Ok((
        User {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            password_salt: row.get(4)?,
            hasher: VidstreamHasher::Argon2,
            avatar: row.get(6)?,
            cover_image: row.get(7)?,
            refresh_token: row.get(8)?,
            created: epoch_to_system_time(row.get(9)?),
            updated: epoch_to_system_time(row.get(10)?),
        },
        hasher_name,
    ))
}

const USER_COLUMNS: &str =
    "id, username, email, password_hash, salt, hasher, avatar, cover_image, refresh_token, created, updated";

#[derive(Clone)]
pub struct SqliteUserStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUserStore {
    pub fn new<T: AsRef<Path>>(db_path: T) -> Result<Self> {
        let conn = open_versioned_db(db_path, VERSIONED_SCHEMAS)?;
        Ok(SqliteUserStore {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn select_user(&self, where_clause: &str, param: &dyn rusqlite::ToSql) -> Result<Option<User>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM {} WHERE {}",
            USER_COLUMNS, USER_TABLE_V_0.name, where_clause
        ))?;
        let found = stmt
            .query_row(&[param] as &[&dyn rusqlite::ToSql], row_to_user)
            .optional()
            .context("Failed to query user")?;
        match found {
            Some((mut user, hasher_name)) => {
                user.hasher = VidstreamHasher::from_str(&hasher_name)?;
                Ok(Some(user))
            }
            None => Ok(None),
        }
    }
}

impl UserStore for SqliteUserStore {
    fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
        salt: &str,
        hasher: &VidstreamHasher,
        profile: &ProfileFields,
    ) -> Result<usize> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (username, email, password_hash, salt, hasher, avatar, cover_image) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                USER_TABLE_V_0.name
            ),
            params![
                username,
                email,
                password_hash,
                salt,
                hasher.to_string(),
                profile.avatar,
                profile.cover_image,
            ],
        )
        .with_context(|| format!("Failed to create user {}", username))?;
        Ok(conn.last_insert_rowid() as usize)
    }

    fn get_user(&self, user_id: usize) -> Result<Option<User>> {
        self.select_user("id = ?1", &(user_id as i64))
    }

    fn get_user_by_handle(&self, handle: &str) -> Result<Option<User>> {
        self.select_user("username = ?1 OR email = ?1", &handle)
    }

    fn username_exists(&self, username: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!(
                "SELECT count(*) FROM {} WHERE username = ?1",
                USER_TABLE_V_0.name
            ),
            params![username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn email_exists(&self, email: &str) -> Result<bool> {
        let conn = self.conn.lock().unwrap();
        let count: i64 = conn.query_row(
            &format!(
                "SELECT count(*) FROM {} WHERE email = ?1",
                USER_TABLE_V_0.name
            ),
            params![email],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn get_user_profile(&self, user_id: usize) -> Result<Option<UserProfile>> {
        let user = match self.get_user(user_id)? {
            Some(user) => user,
            None => return Ok(None),
        };
        let watch_history = self.get_watch_history(user_id)?;
        Ok(Some(user.profile(watch_history)))
    }

    fn set_refresh_token(&self, user_id: usize, token: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET refresh_token = ?1, updated = {} WHERE id = ?2",
                USER_TABLE_V_0.name, DEFAULT_TIMESTAMP
            ),
            params![token, user_id as i64],
        )?;
        if changed == 0 {
            anyhow::bail!("No user with id {}", user_id);
        }
        Ok(())
    }

    fn swap_refresh_token(
        &self,
        user_id: usize,
        presented: &str,
        new_token: &str,
    ) -> Result<RefreshSwapOutcome> {
        let conn = self.conn.lock().unwrap();
        // The conditional UPDATE is the arbiter of concurrent rotations:
        // the changed-row count decides who won.
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET refresh_token = ?1, updated = {} \
                 WHERE id = ?2 AND refresh_token = ?3",
                USER_TABLE_V_0.name, DEFAULT_TIMESTAMP
            ),
            params![new_token, user_id as i64, presented],
        )?;
        if changed == 1 {
            return Ok(RefreshSwapOutcome::Swapped);
        }
        let exists: i64 = conn.query_row(
            &format!(
                "SELECT count(*) FROM {} WHERE id = ?1",
                USER_TABLE_V_0.name
            ),
            params![user_id as i64],
            |row| row.get(0),
        )?;
        if exists == 0 {
            Ok(RefreshSwapOutcome::NoSuchUser)
        } else {
            Ok(RefreshSwapOutcome::Mismatch)
        }
    }

    fn clear_refresh_token(&self, user_id: usize) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "UPDATE {} SET refresh_token = NULL, updated = {} WHERE id = ?1",
                USER_TABLE_V_0.name, DEFAULT_TIMESTAMP
            ),
            params![user_id as i64],
        )?;
        Ok(())
    }

    fn update_password(
        &self,
        user_id: usize,
        password_hash: &str,
        salt: &str,
        hasher: &VidstreamHasher,
    ) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        let changed = conn.execute(
            &format!(
                "UPDATE {} SET password_hash = ?1, salt = ?2, hasher = ?3, updated = {} \
                 WHERE id = ?4",
                USER_TABLE_V_0.name, DEFAULT_TIMESTAMP
            ),
            params![password_hash, salt, hasher.to_string(), user_id as i64],
        )?;
        if changed == 0 {
            anyhow::bail!("No user with id {}", user_id);
        }
        Ok(())
    }

    fn record_watch(&self, user_id: usize, video_id: &str) -> Result<()> {
        let conn = self.conn.lock().unwrap();
        conn.execute(
            &format!(
                "INSERT INTO {} (user_id, video_id) VALUES (?1, ?2)",
                WATCH_HISTORY_TABLE_V_0.name
            ),
            params![user_id as i64, video_id],
        )?;
        Ok(())
    }

    fn get_watch_history(&self, user_id: usize) -> Result<Vec<String>> {
        let conn = self.conn.lock().unwrap();
        let mut stmt = conn.prepare(&format!(
            "SELECT video_id FROM {} WHERE user_id = ?1 ORDER BY id DESC",
            WATCH_HISTORY_TABLE_V_0.name
        ))?;
        let history = stmt
            .query_map(params![user_id as i64], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(history)
    }
}
