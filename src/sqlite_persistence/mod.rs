mod versioned_schema;

pub use versioned_schema::{
    Column, ForeignKey, ForeignKeyOnChange, SqlType, Table, VersionedSchema, BASE_DB_VERSION,
    DEFAULT_TIMESTAMP,
};

use anyhow::{bail, Context, Result};
use rusqlite::Connection;
use std::path::Path;
use tracing::info;

/// Opens (or creates) a SQLite database file and brings it to the latest
/// schema version in `schemas`, running migrations as needed.
pub fn open_versioned_db<T: AsRef<Path>>(
    db_path: T,
    schemas: &[VersionedSchema],
) -> Result<Connection> {
    let conn = if db_path.as_ref().exists() {
        Connection::open_with_flags(
            db_path,
            rusqlite::OpenFlags::SQLITE_OPEN_READ_WRITE
                | rusqlite::OpenFlags::SQLITE_OPEN_URI
                | rusqlite::OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?
    } else {
        let conn = Connection::open(db_path)?;
        schemas.last().context("No schemas defined")?.create(&conn)?;
        conn
    };

    let db_version = conn
        .query_row("PRAGMA user_version;", [], |row| row.get::<usize, i64>(0))
        .context("Failed to read database version")?
        - BASE_DB_VERSION as i64;

    if db_version < 0 {
        bail!(
            "Database version {} is too old, does not contain base db version {}",
            db_version,
            BASE_DB_VERSION
        );
    }
    let version = db_version as usize;

    if db_version >= schemas.len() as i64 {
        bail!("Database version {} is too new", db_version);
    }
    schemas
        .get(version)
        .context("Failed to get schema")?
        .validate(&conn)?;

    migrate_if_needed(&conn, schemas, version)?;

    Ok(conn)
}

fn migrate_if_needed(conn: &Connection, schemas: &[VersionedSchema], version: usize) -> Result<()> {
    let mut latest_from = version;
    for schema in schemas.iter().skip(version + 1) {
        if let Some(migration_fn) = schema.migration {
            info!(
                "Migrating db from version {} to {}",
                latest_from, schema.version
            );
            migration_fn(conn)?;
            latest_from = schema.version;
        }
    }
    conn.execute(
        &format!("PRAGMA user_version = {}", BASE_DB_VERSION + latest_from),
        [],
    )?;

    Ok(())
}
