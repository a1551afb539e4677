//! Record store schema.
//!
//! The store is never migrated in place: it is dropped and rebuilt from
//! scratch by [`create_schema`]. The SQLite `user_version` pragma records which
//! layout a file was built with so a stale store is rejected on open.

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::DatabaseError;

/// Layout version written to `user_version` by [`create_schema`].
pub const SCHEMA_VERSION: u32 = 1;

/// Reference id of the single processed-pointer row in `tip`.
pub const TIP_REF: i64 = 1;

const SCHEMA: &str = r#"
    DROP TABLE IF EXISTS commits;
    DROP TABLE IF EXISTS tip;

    CREATE TABLE commits (
        sha           TEXT PRIMARY KEY,
        committed_at  INTEGER NOT NULL,
        subject       TEXT    NOT NULL,
        disposition   TEXT    NOT NULL DEFAULT '',
        reason        TEXT    NOT NULL DEFAULT '',
        updated_at    INTEGER NOT NULL DEFAULT 0,
        linked_sha    TEXT
    );

    CREATE INDEX idx_commits_subject ON commits (subject);
    CREATE INDEX idx_commits_disposition ON commits (disposition);

    -- Row ref=1 holds the most recently processed SHA.
    CREATE TABLE tip (
        ref  INTEGER PRIMARY KEY,
        sha  TEXT NOT NULL
    );
"#;

/// Drop and rebuild every table, leaving an empty processed pointer.
pub fn create_schema(conn: &Connection) -> Result<(), DatabaseError> {
    info!(version = SCHEMA_VERSION, "creating record store schema");
    conn.execute_batch(SCHEMA)?;
    conn.execute(
        "INSERT INTO tip (ref, sha) VALUES (?1, '')",
        rusqlite::params![TIP_REF],
    )?;
    set_schema_version(conn, SCHEMA_VERSION)?;
    debug!("record store schema created");
    Ok(())
}

/// Fail unless the store was built by this version of [`create_schema`].
pub fn verify_schema(conn: &Connection) -> Result<(), DatabaseError> {
    let found = get_schema_version(conn)?;
    if found != SCHEMA_VERSION {
        return Err(DatabaseError::SchemaMismatch {
            found,
            expected: SCHEMA_VERSION,
        });
    }
    Ok(())
}

/// Read the current schema version from the SQLite `user_version` pragma.
fn get_schema_version(conn: &Connection) -> Result<u32, DatabaseError> {
    let version: u32 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    Ok(version)
}

/// Set the schema version via the SQLite `user_version` pragma.
fn set_schema_version(conn: &Connection, version: u32) -> Result<(), DatabaseError> {
    conn.pragma_update(None, "user_version", version)?;
    Ok(())
}
