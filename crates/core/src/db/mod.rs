//! SQLite record store for rebasekit.
//!
//! Provides a [`Database`] handle over the `commits` and `tip` tables. Stores
//! are built by [`Database::recreate`] and opened by [`Database::new`], which
//! refuses files built with a different schema layout.

pub mod queries;
pub mod schema;

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::Connection;
use tracing::{debug, info};

use crate::errors::DatabaseError;

pub use queries::{CommitFilter, CommitStore, SqliteCommitStore};

/// Main database handle wrapping a SQLite connection.
///
/// The inner connection is wrapped in a `Mutex` so that `Database` is
/// `Send + Sync`. This does not make concurrent revert passes safe: callers
/// must run at most one pass against a store at a time.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open an existing record store at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        info!(path = %path.display(), "opening record store");

        if !path.exists() {
            return Err(DatabaseError::NotFound {
                entity: "record store".into(),
                id: path.display().to_string(),
            });
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;
        schema::verify_schema(&conn)?;

        debug!("record store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Destroy any store at `path` and build an empty one in its place.
    ///
    /// The parent directory is created if it does not exist yet.
    pub fn recreate<P: AsRef<Path>>(path: P) -> Result<Self, DatabaseError> {
        let path = path.as_ref();
        info!(path = %path.display(), "recreating record store");

        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                std::fs::create_dir_all(dir)?;
            }
        }

        match std::fs::remove_file(path) {
            Ok(()) => debug!("removed previous record store"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }

        let conn = Connection::open(path)?;
        schema::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Build an empty in-memory store (useful for testing).
    pub fn in_memory() -> Result<Self, DatabaseError> {
        let conn = Connection::open_in_memory()?;
        schema::create_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Obtain a lock on the underlying connection.
    ///
    /// Prefer using the typed query methods on [`Database`] over raw SQL
    /// whenever possible.
    ///
    /// If the Mutex is poisoned (a previous holder panicked), the lock is
    /// recovered rather than propagating a panic.
    pub fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| {
            tracing::warn!("database mutex was poisoned, recovering");
            poisoned.into_inner()
        })
    }

    /// Execute a closure inside a SQLite transaction. If the closure returns
    /// `Ok`, the transaction is committed; otherwise it is rolled back.
    pub fn transaction<F, T>(&self, f: F) -> Result<T, DatabaseError>
    where
        F: FnOnce(&Connection) -> Result<T, DatabaseError>,
    {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let result = f(&tx)?;
        tx.commit()?;
        Ok(result)
    }
}
