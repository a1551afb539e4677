//! Typed query helpers for the `commits` and `tip` tables, and the
//! [`CommitStore`] interface the revert engine runs against.

use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::debug;

use super::schema::TIP_REF;
use super::Database;
use crate::errors::DatabaseError;
use crate::models::{CommitRecord, Disposition};

const COMMIT_COLUMNS: &str =
    "sha, committed_at, subject, disposition, reason, updated_at, linked_sha";

fn row_to_commit(row: &Row<'_>) -> rusqlite::Result<CommitRecord> {
    let disposition: String = row.get(3)?;
    Ok(CommitRecord {
        sha: row.get(0)?,
        committed_at: row.get(1)?,
        subject: row.get(2)?,
        disposition: Disposition::from_str_val(&disposition),
        reason: row.get(4)?,
        updated_at: row.get(5)?,
        linked_sha: row.get(6)?,
    })
}

// ---------------------------------------------------------------------------
// Store interface
// ---------------------------------------------------------------------------

/// The record-store operations a revert pass needs.
///
/// Implementations are expected to run inside a single durability boundary
/// (for SQLite, one transaction) so a pass is applied entirely or not at all.
pub trait CommitStore {
    /// Every record whose disposition is not `drop`, in no guaranteed order.
    fn list_candidates(&self) -> Result<Vec<CommitRecord>, DatabaseError>;

    /// Every record whose subject is exactly `subject`, dropped or not.
    fn find_by_subject(&self, subject: &str) -> Result<Vec<CommitRecord>, DatabaseError>;

    /// Set the disposition of `sha`. A `None` link leaves the stored link as
    /// it is.
    fn update_disposition(
        &self,
        sha: &str,
        disposition: Disposition,
        reason: &str,
        linked_sha: Option<&str>,
        updated_at: i64,
    ) -> Result<(), DatabaseError>;
}

/// [`CommitStore`] over a borrowed SQLite connection, usually an open
/// transaction from [`Database::transaction`].
pub struct SqliteCommitStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCommitStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl CommitStore for SqliteCommitStore<'_> {
    fn list_candidates(&self) -> Result<Vec<CommitRecord>, DatabaseError> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMMIT_COLUMNS} FROM commits WHERE disposition != ?1"
        ))?;
        let rows = stmt
            .query_map(params![Disposition::Drop.as_str()], row_to_commit)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn find_by_subject(&self, subject: &str) -> Result<Vec<CommitRecord>, DatabaseError> {
        // Bound parameters keep quotes inside subjects from altering the match.
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {COMMIT_COLUMNS} FROM commits WHERE subject = ?1
             ORDER BY committed_at, sha"
        ))?;
        let rows = stmt
            .query_map(params![subject], row_to_commit)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn update_disposition(
        &self,
        sha: &str,
        disposition: Disposition,
        reason: &str,
        linked_sha: Option<&str>,
        updated_at: i64,
    ) -> Result<(), DatabaseError> {
        let changed = self.conn.execute(
            "UPDATE commits
             SET disposition = ?1, reason = ?2, updated_at = ?3,
                 linked_sha = COALESCE(?4, linked_sha)
             WHERE sha = ?5",
            params![disposition.as_str(), reason, updated_at, linked_sha, sha],
        )?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "commit".into(),
                id: sha.to_string(),
            });
        }
        debug!(sha, %disposition, reason, "updated disposition");
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Listing filter
// ---------------------------------------------------------------------------

/// Filter for [`Database::list_commits`].
#[derive(Debug, Clone, Default)]
pub struct CommitFilter {
    /// Only records with this disposition.
    pub disposition: Option<Disposition>,
    /// Only records with this reason.
    pub reason: Option<String>,
    /// At most this many records; `None` for all.
    pub limit: Option<u32>,
}

// ---------------------------------------------------------------------------
// Query implementations
// ---------------------------------------------------------------------------

impl Database {
    // -- commits ------------------------------------------------------------

    /// Insert a commit record. Used by ingestion.
    pub fn insert_commit(&self, record: &CommitRecord) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO commits (sha, committed_at, subject, disposition, reason, updated_at, linked_sha)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.sha,
                record.committed_at,
                record.subject,
                record.disposition.as_str(),
                record.reason,
                record.updated_at,
                record.linked_sha,
            ],
        )?;
        debug!(sha = %record.sha, "inserted commit");
        Ok(())
    }

    /// Look up a single commit by SHA.
    pub fn get_commit(&self, sha: &str) -> Result<Option<CommitRecord>, DatabaseError> {
        let conn = self.conn();
        let record = conn
            .query_row(
                &format!("SELECT {COMMIT_COLUMNS} FROM commits WHERE sha = ?1"),
                params![sha],
                row_to_commit,
            )
            .optional()?;
        Ok(record)
    }

    /// List commits in commit-time order.
    pub fn list_commits(&self, filter: &CommitFilter) -> Result<Vec<CommitRecord>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMIT_COLUMNS} FROM commits
             WHERE (?1 IS NULL OR disposition = ?1)
               AND (?2 IS NULL OR reason = ?2)
             ORDER BY committed_at, sha
             LIMIT ?3"
        ))?;
        let limit = filter.limit.map(i64::from).unwrap_or(-1);
        let rows = stmt
            .query_map(
                params![
                    filter.disposition.map(|d| d.as_str()),
                    filter.reason.as_deref(),
                    limit
                ],
                row_to_commit,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Number of commits per disposition.
    pub fn count_by_disposition(&self) -> Result<Vec<(Disposition, i64)>, DatabaseError> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT disposition, COUNT(*) FROM commits GROUP BY disposition ORDER BY disposition",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let disposition: String = row.get(0)?;
                Ok((Disposition::from_str_val(&disposition), row.get(1)?))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // -- tip ----------------------------------------------------------------

    /// The most recently processed SHA, or `None` if nothing was processed.
    pub fn get_tip(&self) -> Result<Option<String>, DatabaseError> {
        let conn = self.conn();
        let sha: Option<String> = conn
            .query_row(
                "SELECT sha FROM tip WHERE ref = ?1",
                params![TIP_REF],
                |row| row.get(0),
            )
            .optional()?;
        Ok(sha.filter(|s| !s.is_empty()))
    }

    /// Record `sha` as the most recently processed commit.
    pub fn set_tip(&self, sha: &str) -> Result<(), DatabaseError> {
        let conn = self.conn();
        conn.execute(
            "INSERT INTO tip (ref, sha) VALUES (?1, ?2)
             ON CONFLICT(ref) DO UPDATE SET sha = excluded.sha",
            params![TIP_REF, sha],
        )?;
        debug!(sha, "updated tip");
        Ok(())
    }
}
