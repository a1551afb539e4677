//! Revert resolution.
//!
//! A pass scans every commit not yet dropped, looking for subjects of the
//! form `Revert "<subject>"`. For each such revert:
//!
//! 1. Find the commit with exactly `<subject>` committed most recently before
//!    the revert. Repeated revert/re-apply cycles pair each revert with the
//!    closest preceding application.
//! 2. If there is none, mark the revert `pick` with reason `revisit` so a
//!    human looks at it. Unmatched reverts are never dropped automatically.
//! 3. Otherwise mark both commits `drop`/`reverted`, each linked to the other,
//!    and drop every `FIXUP: <subject>` committed between the two (inclusive)
//!    as `fixup/reverted`, linked to the reverted commit.
//!
//! Dropped commits are never reconsidered, so running a pass again on the
//! same store changes nothing. All writes from one pass go through a single
//! transaction.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, OnceLock};

use chrono::{DateTime, Utc};
use regex_lite::Regex;
use tracing::{debug, info, warn};

use crate::db::{CommitStore, Database, SqliteCommitStore};
use crate::errors::{DatabaseError, RevertError};
use crate::models::{
    CommitRecord, Disposition, RevertReport, REASON_FIXUP_REVERTED, REASON_REVERTED,
    REASON_REVISIT,
};

/// Prefix of a fixup commit's subject.
pub const FIXUP_PREFIX: &str = "FIXUP: ";

fn revert_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"Revert "(.*)""#)
            .unwrap_or_else(|e| panic!("revert pattern failed to compile: {e}"))
    })
}

/// The subject quoted by a revert commit, if `subject` announces one.
///
/// The quoted part is matched greedily, so the revert of a revert yields the
/// inner revert's full subject.
pub fn reverted_subject(subject: &str) -> Option<&str> {
    revert_regex()
        .captures(subject)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Subject of a fixup to the commit with subject `original`.
pub fn fixup_subject(original: &str) -> String {
    format!("{FIXUP_PREFIX}{original}")
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Runs revert passes against one record store.
pub struct RevertEngine {
    db: Database,
    /// Start time of the pass in progress, if any.
    current_pass: Mutex<Option<DateTime<Utc>>>,
}

impl RevertEngine {
    pub fn new(db: Database) -> Self {
        Self {
            db,
            current_pass: Mutex::new(None),
        }
    }

    /// Return a reference to the database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Give the store handle back.
    pub fn into_db(self) -> Database {
        self.db
    }

    /// Run one full pass inside a single transaction.
    ///
    /// On error the transaction is rolled back and no disposition from the
    /// pass is kept.
    pub fn run(&self) -> Result<RevertReport, RevertError> {
        {
            let mut current = self.current_pass();
            if let Some(started_at) = *current {
                return Err(RevertError::AlreadyRunning {
                    started_at: started_at.to_rfc3339(),
                });
            }
            *current = Some(Utc::now());
        }
        let _guard = PassGuard(self);

        let now = Utc::now().timestamp();
        let report = self
            .db
            .transaction(|conn| resolve_reverts(&SqliteCommitStore::new(conn), now))?;

        info!(
            scanned = report.scanned,
            reverts = report.reverts_found,
            pairs = report.pairs_dropped,
            fixups = report.fixups_dropped,
            revisits = report.revisits,
            updates = report.updates,
            "revert pass complete"
        );
        Ok(report)
    }
}

impl RevertEngine {
    fn current_pass(&self) -> MutexGuard<'_, Option<DateTime<Utc>>> {
        self.current_pass
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

/// Clears the pass in progress when it ends, including by panic.
struct PassGuard<'a>(&'a RevertEngine);

impl Drop for PassGuard<'_> {
    fn drop(&mut self) {
        *self.0.current_pass() = None;
    }
}

// ---------------------------------------------------------------------------
// Pass
// ---------------------------------------------------------------------------

/// One revert pass over `store`, stamping changed rows with `now`.
///
/// The caller owns the durability boundary: everything written here should
/// be committed together or discarded together.
pub fn resolve_reverts<S: CommitStore>(store: &S, now: i64) -> Result<RevertReport, DatabaseError> {
    let mut report = RevertReport::default();

    let mut candidates = store.list_candidates()?;
    candidates.sort_by(|a, b| {
        a.committed_at
            .cmp(&b.committed_at)
            .then_with(|| a.sha.cmp(&b.sha))
    });

    // Commits dropped earlier in this pass are terminal too.
    let mut dropped: HashSet<String> = HashSet::new();

    for revert in &candidates {
        if dropped.contains(&revert.sha) {
            continue;
        }
        report.scanned += 1;

        let Some(original) = reverted_subject(&revert.subject) else {
            continue;
        };
        report.reverts_found += 1;
        info!(sha = %revert.sha, subject = %revert.subject, "found revert");

        let history = store.find_by_subject(original)?;
        let Some(reverted) = closest_preceding(&history, revert.committed_at) else {
            warn!(sha = %revert.sha, original, "no matching commit found");
            if mark(store, revert, Disposition::Pick, REASON_REVISIT, None, now, &mut report)? {
                report.revisits += 1;
            }
            continue;
        };

        mark(
            store,
            reverted,
            Disposition::Drop,
            REASON_REVERTED,
            Some(revert.sha.as_str()),
            now,
            &mut report,
        )?;
        mark(
            store,
            revert,
            Disposition::Drop,
            REASON_REVERTED,
            Some(reverted.sha.as_str()),
            now,
            &mut report,
        )?;
        dropped.insert(reverted.sha.clone());
        dropped.insert(revert.sha.clone());
        report.pairs_dropped += 1;

        // A fixup only matters while its target is live.
        let window = reverted.committed_at..=revert.committed_at;
        for fixup in store.find_by_subject(&fixup_subject(original))? {
            if !window.contains(&fixup.committed_at) {
                debug!(sha = %fixup.sha, "fixup outside revert window");
                continue;
            }
            // Keeps the link of a fixup that was itself reverted.
            if fixup.is_terminal() {
                debug!(sha = %fixup.sha, reason = %fixup.reason, "fixup already dropped");
                continue;
            }
            if mark(
                store,
                &fixup,
                Disposition::Drop,
                REASON_FIXUP_REVERTED,
                Some(reverted.sha.as_str()),
                now,
                &mut report,
            )? {
                report.fixups_dropped += 1;
            }
            dropped.insert(fixup.sha);
        }
    }

    Ok(report)
}

/// The record committed latest but strictly before `before`. Ties keep the
/// first record in `history`.
fn closest_preceding(history: &[CommitRecord], before: i64) -> Option<&CommitRecord> {
    history
        .iter()
        .filter(|r| r.committed_at < before)
        .fold(None, |best: Option<&CommitRecord>, r| match best {
            Some(b) if b.committed_at >= r.committed_at => Some(b),
            _ => Some(r),
        })
}

/// Write a disposition unless the record already carries it, returning
/// whether anything was written. A `None` link keeps whatever link the record
/// has.
fn mark<S: CommitStore>(
    store: &S,
    record: &CommitRecord,
    disposition: Disposition,
    reason: &str,
    linked_sha: Option<&str>,
    now: i64,
    report: &mut RevertReport,
) -> Result<bool, DatabaseError> {
    let linked_sha = linked_sha.or(record.linked_sha.as_deref());
    if record.has_disposition(disposition, reason, linked_sha) {
        debug!(sha = %record.sha, %disposition, reason, "disposition unchanged");
        return Ok(false);
    }

    info!(sha = %record.sha, %disposition, reason, linked = ?linked_sha, "marking commit");
    store.update_disposition(&record.sha, disposition, reason, linked_sha, now)?;
    report.updates += 1;
    Ok(true)
}
