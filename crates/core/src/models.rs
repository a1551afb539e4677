//! Domain model types used throughout rebasekit.
//!
//! These types bridge the revert engine, the record store, and the CLI.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Disposition
// ---------------------------------------------------------------------------

/// Whether a commit is carried into the rebased branch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Not classified yet.
    #[default]
    Unset,
    Pick,
    Drop,
}

impl Disposition {
    /// Parse the stored column value. Anything unrecognised is `Unset`.
    pub fn from_str_val(s: &str) -> Self {
        match s {
            "pick" => Self::Pick,
            "drop" => Self::Drop,
            _ => Self::Unset,
        }
    }

    /// The value stored in the `disposition` column.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unset => "",
            Self::Pick => "pick",
            Self::Drop => "drop",
        }
    }
}

impl std::fmt::Display for Disposition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unset => write!(f, "unset"),
            other => write!(f, "{}", other.as_str()),
        }
    }
}

// ---------------------------------------------------------------------------
// Reasons
// ---------------------------------------------------------------------------

/// Reason recorded on both halves of a cancelled revert pair.
pub const REASON_REVERTED: &str = "reverted";

/// Reason recorded on a fixup whose target was reverted.
pub const REASON_FIXUP_REVERTED: &str = "fixup/reverted";

/// Reason recorded on a revert whose target is not in the history.
pub const REASON_REVISIT: &str = "revisit";

// ---------------------------------------------------------------------------
// Commit record
// ---------------------------------------------------------------------------

/// One commit under review, as stored in the `commits` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitRecord {
    pub sha: String,
    /// Commit time, seconds since the epoch.
    pub committed_at: i64,
    pub subject: String,
    pub disposition: Disposition,
    pub reason: String,
    /// Seconds since the epoch of the last disposition change.
    pub updated_at: i64,
    /// The commit this one reverts or is reverted by.
    pub linked_sha: Option<String>,
}

impl CommitRecord {
    /// A freshly ingested, unclassified commit.
    pub fn new(sha: impl Into<String>, committed_at: i64, subject: impl Into<String>) -> Self {
        Self {
            sha: sha.into(),
            committed_at,
            subject: subject.into(),
            disposition: Disposition::Unset,
            reason: String::new(),
            updated_at: 0,
            linked_sha: None,
        }
    }

    /// Whether the record already carries exactly this disposition.
    pub fn has_disposition(
        &self,
        disposition: Disposition,
        reason: &str,
        linked_sha: Option<&str>,
    ) -> bool {
        self.disposition == disposition
            && self.reason == reason
            && self.linked_sha.as_deref() == linked_sha
    }

    /// Dropped by an earlier revert pass; such records are never revisited.
    pub fn is_terminal(&self) -> bool {
        self.disposition == Disposition::Drop
            && (self.reason == REASON_REVERTED || self.reason == REASON_FIXUP_REVERTED)
    }
}

// ---------------------------------------------------------------------------
// Revert pass report
// ---------------------------------------------------------------------------

/// Counters collected over one revert resolution pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevertReport {
    /// Candidate records examined.
    pub scanned: usize,
    /// Candidates whose subject announces a revert.
    pub reverts_found: usize,
    /// Reverts matched to their reverted commit.
    pub pairs_dropped: usize,
    /// Fixups dropped along with a reverted commit.
    pub fixups_dropped: usize,
    /// Reverts with no matching commit, left for manual review.
    pub revisits: usize,
    /// Rows actually written.
    pub updates: usize,
}
