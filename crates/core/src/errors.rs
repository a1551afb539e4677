//! Error types for the rebasekit core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Unparseable version strings are deliberately absent from this module:
//! they degrade to the zero key and are never reported as errors.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Git(#[from] GitError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Database(#[from] DatabaseError),

    #[error(transparent)]
    Revert(#[from] RevertError),
}

// ---------------------------------------------------------------------------
// Git errors
// ---------------------------------------------------------------------------

/// Errors from version-control queries (git2 and the `git` binary).
#[derive(Debug, Error)]
pub enum GitError {
    /// The repository path does not exist or is not a git repo.
    #[error("git repository not found at '{0}'")]
    RepositoryNotFound(String),

    /// A `git2` library error.
    #[error("git2 error: {0}")]
    Git2Error(#[from] git2::Error),

    /// The `git` binary was not found on `$PATH`.
    #[error("git binary not found: {0}")]
    BinaryNotFound(String),

    /// A `git` command exited with a non-zero status.
    #[error("git command failed (exit {exit_code}): {stderr}")]
    CommandFailed {
        exit_code: i32,
        stderr: String,
    },

    /// The command succeeded but printed something we cannot use.
    #[error("unexpected git output: {0}")]
    UnexpectedOutput(String),

    /// Generic I/O wrapper.
    #[error("git I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue {
        field: String,
        detail: String,
    },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Database errors
// ---------------------------------------------------------------------------

/// Errors from the SQLite record store.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Underlying rusqlite error.
    #[error("database error: {0}")]
    SqliteError(#[from] rusqlite::Error),

    /// The store was created by an incompatible schema version.
    #[error("database schema version {found} does not match expected {expected}; recreate the store")]
    SchemaMismatch {
        found: u32,
        expected: u32,
    },

    /// A record was not found.
    #[error("{entity} not found: {id}")]
    NotFound {
        entity: String,
        id: String,
    },

    /// Generic I/O error (e.g. file permissions).
    #[error("database I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Revert engine errors
// ---------------------------------------------------------------------------

/// Errors from a revert resolution pass.
#[derive(Debug, Error)]
pub enum RevertError {
    /// Another pass is already running on this engine.
    #[error("revert pass already in progress (started at {started_at})")]
    AlreadyRunning {
        started_at: String,
    },

    /// The record store failed; nothing from the pass was applied.
    #[error("revert pass database error: {0}")]
    DatabaseError(#[from] DatabaseError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_messages() {
        let err = GitError::RepositoryNotFound("/tmp/repo".into());
        assert_eq!(err.to_string(), "git repository not found at '/tmp/repo'");

        let err = GitError::CommandFailed {
            exit_code: 128,
            stderr: "fatal: no tag".into(),
        };
        assert_eq!(
            err.to_string(),
            "git command failed (exit 128): fatal: no tag"
        );

        let err = ConfigError::InvalidValue {
            field: "upstream.target".into(),
            detail: "not a version".into(),
        };
        assert!(err.to_string().contains("upstream.target"));

        let err = DatabaseError::SchemaMismatch {
            found: 0,
            expected: 1,
        };
        assert!(err.to_string().contains("recreate"));

        let err = RevertError::AlreadyRunning {
            started_at: "2026-01-01T00:00:00Z".into(),
        };
        assert!(err.to_string().contains("already in progress"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let git_err = GitError::UnexpectedOutput(String::new());
        let core_err: CoreError = git_err.into();
        assert!(matches!(core_err, CoreError::Git(_)));

        let db_err = DatabaseError::NotFound {
            entity: "commit".into(),
            id: "abc".into(),
        };
        let core_err: CoreError = db_err.into();
        assert!(matches!(core_err, CoreError::Database(_)));
    }
}
