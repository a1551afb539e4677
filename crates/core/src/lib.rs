//! rebasekit core library.
//!
//! This crate tracks the commits being curated for a downstream rebase and
//! decides which of them to keep: version parsing and ordering, baseline and
//! target resolution against local working copies, the SQLite record store,
//! and the revert resolution engine.

pub mod config;
pub mod db;
pub mod errors;
pub mod git;
pub mod models;
pub mod resolver;
pub mod revert;
pub mod version;

// Re-exports for convenience.
pub use config::AppConfig;
pub use db::Database;
pub use models::{CommitRecord, Disposition, RevertReport};
pub use resolver::Resolver;
pub use revert::RevertEngine;
pub use version::VersionKey;
