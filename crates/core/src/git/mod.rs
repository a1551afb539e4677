//! Version-control queries for rebasekit.

pub mod client;

pub use client::{GitClient, GitDescriber, TagDescriber};
