//! TOML-based configuration for rebasekit.
//!
//! The configuration names the record store, the downstream working copy and
//! the branch whose nearest tag is the baseline, and the upstream working copy
//! together with the version being rebased onto.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::errors::ConfigError;
use crate::version::VersionKey;

/// Target selector meaning "whatever upstream is currently tagged at".
pub const TARGET_LATEST: &str = "latest";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level application configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Storage and logging settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// The branch being rebased.
    pub downstream: DownstreamConfig,

    /// The tree being rebased onto.
    pub upstream: UpstreamConfig,
}

// ---------------------------------------------------------------------------
// General
// ---------------------------------------------------------------------------

/// Storage and logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Directory holding record stores (default `database`).
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// File name of the record store inside `data_dir`.
    #[serde(default = "default_database")]
    pub database: String,

    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("database")
}
fn default_database() -> String {
    "rebase-latest.db".into()
}
fn default_log_level() -> String {
    "info".into()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            database: default_database(),
            log_level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Downstream
// ---------------------------------------------------------------------------

/// Downstream working copy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownstreamConfig {
    /// Local working copy. If it does not exist there is no baseline yet.
    pub path: PathBuf,

    /// Branch whose nearest tag is the baseline (e.g. `chromeos-5.44`).
    pub baseline_branch: String,

    /// Prefix of per-series downstream branches (`<prefix>-<series>`).
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
}

fn default_branch_prefix() -> String {
    "chromeos".into()
}

// ---------------------------------------------------------------------------
// Upstream
// ---------------------------------------------------------------------------

/// Upstream working copy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Local working copy. If it does not exist the target is `HEAD`.
    pub path: PathBuf,

    /// `latest` to follow upstream's nearest tag, or an explicit version.
    #[serde(default = "default_target")]
    pub target: String,

    /// Stable branch name pattern; `{series}` is replaced by `MAJOR.MINOR`.
    #[serde(default = "default_stable_branch_format")]
    pub stable_branch_format: String,
}

fn default_target() -> String {
    TARGET_LATEST.into()
}
fn default_stable_branch_format() -> String {
    "linux-{series}.y".into()
}

// ---------------------------------------------------------------------------
// Loading & derived values
// ---------------------------------------------------------------------------

impl AppConfig {
    /// Load an [`AppConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: AppConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.general.database.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "general.database".into(),
                detail: "database file name must not be empty".into(),
            });
        }
        if self.downstream.baseline_branch.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "downstream.baseline_branch".into(),
                detail: "baseline branch must not be empty".into(),
            });
        }
        if self.upstream.target.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "upstream.target".into(),
                detail: "target must be 'latest' or a version such as 'v5.54'".into(),
            });
        }
        if !self.follows_latest() && VersionKey::try_parse(&self.upstream.target).is_none() {
            return Err(ConfigError::InvalidValue {
                field: "upstream.target".into(),
                detail: format!(
                    "'{}' is neither 'latest' nor a version",
                    self.upstream.target
                ),
            });
        }
        if !self.upstream.stable_branch_format.contains("{series}") {
            return Err(ConfigError::InvalidValue {
                field: "upstream.stable_branch_format".into(),
                detail: "pattern must contain '{series}'".into(),
            });
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Whether the target follows upstream's nearest tag.
    pub fn follows_latest(&self) -> bool {
        self.upstream.target == TARGET_LATEST
    }

    /// Path of the main record store.
    pub fn database_path(&self) -> PathBuf {
        self.general.data_dir.join(&self.general.database)
    }

    /// Path of the record store kept for one downstream release series.
    pub fn series_database_path(&self, series: &str) -> PathBuf {
        self.general
            .data_dir
            .join(format!("{}.db", self.downstream_branch(series)))
    }

    /// Downstream branch carrying `series`, e.g. `chromeos-5.4`.
    pub fn downstream_branch(&self, series: &str) -> String {
        format!("{}-{}", self.downstream.branch_prefix, series)
    }

    /// Upstream stable branch carrying `series`, e.g. `linux-5.4.y`.
    pub fn stable_branch(&self, series: &str) -> String {
        self.upstream
            .stable_branch_format
            .replace("{series}", series)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[general]
data_dir = "/tmp/rebasekit"
database = "rebase-5.54.db"
log_level = "debug"

[downstream]
path = "bluez-chrome"
baseline_branch = "chromeos-5.44"
branch_prefix = "chromeos"

[upstream]
path = "bluez-upstream"
target = "v5.54"
stable_branch_format = "stable-{series}"
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: AppConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.general.log_level, "debug");
        assert_eq!(config.downstream.baseline_branch, "chromeos-5.44");
        assert_eq!(config.upstream.target, "v5.54");
        assert!(!config.follows_latest());
        config.validate().unwrap();
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rebasekit.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = AppConfig::load_and_validate(&path).expect("load failed");
        assert_eq!(config.upstream.path, PathBuf::from("bluez-upstream"));
    }

    #[test]
    fn test_file_not_found() {
        let result = AppConfig::load_from_file("/nonexistent/rebasekit.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "[downstream\npath = ").unwrap();
        assert!(matches!(
            AppConfig::load_from_file(&path),
            Err(ConfigError::ParseError(_))
        ));
    }

    #[test]
    fn test_defaults() {
        let minimal = r#"
[downstream]
path = "down"
baseline_branch = "chromeos-5.44"
[upstream]
path = "up"
"#;
        let config: AppConfig = toml::from_str(minimal).unwrap();
        assert_eq!(config.general.data_dir, PathBuf::from("database"));
        assert_eq!(config.general.database, "rebase-latest.db");
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.downstream.branch_prefix, "chromeos");
        assert_eq!(config.upstream.target, TARGET_LATEST);
        assert!(config.follows_latest());
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_bad_target() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.upstream.target = "tip-of-tree".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "upstream.target"
        ));

        config.upstream.target = "5.54".into();
        config.validate().unwrap();
    }

    #[test]
    fn test_validate_rejects_empty_branch() {
        let mut config: AppConfig = toml::from_str(sample_toml()).unwrap();
        config.downstream.baseline_branch = String::new();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "downstream.baseline_branch"
        ));
    }

    #[test]
    fn test_derived_names() {
        let config: AppConfig = toml::from_str(sample_toml()).unwrap();
        assert_eq!(
            config.database_path(),
            PathBuf::from("/tmp/rebasekit/rebase-5.54.db")
        );
        assert_eq!(config.downstream_branch("5.4"), "chromeos-5.4");
        assert_eq!(
            config.series_database_path("5.4"),
            PathBuf::from("/tmp/rebasekit/chromeos-5.4.db")
        );
        assert_eq!(config.stable_branch("5.4"), "stable-5.4");
    }
}
