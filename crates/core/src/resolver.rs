//! Baseline and target resolution.
//!
//! The baseline is the newest version already shipped on the downstream
//! branch; the target is the upstream version being rebased onto. Both come
//! from `git describe` output run through the version codec. Any failure to
//! query a repository degrades to "unknown" (`None` for the baseline, `HEAD`
//! for the target) and is never returned to the caller.

use std::cell::OnceCell;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::config::{AppConfig, TARGET_LATEST};
use crate::git::{GitDescriber, TagDescriber};
use crate::version::{compare_included, version_token};

/// Target used when upstream is unavailable or carries no version tag.
pub const TARGET_HEAD: &str = "HEAD";

/// Whether `version` is already part of `reference`. Either side missing
/// means "not included".
pub fn is_included(version: Option<&str>, reference: Option<&str>) -> bool {
    match (version, reference) {
        (Some(version), Some(reference)) if !version.is_empty() && !reference.is_empty() => {
            compare_included(version, reference)
        }
        _ => false,
    }
}

/// Resolves baseline and target tags for one run.
///
/// Results are computed on first use and then reused for the lifetime of the
/// resolver.
pub struct Resolver<D = GitDescriber> {
    downstream_path: PathBuf,
    baseline_branch: String,
    upstream_path: PathBuf,
    target: String,
    describer: D,
    baseline_cache: OnceCell<Option<String>>,
    target_cache: OnceCell<String>,
}

impl Resolver<GitDescriber> {
    /// Resolver over the working copies named in `config`.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            &config.downstream.path,
            &config.downstream.baseline_branch,
            &config.upstream.path,
            &config.upstream.target,
            GitDescriber,
        )
    }
}

impl<D: TagDescriber> Resolver<D> {
    pub fn new(
        downstream_path: impl AsRef<Path>,
        baseline_branch: impl Into<String>,
        upstream_path: impl AsRef<Path>,
        target: impl Into<String>,
        describer: D,
    ) -> Self {
        Self {
            downstream_path: downstream_path.as_ref().to_path_buf(),
            baseline_branch: baseline_branch.into(),
            upstream_path: upstream_path.as_ref().to_path_buf(),
            target: target.into(),
            describer,
            baseline_cache: OnceCell::new(),
            target_cache: OnceCell::new(),
        }
    }

    /// Most recent tag on the downstream baseline branch, e.g. `v5.44.3`.
    pub fn baseline(&self) -> Option<String> {
        self.baseline_cache
            .get_or_init(|| self.resolve_baseline())
            .clone()
    }

    /// The baseline reduced to its `MAJOR.MINOR` series, e.g. `v5.44`.
    pub fn baseline_series(&self) -> Option<String> {
        let baseline = self.baseline()?;
        let mut parts = baseline.split('.');
        match (parts.next(), parts.next()) {
            (Some(major), Some(minor)) => Some(format!("{major}.{minor}")),
            _ => {
                warn!(%baseline, "baseline tag has no MAJOR.MINOR series");
                None
            }
        }
    }

    /// The upstream version being rebased onto, or [`TARGET_HEAD`].
    pub fn target(&self) -> String {
        self.target_cache
            .get_or_init(|| self.resolve_target())
            .clone()
    }

    /// The target without its leading `v`.
    pub fn target_version(&self) -> String {
        let target = self.target();
        match target.strip_prefix('v') {
            Some(rest) => rest.to_string(),
            None => target,
        }
    }

    /// First upstream version tag whose history contains `sha`.
    pub fn integrated_tag(&self, sha: &str) -> Option<String> {
        match self.describer.describe_contains(&self.upstream_path, sha) {
            Ok(text) => {
                let tag = version_token(&text).map(str::to_string);
                debug!(sha, ?tag, "resolved integrated tag");
                tag
            }
            Err(e) => {
                debug!(sha, error = %e, "no integrated tag");
                None
            }
        }
    }

    /// Whether `version` is already in the downstream baseline.
    pub fn is_in_baseline(&self, version: Option<&str>) -> bool {
        is_included(version, self.baseline().as_deref())
    }

    /// Whether `version` is already in the rebase target.
    pub fn is_in_target(&self, version: Option<&str>) -> bool {
        is_included(version, Some(self.target().as_str()))
    }

    fn resolve_baseline(&self) -> Option<String> {
        if !self.downstream_path.exists() {
            info!(path = %self.downstream_path.display(), "no downstream working copy, no baseline");
            return None;
        }

        match self
            .describer
            .describe(&self.downstream_path, &self.baseline_branch)
        {
            Ok(text) => {
                let tag = text.trim().split('-').next().unwrap_or_default();
                if tag.is_empty() {
                    warn!(branch = %self.baseline_branch, "empty describe output");
                    return None;
                }
                info!(branch = %self.baseline_branch, tag, "resolved baseline");
                Some(tag.to_string())
            }
            Err(e) => {
                warn!(branch = %self.baseline_branch, error = %e, "failed to describe baseline branch");
                None
            }
        }
    }

    fn resolve_target(&self) -> String {
        if !self.upstream_path.exists() {
            info!(path = %self.upstream_path.display(), "no upstream working copy, targeting HEAD");
            return TARGET_HEAD.to_string();
        }

        if self.target != TARGET_LATEST {
            return self.target.clone();
        }

        match self.describer.describe(&self.upstream_path, "HEAD") {
            Ok(text) => match version_token(&text) {
                Some(tag) => {
                    info!(tag, "resolved latest upstream target");
                    tag.to_string()
                }
                None => {
                    warn!(%text, "upstream describe has no version, targeting HEAD");
                    TARGET_HEAD.to_string()
                }
            },
            Err(e) => {
                warn!(error = %e, "failed to describe upstream, targeting HEAD");
                TARGET_HEAD.to_string()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::GitError;
    use std::cell::Cell;
    use std::collections::HashMap;

    #[derive(Default)]
    struct CannedDescriber {
        describe: HashMap<String, String>,
        contains: HashMap<String, String>,
        calls: Cell<usize>,
    }

    impl CannedDescriber {
        fn with_describe(mut self, rev: &str, out: &str) -> Self {
            self.describe.insert(rev.into(), out.into());
            self
        }

        fn with_contains(mut self, sha: &str, out: &str) -> Self {
            self.contains.insert(sha.into(), out.into());
            self
        }
    }

    fn failed() -> GitError {
        GitError::CommandFailed {
            exit_code: 128,
            stderr: "fatal: No names found".into(),
        }
    }

    impl TagDescriber for CannedDescriber {
        fn describe(&self, _repo_path: &Path, rev: &str) -> Result<String, GitError> {
            self.calls.set(self.calls.get() + 1);
            self.describe.get(rev).cloned().ok_or_else(failed)
        }

        fn describe_contains(&self, _repo_path: &Path, sha: &str) -> Result<String, GitError> {
            self.contains.get(sha).cloned().ok_or_else(failed)
        }
    }

    fn resolver(
        dir: &Path,
        target: &str,
        describer: CannedDescriber,
    ) -> Resolver<CannedDescriber> {
        Resolver::new(dir, "chromeos-5.44", dir, target, describer)
    }

    #[test]
    fn test_baseline_from_describe() {
        let dir = tempfile::tempdir().unwrap();
        let describer =
            CannedDescriber::default().with_describe("chromeos-5.44", "v5.44.3-120-gabcdef0\n");
        let r = resolver(dir.path(), TARGET_LATEST, describer);

        assert_eq!(r.baseline().as_deref(), Some("v5.44.3"));
        assert_eq!(r.baseline_series().as_deref(), Some("v5.44"));
    }

    #[test]
    fn test_baseline_is_cached() {
        let dir = tempfile::tempdir().unwrap();
        let describer = CannedDescriber::default().with_describe("chromeos-5.44", "v5.44");
        let r = resolver(dir.path(), TARGET_LATEST, describer);

        r.baseline();
        r.baseline();
        r.baseline_series();
        assert_eq!(r.describer.calls.get(), 1);
    }

    #[test]
    fn test_baseline_missing_repo() {
        let r = resolver(
            Path::new("/nonexistent/downstream"),
            TARGET_LATEST,
            CannedDescriber::default().with_describe("chromeos-5.44", "v5.44"),
        );
        assert_eq!(r.baseline(), None);
        assert_eq!(r.baseline_series(), None);
        assert_eq!(r.describer.calls.get(), 0);
    }

    #[test]
    fn test_baseline_describe_failure() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), TARGET_LATEST, CannedDescriber::default());
        assert_eq!(r.baseline(), None);
        assert!(!r.is_in_baseline(Some("v5.1")));
    }

    #[test]
    fn test_target_latest() {
        let dir = tempfile::tempdir().unwrap();
        let describer = CannedDescriber::default().with_describe("HEAD", "v5.54-rc2-17-g0123abc\n");
        let r = resolver(dir.path(), TARGET_LATEST, describer);
        assert_eq!(r.target(), "v5.54-rc2");
        assert_eq!(r.target_version(), "5.54-rc2");
    }

    #[test]
    fn test_target_latest_without_version() {
        let dir = tempfile::tempdir().unwrap();
        let describer = CannedDescriber::default().with_describe("HEAD", "nightly-3-g0123abc");
        let r = resolver(dir.path(), TARGET_LATEST, describer);
        assert_eq!(r.target(), TARGET_HEAD);
    }

    #[test]
    fn test_target_latest_describe_failure() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), TARGET_LATEST, CannedDescriber::default());
        assert_eq!(r.target(), TARGET_HEAD);
        assert_eq!(r.target_version(), TARGET_HEAD);
    }

    #[test]
    fn test_target_explicit() {
        let dir = tempfile::tempdir().unwrap();
        let r = resolver(dir.path(), "v5.54", CannedDescriber::default());
        assert_eq!(r.target(), "v5.54");
        assert_eq!(r.target_version(), "5.54");
        assert_eq!(r.describer.calls.get(), 0);
    }

    #[test]
    fn test_target_missing_repo() {
        let r = resolver(
            Path::new("/nonexistent/upstream"),
            "v5.54",
            CannedDescriber::default(),
        );
        assert_eq!(r.target(), TARGET_HEAD);
        assert!(!r.is_in_target(Some("v5.1")));
    }

    #[test]
    fn test_inclusion_checks() {
        let dir = tempfile::tempdir().unwrap();
        let describer = CannedDescriber::default().with_describe("chromeos-5.44", "v5.44-3-gabc");
        let r = resolver(dir.path(), "v5.54", describer);

        assert!(r.is_in_baseline(Some("v5.44")));
        assert!(r.is_in_baseline(Some("v5.44-rc1")));
        assert!(!r.is_in_baseline(Some("v5.45")));
        assert!(!r.is_in_baseline(None));

        assert!(r.is_in_target(Some("v5.50")));
        assert!(!r.is_in_target(Some("v5.55-rc1")));
        assert!(!r.is_in_target(Some("")));
    }

    #[test]
    fn test_is_included() {
        assert!(is_included(Some("v5.4"), Some("v5.4")));
        assert!(!is_included(None, Some("v5.4")));
        assert!(!is_included(Some("v5.4"), None));
        assert!(!is_included(Some(""), Some("v5.4")));
        assert!(!is_included(Some("v5.4"), Some(TARGET_HEAD)));
    }

    #[test]
    fn test_integrated_tag() {
        let dir = tempfile::tempdir().unwrap();
        let describer = CannedDescriber::default().with_contains("abc123", "v5.4-rc1~12^2~3\n");
        let r = resolver(dir.path(), TARGET_LATEST, describer);

        assert_eq!(r.integrated_tag("abc123").as_deref(), Some("v5.4-rc1"));
        assert_eq!(r.integrated_tag("unknown"), None);
    }

    #[test]
    fn test_from_config_against_real_repos() {
        use crate::git::client::tests::{commit_file, tag};
        use git2::Repository;

        let dir = tempfile::tempdir().unwrap();
        let down = dir.path().join("down");
        let up = dir.path().join("up");

        let repo = Repository::init(&down).unwrap();
        let oid = commit_file(&repo, "a.txt", "base");
        tag(&repo, "v5.44.2", oid);
        let head = commit_file(&repo, "b.txt", "carried");
        repo.branch("chromeos-5.44", &repo.find_commit(head).unwrap(), false)
            .unwrap();

        let repo = Repository::init(&up).unwrap();
        let oid = commit_file(&repo, "a.txt", "upstream");
        tag(&repo, "v5.54", oid);
        commit_file(&repo, "b.txt", "later");

        let toml = format!(
            r#"
[downstream]
path = "{}"
baseline_branch = "chromeos-5.44"
[upstream]
path = "{}"
"#,
            down.display(),
            up.display()
        );
        let config: AppConfig = toml::from_str(&toml).unwrap();
        let r = Resolver::from_config(&config);

        assert_eq!(r.baseline().as_deref(), Some("v5.44.2"));
        assert_eq!(r.baseline_series().as_deref(), Some("v5.44"));
        assert_eq!(r.target(), "v5.54");
        assert!(r.is_in_target(Some("v5.44.2")));
    }
}
