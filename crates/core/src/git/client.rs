//! Tag queries against a local Git repository.
//!
//! Nearest-tag descriptions go through `git2`. libgit2 has no equivalent of
//! `git describe --contains`, so that query shells out to the `git` binary.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use git2::{DescribeFormatOptions, DescribeOptions, Repository};
use tracing::{debug, info, instrument, warn};

use crate::errors::GitError;

/// Thin wrapper around a `git2::Repository` exposing the tag queries the
/// resolver needs.
pub struct GitClient {
    repo: Repository,
    repo_path: PathBuf,
}

impl GitClient {
    /// Open an existing Git repository at `repo_path`.
    pub fn new<P: AsRef<Path>>(repo_path: P) -> Result<Self, GitError> {
        let path = repo_path.as_ref();
        debug!(path = %path.display(), "opening git repository");
        let repo = Repository::open(path)
            .map_err(|_| GitError::RepositoryNotFound(path.display().to_string()))?;
        Ok(Self {
            repo,
            repo_path: path.to_path_buf(),
        })
    }

    /// Equivalent of `git describe <rev>`: the nearest annotated tag reachable
    /// from `rev`, in `TAG[-N-gHASH]` form.
    #[instrument(skip(self), fields(path = %self.repo_path.display()))]
    pub fn describe(&self, rev: &str) -> Result<String, GitError> {
        let object = self.repo.revparse_single(rev)?;
        let description = object.describe(&DescribeOptions::new())?;
        let text = description.format(Some(&DescribeFormatOptions::new()))?;
        debug!(%text, "described revision");
        Ok(text)
    }

    /// Equivalent of `git describe --match 'v*' --contains <sha>`: the first
    /// version tag whose history includes `sha`, e.g. `v5.4-rc1~12^2~3`.
    #[instrument(skip(self), fields(path = %self.repo_path.display()))]
    pub fn describe_contains(&self, sha: &str) -> Result<String, GitError> {
        let output = self.run_git(&["describe", "--match", "v*", "--contains", sha])?;
        let text = output.trim().to_string();
        if text.is_empty() {
            return Err(GitError::UnexpectedOutput(format!(
                "empty describe output for {sha}"
            )));
        }
        Ok(text)
    }

    fn run_git(&self, args: &[&str]) -> Result<String, GitError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(&self.repo_path)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        debug!(cmd = ?format!("git {}", args.join(" ")), "running git command");
        let output = cmd.output().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                GitError::BinaryNotFound("git".into())
            } else {
                GitError::IoError(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let exit_code = output.status.code().unwrap_or(-1);
            warn!(exit_code, %stderr, "git command failed");
            return Err(GitError::CommandFailed { exit_code, stderr });
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }
}

/// Source of tag descriptions for a repository path.
///
/// The resolver depends on this rather than on [`GitClient`] so that callers
/// and tests can substitute canned output.
pub trait TagDescriber {
    /// Nearest tag reachable from `rev`, `TAG[-N-gHASH]`.
    fn describe(&self, repo_path: &Path, rev: &str) -> Result<String, GitError>;

    /// Nearest version tag containing `sha`.
    fn describe_contains(&self, repo_path: &Path, sha: &str) -> Result<String, GitError>;
}

/// [`TagDescriber`] backed by the local repositories on disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitDescriber;

impl TagDescriber for GitDescriber {
    fn describe(&self, repo_path: &Path, rev: &str) -> Result<String, GitError> {
        GitClient::new(repo_path)?.describe(rev)
    }

    fn describe_contains(&self, repo_path: &Path, sha: &str) -> Result<String, GitError> {
        let client = GitClient::new(repo_path)?;
        let text = client.describe_contains(sha)?;
        info!(sha, %text, "found containing tag");
        Ok(text)
    }
}
