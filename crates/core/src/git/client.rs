//! Thin typed layer over the `git` command surface.
//!
//! [`GitCli`] pairs a [`CommandRunner`] with the configured timeouts and
//! exposes the handful of queries the worktree manager, detector and
//! resolver share.

use std::path::Path;

use tracing::{debug, instrument};

use super::runner::{CommandOutput, CommandRunner};
use crate::config::{TimeoutClass, TimeoutConfig};
use crate::errors::CommandError;

/// `git` with per-class timeouts.
#[derive(Debug, Clone)]
pub struct GitCli {
    runner: CommandRunner,
    timeouts: TimeoutConfig,
}

impl GitCli {
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self {
            runner: CommandRunner::git(),
            timeouts,
        }
    }

    pub fn timeouts(&self) -> &TimeoutConfig {
        &self.timeouts
    }

    /// Run `git args...` in `cwd` with the timeout for `class`.
    pub async fn run(
        &self,
        args: &[&str],
        cwd: &Path,
        class: TimeoutClass,
    ) -> Result<CommandOutput, CommandError> {
        self.runner
            .run(args, cwd, self.timeouts.duration(class))
            .await
    }

    /// `true` if `rev` resolves to a commit.
    pub async fn ref_exists(&self, cwd: &Path, rev: &str) -> Result<bool, CommandError> {
        let spec = format!("{rev}^{{commit}}");
        let out = self
            .run(&["rev-parse", "--verify", "--quiet", &spec], cwd, TimeoutClass::Short)
            .await?;
        Ok(out.success())
    }

    /// `true` if `refs/heads/{branch}` exists.
    pub async fn local_branch_exists(&self, cwd: &Path, branch: &str) -> Result<bool, CommandError> {
        let full = format!("refs/heads/{branch}");
        let out = self
            .run(&["show-ref", "--verify", "--quiet", &full], cwd, TimeoutClass::Short)
            .await?;
        Ok(out.success())
    }

    /// Name of the checked-out branch, or `None` for a detached HEAD.
    pub async fn current_branch(&self, cwd: &Path) -> Result<Option<String>, CommandError> {
        let out = self
            .run(&["rev-parse", "--abbrev-ref", "HEAD"], cwd, TimeoutClass::Short)
            .await?;
        let name = out.stdout_trimmed();
        if !out.success() || name.is_empty() || name == "HEAD" {
            return Ok(None);
        }
        Ok(Some(name.to_string()))
    }

    /// Common ancestor of two revisions.
    #[instrument(skip(self))]
    pub async fn merge_base(&self, cwd: &Path, a: &str, b: &str) -> Result<Option<String>, CommandError> {
        let out = self.run(&["merge-base", a, b], cwd, TimeoutClass::Short).await?;
        let sha = out.stdout_trimmed();
        if !out.success() || sha.is_empty() {
            debug!(exit_code = out.exit_code, "no merge base");
            return Ok(None);
        }
        Ok(Some(sha.to_string()))
    }

    /// Number of commits in `range` (`a..b`). `None` if git failed.
    pub async fn count_commits(&self, cwd: &Path, range: &str) -> Result<Option<u64>, CommandError> {
        let out = self
            .run(&["rev-list", "--count", range], cwd, TimeoutClass::Short)
            .await?;
        if !out.success() {
            return Ok(None);
        }
        Ok(out.stdout_trimmed().parse().ok())
    }

    /// Paths changed between two revisions (`diff --name-only from to`).
    pub async fn changed_files(
        &self,
        cwd: &Path,
        from: &str,
        to: &str,
    ) -> Result<Option<Vec<String>>, CommandError> {
        let out = self
            .run(&["diff", "--name-only", "-z", from, to], cwd, TimeoutClass::Medium)
            .await?;
        if !out.success() {
            return Ok(None);
        }
        Ok(Some(out.stdout_paths().map(str::to_string).collect()))
    }

    /// Raw bytes of `path` at `rev`, or `None` if it does not exist there.
    pub async fn show_blob(&self, cwd: &Path, rev: &str, path: &str) -> Result<Option<Vec<u8>>, CommandError> {
        let spec = format!("{rev}:{path}");
        let out = self
            .runner
            .run_raw(&["cat-file", "blob", &spec], cwd, self.timeouts.duration(TimeoutClass::Short))
            .await?;
        if !out.success() {
            return Ok(None);
        }
        Ok(Some(out.stdout))
    }

    /// Text of `path` at `rev`. Invalid UTF-8 is replaced.
    pub async fn show_file(&self, cwd: &Path, rev: &str, path: &str) -> Result<Option<String>, CommandError> {
        Ok(self
            .show_blob(cwd, rev, path)
            .await?
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()))
    }

    /// Paths with unresolved merge conflicts in the working copy at `cwd`.
    pub async fn unmerged_paths(&self, cwd: &Path) -> Result<Vec<String>, CommandError> {
        let out = self
            .run(&["diff", "--name-only", "-z", "--diff-filter=U"], cwd, TimeoutClass::Short)
            .await?;
        let mut paths: Vec<String> = out.stdout_paths().map(str::to_string).collect();
        paths.dedup();
        Ok(paths)
    }

    /// `true` while a merge is recorded (`MERGE_HEAD` exists).
    pub async fn merge_in_progress(&self, cwd: &Path) -> Result<bool, CommandError> {
        self.ref_exists(cwd, "MERGE_HEAD").await
    }
}
