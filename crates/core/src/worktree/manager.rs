//! Per-task worktree lifecycle management.
//!
//! Every task gets its own branch `autoclaude/{task_id}` checked out in its
//! own directory `{root}/.autoclaude/worktrees/tasks/{task_id}`, so tasks
//! never share a working tree. The primary working copy is only touched by
//! [`WorktreeManager::merge_worktree`], which is serialized by a merge lock.

use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use regex_lite::Regex;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn, Instrument};

use super::stats::{parse_name_status, parse_shortstat};
use crate::config::{ReconcileConfig, TimeoutClass};
use crate::errors::{CoreError, WorktreeError};
use crate::file_policy::LockFilePolicy;
use crate::git::{CommandOutput, GitCli, GitHubCli, PullRequest, PullRequestOptions};
use crate::models::{
    ChangedFile, MergeOutcome, PushAndPrOutcome, WorktreeRecord, WorktreeState, WorktreeStats,
};

/// Branch namespace owned by this tool.
pub const BRANCH_PREFIX: &str = "autoclaude";

/// Branch name for a task.
pub fn branch_name(task_id: &str) -> String {
    format!("{BRANCH_PREFIX}/{task_id}")
}

fn task_id_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9._-]+$").expect("static regex"))
}

/// Reject task ids that are unsafe as a directory name or a ref component.
pub fn validate_task_id(task_id: &str) -> Result<(), WorktreeError> {
    let invalid = |reason: &str| WorktreeError::InvalidTaskId {
        task_id: task_id.to_string(),
        reason: reason.to_string(),
    };
    if !task_id_re().is_match(task_id) {
        return Err(invalid("only letters, digits, '.', '_' and '-' are allowed"));
    }
    if task_id.starts_with('.') || task_id.ends_with('.') || task_id.contains("..") {
        return Err(invalid("must not start or end with '.' or contain '..'"));
    }
    if task_id.ends_with(".lock") {
        return Err(invalid("must not end with '.lock'"));
    }
    Ok(())
}

/// Options for [`WorktreeManager::merge_worktree`].
#[derive(Debug, Clone)]
pub struct MergeOptions {
    /// Commit the merge. When `false` the merge is left staged.
    pub commit: bool,
    /// Merge commit message. Defaults to `autoclaude: merge {branch}`.
    pub message: Option<String>,
    /// Remove the worktree after a successful merge.
    pub cleanup: bool,
}

impl Default for MergeOptions {
    fn default() -> Self {
        Self {
            commit: true,
            message: None,
            cleanup: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns the worktrees of one repository.
///
/// Clones share the merge lock, so one manager (or its clones) should be
/// used per repository root.
#[derive(Debug, Clone)]
pub struct WorktreeManager {
    project_dir: PathBuf,
    config: ReconcileConfig,
    git: GitCli,
    github: GitHubCli,
    lock_policy: LockFilePolicy,
    merge_lock: Arc<Mutex<()>>,
}

impl WorktreeManager {
    pub fn new(project_dir: impl Into<PathBuf>, config: ReconcileConfig) -> Self {
        let git = GitCli::new(config.timeouts.clone());
        let github = GitHubCli::new(config.timeouts.clone());
        Self::with_clients(project_dir, config, git, github)
    }

    /// Build with explicit command clients.
    pub fn with_clients(
        project_dir: impl Into<PathBuf>,
        config: ReconcileConfig,
        git: GitCli,
        github: GitHubCli,
    ) -> Self {
        let project_dir = project_dir.into();
        info!(project_dir = %project_dir.display(), "initializing worktree manager");
        let lock_policy = LockFilePolicy::from(&config.merge);
        Self {
            project_dir,
            config,
            git,
            github,
            lock_policy,
            merge_lock: Arc::new(Mutex::new(())),
        }
    }

    pub fn project_dir(&self) -> &Path {
        &self.project_dir
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    pub fn git(&self) -> &GitCli {
        &self.git
    }

    /// `{root}/{metadata_dir}/worktrees/tasks`.
    pub fn tasks_dir(&self) -> PathBuf {
        self.project_dir
            .join(&self.config.worktree.metadata_dir)
            .join("worktrees")
            .join("tasks")
    }

    pub fn worktree_path(&self, task_id: &str) -> PathBuf {
        self.tasks_dir().join(task_id)
    }

    async fn git_in_root(&self, args: &[&str], class: TimeoutClass) -> Result<CommandOutput, WorktreeError> {
        Ok(self.git.run(args, &self.project_dir, class).await?)
    }

    // -----------------------------------------------------------------------
    // Base branch
    // -----------------------------------------------------------------------

    /// The branch tasks fork from and merge into.
    ///
    /// Order: configured override (if it exists), then `main`, then
    /// `master`, then whatever is checked out.
    #[instrument(skip(self))]
    pub async fn detect_base_branch(&self) -> Result<String, WorktreeError> {
        if let Some(branch) = &self.config.worktree.base_branch {
            if self.git.local_branch_exists(&self.project_dir, branch).await? {
                return Ok(branch.clone());
            }
            warn!(branch = %branch, "configured base branch does not exist, auto-detecting");
        }

        for candidate in ["main", "master"] {
            if self.git.local_branch_exists(&self.project_dir, candidate).await? {
                debug!(branch = candidate, "detected base branch");
                return Ok(candidate.to_string());
            }
        }

        match self.git.current_branch(&self.project_dir).await? {
            Some(branch) => {
                warn!(branch = %branch, "no main or master branch, using current branch as base");
                Ok(branch)
            }
            None => {
                warn!("HEAD is detached and no main or master branch exists, assuming 'main'");
                Ok("main".to_string())
            }
        }
    }

    /// Fail if a plain branch named `autoclaude` blocks the namespace.
    async fn check_branch_namespace(&self) -> Result<(), WorktreeError> {
        if self.git.local_branch_exists(&self.project_dir, BRANCH_PREFIX).await? {
            return Err(WorktreeError::BranchNamespaceCollision {
                colliding_ref: BRANCH_PREFIX.to_string(),
                prefix: BRANCH_PREFIX.to_string(),
            });
        }
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Create / inspect
    // -----------------------------------------------------------------------

    /// Create the task's worktree, or return the existing one.
    pub async fn create_worktree(&self, task_id: &str) -> Result<WorktreeRecord, WorktreeError> {
        self.create_worktree_with(task_id, false).await
    }

    /// Create the task's worktree. With `force`, an existing worktree and
    /// branch are discarded and recreated from the base branch.
    #[instrument(skip(self))]
    pub async fn create_worktree_with(
        &self,
        task_id: &str,
        force: bool,
    ) -> Result<WorktreeRecord, WorktreeError> {
        validate_task_id(task_id)?;
        if !force {
            if let Some(existing) = self.get_worktree_info(task_id).await? {
                debug!("worktree already active");
                return Ok(existing);
            }
        }

        self.check_branch_namespace().await?;
        let base = self.detect_base_branch().await?;

        // Leftovers from a crashed run.
        self.remove_worktree(task_id, true).await?;

        let start_point = self.fork_point(&base).await?;
        let path = self.worktree_path(task_id);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let branch = branch_name(task_id);
        let path_str = path.to_string_lossy().into_owned();
        let out = self
            .git_in_root(
                &["worktree", "add", "-b", &branch, &path_str, &start_point],
                TimeoutClass::Medium,
            )
            .await?;
        if !out.success() {
            return Err(WorktreeError::CreationFailed {
                task_id: task_id.to_string(),
                detail: out.detail(),
            });
        }
        info!(branch = %branch, start_point = %start_point, path = %path.display(), "worktree created");

        self.get_worktree_info(task_id)
            .await?
            .ok_or_else(|| WorktreeError::CreationFailed {
                task_id: task_id.to_string(),
                detail: "worktree was created but its branch is not checked out".into(),
            })
    }

    /// Fetch the base branch and prefer the remote copy as the fork point.
    async fn fork_point(&self, base: &str) -> Result<String, WorktreeError> {
        let remote = self.config.worktree.remote.as_str();
        let fetch = self
            .git_in_root(&["fetch", remote, base], TimeoutClass::Long)
            .await?;
        if !fetch.success() {
            warn!(remote, base, detail = %fetch.detail(), "fetch failed, using local base branch");
        }

        let remote_ref = format!("{remote}/{base}");
        if self.git.ref_exists(&self.project_dir, &remote_ref).await? {
            return Ok(remote_ref);
        }
        Ok(base.to_string())
    }

    /// The active worktree for `task_id`, with fresh stats.
    ///
    /// `None` unless the directory exists and has the task branch checked out.
    pub async fn get_worktree_info(&self, task_id: &str) -> Result<Option<WorktreeRecord>, WorktreeError> {
        validate_task_id(task_id)?;
        let path = self.worktree_path(task_id);
        if !path.is_dir() {
            return Ok(None);
        }

        let branch = branch_name(task_id);
        match self.git.current_branch(&path).await? {
            Some(current) if current == branch => {}
            other => {
                debug!(task_id, found = ?other, "directory exists but task branch is not checked out");
                return Ok(None);
            }
        }

        let base_branch = self.detect_base_branch().await?;
        let stats = self.compute_stats(&path, &base_branch).await?;
        Ok(Some(WorktreeRecord {
            task_id: task_id.to_string(),
            branch_name: branch,
            path,
            base_branch,
            stats,
        }))
    }

    async fn compute_stats(&self, worktree: &Path, base: &str) -> Result<WorktreeStats, WorktreeError> {
        let commits = self
            .git
            .count_commits(worktree, &format!("{base}..HEAD"))
            .await?
            .unwrap_or(0);

        let out = self
            .git
            .run(
                &["diff", "--shortstat", &format!("{base}...HEAD")],
                worktree,
                TimeoutClass::Medium,
            )
            .await?;
        let (files_changed, additions, deletions) = if out.success() {
            parse_shortstat(&out.stdout)
        } else {
            warn!(detail = %out.detail(), "shortstat failed");
            (0, 0, 0)
        };

        Ok(WorktreeStats {
            commits,
            files_changed,
            additions,
            deletions,
        })
    }

    /// All active task worktrees, sorted by task id.
    pub async fn list_worktrees(&self) -> Result<Vec<WorktreeRecord>, WorktreeError> {
        let dir = self.tasks_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut ids = Vec::new();
        let mut entries = tokio::fs::read_dir(&dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                if validate_task_id(name).is_ok() {
                    ids.push(name.to_string());
                }
            }
        }
        ids.sort();

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(record) = self.get_worktree_info(&id).await? {
                records.push(record);
            }
        }
        Ok(records)
    }

    /// Files the task branch changed relative to the base branch.
    pub async fn get_changed_files(&self, task_id: &str) -> Result<Vec<ChangedFile>, WorktreeError> {
        validate_task_id(task_id)?;
        let branch = branch_name(task_id);
        if !self.git.local_branch_exists(&self.project_dir, &branch).await? {
            return Err(WorktreeError::NotFound(task_id.to_string()));
        }
        let base = self.detect_base_branch().await?;
        let range = format!("{base}...{branch}");
        let out = self
            .git_in_root(&["diff", "--name-status", &range], TimeoutClass::Medium)
            .await?;
        if !out.success() {
            warn!(range = %range, detail = %out.detail(), "could not list changed files");
            return Ok(Vec::new());
        }
        Ok(parse_name_status(&out.stdout))
    }

    /// Stage everything in the task worktree and commit it.
    ///
    /// Returns `false` when there was nothing to commit.
    #[instrument(skip(self, message))]
    pub async fn commit_in_worktree(&self, task_id: &str, message: &str) -> Result<bool, WorktreeError> {
        validate_task_id(task_id)?;
        let path = self.worktree_path(task_id);
        if !path.is_dir() {
            return Err(WorktreeError::NotFound(task_id.to_string()));
        }
        let commit_failed = |detail: String| WorktreeError::CommitFailed {
            task_id: task_id.to_string(),
            detail,
        };

        let add = self.git.run(&["add", "-A"], &path, TimeoutClass::Short).await?;
        if !add.success() {
            return Err(commit_failed(add.detail()));
        }

        let staged = self
            .git
            .run(&["diff", "--cached", "--quiet"], &path, TimeoutClass::Short)
            .await?;
        match staged.exit_code {
            0 => {
                debug!("nothing to commit");
                return Ok(false);
            }
            1 => {}
            _ => return Err(commit_failed(staged.detail())),
        }

        let out = self
            .git
            .run(&["commit", "-m", message], &path, TimeoutClass::Medium)
            .await?;
        if !out.success() {
            return Err(commit_failed(out.detail()));
        }
        info!("committed task changes");
        Ok(true)
    }

    // -----------------------------------------------------------------------
    // Merge
    // -----------------------------------------------------------------------

    /// Merge the task branch into the base branch in the primary working copy.
    ///
    /// Merges are serialized per manager. The merge body runs on its own
    /// task, so dropping the returned future does not stop a merge that has
    /// started; the next call recovers from any half-finished merge.
    #[instrument(skip(self, options))]
    pub async fn merge_worktree(
        &self,
        task_id: &str,
        options: MergeOptions,
    ) -> Result<MergeOutcome, WorktreeError> {
        validate_task_id(task_id)?;
        let this = self.clone();
        let id = task_id.to_string();
        let handle = tokio::spawn(
            async move {
                let _guard = this.merge_lock.lock().await;
                this.merge_locked(&id, options).await
            }
            .instrument(tracing::Span::current()),
        );
        handle.await.map_err(|e| {
            warn!(error = %e, "merge task did not complete");
            WorktreeError::MergeTaskLost(task_id.to_string())
        })?
    }

    async fn merge_locked(&self, task_id: &str, options: MergeOptions) -> Result<MergeOutcome, WorktreeError> {
        let branch = branch_name(task_id);
        if !self.git.local_branch_exists(&self.project_dir, &branch).await? {
            return Err(WorktreeError::NotFound(task_id.to_string()));
        }

        self.recover_interrupted_merge().await?;

        let base = self.detect_base_branch().await?;
        let checkout = self.git_in_root(&["checkout", &base], TimeoutClass::Medium).await?;
        if !checkout.success() {
            return Err(WorktreeError::CheckoutFailed {
                branch: base,
                detail: checkout.detail(),
            });
        }

        let message = options
            .message
            .clone()
            .unwrap_or_else(|| format!("{BRANCH_PREFIX}: merge {branch}"));
        let mut args: Vec<&str> = vec!["merge", "--no-ff"];
        if !options.commit {
            args.push("--no-commit");
        }
        args.extend(["-m", message.as_str(), branch.as_str()]);

        let out = self.git_in_root(&args, TimeoutClass::Medium).await?;
        let mut lock_files_resolved = Vec::new();
        if !out.success() {
            lock_files_resolved = match self.take_task_lock_files(&branch).await {
                Ok(Some(files)) => files,
                Ok(None) => return Err(self.abort_failed_merge(&branch, out.detail()).await),
                Err(e) => return Err(self.abort_failed_merge(&branch, e.to_string()).await),
            };
            if options.commit {
                let commit = match self
                    .git_in_root(&["commit", "-q", "-m", message.as_str()], TimeoutClass::Medium)
                    .await
                {
                    Ok(commit) => commit,
                    Err(e) => return Err(self.abort_failed_merge(&branch, e.to_string()).await),
                };
                if !commit.success() {
                    return Err(self.abort_failed_merge(&branch, commit.detail()).await);
                }
            }
        }

        let unstaged_files = if options.commit {
            Vec::new()
        } else {
            self.unstage_private_files(&branch).await?
        };

        let final_state = if options.cleanup {
            // Keep the branch when the merge is only staged so it can be redone.
            self.remove_worktree(task_id, options.commit).await?;
            WorktreeState::MergedAndRemoved
        } else {
            WorktreeState::Active
        };

        info!(
            branch = %branch,
            base = %base,
            committed = options.commit,
            unstaged = unstaged_files.len(),
            state = %final_state,
            "merge complete"
        );
        Ok(MergeOutcome {
            task_id: task_id.to_string(),
            branch,
            base_branch: base,
            committed: options.commit,
            unstaged_files,
            lock_files_resolved,
            final_state,
        })
    }

    /// Resolve a conflicted merge whose only conflicts are lock files by
    /// taking the task branch's version of each. `None` when the merge did
    /// not stop on conflicts or a regular file conflicts.
    async fn take_task_lock_files(&self, branch: &str) -> Result<Option<Vec<String>>, WorktreeError> {
        if !self.git.merge_in_progress(&self.project_dir).await? {
            return Ok(None);
        }
        let unmerged = self.git.unmerged_paths(&self.project_dir).await?;
        if unmerged.is_empty() {
            return Ok(None);
        }
        let (regular, locks) = self.lock_policy.partition(unmerged);
        if !regular.is_empty() {
            debug!(conflicts = ?regular, "merge has conflicts outside lock files");
            return Ok(None);
        }

        for path in locks.iter().map(String::as_str) {
            let theirs = self
                .git_in_root(
                    &["--literal-pathspecs", "checkout", "--theirs", "--", path],
                    TimeoutClass::Short,
                )
                .await?;
            let mut stage = vec!["--literal-pathspecs"];
            if theirs.success() {
                stage.extend(["add", "--", path]);
            } else {
                // The task branch deleted the lock file.
                stage.extend(["rm", "-q", "--", path]);
            }
            let staged = self.git_in_root(&stage, TimeoutClass::Short).await?;
            if !staged.success() {
                return Err(WorktreeError::MergeFailed {
                    branch: branch.to_string(),
                    detail: format!("could not take task version of {path}: {}", staged.detail()),
                });
            }
        }
        info!(branch, lock_files = ?locks, "lock file conflicts resolved to the task version");
        Ok(Some(locks))
    }

    /// Abort a merge left behind by a cancelled or crashed run.
    async fn recover_interrupted_merge(&self) -> Result<(), WorktreeError> {
        let unmerged = self.git.unmerged_paths(&self.project_dir).await?;
        if !unmerged.is_empty() {
            warn!(files = ?unmerged, "found a half-finished merge, aborting it");
            let out = self.git_in_root(&["merge", "--abort"], TimeoutClass::Short).await?;
            if !out.success() {
                return Err(WorktreeError::MergeFailed {
                    branch: "MERGE_HEAD".into(),
                    detail: out.detail(),
                });
            }
            return Ok(());
        }
        if self.git.merge_in_progress(&self.project_dir).await? {
            return Err(WorktreeError::MergeInProgress {
                repo: self.project_dir.display().to_string(),
            });
        }
        Ok(())
    }

    /// Roll back a failed merge so no conflict markers remain.
    async fn abort_failed_merge(&self, branch: &str, detail: String) -> WorktreeError {
        let in_progress = match self.git.merge_in_progress(&self.project_dir).await {
            Ok(v) => v,
            Err(e) => return e.into(),
        };
        if !in_progress {
            warn!(branch, detail = %detail, "merge failed before starting");
            return WorktreeError::MergeFailed {
                branch: branch.to_string(),
                detail,
            };
        }

        match self.git_in_root(&["merge", "--abort"], TimeoutClass::Short).await {
            Ok(out) if out.success() => warn!(branch, "merge conflicted and was aborted"),
            Ok(out) => warn!(branch, detail = %out.detail(), "merge --abort failed"),
            Err(e) => return e,
        }
        WorktreeError::MergeAborted {
            branch: branch.to_string(),
            detail,
        }
    }

    /// Unstage metadata-dir and ignored files from a staged merge.
    async fn unstage_private_files(&self, branch: &str) -> Result<Vec<String>, WorktreeError> {
        let staged_out = self
            .git_in_root(&["diff", "--cached", "--name-only", "-z"], TimeoutClass::Short)
            .await?;
        let staged: Vec<String> = staged_out.stdout_paths().map(str::to_string).collect();
        if staged.is_empty() {
            return Ok(Vec::new());
        }

        let meta = self.config.worktree.metadata_dir.trim_end_matches('/');
        let meta_prefix = format!("{meta}/");
        let (mut private, candidates): (Vec<String>, Vec<String>) = staged
            .into_iter()
            .partition(|p| p == meta || p.starts_with(&meta_prefix));

        if !candidates.is_empty() {
            let mut args: Vec<&str> = vec!["check-ignore", "--no-index", "-z", "--"];
            args.extend(candidates.iter().map(String::as_str));
            let out = self.git_in_root(&args, TimeoutClass::Short).await?;
            match out.exit_code {
                0 => private.extend(out.stdout_paths().map(str::to_string)),
                1 => {}
                code => warn!(exit_code = code, detail = %out.detail(), "check-ignore failed"),
            }
        }
        if private.is_empty() {
            return Ok(private);
        }
        private.sort();
        private.dedup();

        let mut args: Vec<&str> = vec!["--literal-pathspecs", "reset", "-q", "HEAD", "--"];
        args.extend(private.iter().map(String::as_str));
        let out = self.git_in_root(&args, TimeoutClass::Short).await?;
        if !out.success() {
            return Err(WorktreeError::MergeFailed {
                branch: branch.to_string(),
                detail: format!("could not unstage private files: {}", out.detail()),
            });
        }
        info!(files = ?private, "unstaged ignored and metadata files");
        Ok(private)
    }

    // -----------------------------------------------------------------------
    // Remove
    // -----------------------------------------------------------------------

    /// Remove the task's worktree and optionally its branch. Idempotent.
    #[instrument(skip(self))]
    pub async fn remove_worktree(&self, task_id: &str, delete_branch: bool) -> Result<(), WorktreeError> {
        validate_task_id(task_id)?;
        let path = self.worktree_path(task_id);

        if path.exists() {
            let path_str = path.to_string_lossy().into_owned();
            let out = self
                .git_in_root(&["worktree", "remove", "--force", &path_str], TimeoutClass::Medium)
                .await?;
            if !out.success() {
                warn!(path = %path.display(), detail = %out.detail(), "worktree remove failed, deleting directory");
            }
            if path.exists() {
                tokio::fs::remove_dir_all(&path).await?;
            }
        }

        let prune = self.git_in_root(&["worktree", "prune"], TimeoutClass::Short).await?;
        if !prune.success() {
            warn!(detail = %prune.detail(), "worktree prune failed");
        }

        let branch = branch_name(task_id);
        if delete_branch && self.git.local_branch_exists(&self.project_dir, &branch).await? {
            let out = self.git_in_root(&["branch", "-D", &branch], TimeoutClass::Short).await?;
            if !out.success() {
                warn!(branch = %branch, detail = %out.detail(), "could not delete task branch");
            }
        }
        debug!("worktree removed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Push / pull request
    // -----------------------------------------------------------------------

    /// Push the task branch to the configured remote with upstream tracking.
    #[instrument(skip(self))]
    pub async fn push_branch(&self, task_id: &str) -> Result<String, WorktreeError> {
        validate_task_id(task_id)?;
        let branch = branch_name(task_id);
        if !self.git.local_branch_exists(&self.project_dir, &branch).await? {
            return Err(WorktreeError::NotFound(task_id.to_string()));
        }
        let remote = self.config.worktree.remote.as_str();
        let out = self
            .git_in_root(&["push", "-u", remote, &branch], TimeoutClass::Long)
            .await?;
        if !out.success() {
            return Err(WorktreeError::PushFailed {
                branch,
                detail: out.detail(),
            });
        }
        info!(branch = %branch, remote, "branch pushed");
        Ok(branch)
    }

    /// Open a PR from the task branch into the base branch.
    pub async fn create_pull_request(
        &self,
        task_id: &str,
        options: &PullRequestOptions,
    ) -> Result<PullRequest, CoreError> {
        validate_task_id(task_id)?;
        let base = self.detect_base_branch().await?;
        let pr = self
            .github
            .create_pull_request(&self.project_dir, &branch_name(task_id), &base, options)
            .await?;
        Ok(pr)
    }

    pub async fn push_and_create_pull_request(
        &self,
        task_id: &str,
        options: &PullRequestOptions,
    ) -> Result<PushAndPrOutcome, CoreError> {
        let branch = self.push_branch(task_id).await?;
        let pull_request = self.create_pull_request(task_id, options).await?;
        Ok(PushAndPrOutcome { branch, pull_request })
    }
}
