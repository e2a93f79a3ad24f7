//! Read-only conflict detection between a task branch and its base branch.
//!
//! The detector never touches the working tree, the index or `HEAD`. It
//! computes the merge base, counts how far the base branch has moved, and
//! runs `git merge-tree --write-tree`, which performs the three-way merge
//! entirely in the object database. Any unexpected failure degrades to an
//! empty "assume safe" report: the real merge is the authoritative check.

use std::collections::BTreeSet;
use std::path::Path;

use tracing::{debug, info, instrument, warn};

use super::parser::{parse_merge_tree_conflicts, resolve_conflicting_files, ConflictSource};
use super::rename::RenameMapper;
use crate::config::{ReconcileConfig, TimeoutClass};
use crate::errors::ConflictError;
use crate::file_policy::LockFilePolicy;
use crate::git::GitCli;
use crate::models::{ConflictReport, RenameCandidate};

/// Outcome of the in-memory merge.
enum TreeMerge {
    Clean,
    Conflicted(BTreeSet<String>),
}

/// Detects conflicts without mutating the repository.
#[derive(Debug, Clone)]
pub struct ConflictDetector {
    git: GitCli,
    renames: RenameMapper,
    policy: LockFilePolicy,
}

impl ConflictDetector {
    pub fn new(git: GitCli, policy: LockFilePolicy) -> Self {
        Self {
            renames: RenameMapper::new(git.clone()),
            git,
            policy,
        }
    }

    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self::new(
            GitCli::new(config.timeouts.clone()),
            LockFilePolicy::from(&config.merge),
        )
    }

    pub fn policy(&self) -> &LockFilePolicy {
        &self.policy
    }

    /// Detect conflicts between `task_branch` and `current_branch` (the base).
    ///
    /// Never fails. Errors are logged and produce a report with
    /// `has_conflicts == false`.
    #[instrument(skip(self), fields(repo = %repo_root.display()))]
    pub async fn detect(
        &self,
        repo_root: &Path,
        task_branch: &str,
        current_branch: &str,
    ) -> ConflictReport {
        match self.try_detect(repo_root, task_branch, current_branch).await {
            Ok(report) => report,
            Err(e) => {
                warn!(error = %e, "conflict detection failed; assuming safe");
                ConflictReport::empty(current_branch, task_branch)
            }
        }
    }

    async fn try_detect(
        &self,
        repo_root: &Path,
        task_branch: &str,
        base_branch: &str,
    ) -> Result<ConflictReport, ConflictError> {
        let mut report = ConflictReport::empty(base_branch, task_branch);

        let Some(merge_base) = self.git.merge_base(repo_root, base_branch, task_branch).await? else {
            debug!("no merge base; nothing to compare");
            return Ok(report);
        };

        let range = format!("{merge_base}..{base_branch}");
        report.commits_behind = self
            .git
            .count_commits(repo_root, &range)
            .await?
            .ok_or_else(|| ConflictError::UnexpectedOutput {
                operation: "rev-list --count".into(),
                output: range.clone(),
            })?;
        report.needs_rebase = report.commits_behind > 0;

        let mut conflicting: BTreeSet<String> = BTreeSet::new();
        match self.merge_tree(repo_root, base_branch, task_branch).await? {
            TreeMerge::Clean => debug!("in-memory merge is clean"),
            TreeMerge::Conflicted(parsed) => {
                let (files, source) = if parsed.is_empty() {
                    let base_changed = self.changed(repo_root, &merge_base, base_branch).await?;
                    let task_changed = self.changed(repo_root, &merge_base, task_branch).await?;
                    resolve_conflicting_files(parsed, &base_changed, &task_changed)
                } else {
                    (parsed, ConflictSource::Parsed)
                };
                debug!(files = files.len(), source = ?source, "conflicting files identified");
                conflicting = files;
            }
        }

        let (regular, locks) = self.policy.partition(conflicting);
        if !locks.is_empty() {
            info!(lock_files = ?locks, "excluding lock files from conflicts");
        }
        report.conflicting_files = regular.into_iter().collect();
        report.lock_files_excluded = locks;

        if report.commits_behind > 0 {
            let candidates = self
                .rename_candidates(repo_root, &merge_base, base_branch, task_branch)
                .await?;
            for candidate in candidates {
                if self.policy.is_lock_file(&candidate.task_path) {
                    continue;
                }
                report.conflicting_files.insert(candidate.task_path.clone());
                report.rename_candidates.push(candidate);
            }
        }

        report.has_conflicts = !report.conflicting_files.is_empty();
        info!(
            has_conflicts = report.has_conflicts,
            conflicts = report.conflicting_files.len(),
            commits_behind = report.commits_behind,
            renames = report.rename_candidates.len(),
            "conflict detection complete"
        );
        Ok(report)
    }

    /// `git merge-tree --write-tree -z`: exit 0 is clean, exit 1 conflicted.
    async fn merge_tree(
        &self,
        repo_root: &Path,
        base_branch: &str,
        task_branch: &str,
    ) -> Result<TreeMerge, ConflictError> {
        let out = self
            .git
            .run(
                &["merge-tree", "--write-tree", "--name-only", "-z", base_branch, task_branch],
                repo_root,
                TimeoutClass::Medium,
            )
            .await?;
        match out.exit_code {
            0 => Ok(TreeMerge::Clean),
            1 => Ok(TreeMerge::Conflicted(parse_merge_tree_conflicts(&out.stdout))),
            code => Err(ConflictError::GitFailed {
                operation: "merge-tree --write-tree".into(),
                exit_code: code,
                stderr: out.detail(),
            }),
        }
    }

    async fn changed(&self, repo_root: &Path, from: &str, to: &str) -> Result<Vec<String>, ConflictError> {
        self.git
            .changed_files(repo_root, from, to)
            .await?
            .ok_or_else(|| ConflictError::GitFailed {
                operation: format!("diff --name-only {from} {to}"),
                exit_code: 1,
                stderr: String::new(),
            })
    }

    /// Task-branch files that the base branch renamed since the fork.
    async fn rename_candidates(
        &self,
        repo_root: &Path,
        merge_base: &str,
        base_branch: &str,
        task_branch: &str,
    ) -> Result<Vec<RenameCandidate>, ConflictError> {
        let mapping = self.renames.detect_renames(repo_root, merge_base, base_branch).await?;
        if mapping.is_empty() {
            return Ok(Vec::new());
        }
        let task_changed = self.changed(repo_root, merge_base, task_branch).await?;
        let mut candidates: Vec<RenameCandidate> = task_changed
            .into_iter()
            .filter_map(|path| {
                let moved = mapping.apply(&path);
                (moved != path).then(|| RenameCandidate {
                    base_path: moved.to_string(),
                    task_path: path.clone(),
                })
            })
            .collect();
        candidates.sort();
        if !candidates.is_empty() {
            info!(candidates = ?candidates, "task files renamed on base branch");
        }
        Ok(candidates)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_detect_outside_repo_assumes_safe() {
        let dir = tempfile::tempdir().unwrap();
        let detector = ConflictDetector::from_config(&ReconcileConfig::default());
        let report = detector.detect(dir.path(), "autoclaude/t1", "main").await;
        assert!(!report.has_conflicts);
        assert!(report.conflicting_files.is_empty());
        assert_eq!(report.base_branch, "main");
        assert_eq!(report.task_branch, "autoclaude/t1");
    }

    #[tokio::test]
    async fn test_detect_missing_dir_assumes_safe() {
        let detector = ConflictDetector::from_config(&ReconcileConfig::default());
        let report = detector
            .detect(Path::new("/nonexistent/repo/root"), "autoclaude/t1", "main")
            .await;
        assert!(!report.has_conflicts);
    }
}
