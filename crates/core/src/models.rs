//! Domain model types shared by the worktree manager, the conflict detector
//! and the resolution engine.
//!
//! All records are plain data with `serde` support so a UI or caller can
//! consume them as JSON.

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Worktrees
// ---------------------------------------------------------------------------

/// Per-task lifecycle state.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WorktreeState {
    Absent,
    Active,
    MergedAndRemoved,
    Removed,
}

impl std::fmt::Display for WorktreeState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absent => write!(f, "absent"),
            Self::Active => write!(f, "active"),
            Self::MergedAndRemoved => write!(f, "merged_and_removed"),
            Self::Removed => write!(f, "removed"),
        }
    }
}

/// Change statistics of a task branch relative to its base branch.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorktreeStats {
    pub commits: u64,
    pub files_changed: u64,
    pub additions: u64,
    pub deletions: u64,
}

/// One active task worktree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct WorktreeRecord {
    pub task_id: String,
    /// Always `autoclaude/{task_id}`.
    pub branch_name: String,
    /// Always `{root}/.autoclaude/worktrees/tasks/{task_id}`.
    pub path: PathBuf,
    pub base_branch: String,
    /// Recomputed on every lookup.
    pub stats: WorktreeStats,
}

/// A file touched by a task branch (`diff --name-status`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangedFile {
    /// Single-letter git status (`A`, `M`, `D`, `R`, ...).
    pub status: String,
    pub path: String,
}

/// Result of a successful merge into the base branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MergeOutcome {
    pub task_id: String,
    pub branch: String,
    pub base_branch: String,
    /// `false` when the merge was left staged for a manual commit.
    pub committed: bool,
    /// Files removed from the index because they are ignored on the base
    /// branch or live under the private metadata directory.
    pub unstaged_files: Vec<String>,
    /// Conflicted lock files that were resolved to the task branch's version.
    #[serde(default)]
    pub lock_files_resolved: Vec<String>,
    /// `MergedAndRemoved` when cleanup ran, otherwise `Active`.
    pub final_state: WorktreeState,
}

/// Result of pushing a task branch and opening a PR.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PushAndPrOutcome {
    pub branch: String,
    pub pull_request: crate::git::PullRequest,
}

// ---------------------------------------------------------------------------
// Conflict detection
// ---------------------------------------------------------------------------

/// A task-branch file whose path was renamed on the base branch.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct RenameCandidate {
    /// Path as the task branch knows it.
    pub task_path: String,
    /// Where the base branch moved it.
    pub base_path: String,
}

/// Result of a read-only detection pass.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConflictReport {
    pub has_conflicts: bool,
    /// Never contains lock files.
    pub conflicting_files: BTreeSet<String>,
    pub commits_behind: u64,
    pub needs_rebase: bool,
    pub base_branch: String,
    pub task_branch: String,
    /// Files that moved on the base branch and need a rename-aware merge.
    #[serde(default)]
    pub rename_candidates: Vec<RenameCandidate>,
    /// Lock files dropped from `conflicting_files`; always take the task side.
    #[serde(default)]
    pub lock_files_excluded: Vec<String>,
}

impl ConflictReport {
    /// An empty report for the given branches.
    pub fn empty(base_branch: impl Into<String>, task_branch: impl Into<String>) -> Self {
        Self {
            base_branch: base_branch.into(),
            task_branch: task_branch.into(),
            ..Default::default()
        }
    }

    /// Copy of this report limited to `files`.
    pub fn restricted_to<'a>(&self, files: impl IntoIterator<Item = &'a str>) -> Self {
        let wanted: BTreeSet<&str> = files.into_iter().collect();
        let conflicting_files: BTreeSet<String> = self
            .conflicting_files
            .iter()
            .filter(|f| wanted.contains(f.as_str()))
            .cloned()
            .collect();
        let rename_candidates = self
            .rename_candidates
            .iter()
            .filter(|c| wanted.contains(c.task_path.as_str()))
            .cloned()
            .collect();
        Self {
            has_conflicts: !conflicting_files.is_empty(),
            conflicting_files,
            commits_behind: self.commits_behind,
            needs_rebase: self.needs_rebase,
            base_branch: self.base_branch.clone(),
            task_branch: self.task_branch.clone(),
            rename_candidates,
            lock_files_excluded: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Hunks
// ---------------------------------------------------------------------------

/// A contiguous changed region within one file's diff.
///
/// Line numbers are 1-indexed and inclusive. A side with no lines has
/// `end == start - 1`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Hunk {
    pub id: String,
    pub start_line_base: i64,
    pub end_line_base: i64,
    pub start_line_task: i64,
    pub end_line_task: i64,
    pub content_base: Vec<String>,
    pub content_task: Vec<String>,
}

impl Hunk {
    /// Number of base-side lines the hunk header declared.
    pub fn base_len(&self) -> i64 {
        self.end_line_base - self.start_line_base + 1
    }
}

/// Per-hunk decision for [`apply_hunk_resolution`](crate::conflict::ConflictResolutionEngine::apply_hunk_resolution).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum HunkSide {
    Base,
    Task,
}

/// A decision for one hunk id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct HunkChoice {
    pub hunk_id: String,
    pub side: HunkSide,
}

// ---------------------------------------------------------------------------
// Resolutions
// ---------------------------------------------------------------------------

/// How to resolve one file.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionStrategy {
    TakeTask,
    TakeBase,
    Concatenate,
    Custom,
    DelegateToExternalResolver,
}

impl std::fmt::Display for ResolutionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TakeTask => write!(f, "take_task"),
            Self::TakeBase => write!(f, "take_base"),
            Self::Concatenate => write!(f, "concatenate"),
            Self::Custom => write!(f, "custom"),
            Self::DelegateToExternalResolver => write!(f, "delegate_to_external_resolver"),
        }
    }
}

/// A user/AI decision for one file. Ephemeral; never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Resolution {
    pub file_path: String,
    pub strategy: ResolutionStrategy,
    /// Required iff `strategy` is `Custom`.
    #[serde(default)]
    pub custom_content: Option<String>,
}

impl Resolution {
    pub fn new(file_path: impl Into<String>, strategy: ResolutionStrategy) -> Self {
        Self {
            file_path: file_path.into(),
            strategy,
            custom_content: None,
        }
    }

    pub fn custom(file_path: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            file_path: file_path.into(),
            strategy: ResolutionStrategy::Custom,
            custom_content: Some(content.into()),
        }
    }
}

/// A file the engine could not resolve, with the reason.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FailedFile {
    pub path: String,
    pub error: String,
}

/// Per-file outcome of a resolution batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ResolutionOutcome {
    pub resolved_files: Vec<String>,
    pub failed_files: Vec<FailedFile>,
}

impl ResolutionOutcome {
    pub fn fail(&mut self, path: impl Into<String>, error: impl std::fmt::Display) {
        self.failed_files.push(FailedFile {
            path: path.into(),
            error: error.to_string(),
        });
    }

    /// Append another outcome's lists.
    pub fn merge(&mut self, other: ResolutionOutcome) {
        self.resolved_files.extend(other.resolved_files);
        self.failed_files.extend(other.failed_files);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_json_shape() {
        let r: Resolution =
            serde_json::from_str(r#"{"file_path":"a.py","strategy":"take_task"}"#).unwrap();
        assert_eq!(r.strategy, ResolutionStrategy::TakeTask);
        assert_eq!(r.custom_content, None);

        let json = serde_json::to_string(&Resolution::custom("b.py", "x")).unwrap();
        assert!(json.contains(r#""strategy":"custom""#));
    }

    #[test]
    fn test_report_restricted_to() {
        let mut report = ConflictReport::empty("main", "autoclaude/t1");
        report.has_conflicts = true;
        report.commits_behind = 2;
        report.needs_rebase = true;
        report.conflicting_files = ["a.py", "b.py", "c.py"].iter().map(|s| s.to_string()).collect();
        report.rename_candidates.push(RenameCandidate {
            task_path: "c.py".into(),
            base_path: "lib/c.py".into(),
        });

        let sub = report.restricted_to(["b.py", "c.py"]);
        assert!(sub.has_conflicts);
        assert_eq!(sub.conflicting_files.len(), 2);
        assert_eq!(sub.rename_candidates.len(), 1);
        assert_eq!(sub.commits_behind, 2);

        let none = report.restricted_to(["zzz"]);
        assert!(!none.has_conflicts);
    }
}
