//! Merge preview for a UI or caller.
//!
//! Combines the read-only git-level [`ConflictReport`] with semantic
//! conflicts from an external analyzer into one [`MergePreview`]. Git
//! conflicts win when both sources name the same file. Like detection, a
//! preview never fails; missing pieces are logged and left empty.

use std::collections::BTreeSet;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::detector::ConflictDetector;
use super::resolver::ConflictResolutionEngine;
use crate::errors::ConflictError;
use crate::models::{ChangedFile, ConflictReport, Hunk};
use crate::worktree::{branch_name, WorktreeManager};

// ---------------------------------------------------------------------------
// Semantic conflict source
// ---------------------------------------------------------------------------

/// A conflict reported by the semantic analyzer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SemanticConflict {
    pub file: String,
    /// Symbol or region, e.g. `function:login`.
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub tasks: Vec<String>,
    pub severity: String,
    #[serde(default)]
    pub can_auto_merge: bool,
    #[serde(default)]
    pub reason: String,
}

/// Output of [`SemanticConflictSource::preview_merge`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SemanticPreview {
    pub conflicts: Vec<SemanticConflict>,
    /// Passed through to the preview summary as-is.
    #[serde(default)]
    pub summary: serde_json::Value,
}

/// External analyzer of overlapping logical edits across tasks.
#[async_trait]
pub trait SemanticConflictSource: Send + Sync {
    async fn preview_merge(&self, task_ids: &[String]) -> Result<SemanticPreview, ConflictError>;
}

// ---------------------------------------------------------------------------
// Preview object
// ---------------------------------------------------------------------------

/// Where a preview conflict came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConflictOrigin {
    Git,
    Semantic,
}

impl std::fmt::Display for ConflictOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Git => write!(f, "git"),
            Self::Semantic => write!(f, "semantic"),
        }
    }
}

/// One entry in [`MergePreview::conflicts`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreviewConflict {
    pub file: String,
    #[serde(rename = "type")]
    pub origin: ConflictOrigin,
    pub location: Option<String>,
    pub tasks: Vec<String>,
    pub severity: String,
    pub can_auto_merge: bool,
    pub reason: String,
    /// Rendered hunks, for git conflicts only.
    #[serde(default)]
    pub hunks: Vec<Hunk>,
}

/// Aggregate counts over a preview.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PreviewSummary {
    pub total_files: usize,
    pub total_conflicts: usize,
    pub git_conflicts: usize,
    pub semantic_conflicts: usize,
    pub auto_mergeable: usize,
    pub high_severity: usize,
    pub rename_candidates: usize,
    pub lock_files_excluded: usize,
    /// The semantic source's own summary, if any.
    #[serde(default)]
    pub semantic: serde_json::Value,
}

/// Everything a caller needs to decide how to merge a task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MergePreview {
    pub task_id: String,
    pub files_changed: Vec<ChangedFile>,
    pub conflicts: Vec<PreviewConflict>,
    pub git_conflicts: ConflictReport,
    pub summary: PreviewSummary,
    pub generated_at: DateTime<Utc>,
}

/// Merge git-level and semantic conflicts, de-duplicating by file path.
///
/// Git conflicts come first and win over semantic ones for the same file;
/// among semantic conflicts the first per file is kept.
pub fn combine_conflicts(
    git: Vec<PreviewConflict>,
    semantic: Vec<SemanticConflict>,
) -> Vec<PreviewConflict> {
    let mut seen: BTreeSet<String> = git.iter().map(|c| c.file.clone()).collect();
    let mut out = git;
    for conflict in semantic {
        if !seen.insert(conflict.file.clone()) {
            debug!(file = %conflict.file, "semantic conflict shadowed by git conflict");
            continue;
        }
        out.push(PreviewConflict {
            file: conflict.file,
            origin: ConflictOrigin::Semantic,
            location: conflict.location,
            tasks: conflict.tasks,
            severity: conflict.severity,
            can_auto_merge: conflict.can_auto_merge,
            reason: conflict.reason,
            hunks: Vec::new(),
        });
    }
    out
}

fn summarize(
    files_changed: usize,
    conflicts: &[PreviewConflict],
    report: &ConflictReport,
    semantic: serde_json::Value,
) -> PreviewSummary {
    PreviewSummary {
        total_files: files_changed,
        total_conflicts: conflicts.len(),
        git_conflicts: conflicts.iter().filter(|c| c.origin == ConflictOrigin::Git).count(),
        semantic_conflicts: conflicts
            .iter()
            .filter(|c| c.origin == ConflictOrigin::Semantic)
            .count(),
        auto_mergeable: conflicts.iter().filter(|c| c.can_auto_merge).count(),
        high_severity: conflicts
            .iter()
            .filter(|c| matches!(c.severity.as_str(), "high" | "critical"))
            .count(),
        rename_candidates: report.rename_candidates.len(),
        lock_files_excluded: report.lock_files_excluded.len(),
        semantic,
    }
}

// ---------------------------------------------------------------------------
// Previewer
// ---------------------------------------------------------------------------

/// Builds [`MergePreview`]s for the tasks of one repository.
#[derive(Debug, Clone)]
pub struct MergePreviewer {
    manager: WorktreeManager,
    detector: ConflictDetector,
    engine: ConflictResolutionEngine,
}

impl MergePreviewer {
    pub fn new(manager: WorktreeManager) -> Self {
        let detector = ConflictDetector::from_config(manager.config());
        let engine = ConflictResolutionEngine::from_config(manager.config());
        Self {
            manager,
            detector,
            engine,
        }
    }

    /// Preview merging `task_id` into the base branch.
    #[instrument(skip(self, semantic))]
    pub async fn preview(
        &self,
        task_id: &str,
        semantic: Option<&dyn SemanticConflictSource>,
    ) -> MergePreview {
        let repo_root = self.manager.project_dir();
        let task_branch = branch_name(task_id);

        let files_changed = match self.manager.get_changed_files(task_id).await {
            Ok(files) => files,
            Err(e) => {
                warn!(error = %e, "could not list changed files for preview");
                Vec::new()
            }
        };

        let report = match self.manager.detect_base_branch().await {
            Ok(base) => self.detector.detect(repo_root, &task_branch, &base).await,
            Err(e) => {
                warn!(error = %e, "could not determine base branch for preview");
                ConflictReport::empty("", task_branch.clone())
            }
        };

        let mut git_conflicts = Vec::with_capacity(report.conflicting_files.len());
        for file in &report.conflicting_files {
            let renamed_to = report
                .rename_candidates
                .iter()
                .find(|c| &c.task_path == file)
                .map(|c| c.base_path.clone());
            let reason = match &renamed_to {
                Some(new_path) => format!("renamed to {new_path} on {}", report.base_branch),
                None => format!("changed on both {} and {task_branch}", report.base_branch),
            };
            let hunks = match self
                .engine
                .file_hunks(repo_root, &report.base_branch, &task_branch, file)
                .await
            {
                Ok(hunks) => hunks,
                Err(e) => {
                    debug!(file = %file, error = %e, "no hunks for conflicting file");
                    Vec::new()
                }
            };
            git_conflicts.push(PreviewConflict {
                file: file.clone(),
                origin: ConflictOrigin::Git,
                location: renamed_to,
                tasks: vec![task_id.to_string()],
                severity: "high".into(),
                can_auto_merge: false,
                reason,
                hunks,
            });
        }

        let semantic_preview = match semantic {
            Some(source) => match source.preview_merge(&[task_id.to_string()]).await {
                Ok(preview) => preview,
                Err(e) => {
                    warn!(error = %e, "semantic conflict analysis unavailable");
                    SemanticPreview::default()
                }
            },
            None => SemanticPreview::default(),
        };

        let conflicts = combine_conflicts(git_conflicts, semantic_preview.conflicts);
        let summary = summarize(files_changed.len(), &conflicts, &report, semantic_preview.summary);
        info!(
            files = summary.total_files,
            conflicts = summary.total_conflicts,
            git = summary.git_conflicts,
            semantic = summary.semantic_conflicts,
            "merge preview ready"
        );

        MergePreview {
            task_id: task_id.to_string(),
            files_changed,
            conflicts,
            git_conflicts: report,
            summary,
            generated_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReconcileConfig;

    fn git_conflict(file: &str) -> PreviewConflict {
        PreviewConflict {
            file: file.into(),
            origin: ConflictOrigin::Git,
            location: None,
            tasks: vec!["t1".into()],
            severity: "high".into(),
            can_auto_merge: false,
            reason: "changed on both".into(),
            hunks: Vec::new(),
        }
    }

    fn semantic(file: &str, severity: &str, auto: bool) -> SemanticConflict {
        SemanticConflict {
            file: file.into(),
            location: Some("function:login".into()),
            tasks: vec!["t1".into(), "t2".into()],
            severity: severity.into(),
            can_auto_merge: auto,
            reason: "overlapping edit".into(),
        }
    }

    #[test]
    fn test_git_conflicts_win_on_same_file() {
        let combined = combine_conflicts(
            vec![git_conflict("auth.py")],
            vec![
                semantic("auth.py", "medium", true),
                semantic("views.py", "low", true),
                semantic("views.py", "high", false),
            ],
        );
        assert_eq!(combined.len(), 2);
        assert_eq!(combined[0].origin, ConflictOrigin::Git);
        assert_eq!(combined[1].file, "views.py");
        assert_eq!(combined[1].origin, ConflictOrigin::Semantic);
        assert_eq!(combined[1].severity, "low");
    }

    #[test]
    fn test_summary_counts() {
        let conflicts = combine_conflicts(
            vec![git_conflict("a.py")],
            vec![semantic("b.py", "low", true), semantic("c.py", "critical", false)],
        );
        let mut report = ConflictReport::empty("main", "autoclaude/t1");
        report.lock_files_excluded.push("yarn.lock".into());
        let summary = summarize(5, &conflicts, &report, serde_json::json!({"tasks": 1}));
        assert_eq!(summary.total_files, 5);
        assert_eq!(summary.total_conflicts, 3);
        assert_eq!(summary.git_conflicts, 1);
        assert_eq!(summary.semantic_conflicts, 2);
        assert_eq!(summary.auto_mergeable, 1);
        assert_eq!(summary.high_severity, 2);
        assert_eq!(summary.lock_files_excluded, 1);
    }

    #[test]
    fn test_conflict_json_is_tagged() {
        let json = serde_json::to_value(git_conflict("a.py")).unwrap();
        assert_eq!(json["type"], "git");
        let json = serde_json::to_value(&combine_conflicts(vec![], vec![semantic("b", "low", true)])[0]).unwrap();
        assert_eq!(json["type"], "semantic");
    }

    struct Failing;

    #[async_trait]
    impl SemanticConflictSource for Failing {
        async fn preview_merge(&self, _task_ids: &[String]) -> Result<SemanticPreview, ConflictError> {
            Err(ConflictError::Semantic("analyzer offline".into()))
        }
    }

    #[tokio::test]
    async fn test_preview_degrades_outside_repo() {
        let dir = tempfile::tempdir().unwrap();
        let manager = WorktreeManager::new(dir.path(), ReconcileConfig::default());
        let previewer = MergePreviewer::new(manager);
        let preview = previewer.preview("t1", Some(&Failing)).await;
        assert_eq!(preview.task_id, "t1");
        assert!(preview.conflicts.is_empty());
        assert!(!preview.git_conflicts.has_conflicts);
        assert_eq!(preview.summary.total_conflicts, 0);
    }
}
