//! Applying per-file conflict resolutions.
//!
//! [`ConflictResolutionEngine::apply_resolutions`] handles every resolution
//! independently: one bad entry never blocks the rest. Each target path is
//! checked to stay inside the repository root before anything is written,
//! then the file is written and staged.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, instrument, warn};

use super::detector::ConflictDetector;
use super::hunks::{parse_hunks, rebuild_from_hunks};
use crate::config::{ReconcileConfig, TimeoutClass};
use crate::errors::{ConflictError, ResolutionError};
use crate::git::GitCli;
use crate::models::{
    ConflictReport, Hunk, HunkChoice, Resolution, ResolutionOutcome, ResolutionStrategy,
};
use crate::worktree::BRANCH_PREFIX;

// ---------------------------------------------------------------------------
// External resolver seam
// ---------------------------------------------------------------------------

/// Collaborator that merges files this engine cannot, typically an AI merge.
#[async_trait]
pub trait ExternalResolver: Send + Sync {
    /// Resolve the files in `report.conflicting_files`.
    async fn resolve(
        &self,
        repo_root: &Path,
        report: &ConflictReport,
    ) -> Result<ResolutionOutcome, ResolutionError>;
}

// ---------------------------------------------------------------------------
// Path safety
// ---------------------------------------------------------------------------

/// Resolve `rel_path` under `repo_root`, rejecting anything that escapes it
/// or lands inside a `.git` directory.
///
/// `..` components are folded lexically and the deepest existing ancestor is
/// canonicalized, so symlinks pointing outside the root are caught too.
pub fn resolve_within_root(repo_root: &Path, rel_path: &str) -> Result<PathBuf, ResolutionError> {
    if rel_path.trim().is_empty() {
        return Err(ResolutionError::Malformed("empty file path".into()));
    }
    let root = std::fs::canonicalize(repo_root)?;
    let escapes = || ResolutionError::PathTraversal(rel_path.to_string());

    let mut normalized = PathBuf::new();
    for component in root.join(rel_path).components() {
        match component {
            Component::ParentDir => {
                if !normalized.pop() {
                    return Err(escapes());
                }
            }
            Component::CurDir => {}
            other => normalized.push(other.as_os_str()),
        }
    }

    let mut existing = normalized.as_path();
    let mut missing = Vec::new();
    while !existing.exists() {
        let Some(name) = existing.file_name() else {
            return Err(escapes());
        };
        missing.push(name.to_os_string());
        existing = existing.parent().ok_or_else(escapes)?;
    }
    let mut resolved = std::fs::canonicalize(existing)?;
    for name in missing.into_iter().rev() {
        resolved.push(name);
    }

    let Ok(inside) = resolved.strip_prefix(&root) else {
        return Err(escapes());
    };
    if inside.as_os_str().is_empty() {
        return Err(escapes());
    }
    let in_git_dir = inside
        .components()
        .any(|c| c.as_os_str().to_string_lossy().eq_ignore_ascii_case(".git"));
    if in_git_dir {
        return Err(ResolutionError::GitMetadata(rel_path.to_string()));
    }
    Ok(resolved)
}

// ---------------------------------------------------------------------------
// Concatenation
// ---------------------------------------------------------------------------

/// Separator comment for `path`, based on its extension.
pub fn separator_comment(path: &str, label: &str) -> String {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "py" | "sh" | "bash" | "zsh" | "rb" | "pl" | "r" | "yaml" | "yml" | "toml" | "ps1"
        | "cfg" | "conf" | "mk" => format!("# {label}"),
        "html" | "htm" | "xml" | "md" | "markdown" | "vue" | "svg" | "xhtml" => {
            format!("<!-- {label} -->")
        }
        "css" | "scss" | "less" => format!("/* {label} */"),
        "js" | "jsx" | "mjs" | "cjs" | "ts" | "tsx" | "rs" | "go" | "java" | "kt" | "kts"
        | "swift" | "c" | "h" | "cc" | "cpp" | "hpp" | "cs" | "scala" | "dart" | "php" => {
            format!("// {label}")
        }
        _ => String::new(),
    }
}

/// Base content, then a labelled separator, then task content.
pub fn concatenate(path: &str, task_branch: &str, base: &str, task: &str) -> String {
    let mut out = String::with_capacity(base.len() + task.len() + 64);
    out.push_str(base);
    if !base.is_empty() && !base.ends_with('\n') {
        out.push('\n');
    }
    out.push('\n');
    let sep = separator_comment(path, &format!("=== changes from {task_branch} ==="));
    if !sep.is_empty() {
        out.push_str(&sep);
        out.push('\n');
    }
    out.push_str(task);
    out
}

// ---------------------------------------------------------------------------
// Batch parsing
// ---------------------------------------------------------------------------

/// Deserialize a batch item by item. Malformed items are reported in the
/// returned outcome's `failed_files`.
pub fn parse_resolutions(values: Vec<serde_json::Value>) -> (Vec<Resolution>, ResolutionOutcome) {
    let mut resolutions = Vec::with_capacity(values.len());
    let mut outcome = ResolutionOutcome::default();
    for (i, value) in values.into_iter().enumerate() {
        let label = value
            .get("file_path")
            .and_then(|p| p.as_str())
            .map(str::to_string)
            .unwrap_or_else(|| format!("<item {i}>"));
        match serde_json::from_value::<Resolution>(value) {
            Ok(r) => resolutions.push(r),
            Err(e) => {
                warn!(item = %label, error = %e, "malformed resolution");
                outcome.fail(label, ResolutionError::Malformed(e.to_string()));
            }
        }
    }
    (resolutions, outcome)
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Writes resolved content into the repository and stages it.
#[derive(Clone)]
pub struct ConflictResolutionEngine {
    git: GitCli,
    detector: ConflictDetector,
    metadata_dir: String,
    external: Option<Arc<dyn ExternalResolver>>,
}

impl std::fmt::Debug for ConflictResolutionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConflictResolutionEngine")
            .field("metadata_dir", &self.metadata_dir)
            .field("external", &self.external.is_some())
            .finish()
    }
}

impl ConflictResolutionEngine {
    pub fn new(git: GitCli, detector: ConflictDetector, metadata_dir: impl Into<String>) -> Self {
        Self {
            git,
            detector,
            metadata_dir: metadata_dir.into(),
            external: None,
        }
    }

    pub fn from_config(config: &ReconcileConfig) -> Self {
        Self::new(
            GitCli::new(config.timeouts.clone()),
            ConflictDetector::from_config(config),
            config.worktree.metadata_dir.clone(),
        )
    }

    pub fn with_external_resolver(mut self, resolver: Arc<dyn ExternalResolver>) -> Self {
        self.external = Some(resolver);
        self
    }

    /// Apply `resolutions`, each independently.
    #[instrument(skip(self, resolutions), fields(repo = %repo_root.display(), count = resolutions.len()))]
    pub async fn apply_resolutions(
        &self,
        repo_root: &Path,
        task_branch: &str,
        base_branch: &str,
        resolutions: &[Resolution],
    ) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome::default();
        let mut delegated = Vec::new();

        for resolution in resolutions {
            if resolution.strategy == ResolutionStrategy::DelegateToExternalResolver {
                delegated.push(resolution.file_path.clone());
                continue;
            }
            match self.apply_one(repo_root, task_branch, base_branch, resolution).await {
                Ok(()) => {
                    debug!(path = %resolution.file_path, strategy = %resolution.strategy, "resolved");
                    outcome.resolved_files.push(resolution.file_path.clone());
                }
                Err(e) => {
                    warn!(path = %resolution.file_path, error = %e, "resolution failed");
                    outcome.fail(&resolution.file_path, e);
                }
            }
        }

        if !delegated.is_empty() {
            let external = self
                .delegate(repo_root, task_branch, base_branch, delegated)
                .await;
            outcome.merge(external);
        }

        info!(
            resolved = outcome.resolved_files.len(),
            failed = outcome.failed_files.len(),
            "resolutions applied"
        );
        outcome
    }

    async fn apply_one(
        &self,
        repo_root: &Path,
        task_branch: &str,
        base_branch: &str,
        resolution: &Resolution,
    ) -> Result<(), ResolutionError> {
        let path = resolution.file_path.as_str();
        let target = resolve_within_root(repo_root, path)?;

        let content: Vec<u8> = match resolution.strategy {
            ResolutionStrategy::TakeTask => self.task_content(repo_root, task_branch, path).await?,
            ResolutionStrategy::TakeBase => self
                .git
                .show_blob(repo_root, base_branch, path)
                .await?
                .ok_or_else(|| ResolutionError::ContentUnavailable {
                    path: path.to_string(),
                    side: base_branch.to_string(),
                })?,
            ResolutionStrategy::Concatenate => {
                let base = self.git.show_file(repo_root, base_branch, path).await?;
                let task = self.git.show_file(repo_root, task_branch, path).await?;
                concatenate(
                    path,
                    task_branch,
                    base.as_deref().unwrap_or_default(),
                    task.as_deref().unwrap_or_default(),
                )
                .into_bytes()
            }
            ResolutionStrategy::Custom => resolution
                .custom_content
                .clone()
                .ok_or_else(|| ResolutionError::MissingCustomContent(path.to_string()))?
                .into_bytes(),
            ResolutionStrategy::DelegateToExternalResolver => {
                return Err(ResolutionError::External(
                    "delegated resolutions are batched".into(),
                ));
            }
        };

        self.write_and_stage(repo_root, &target, path, &content).await
    }

    /// Task blob, else the live file in the task's worktree, else the live
    /// file in the repository root.
    async fn task_content(
        &self,
        repo_root: &Path,
        task_branch: &str,
        path: &str,
    ) -> Result<Vec<u8>, ResolutionError> {
        if let Some(content) = self.git.show_blob(repo_root, task_branch, path).await? {
            return Ok(content);
        }

        let mut roots = Vec::new();
        if let Some(task_id) = task_branch.strip_prefix(&format!("{BRANCH_PREFIX}/")) {
            roots.push(
                repo_root
                    .join(&self.metadata_dir)
                    .join("worktrees")
                    .join("tasks")
                    .join(task_id),
            );
        }
        roots.push(repo_root.to_path_buf());

        for root in roots {
            if !root.is_dir() {
                continue;
            }
            let Ok(live) = resolve_within_root(&root, path) else {
                continue;
            };
            if live.is_file() {
                debug!(path, source = %live.display(), "task blob missing, using working copy");
                return Ok(tokio::fs::read(&live).await?);
            }
        }
        Err(ResolutionError::ContentUnavailable {
            path: path.to_string(),
            side: task_branch.to_string(),
        })
    }

    async fn write_and_stage(
        &self,
        repo_root: &Path,
        target: &Path,
        path: &str,
        content: &[u8],
    ) -> Result<(), ResolutionError> {
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(target, content).await?;

        let target_str = target.to_string_lossy().into_owned();
        let out = self
            .git
            .run(
                &["--literal-pathspecs", "add", "--", &target_str],
                repo_root,
                TimeoutClass::Short,
            )
            .await?;
        if !out.success() {
            return Err(ResolutionError::StageFailed {
                path: path.to_string(),
                detail: out.detail(),
            });
        }
        Ok(())
    }

    /// Hand delegated files to the external resolver with a report
    /// restricted to them.
    async fn delegate(
        &self,
        repo_root: &Path,
        task_branch: &str,
        base_branch: &str,
        files: Vec<String>,
    ) -> ResolutionOutcome {
        let mut outcome = ResolutionOutcome::default();
        let Some(resolver) = self.external.as_ref() else {
            for file in files {
                outcome.fail(file, ResolutionError::External("no external resolver configured".into()));
            }
            return outcome;
        };

        let mut safe = Vec::with_capacity(files.len());
        for file in files {
            match resolve_within_root(repo_root, &file) {
                Ok(_) => safe.push(file),
                Err(e) => outcome.fail(file, e),
            }
        }
        if safe.is_empty() {
            return outcome;
        }

        let report = self.detector.detect(repo_root, task_branch, base_branch).await;
        let mut subset = report.restricted_to(safe.iter().map(String::as_str));
        subset.conflicting_files.extend(safe.iter().cloned());
        subset.has_conflicts = true;

        info!(files = safe.len(), "delegating to external resolver");
        match resolver.resolve(repo_root, &subset).await {
            Ok(external) => outcome.merge(external),
            Err(e) => {
                warn!(error = %e, "external resolver failed");
                let msg = e.to_string();
                for file in safe {
                    outcome.fail(file, ResolutionError::External(msg.clone()));
                }
            }
        }
        outcome
    }

    // -----------------------------------------------------------------------
    // Hunk-level resolution
    // -----------------------------------------------------------------------

    /// Hunks of `path` between `base_branch` and `task_branch`.
    pub async fn file_hunks(
        &self,
        repo_root: &Path,
        base_branch: &str,
        task_branch: &str,
        path: &str,
    ) -> Result<Vec<Hunk>, ConflictError> {
        let out = self
            .git
            .run(
                &["diff", "-U3", base_branch, task_branch, "--", path],
                repo_root,
                TimeoutClass::Medium,
            )
            .await?;
        if !out.success() {
            return Err(ConflictError::GitFailed {
                operation: format!("diff -U3 -- {path}"),
                exit_code: out.exit_code,
                stderr: out.detail(),
            });
        }
        Ok(parse_hunks(&out.stdout))
    }

    /// Rebuild `path` from the base blob, taking the task side for the
    /// chosen hunks, then write and stage it.
    #[instrument(skip(self, choices), fields(repo = %repo_root.display()))]
    pub async fn apply_hunk_resolution(
        &self,
        repo_root: &Path,
        base_branch: &str,
        task_branch: &str,
        path: &str,
        choices: &[HunkChoice],
    ) -> Result<(), ResolutionError> {
        let target = resolve_within_root(repo_root, path)?;
        let base = self
            .git
            .show_file(repo_root, base_branch, path)
            .await?
            .unwrap_or_default();
        let hunks = self.file_hunks(repo_root, base_branch, task_branch, path).await?;
        let content = rebuild_from_hunks(path, &base, &hunks, choices)?;
        self.write_and_stage(repo_root, &target, path, content.as_bytes())
            .await?;
        info!(path, hunks = hunks.len(), chosen = choices.len(), "hunk resolution applied");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_separator_comment_styles() {
        assert_eq!(separator_comment("a.py", "x"), "# x");
        assert_eq!(separator_comment("docs/README.md", "x"), "<!-- x -->");
        assert_eq!(separator_comment("style.SCSS", "x"), "/* x */");
        assert_eq!(separator_comment("src/main.rs", "x"), "// x");
        assert_eq!(separator_comment("data.bin", "x"), "");
        assert_eq!(separator_comment("Makefile", "x"), "");
    }

    #[test]
    fn test_concatenate_order_and_label() {
        let out = concatenate("app.ts", "autoclaude/t1", "base\n", "task\n");
        assert_eq!(out, "base\n\n// === changes from autoclaude/t1 ===\ntask\n");

        let out = concatenate("notes.txt", "autoclaude/t1", "base", "");
        assert_eq!(out, "base\n\n");
    }

    #[test]
    fn test_resolve_within_root() {
        let dir = tempfile::tempdir().unwrap();
        let root = std::fs::canonicalize(dir.path()).unwrap();

        let ok = resolve_within_root(dir.path(), "src/new/file.py").unwrap();
        assert_eq!(ok, root.join("src/new/file.py"));
        let ok = resolve_within_root(dir.path(), "a/../b.py").unwrap();
        assert_eq!(ok, root.join("b.py"));

        for bad in ["../../etc/passwd", "../sibling.txt", "a/../../x", "/etc/passwd", "."] {
            assert!(
                matches!(resolve_within_root(dir.path(), bad), Err(ResolutionError::PathTraversal(_))),
                "{bad} should be rejected"
            );
        }
        assert!(matches!(
            resolve_within_root(dir.path(), ""),
            Err(ResolutionError::Malformed(_))
        ));
    }

    #[cfg(unix)]
    #[test]
    fn test_resolve_rejects_symlink_escape() {
        let outside = tempfile::tempdir().unwrap();
        let dir = tempfile::tempdir().unwrap();
        std::os::unix::fs::symlink(outside.path(), dir.path().join("link")).unwrap();
        assert!(matches!(
            resolve_within_root(dir.path(), "link/evil.txt"),
            Err(ResolutionError::PathTraversal(_))
        ));
    }

    #[test]
    fn test_resolve_rejects_git_metadata() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join(".git")).unwrap();
        for bad in [".git/config", ".git/hooks/pre-commit", "vendor/lib/.git/config", ".GIT/config", "x/../.git/HEAD"] {
            let err = resolve_within_root(dir.path(), bad).unwrap_err();
            assert!(matches!(err, ResolutionError::GitMetadata(_)), "{bad} should be rejected");
            assert!(err.to_string().starts_with("security:"));
        }
        assert!(resolve_within_root(dir.path(), ".gitignore").is_ok());
        assert!(resolve_within_root(dir.path(), ".github/workflows/ci.yml").is_ok());
    }

    #[test]
    fn test_parse_resolutions_is_lenient() {
        let values = vec![
            serde_json::json!({"file_path": "a.py", "strategy": "take_task"}),
            serde_json::json!({"file_path": "b.py", "strategy": "flip_a_coin"}),
            serde_json::json!({"strategy": "take_base"}),
            serde_json::json!({"file_path": "c.py", "strategy": "custom", "custom_content": "x"}),
        ];
        let (ok, outcome) = parse_resolutions(values);
        assert_eq!(ok.len(), 2);
        assert_eq!(ok[1].custom_content.as_deref(), Some("x"));
        assert_eq!(outcome.failed_files.len(), 2);
        assert_eq!(outcome.failed_files[0].path, "b.py");
        assert_eq!(outcome.failed_files[1].path, "<item 2>");
    }

    struct Recording;

    #[async_trait]
    impl ExternalResolver for Recording {
        async fn resolve(
            &self,
            _repo_root: &Path,
            report: &ConflictReport,
        ) -> Result<ResolutionOutcome, ResolutionError> {
            Ok(ResolutionOutcome {
                resolved_files: report.conflicting_files.iter().cloned().collect(),
                failed_files: Vec::new(),
            })
        }
    }

    #[tokio::test]
    async fn test_custom_without_content_and_traversal_fail_individually() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ConflictResolutionEngine::from_config(&ReconcileConfig::default());
        let resolutions = vec![
            Resolution::new("x.py", ResolutionStrategy::Custom),
            Resolution::custom("../../etc/passwd", "pwned"),
        ];
        let outcome = engine
            .apply_resolutions(dir.path(), "autoclaude/t1", "main", &resolutions)
            .await;
        assert!(outcome.resolved_files.is_empty());
        assert_eq!(outcome.failed_files.len(), 2);
        assert!(outcome.failed_files[1].error.starts_with("security:"));
        assert!(!dir.path().join("x.py").exists());
    }

    #[tokio::test]
    async fn test_delegation_without_resolver_fails_files() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ConflictResolutionEngine::from_config(&ReconcileConfig::default());
        let resolutions = vec![Resolution::new("a.py", ResolutionStrategy::DelegateToExternalResolver)];
        let outcome = engine
            .apply_resolutions(dir.path(), "autoclaude/t1", "main", &resolutions)
            .await;
        assert_eq!(outcome.failed_files.len(), 1);
        assert!(outcome.failed_files[0].error.contains("no external resolver"));
    }

    #[tokio::test]
    async fn test_delegation_merges_external_outcome() {
        let dir = tempfile::tempdir().unwrap();
        let engine = ConflictResolutionEngine::from_config(&ReconcileConfig::default())
            .with_external_resolver(Arc::new(Recording));
        let resolutions = vec![
            Resolution::new("a.py", ResolutionStrategy::DelegateToExternalResolver),
            Resolution::new("../b.py", ResolutionStrategy::DelegateToExternalResolver),
        ];
        let outcome = engine
            .apply_resolutions(dir.path(), "autoclaude/t1", "main", &resolutions)
            .await;
        assert_eq!(outcome.resolved_files, vec!["a.py"]);
        assert_eq!(outcome.failed_files.len(), 1);
        assert_eq!(outcome.failed_files[0].path, "../b.py");
    }
}
