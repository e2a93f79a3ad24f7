//! Error types for the autoclaude core library.
//!
//! Each subsystem has its own error type derived with `thiserror`, and a
//! top-level [`CoreError`] enum unifies them all for callers that want a
//! single error type.
//!
//! Detection and preview paths never surface these to callers (they degrade
//! to best-effort reports). Mutating operations return them.

use thiserror::Error;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Unified error type for the entire core library.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Worktree(#[from] WorktreeError),

    #[error(transparent)]
    Conflict(#[from] ConflictError),

    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    PullRequest(#[from] PullRequestError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

// ---------------------------------------------------------------------------
// Command errors
// ---------------------------------------------------------------------------

/// Errors from spawning external commands.
///
/// A non-zero exit or a timeout is *not* an error: those come back as a
/// [`CommandOutput`](crate::git::CommandOutput) for the caller to inspect.
#[derive(Debug, Error)]
pub enum CommandError {
    /// The binary was not found on `$PATH`.
    #[error("{0} binary not found on PATH")]
    BinaryNotFound(String),

    /// The working directory handed to the command does not exist.
    #[error("working directory does not exist: {0}")]
    MissingWorkingDir(String),

    /// Generic I/O failure while spawning or collecting output.
    #[error("command I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Worktree errors
// ---------------------------------------------------------------------------

/// Errors from the per-task worktree lifecycle.
#[derive(Debug, Error)]
pub enum WorktreeError {
    /// The task id cannot be used as a directory and branch name.
    #[error("invalid task id '{task_id}': {reason}")]
    InvalidTaskId { task_id: String, reason: String },

    /// A branch blocks the `autoclaude/` ref namespace.
    #[error(
        "branch '{colliding_ref}' blocks the '{prefix}/' branch namespace; \
         rename it with: git branch -m {colliding_ref} {colliding_ref}-backup"
    )]
    BranchNamespaceCollision {
        colliding_ref: String,
        prefix: String,
    },

    /// `git worktree add` itself failed.
    #[error("failed to create worktree for task '{task_id}': {detail}")]
    CreationFailed { task_id: String, detail: String },

    /// No active worktree exists for the task.
    #[error("no worktree found for task '{0}'")]
    NotFound(String),

    /// Checking out the base branch in the primary working copy failed.
    #[error("failed to check out base branch '{branch}': {detail}")]
    CheckoutFailed { branch: String, detail: String },

    /// The merge conflicted and was aborted; the working tree is clean.
    #[error("merge of '{branch}' conflicted and was aborted: {detail}")]
    MergeAborted { branch: String, detail: String },

    /// A staged-but-uncommitted merge is pending in the primary working copy.
    #[error(
        "a merge is already in progress in '{repo}'; commit it or run 'git merge --abort' first"
    )]
    MergeInProgress { repo: String },

    /// The merge failed for a reason other than conflicts.
    #[error("merge of '{branch}' failed: {detail}")]
    MergeFailed { branch: String, detail: String },

    /// Committing inside the isolated worktree failed.
    #[error("commit in worktree for task '{task_id}' failed: {detail}")]
    CommitFailed { task_id: String, detail: String },

    /// Pushing the task branch failed.
    #[error("push of branch '{branch}' failed: {detail}")]
    PushFailed { branch: String, detail: String },

    /// The spawned merge task panicked or was cancelled by the runtime.
    #[error("merge task for '{0}' did not complete")]
    MergeTaskLost(String),

    /// Underlying command could not be spawned.
    #[error("worktree command error: {0}")]
    Command(#[from] CommandError),

    /// Generic I/O wrapper.
    #[error("worktree I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Conflict errors
// ---------------------------------------------------------------------------

/// Errors from read-only conflict analysis.
///
/// These stay inside the detector; the public detection entry point turns
/// them into an "assume safe" report.
#[derive(Debug, Error)]
pub enum ConflictError {
    /// A git plumbing command exited non-zero.
    #[error("git {operation} failed (exit {exit_code}): {stderr}")]
    GitFailed {
        operation: String,
        exit_code: i32,
        stderr: String,
    },

    /// Command output did not have the expected shape.
    #[error("unexpected output from git {operation}: {output}")]
    UnexpectedOutput { operation: String, output: String },

    /// The semantic conflict source failed.
    #[error("semantic conflict analysis failed: {0}")]
    Semantic(String),

    /// Underlying command could not be spawned.
    #[error("conflict command error: {0}")]
    Command(#[from] CommandError),
}

// ---------------------------------------------------------------------------
// Resolution errors
// ---------------------------------------------------------------------------

/// Errors for a single file in a resolution batch.
///
/// These are reported per file in `failed_files`; one bad entry never aborts
/// the batch.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// The target path resolves outside the repository root.
    #[error("security: path '{0}' escapes the repository root")]
    PathTraversal(String),

    /// The target path lies inside a `.git` directory.
    #[error("security: path '{0}' points into git metadata")]
    GitMetadata(String),

    /// `Custom` strategy without `custom_content`.
    #[error("custom resolution for '{0}' requires custom_content")]
    MissingCustomContent(String),

    /// The batch item could not be parsed into a resolution.
    #[error("malformed resolution: {0}")]
    Malformed(String),

    /// Neither side had content for the path.
    #[error("no content for '{path}' on {side}")]
    ContentUnavailable { path: String, side: String },

    /// A hunk decision referenced an unknown hunk id.
    #[error("unknown hunk '{hunk_id}' for '{path}'")]
    UnknownHunk { path: String, hunk_id: String },

    /// A hunk no longer matches the base content it was computed from.
    #[error("hunk '{hunk_id}' no longer applies to '{path}'")]
    StaleHunk { path: String, hunk_id: String },

    /// `git add` failed after the file was written.
    #[error("failed to stage '{path}': {detail}")]
    StageFailed { path: String, detail: String },

    /// The delegated external resolver is missing or reported a failure.
    #[error("external resolver: {0}")]
    External(String),

    /// Computing the file's diff failed.
    #[error("diff analysis failed: {0}")]
    Diff(#[from] ConflictError),

    /// Underlying command could not be spawned.
    #[error("resolution command error: {0}")]
    Command(#[from] CommandError),

    /// Generic I/O wrapper.
    #[error("resolution I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Pull request errors
// ---------------------------------------------------------------------------

/// Errors from the code-hosting CLI (`gh`).
#[derive(Debug, Error)]
pub enum PullRequestError {
    /// `gh` is not installed.
    #[error(
        "GitHub CLI (gh) is not installed; install it from https://cli.github.com \
         and run 'gh auth login'"
    )]
    CliNotInstalled,

    /// `gh` is installed but not authenticated.
    #[error("GitHub CLI is not authenticated; run 'gh auth login': {0}")]
    NotAuthenticated(String),

    /// `gh pr create` failed.
    #[error("pull request creation failed (exit {exit_code}): {stderr}")]
    CreateFailed { exit_code: i32, stderr: String },

    /// The existing PR URL could not be looked up. Callers treat it as absent.
    #[error("could not look up pull request for '{branch}': {detail}")]
    LookupFailed { branch: String, detail: String },

    /// Underlying command could not be spawned.
    #[error("pull request command error: {0}")]
    Command(#[from] CommandError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Config file not found.
    #[error("configuration file not found: {0}")]
    FileNotFound(String),

    /// TOML parse error.
    #[error("configuration parse error: {0}")]
    ParseError(String),

    /// A config value is invalid.
    #[error("invalid configuration value for '{field}': {detail}")]
    InvalidValue { field: String, detail: String },

    /// Generic I/O error reading the config file.
    #[error("configuration I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_namespace_collision_names_fix() {
        let err = WorktreeError::BranchNamespaceCollision {
            colliding_ref: "autoclaude".into(),
            prefix: "autoclaude".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'autoclaude'"));
        assert!(msg.contains("git branch -m autoclaude autoclaude-backup"));
    }

    #[test]
    fn test_error_display_messages() {
        let err = ResolutionError::PathTraversal("../../etc/passwd".into());
        assert!(err.to_string().starts_with("security:"));

        let err = PullRequestError::CliNotInstalled;
        assert!(err.to_string().contains("gh auth login"));

        let err = ConfigError::InvalidValue {
            field: "timeouts.short_secs".into(),
            detail: "must be > 0".into(),
        };
        assert!(err.to_string().contains("timeouts.short_secs"));
    }

    #[test]
    fn test_core_error_from_subsystem() {
        let err: CoreError = WorktreeError::NotFound("t1".into()).into();
        assert!(matches!(err, CoreError::Worktree(_)));

        let err: CoreError = CommandError::BinaryNotFound("git".into()).into();
        assert!(matches!(err, CoreError::Command(_)));
    }
}
