//! autoclaude core library.
//!
//! Runs autonomous coding tasks in isolated git worktrees and reconciles
//! their branches back into the base branch without ever leaving the
//! primary working copy half-merged:
//!
//! - [`WorktreeManager`] owns the per-task `autoclaude/{task_id}` branches
//!   and worktrees, and performs the serialized merge.
//! - [`ConflictDetector`] previews conflicts without touching the working
//!   tree, index or `HEAD`.
//! - [`ConflictResolutionEngine`] applies per-file resolutions.
//!
//! The library logs through `tracing` and never installs a subscriber.

pub mod config;
pub mod conflict;
pub mod errors;
pub mod file_policy;
pub mod git;
pub mod models;
pub mod worktree;

// Re-exports for convenience.
pub use config::ReconcileConfig;
pub use conflict::{ConflictDetector, ConflictResolutionEngine, MergePreviewer};
pub use errors::CoreError;
pub use file_policy::LockFilePolicy;
pub use worktree::{MergeOptions, WorktreeManager};
