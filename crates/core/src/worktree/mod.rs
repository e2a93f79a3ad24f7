//! Per-task worktree isolation.

pub mod manager;
pub mod stats;

pub use manager::{branch_name, validate_task_id, MergeOptions, WorktreeManager, BRANCH_PREFIX};
