//! Conflict analysis and resolution.
//!
//! 1. **Detection** -- read-only, via an in-memory three-way merge
//!    ([`ConflictDetector`]), with rename awareness ([`RenameMapper`]).
//! 2. **Preview** -- git and semantic conflicts combined for a caller
//!    ([`MergePreviewer`]).
//! 3. **Resolution** -- per-file and per-hunk decisions written into the
//!    repository and staged ([`ConflictResolutionEngine`]).

pub mod detector;
pub mod hunks;
pub mod parser;
pub mod preview;
pub mod rename;
pub mod resolver;

pub use detector::ConflictDetector;
pub use hunks::{parse_hunks, rebuild_from_hunks};
pub use parser::{parse_merge_tree_conflicts, resolve_conflicting_files, ConflictSource};
pub use preview::{
    ConflictOrigin, MergePreview, MergePreviewer, PreviewConflict, PreviewSummary,
    SemanticConflict, SemanticConflictSource, SemanticPreview,
};
pub use rename::{apply_mapping, PathMapping, RenameMapper};
pub use resolver::{
    parse_resolutions, resolve_within_root, ConflictResolutionEngine, ExternalResolver,
};
