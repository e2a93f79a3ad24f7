//! Rename-aware path mapping between two refs.
//!
//! Uses git's own rename detection (`diff --name-status -M`) at its default
//! similarity threshold. The resulting [`PathMapping`] maps a path as it
//! existed at `from` to where it lives at `to`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::TimeoutClass;
use crate::errors::ConflictError;
use crate::git::GitCli;

/// `old_path -> new_path` for files renamed between two refs.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct PathMapping {
    renames: BTreeMap<String, String>,
}

impl PathMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, old_path: impl Into<String>, new_path: impl Into<String>) {
        self.renames.insert(old_path.into(), new_path.into());
    }

    /// Where `path` lives after the renames, or `path` itself if unmoved.
    ///
    /// Chains (`a -> b -> c`) are followed to their end so the result is a
    /// fixed point. A cycle stops after one pass over the map.
    pub fn apply<'a>(&'a self, path: &'a str) -> &'a str {
        let mut current = path;
        for _ in 0..self.renames.len() {
            match self.renames.get(current) {
                Some(next) if next != current => current = next.as_str(),
                _ => break,
            }
        }
        current
    }

    /// The new path if `path` was renamed.
    pub fn get(&self, path: &str) -> Option<&str> {
        self.renames.get(path).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.renames.is_empty()
    }

    pub fn len(&self) -> usize {
        self.renames.len()
    }
}

impl FromIterator<(String, String)> for PathMapping {
    fn from_iter<I: IntoIterator<Item = (String, String)>>(iter: I) -> Self {
        Self {
            renames: iter.into_iter().collect(),
        }
    }
}

/// Map `path` through `mapping`. Total: unmapped paths come back unchanged.
pub fn apply_mapping(path: &str, mapping: &PathMapping) -> String {
    mapping.apply(path).to_string()
}

/// Parse `git diff --name-status -M -z` output into a mapping.
///
/// Rename records are `R087 NUL old NUL new NUL`; everything else is skipped.
pub fn parse_name_status_renames(output: &str) -> PathMapping {
    let mut mapping = PathMapping::new();
    let mut fields = output.split('\0');
    while let Some(status) = fields.next() {
        if status.is_empty() {
            continue;
        }
        let two_paths = status.starts_with('R') || status.starts_with('C');
        let Some(old) = fields.next() else {
            break;
        };
        if !two_paths {
            continue;
        }
        let Some(new) = fields.next() else {
            break;
        };
        if status.starts_with('R') && !old.is_empty() && !new.is_empty() {
            mapping.insert(old, new);
        }
    }
    mapping
}

/// Detects renames between refs with `git diff`.
#[derive(Debug, Clone)]
pub struct RenameMapper {
    git: GitCli,
}

impl RenameMapper {
    pub fn new(git: GitCli) -> Self {
        Self { git }
    }

    /// Files renamed between `from_ref` and `to_ref`.
    #[instrument(skip(self), fields(repo = %repo_root.display()))]
    pub async fn detect_renames(
        &self,
        repo_root: &Path,
        from_ref: &str,
        to_ref: &str,
    ) -> Result<PathMapping, ConflictError> {
        let out = self
            .git
            .run(
                &["diff", "--name-status", "-M", "-z", from_ref, to_ref],
                repo_root,
                TimeoutClass::Medium,
            )
            .await?;
        if !out.success() {
            return Err(ConflictError::GitFailed {
                operation: "diff --name-status -M".into(),
                exit_code: out.exit_code,
                stderr: out.detail(),
            });
        }
        let mapping = parse_name_status_renames(&out.stdout);
        debug!(renames = mapping.len(), "rename detection complete");
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_name_status() {
        let out = "M\0README.md\0R087\0old/util.py\0new/util.py\0A\0new.txt\0C075\0x.rs\0y.rs\0R100\0a.rs\0src/a.rs\0D\0gone.txt\0";
        let mapping = parse_name_status_renames(out);
        assert_eq!(mapping.len(), 2);
        assert_eq!(mapping.get("old/util.py"), Some("new/util.py"));
        assert_eq!(mapping.get("a.rs"), Some("src/a.rs"));
        assert_eq!(mapping.get("README.md"), None);
    }

    #[test]
    fn test_apply_is_total() {
        let mut m = PathMapping::new();
        m.insert("old/util.py", "new/util.py");
        assert_eq!(apply_mapping("old/util.py", &m), "new/util.py");
        assert_eq!(apply_mapping("untouched.py", &m), "untouched.py");
        assert_eq!(apply_mapping("", &PathMapping::new()), "");
    }

    #[test]
    fn test_apply_is_idempotent_for_acyclic_mapping() {
        let mut m = PathMapping::new();
        m.insert("a.py", "b.py");
        m.insert("docs/x.md", "guide/x.md");
        for p in ["a.py", "b.py", "docs/x.md", "guide/x.md", "zzz"] {
            let once = apply_mapping(p, &m);
            assert_eq!(apply_mapping(&once, &m), once, "not idempotent for {p}");
        }
    }

    #[test]
    fn test_apply_follows_chains() {
        let mut m = PathMapping::new();
        m.insert("a.py", "b.py");
        m.insert("b.py", "c.py");
        assert_eq!(apply_mapping("a.py", &m), "c.py");
        assert_eq!(apply_mapping("c.py", &m), "c.py");
    }

    #[test]
    fn test_ignores_malformed_lines() {
        let mapping = parse_name_status_renames("R100\0only-one-path\0");
        assert!(mapping.is_empty());
        let mapping = parse_name_status_renames("R100\0\0\0");
        assert!(mapping.is_empty());
    }
}
