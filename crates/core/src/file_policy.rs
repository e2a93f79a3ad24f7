//! Lock-file policy for conflict reporting.
//!
//! Dependency-manager lock files are never surfaced as conflicts: they are
//! regenerated, so a merge always takes the task branch's version. The
//! policy matches a built-in list of lock-file names at any depth plus any
//! extra glob patterns from `[merge] lock_file_patterns`.
//!
//! | Path | Decision |
//! |------|----------|
//! | basename in the built-in list | lock file |
//! | matches an extra glob pattern | lock file |
//! | anything else | regular file |

use tracing::debug;

use crate::config::MergeConfig;

/// Lock files recognised by name regardless of directory.
pub const DEFAULT_LOCK_FILES: &[&str] = &[
    "package-lock.json",
    "npm-shrinkwrap.json",
    "yarn.lock",
    "pnpm-lock.yaml",
    "bun.lockb",
    "bun.lock",
    "Cargo.lock",
    "poetry.lock",
    "Pipfile.lock",
    "uv.lock",
    "pdm.lock",
    "composer.lock",
    "Gemfile.lock",
    "go.sum",
    "mix.lock",
    "pubspec.lock",
    "Podfile.lock",
    "flake.lock",
];

/// Decides which paths are lock files.
#[derive(Debug, Clone, Default)]
pub struct LockFilePolicy {
    /// Extra glob patterns, matched against the forward-slash relative path.
    extra_patterns: Vec<String>,
}

impl LockFilePolicy {
    pub fn new(extra_patterns: Vec<String>) -> Self {
        Self { extra_patterns }
    }

    /// `true` if `rel_path` is a lock file.
    pub fn is_lock_file(&self, rel_path: &str) -> bool {
        let path = rel_path.replace('\\', "/");
        let name = path.rsplit('/').next().unwrap_or(path.as_str());
        if DEFAULT_LOCK_FILES.contains(&name) {
            return true;
        }
        let matched = self
            .extra_patterns
            .iter()
            .find(|pattern| glob_match::glob_match(&pattern.replace('\\', "/"), &path));
        if let Some(pattern) = matched {
            debug!(path = %path, pattern = %pattern, "path matches lock-file pattern");
            return true;
        }
        false
    }

    /// Split `paths` into `(regular, lock_files)`, preserving order.
    pub fn partition<I, S>(&self, paths: I) -> (Vec<String>, Vec<String>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        paths
            .into_iter()
            .map(Into::into)
            .partition(|p: &String| !self.is_lock_file(p))
    }
}

impl From<&MergeConfig> for LockFilePolicy {
    fn from(cfg: &MergeConfig) -> Self {
        Self::new(cfg.lock_file_patterns.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_lock_files_any_depth() {
        let policy = LockFilePolicy::default();
        assert!(policy.is_lock_file("package-lock.json"));
        assert!(policy.is_lock_file("frontend/yarn.lock"));
        assert!(policy.is_lock_file("crates/app/Cargo.lock"));
        assert!(policy.is_lock_file("services\\api\\poetry.lock"));
        assert!(!policy.is_lock_file("src/lock.rs"));
        assert!(!policy.is_lock_file("package.json"));
    }

    #[test]
    fn test_extra_patterns() {
        let policy = LockFilePolicy::new(vec!["**/*.lockfile".into(), "deps/*.json".into()]);
        assert!(policy.is_lock_file("a/b/c.lockfile"));
        assert!(policy.is_lock_file("deps/versions.json"));
        assert!(!policy.is_lock_file("src/versions.json"));
    }

    #[test]
    fn test_partition() {
        let policy = LockFilePolicy::default();
        let (regular, locks) = policy.partition(["b.py", "yarn.lock", "c.py", "web/package-lock.json"]);
        assert_eq!(regular, vec!["b.py", "c.py"]);
        assert_eq!(locks, vec!["yarn.lock", "web/package-lock.json"]);
    }

    #[test]
    fn test_from_merge_config() {
        let cfg = MergeConfig {
            lock_file_patterns: vec!["*.lck".into()],
        };
        let policy = LockFilePolicy::from(&cfg);
        assert!(policy.is_lock_file("x.lck"));
        assert!(policy.is_lock_file("go.sum"));
    }
}
