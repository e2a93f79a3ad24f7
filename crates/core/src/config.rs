//! TOML-based configuration for worktree management and merge reconciliation.
//!
//! Every field has a default, so an empty file (or [`ReconcileConfig::default`])
//! is a usable configuration. The base-branch override may also come from the
//! `DEFAULT_BRANCH` environment variable via
//! [`ReconcileConfig::resolve_env_vars`].

use std::path::{Component, Path};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::errors::ConfigError;

/// Environment variable consulted for the base-branch override.
pub const BASE_BRANCH_ENV: &str = "DEFAULT_BRANCH";

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReconcileConfig {
    /// Worktree layout and base-branch settings.
    #[serde(default)]
    pub worktree: WorktreeConfig,

    /// Per-class command timeouts.
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Merge and conflict policy.
    #[serde(default)]
    pub merge: MergeConfig,
}

// ---------------------------------------------------------------------------
// Worktree
// ---------------------------------------------------------------------------

/// Worktree layout and base-branch settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorktreeConfig {
    /// Explicit base branch. Verified to exist before use.
    #[serde(default)]
    pub base_branch: Option<String>,

    /// Remote fetched before creating a worktree (default `origin`).
    #[serde(default = "default_remote")]
    pub remote: String,

    /// Private metadata directory, relative to the repository root.
    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: String,
}

fn default_remote() -> String {
    "origin".into()
}
fn default_metadata_dir() -> String {
    ".autoclaude".into()
}

impl Default for WorktreeConfig {
    fn default() -> Self {
        Self {
            base_branch: None,
            remote: default_remote(),
            metadata_dir: default_metadata_dir(),
        }
    }
}

// ---------------------------------------------------------------------------
// Timeouts
// ---------------------------------------------------------------------------

/// Timeout classes for external commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeoutClass {
    /// Metadata queries (`rev-parse`, `branch`, `gh pr view`).
    Short,
    /// Diffs, merges and in-memory merge analysis.
    Medium,
    /// Network operations (`fetch`, `push`).
    Long,
}

/// Per-class command timeouts in seconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    #[serde(default = "default_short")]
    pub short_secs: u64,
    #[serde(default = "default_medium")]
    pub medium_secs: u64,
    #[serde(default = "default_long")]
    pub long_secs: u64,
}

fn default_short() -> u64 {
    30
}
fn default_medium() -> u64 {
    60
}
fn default_long() -> u64 {
    120
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            short_secs: default_short(),
            medium_secs: default_medium(),
            long_secs: default_long(),
        }
    }
}

impl TimeoutConfig {
    /// Duration for a timeout class.
    pub fn duration(&self, class: TimeoutClass) -> Duration {
        let secs = match class {
            TimeoutClass::Short => self.short_secs,
            TimeoutClass::Medium => self.medium_secs,
            TimeoutClass::Long => self.long_secs,
        };
        Duration::from_secs(secs)
    }
}

// ---------------------------------------------------------------------------
// Merge policy
// ---------------------------------------------------------------------------

/// Merge and conflict policy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MergeConfig {
    /// Extra lock-file glob patterns on top of the built-in list.
    #[serde(default)]
    pub lock_file_patterns: Vec<String>,
}

// ---------------------------------------------------------------------------
// Loading & resolving
// ---------------------------------------------------------------------------

impl ReconcileConfig {
    /// Load a [`ReconcileConfig`] from a TOML file at the given path.
    ///
    /// This does **not** consult the environment -- call
    /// [`resolve_env_vars`](Self::resolve_env_vars) afterwards.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let config: ReconcileConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError(e.to_string()))?;

        debug!("configuration parsed successfully");
        Ok(config)
    }

    /// Fill the base-branch override from `DEFAULT_BRANCH` when the file did
    /// not set one. An explicit file value always wins.
    pub fn resolve_env_vars(&mut self) -> Result<(), ConfigError> {
        if self.worktree.base_branch.is_some() {
            return Ok(());
        }
        match std::env::var(BASE_BRANCH_ENV) {
            Ok(val) if !val.trim().is_empty() => {
                debug!(env = BASE_BRANCH_ENV, branch = %val, "base branch from environment");
                self.worktree.base_branch = Some(val.trim().to_string());
            }
            Ok(_) => warn!(env = BASE_BRANCH_ENV, "env var is set but empty"),
            Err(_) => {}
        }
        Ok(())
    }

    /// Validate that all fields are sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, secs) in [
            ("timeouts.short_secs", self.timeouts.short_secs),
            ("timeouts.medium_secs", self.timeouts.medium_secs),
            ("timeouts.long_secs", self.timeouts.long_secs),
        ] {
            if secs == 0 {
                return Err(ConfigError::InvalidValue {
                    field: field.into(),
                    detail: "timeout must be > 0".into(),
                });
            }
        }
        if self.worktree.remote.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "worktree.remote".into(),
                detail: "remote name must not be empty".into(),
            });
        }
        let meta = Path::new(&self.worktree.metadata_dir);
        if self.worktree.metadata_dir.is_empty()
            || meta.is_absolute()
            || meta
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(ConfigError::InvalidValue {
                field: "worktree.metadata_dir".into(),
                detail: "must be a relative path without '..' components".into(),
            });
        }
        if let Some(branch) = &self.worktree.base_branch {
            if branch.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "worktree.base_branch".into(),
                    detail: "base branch override must not be empty".into(),
                });
            }
        }
        Ok(())
    }

    /// Convenience: load, resolve, and validate in one call.
    pub fn load_and_resolve<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_file(path)?;
        config.resolve_env_vars()?;
        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn sample_toml() -> &'static str {
        r#"
[worktree]
base_branch = "develop"
remote = "upstream"
metadata_dir = ".autoclaude"

[timeouts]
short_secs = 10
medium_secs = 45
long_secs = 300

[merge]
lock_file_patterns = ["deps/*.lock"]
"#
    }

    #[test]
    fn test_parse_full_config() {
        let config: ReconcileConfig = toml::from_str(sample_toml()).expect("failed to parse toml");
        assert_eq!(config.worktree.base_branch.as_deref(), Some("develop"));
        assert_eq!(config.worktree.remote, "upstream");
        assert_eq!(config.timeouts.long_secs, 300);
        assert_eq!(config.merge.lock_file_patterns, vec!["deps/*.lock"]);
    }

    #[test]
    fn test_defaults() {
        let config: ReconcileConfig = toml::from_str("").unwrap();
        assert_eq!(config.worktree.base_branch, None);
        assert_eq!(config.worktree.remote, "origin");
        assert_eq!(config.worktree.metadata_dir, ".autoclaude");
        assert_eq!(config.timeouts.duration(TimeoutClass::Short), Duration::from_secs(30));
        assert_eq!(config.timeouts.duration(TimeoutClass::Medium), Duration::from_secs(60));
        assert_eq!(config.timeouts.duration(TimeoutClass::Long), Duration::from_secs(120));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("reconcile.toml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(sample_toml().as_bytes()).unwrap();

        let config = ReconcileConfig::load_from_file(&path).expect("load_from_file failed");
        assert_eq!(config.timeouts.short_secs, 10);
    }

    #[test]
    fn test_file_not_found() {
        let result = ReconcileConfig::load_from_file("/nonexistent/reconcile.toml");
        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let mut config = ReconcileConfig::default();
        config.timeouts.medium_secs = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "timeouts.medium_secs"
        ));
    }

    #[test]
    fn test_validate_rejects_escaping_metadata_dir() {
        let mut config = ReconcileConfig::default();
        config.worktree.metadata_dir = "../outside".into();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { ref field, .. }) if field == "worktree.metadata_dir"
        ));

        config.worktree.metadata_dir = "/abs".into();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_file_value_beats_env() {
        let mut config: ReconcileConfig = toml::from_str(sample_toml()).unwrap();
        config.resolve_env_vars().unwrap();
        assert_eq!(config.worktree.base_branch.as_deref(), Some("develop"));
    }
}
