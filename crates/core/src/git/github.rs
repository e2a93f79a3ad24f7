//! Pull-request operations through the GitHub CLI (`gh`).
//!
//! Authentication is owned by `gh` itself. A missing binary or an
//! unauthenticated session are reported as distinct errors so the caller can
//! show the right remediation.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::runner::{CommandOutput, CommandRunner};
use crate::config::{TimeoutClass, TimeoutConfig};
use crate::errors::{CommandError, PullRequestError};

/// Options for `gh pr create`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PullRequestOptions {
    pub title: Option<String>,
    pub body: Option<String>,
    #[serde(default)]
    pub draft: bool,
}

/// A created or pre-existing pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PullRequest {
    /// PR URL. `None` only when the PR already existed and its URL could not
    /// be looked up.
    pub url: Option<String>,
    /// `true` if `gh` reported the PR already existed.
    pub already_existed: bool,
}

#[derive(Debug, Deserialize)]
struct PrViewJson {
    url: String,
}

/// `gh` wrapper with its own timeouts.
#[derive(Debug, Clone)]
pub struct GitHubCli {
    runner: CommandRunner,
    timeouts: TimeoutConfig,
}

impl GitHubCli {
    pub fn new(timeouts: TimeoutConfig) -> Self {
        Self {
            runner: CommandRunner::gh(),
            timeouts,
        }
    }

    pub fn with_runner(runner: CommandRunner, timeouts: TimeoutConfig) -> Self {
        Self { runner, timeouts }
    }

    /// Create a PR from `head` into `base`. "Already exists" is a success.
    #[instrument(skip(self, options), fields(cwd = %cwd.display()))]
    pub async fn create_pull_request(
        &self,
        cwd: &Path,
        head: &str,
        base: &str,
        options: &PullRequestOptions,
    ) -> Result<PullRequest, PullRequestError> {
        let title = options
            .title
            .clone()
            .unwrap_or_else(|| format!("Merge {head} into {base}"));
        let body = options.body.clone().unwrap_or_default();

        let mut args: Vec<&str> = vec![
            "pr",
            "create",
            "--base",
            base,
            "--head",
            head,
            "--title",
            title.as_str(),
            "--body",
            body.as_str(),
        ];
        if options.draft {
            args.push("--draft");
        }

        let out = self.run(&args, cwd, TimeoutClass::Medium).await?;
        if out.success() {
            let url = out
                .stdout_lines()
                .rev()
                .find(|l| l.starts_with("http"))
                .map(str::to_string);
            info!(head, base, url = ?url, "pull request created");
            return Ok(PullRequest {
                url,
                already_existed: false,
            });
        }

        let detail = out.detail();
        if is_already_exists(&detail) {
            info!(head, "pull request already exists, looking up URL");
            let url = match self.lookup_pull_request_url(cwd, head).await {
                Ok(url) => Some(url),
                Err(e) => {
                    warn!(head, error = %e, "existing pull request URL unavailable");
                    None
                }
            };
            return Ok(PullRequest {
                url,
                already_existed: true,
            });
        }
        if is_auth_failure(&detail) {
            return Err(PullRequestError::NotAuthenticated(detail));
        }
        Err(PullRequestError::CreateFailed {
            exit_code: out.exit_code,
            stderr: detail,
        })
    }

    /// URL of the open PR whose head is `branch`.
    pub async fn lookup_pull_request_url(
        &self,
        cwd: &Path,
        branch: &str,
    ) -> Result<String, PullRequestError> {
        let out = self
            .run(&["pr", "view", branch, "--json", "url"], cwd, TimeoutClass::Short)
            .await?;
        if !out.success() {
            return Err(PullRequestError::LookupFailed {
                branch: branch.to_string(),
                detail: out.detail(),
            });
        }
        let parsed: PrViewJson =
            serde_json::from_str(out.stdout_trimmed()).map_err(|e| PullRequestError::LookupFailed {
                branch: branch.to_string(),
                detail: e.to_string(),
            })?;
        debug!(branch, url = %parsed.url, "looked up pull request");
        Ok(parsed.url)
    }

    async fn run(
        &self,
        args: &[&str],
        cwd: &Path,
        class: TimeoutClass,
    ) -> Result<CommandOutput, PullRequestError> {
        self.runner
            .run(args, cwd, self.timeouts.duration(class))
            .await
            .map_err(|e| match e {
                CommandError::BinaryNotFound(_) => PullRequestError::CliNotInstalled,
                other => PullRequestError::Command(other),
            })
    }
}

fn is_already_exists(detail: &str) -> bool {
    detail.to_lowercase().contains("already exists")
}

fn is_auth_failure(detail: &str) -> bool {
    let lower = detail.to_lowercase();
    lower.contains("gh auth login") || lower.contains("not logged in") || lower.contains("authentication")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_already_exists_detection() {
        assert!(is_already_exists(
            "a pull request for branch \"autoclaude/t1\" into branch \"main\" already exists:"
        ));
        assert!(!is_already_exists("could not resolve host"));
    }

    #[test]
    fn test_auth_failure_detection() {
        assert!(is_auth_failure(
            "To get started with GitHub CLI, please run:  gh auth login"
        ));
        assert!(!is_auth_failure("pull request create failed: GraphQL error"));
    }

    #[tokio::test]
    async fn test_missing_gh_is_cli_not_installed() {
        let cli = GitHubCli::with_runner(
            CommandRunner::new("gh-binary-that-does-not-exist"),
            TimeoutConfig::default(),
        );
        let dir = tempfile::tempdir().unwrap();
        let result = cli
            .create_pull_request(dir.path(), "autoclaude/t1", "main", &PullRequestOptions::default())
            .await;
        assert!(matches!(result, Err(PullRequestError::CliNotInstalled)));
    }

    /// Runs `sh pr ...` so the fake `gh` is a script named `pr` in `cwd`.
    fn fake_gh(dir: &Path, script: &str) -> GitHubCli {
        std::fs::write(dir.join("pr"), script).unwrap();
        GitHubCli::with_runner(CommandRunner::new("sh"), TimeoutConfig::default())
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_already_exists_with_failed_lookup_is_success() {
        let dir = tempfile::tempdir().unwrap();
        let cli = fake_gh(
            dir.path(),
            "if [ \"$1\" = create ]; then echo 'a pull request for branch already exists' >&2; exit 1; fi\nexit 1\n",
        );
        let pr = cli
            .create_pull_request(dir.path(), "autoclaude/t1", "main", &PullRequestOptions::default())
            .await
            .unwrap();
        assert!(pr.already_existed);
        assert_eq!(pr.url, None);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_already_exists_with_lookup_returns_url() {
        let dir = tempfile::tempdir().unwrap();
        let cli = fake_gh(
            dir.path(),
            "if [ \"$1\" = create ]; then echo 'already exists' >&2; exit 1; fi\necho '{\"url\":\"https://github.com/o/r/pull/7\"}'\n",
        );
        let pr = cli
            .create_pull_request(dir.path(), "autoclaude/t1", "main", &PullRequestOptions::default())
            .await
            .unwrap();
        assert!(pr.already_existed);
        assert_eq!(pr.url.as_deref(), Some("https://github.com/o/r/pull/7"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_created_url_is_parsed() {
        let dir = tempfile::tempdir().unwrap();
        let cli = fake_gh(
            dir.path(),
            "echo 'Creating pull request'\necho 'https://github.com/o/r/pull/9'\n",
        );
        let pr = cli
            .create_pull_request(dir.path(), "autoclaude/t1", "main", &PullRequestOptions::default())
            .await
            .unwrap();
        assert!(!pr.already_existed);
        assert_eq!(pr.url.as_deref(), Some("https://github.com/o/r/pull/9"));
    }
}
