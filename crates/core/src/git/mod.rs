//! External command plumbing: the `git` and `gh` command surfaces.

pub mod client;
pub mod github;
pub mod runner;

pub use client::GitCli;
pub use github::{GitHubCli, PullRequest, PullRequestOptions};
pub use runner::{CommandOutput, CommandRunner, RawOutput, SIGNAL_EXIT_CODE, TIMEOUT_EXIT_CODE};
