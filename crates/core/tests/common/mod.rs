//! Shared helpers for the integration tests: throwaway repositories built
//! with the real `git` binary.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tempfile::TempDir;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test harness. Honors `RUST_LOG`.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn git_available() -> bool {
    Command::new("git")
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// Run git in `dir`, panicking on failure. Returns stdout.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let out = Command::new("git")
        .args(args)
        .current_dir(dir)
        .env("GIT_TERMINAL_PROMPT", "0")
        .output()
        .expect("failed to run git");
    assert!(
        out.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&out.stderr)
    );
    String::from_utf8_lossy(&out.stdout).to_string()
}

/// Run git in `dir` and return whether it succeeded.
pub fn git_ok(dir: &Path, args: &[&str]) -> bool {
    Command::new("git")
        .args(args)
        .current_dir(dir)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

/// A repository on `main` with one commit containing `.gitignore` and
/// `README.md`. The metadata dir and `*.log` are ignored.
pub fn init_repo(tmp: &TempDir) -> PathBuf {
    let repo = tmp.path().join("work").join("repo");
    std::fs::create_dir_all(&repo).unwrap();
    git(&repo, &["init", "-q"]);
    git(&repo, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    git(&repo, &["config", "user.email", "test@example.com"]);
    git(&repo, &["config", "user.name", "Test User"]);
    git(&repo, &["config", "commit.gpgsign", "false"]);
    std::fs::write(repo.join(".gitignore"), ".autoclaude/\n*.log\n").unwrap();
    std::fs::write(repo.join("README.md"), "# demo\n").unwrap();
    git(&repo, &["add", "-A"]);
    git(&repo, &["commit", "-q", "-m", "initial commit"]);
    repo
}

/// Write `path` under `dir` and commit it.
pub fn commit_file(dir: &Path, path: &str, content: &str, message: &str) {
    write_file(dir, path, content);
    git(dir, &["add", "--", path]);
    git(dir, &["commit", "-q", "-m", message]);
}

pub fn write_file(dir: &Path, path: &str, content: &str) {
    let full = dir.join(path);
    if let Some(parent) = full.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(full, content).unwrap();
}

pub fn read_file(dir: &Path, path: &str) -> String {
    std::fs::read_to_string(dir.join(path)).unwrap()
}

/// Ten numbered lines, so edits to different lines merge cleanly.
pub fn numbered(prefix: &str) -> String {
    (1..=10).map(|i| format!("{prefix} line {i}\n")).collect()
}

/// Current branch, HEAD, index and status of the working copy.
#[derive(Debug, PartialEq, Eq)]
pub struct Snapshot {
    pub branch: String,
    pub head: String,
    pub index: String,
    pub status: String,
}

pub fn snapshot(dir: &Path) -> Snapshot {
    Snapshot {
        branch: git(dir, &["rev-parse", "--abbrev-ref", "HEAD"]),
        head: git(dir, &["rev-parse", "HEAD"]),
        index: git(dir, &["ls-files", "-s"]),
        status: git(dir, &["status", "--porcelain", "--ignored"]),
    }
}

pub fn staged_files(dir: &Path) -> Vec<String> {
    git(dir, &["diff", "--cached", "--name-only"])
        .lines()
        .map(str::to_string)
        .collect()
}
