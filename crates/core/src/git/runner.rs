//! Asynchronous external-command runner.
//!
//! Every git/gh invocation goes through [`CommandRunner::run`]. A non-zero
//! exit is returned, not raised, and a timeout becomes exit code
//! [`TIMEOUT_EXIT_CODE`] with a synthetic stderr message. Only a failure to
//! spawn the process at all is an `Err`.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, warn};

use crate::errors::CommandError;

/// Exit code reported for a command killed by its timeout.
pub const TIMEOUT_EXIT_CODE: i32 = -1;

/// Exit code reported when the child was terminated by a signal.
pub const SIGNAL_EXIT_CODE: i32 = -2;

/// Captured result of one external command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn timed_out(&self) -> bool {
        self.exit_code == TIMEOUT_EXIT_CODE
    }

    /// Stdout with surrounding whitespace removed.
    pub fn stdout_trimmed(&self) -> &str {
        self.stdout.trim()
    }

    /// Non-empty stdout lines, trimmed.
    pub fn stdout_lines(&self) -> impl DoubleEndedIterator<Item = &str> {
        self.stdout.lines().map(str::trim).filter(|l| !l.is_empty())
    }

    /// Paths from `-z` output, split on NUL and kept verbatim.
    pub fn stdout_paths(&self) -> impl Iterator<Item = &str> {
        self.stdout.split('\0').filter(|p| !p.is_empty())
    }

    /// Stderr if present, otherwise stdout. Git prints some failures on stdout.
    pub fn detail(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            self.stdout.trim().to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Like [`CommandOutput`], but stdout is kept as raw bytes. Used for blob
/// content, which must round-trip exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOutput {
    pub exit_code: i32,
    pub stdout: Vec<u8>,
    pub stderr: String,
}

impl RawOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

impl From<RawOutput> for CommandOutput {
    fn from(raw: RawOutput) -> Self {
        let stdout = match String::from_utf8(raw.stdout) {
            Ok(text) => text,
            Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
        };
        CommandOutput {
            exit_code: raw.exit_code,
            stdout,
            stderr: raw.stderr,
        }
    }
}

/// Runs one external program (`git`, `gh`) with per-call timeouts.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    program: String,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runner for the `git` binary.
    pub fn git() -> Self {
        Self::new("git")
    }

    /// Runner for the GitHub CLI.
    pub fn gh() -> Self {
        Self::new("gh")
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run `program args...` in `cwd`, waiting at most `timeout`.
    ///
    /// Output is decoded lossily; invalid UTF-8 never fails the call. The
    /// child is killed if the timeout fires.
    pub async fn run(
        &self,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<CommandOutput, CommandError> {
        self.run_raw(args, cwd, timeout).await.map(CommandOutput::from)
    }

    /// [`run`](Self::run) without decoding stdout.
    pub async fn run_raw(
        &self,
        args: &[&str],
        cwd: &Path,
        timeout: Duration,
    ) -> Result<RawOutput, CommandError> {
        if !cwd.is_dir() {
            return Err(CommandError::MissingWorkingDir(cwd.display().to_string()));
        }

        let mut cmd = Command::new(&self.program);
        cmd.current_dir(cwd)
            .args(args)
            .env("GIT_TERMINAL_PROMPT", "0")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %self.program, args = ?args, cwd = %cwd.display(), "running command");
        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::BinaryNotFound(self.program.clone())
            } else {
                CommandError::IoError(e)
            }
        })?;

        match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(output) => {
                let output = output?;
                let exit_code = output.status.code().unwrap_or(SIGNAL_EXIT_CODE);
                let result = RawOutput {
                    exit_code,
                    stdout: output.stdout,
                    stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
                };
                if !result.success() {
                    debug!(program = %self.program, args = ?args, exit_code, stderr = %result.stderr.trim(), "command exited non-zero");
                }
                Ok(result)
            }
            Err(_) => {
                warn!(program = %self.program, args = ?args, timeout_secs = timeout.as_secs(), "command timed out");
                Ok(RawOutput {
                    exit_code: TIMEOUT_EXIT_CODE,
                    stdout: Vec::new(),
                    stderr: format!(
                        "{} {} timed out after {}s",
                        self.program,
                        args.join(" "),
                        timeout.as_secs()
                    ),
                })
            }
        }
    }
}
