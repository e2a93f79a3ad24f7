//! Unified-diff hunk parsing and hunk-level reassembly.
//!
//! The base side of a diff is the `-` side and the task side is the `+`
//! side. Context lines belong to both. A diff without hunks (binary or
//! mode-only change) parses to an empty list.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::errors::ResolutionError;
use crate::models::{Hunk, HunkChoice, HunkSide};

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^@@ -(\d+)(?:,(\d+))? \+(\d+)(?:,(\d+))? @@").expect("static regex")
    })
}

struct Header {
    base_start: i64,
    base_count: i64,
    task_start: i64,
    task_count: i64,
}

fn parse_header(line: &str) -> Option<Header> {
    let caps = header_re().captures(line)?;
    let num = |i: usize, default: i64| -> Option<i64> {
        match caps.get(i) {
            Some(m) => m.as_str().parse().ok(),
            None => Some(default),
        }
    };
    Some(Header {
        base_start: num(1, 0)?,
        base_count: num(2, 1)?,
        task_start: num(3, 0)?,
        task_count: num(4, 1)?,
    })
}

/// Split on `\n` only. A `\r` before the newline stays part of the line,
/// so CRLF content survives a parse and rebuild.
fn split_lines(text: &str) -> Vec<&str> {
    if text.is_empty() {
        return Vec::new();
    }
    text.strip_suffix('\n').unwrap_or(text).split('\n').collect()
}

/// Parse unified diff text into hunks, in input order.
pub fn parse_hunks(diff: &str) -> Vec<Hunk> {
    let mut hunks = Vec::new();
    let mut current: Option<Hunk> = None;

    for line in split_lines(diff) {
        if let Some(h) = parse_header(line) {
            if let Some(done) = current.take() {
                hunks.push(done);
            }
            current = Some(Hunk {
                id: format!("hunk-{}", hunks.len() + 1),
                start_line_base: h.base_start,
                end_line_base: h.base_start + h.base_count - 1,
                start_line_task: h.task_start,
                end_line_task: h.task_start + h.task_count - 1,
                content_base: Vec::new(),
                content_task: Vec::new(),
            });
            continue;
        }

        // A new file section ends the running hunk.
        if line.starts_with("diff --git ") {
            if let Some(done) = current.take() {
                hunks.push(done);
            }
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            continue;
        };
        if let Some(added) = line.strip_prefix('+') {
            hunk.content_task.push(added.to_string());
        } else if let Some(removed) = line.strip_prefix('-') {
            hunk.content_base.push(removed.to_string());
        } else if let Some(ctx) = line.strip_prefix(' ') {
            hunk.content_base.push(ctx.to_string());
            hunk.content_task.push(ctx.to_string());
        } else if line.starts_with('\\') {
            // "\ No newline at end of file"
        } else if line.is_empty() {
            // Some tools strip the leading space of blank context lines.
            hunk.content_base.push(String::new());
            hunk.content_task.push(String::new());
        }
    }

    if let Some(done) = current.take() {
        hunks.push(done);
    }
    hunks
}

/// Rebuild a file from its base content, taking the task side for every hunk
/// whose choice is [`HunkSide::Task`]. Hunks without a choice keep the base.
///
/// Fails if a choice names an unknown hunk or a hunk's base lines no longer
/// match `base_content`.
pub fn rebuild_from_hunks(
    path: &str,
    base_content: &str,
    hunks: &[Hunk],
    choices: &[HunkChoice],
) -> Result<String, ResolutionError> {
    for choice in choices {
        if !hunks.iter().any(|h| h.id == choice.hunk_id) {
            return Err(ResolutionError::UnknownHunk {
                path: path.to_string(),
                hunk_id: choice.hunk_id.clone(),
            });
        }
    }

    let mut lines: Vec<String> = split_lines(base_content).into_iter().map(str::to_string).collect();
    let trailing_newline = base_content.is_empty() || base_content.ends_with('\n');

    // Back to front so earlier indices stay valid.
    for hunk in hunks.iter().rev() {
        let take_task = choices
            .iter()
            .any(|c| c.hunk_id == hunk.id && c.side == HunkSide::Task);
        if !take_task {
            continue;
        }

        let len = hunk.base_len().max(0) as usize;
        let start = if len == 0 {
            hunk.start_line_base.max(0) as usize
        } else {
            (hunk.start_line_base - 1).max(0) as usize
        };
        let stale = || ResolutionError::StaleHunk {
            path: path.to_string(),
            hunk_id: hunk.id.clone(),
        };
        if start + len > lines.len() || lines[start..start + len] != hunk.content_base[..] {
            return Err(stale());
        }
        lines.splice(start..start + len, hunk.content_task.iter().cloned());
    }

    let mut out = lines.join("\n");
    if trailing_newline && !lines.is_empty() {
        out.push('\n');
    }
    Ok(out)
}
