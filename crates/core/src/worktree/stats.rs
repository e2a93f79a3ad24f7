//! Parsing of `git diff --shortstat` and `--name-status` output.

use std::sync::OnceLock;

use regex_lite::Regex;

use crate::models::ChangedFile;

fn files_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+) files? changed").expect("static regex"))
}

fn insertions_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+) insertions?\(\+\)").expect("static regex"))
}

fn deletions_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(\d+) deletions?\(-\)").expect("static regex"))
}

fn capture_u64(re: &Regex, text: &str) -> u64 {
    re.captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0)
}

/// `(files_changed, additions, deletions)` from a shortstat line.
///
/// Each clause is optional: `" 1 file changed, 3 insertions(+)"` has no
/// deletions clause, and empty output means no changes.
pub fn parse_shortstat(text: &str) -> (u64, u64, u64) {
    (
        capture_u64(files_re(), text),
        capture_u64(insertions_re(), text),
        capture_u64(deletions_re(), text),
    )
}

/// Parse `git diff --name-status -z` output. Renames and copies report the
/// destination path.
///
/// Records are `<status> NUL <path> NUL`, or `<status> NUL <old> NUL <new> NUL`
/// for renames (`R`) and copies (`C`).
pub fn parse_name_status(output: &str) -> Vec<ChangedFile> {
    let mut fields = output.split('\0');
    let mut files = Vec::new();
    while let Some(status) = fields.next() {
        let Some(code) = status.chars().next() else {
            continue;
        };
        let Some(first) = fields.next() else {
            break;
        };
        let path = if matches!(code, 'R' | 'C') {
            match fields.next() {
                Some(dest) => dest,
                None => break,
            }
        } else {
            first
        };
        if path.is_empty() {
            continue;
        }
        files.push(ChangedFile {
            status: code.to_string(),
            path: path.to_string(),
        });
    }
    files
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shortstat_full() {
        let line = " 3 files changed, 42 insertions(+), 7 deletions(-)";
        assert_eq!(parse_shortstat(line), (3, 42, 7));
    }

    #[test]
    fn test_shortstat_partial_clauses() {
        assert_eq!(parse_shortstat(" 1 file changed, 1 insertion(+)"), (1, 1, 0));
        assert_eq!(parse_shortstat(" 2 files changed, 5 deletions(-)"), (2, 0, 5));
        assert_eq!(parse_shortstat(" 0 files changed"), (0, 0, 0));
        assert_eq!(parse_shortstat(""), (0, 0, 0));
    }

    #[test]
    fn test_name_status() {
        let out = "M\0src/lib.rs\0A\0new.txt\0R095\0old/a.py\0new/a.py\0D\0gone.md\0";
        let files = parse_name_status(out);
        assert_eq!(files.len(), 4);
        assert_eq!(files[0].status, "M");
        assert_eq!(files[2].status, "R");
        assert_eq!(files[2].path, "new/a.py");
        assert_eq!(files[3].path, "gone.md");
    }

    #[test]
    fn test_name_status_unquoted_paths() {
        let files = parse_name_status("M\0caf\u{e9}.py\0A\0with space .txt\0");
        assert_eq!(files[0].path, "caf\u{e9}.py");
        assert_eq!(files[1].path, "with space .txt");
        assert!(parse_name_status("").is_empty());
    }
}
