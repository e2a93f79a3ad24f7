//! Conflict file extraction from `git merge-tree --write-tree -z` output.
//!
//! Two tiers. The structured tier reads the conflicted-file section, or the
//! path lists of the `CONFLICT` messages when that section is empty. If that
//! yields nothing, the heuristic tier intersects the files each side changed
//! since the merge base. The heuristic over-reports on purpose: every true
//! conflict touches a file both sides changed, so it is always a superset.

use std::collections::BTreeSet;

/// Which tier produced a conflict list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictSource {
    /// Parsed from merge-tree output.
    Parsed,
    /// File intersection since the merge base.
    Intersection,
}

/// Paths named in `merge-tree --write-tree --name-only -z` output.
///
/// Every field is NUL-terminated and paths are never quoted:
///
/// ```text
/// <tree oid> NUL
/// <path> NUL ...                  conflicted-file section
/// NUL                             end of section
/// <n> NUL <path1> NUL ... <pathN> NUL <type> NUL <message> NUL ...
/// ```
///
/// Message types starting with `CONFLICT` contribute their paths only when
/// the conflicted-file section is empty.
pub fn parse_merge_tree_conflicts(output: &str) -> BTreeSet<String> {
    let mut fields = output.split('\0');
    if fields.next().is_none() {
        return BTreeSet::new();
    }

    let mut section = BTreeSet::new();
    for field in fields.by_ref() {
        if field.is_empty() {
            break;
        }
        // Without --name-only the entry is "<mode> <oid> <stage>\t<path>".
        let path = field.split_once('\t').map_or(field, |(_, path)| path);
        section.insert(path.to_string());
    }
    if !section.is_empty() {
        return section;
    }

    let mut from_messages = BTreeSet::new();
    while let Some(count) = fields.next() {
        let Ok(count) = count.parse::<usize>() else {
            break;
        };
        let paths: Vec<&str> = fields.by_ref().take(count).collect();
        let (Some(kind), Some(_message)) = (fields.next(), fields.next()) else {
            break;
        };
        if paths.len() == count && kind.starts_with("CONFLICT") {
            from_messages.extend(paths.into_iter().filter(|p| !p.is_empty()).map(str::to_string));
        }
    }
    from_messages
}

/// Files changed on both sides since the merge base.
pub fn intersect_changed_files(base_changed: &[String], task_changed: &[String]) -> BTreeSet<String> {
    let base: BTreeSet<&str> = base_changed.iter().map(String::as_str).collect();
    task_changed
        .iter()
        .filter(|f| base.contains(f.as_str()))
        .cloned()
        .collect()
}

/// Apply the two-tier strategy: parsed files if any, else the intersection.
pub fn resolve_conflicting_files(
    parsed: BTreeSet<String>,
    base_changed: &[String],
    task_changed: &[String],
) -> (BTreeSet<String>, ConflictSource) {
    if !parsed.is_empty() {
        return (parsed, ConflictSource::Parsed);
    }
    (
        intersect_changed_files(base_changed, task_changed),
        ConflictSource::Intersection,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    /// Output of a merge where both sides edited `yarn.lock` and `é.py`,
    /// and the base renamed `old/a.py` that the task deleted.
    const MIXED: &str = "8ef42fb8336eebc212195e8cb92d0190f0ba81bf\0new/a.py\0yarn.lock\0\u{e9}.py\0\0\
2\0new/a.py\0old/a.py\0CONFLICT (rename/delete)\0CONFLICT (rename/delete): old/a.py renamed to new/a.py in main, but deleted in t.\n\0\
1\0yarn.lock\0Auto-merging\0Auto-merging yarn.lock\n\0\
1\0yarn.lock\0CONFLICT (contents)\0CONFLICT (content): Merge conflict in yarn.lock\n\0\
1\0\u{e9}.py\0CONFLICT (contents)\0CONFLICT (content): Merge conflict in \u{e9}.py\n\0";

    #[test]
    fn test_parse_conflicted_file_section() {
        let files = parse_merge_tree_conflicts(MIXED);
        assert_eq!(
            files.into_iter().collect::<Vec<_>>(),
            vec!["new/a.py", "yarn.lock", "\u{e9}.py"]
        );
    }

    #[test]
    fn test_rename_delete_message_yields_real_paths() {
        let out = "deadbeef\0\0\
2\0new/a.py\0old/a.py\0CONFLICT (rename/delete)\0CONFLICT (rename/delete): old/a.py renamed to new/a.py in main, but deleted in autoclaude/t1.\n\0";
        let files = parse_merge_tree_conflicts(out);
        assert_eq!(files.into_iter().collect::<Vec<_>>(), vec!["new/a.py", "old/a.py"]);
    }

    #[test]
    fn test_messages_other_than_conflict_are_ignored() {
        let out = "deadbeef\0\0\
1\0a.txt\0Auto-merging\0Auto-merging a.txt\n\0\
1\0b.txt\0CONFLICT (modify/delete)\0CONFLICT (modify/delete): b.txt deleted in main and modified in t.\n\0";
        let files = parse_merge_tree_conflicts(out);
        assert_eq!(files.into_iter().collect::<Vec<_>>(), vec!["b.txt"]);
    }

    #[test]
    fn test_paths_with_spaces_are_verbatim() {
        let out = "deadbeef\0 lead.txt\0dir/trail \0\0";
        let files = parse_merge_tree_conflicts(out);
        assert!(files.contains(" lead.txt"));
        assert!(files.contains("dir/trail "));
    }

    #[test]
    fn test_parse_tree_only_is_empty() {
        assert!(parse_merge_tree_conflicts("deadbeef\0").is_empty());
        assert!(parse_merge_tree_conflicts("").is_empty());
        assert!(parse_merge_tree_conflicts("deadbeef\0\0garbage\0").is_empty());
    }

    #[test]
    fn test_intersection_fallback_scenario() {
        let base_changed = strings(&["a.py", "b.py"]);
        let task_changed = strings(&["b.py", "c.py"]);
        let (files, source) = resolve_conflicting_files(BTreeSet::new(), &base_changed, &task_changed);
        assert_eq!(source, ConflictSource::Intersection);
        assert_eq!(files.into_iter().collect::<Vec<_>>(), vec!["b.py"]);
    }

    #[test]
    fn test_parsed_files_win() {
        let parsed: BTreeSet<String> = ["x.py".to_string()].into_iter().collect();
        let (files, source) =
            resolve_conflicting_files(parsed, &strings(&["b.py"]), &strings(&["b.py"]));
        assert_eq!(source, ConflictSource::Parsed);
        assert!(files.contains("x.py"));
        assert!(!files.contains("b.py"));
    }

    #[test]
    fn test_intersection_is_superset_of_overlap() {
        let base_changed = strings(&["a", "b", "c", "d"]);
        let task_changed = strings(&["c", "d", "e"]);
        let files = intersect_changed_files(&base_changed, &task_changed);
        assert_eq!(files.len(), 2);
        assert!(files.contains("c") && files.contains("d"));
    }
}
