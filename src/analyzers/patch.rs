//! Unified-diff input for callers that have a patch but no source snapshots.
//!
//! Without both versions there is no syntax tree to diff, so every file is
//! recorded as a degraded (whole-file) change whose magnitude comes from the
//! hunk line counts alone.

use crate::core::{ChangeSet, FileChange, LineRange};
use std::path::PathBuf;

/// Changed lines at which a patch-only file reaches full magnitude
const PATCH_LINE_SATURATION: f64 = 100.0;

#[derive(Debug, Default)]
struct PatchFile {
    path: Option<PathBuf>,
    old_path: Option<PathBuf>,
    added: usize,
    removed: usize,
    ranges: Vec<LineRange>,
}

impl PatchFile {
    fn into_change(self) -> Option<FileChange> {
        let path = self.path.or(self.old_path)?;
        let mut change = FileChange::whole_file(path, "patch without source snapshots");
        change.lines_added = self.added;
        change.lines_removed = self.removed;
        change.line_deltas = self.ranges;
        change.magnitude = ((self.added + self.removed) as f64 / PATCH_LINE_SATURATION).min(1.0);
        Some(change)
    }
}

/// Parse `git diff` style output into a change set.
pub fn parse_unified_diff(patch: &str) -> ChangeSet {
    let mut files = Vec::new();
    let mut current: Option<PatchFile> = None;

    for line in patch.lines() {
        if line.starts_with("diff --git ") {
            if let Some(done) = current.take().and_then(PatchFile::into_change) {
                files.push(done);
            }
            current = Some(PatchFile::default());
        } else if let Some(rest) = line.strip_prefix("--- ") {
            let file = current.get_or_insert_with(PatchFile::default);
            if file.path.is_some() {
                // A new file section without a `diff --git` header
                if let Some(done) = current.take().and_then(PatchFile::into_change) {
                    files.push(done);
                }
                current = Some(PatchFile::default());
            }
            if let Some(file) = current.as_mut() {
                file.old_path = patch_path(rest, "a/");
            }
        } else if let Some(rest) = line.strip_prefix("+++ ") {
            let file = current.get_or_insert_with(PatchFile::default);
            file.path = patch_path(rest, "b/");
        } else if line.starts_with("@@") {
            if let (Some(file), Some(range)) = (current.as_mut(), parse_hunk_header(line)) {
                file.ranges.push(range);
            }
        } else if line.starts_with('+') {
            if let Some(file) = current.as_mut() {
                file.added += 1;
            }
        } else if line.starts_with('-') {
            if let Some(file) = current.as_mut() {
                file.removed += 1;
            }
        }
    }

    if let Some(done) = current.and_then(PatchFile::into_change) {
        files.push(done);
    }
    ChangeSet::new(files)
}

fn patch_path(raw: &str, prefix: &str) -> Option<PathBuf> {
    let raw = raw.split('\t').next().unwrap_or(raw).trim();
    if raw == "/dev/null" {
        return None;
    }
    Some(PathBuf::from(raw.strip_prefix(prefix).unwrap_or(raw)))
}

/// `@@ -old_start,old_len +new_start,new_len @@`
fn parse_hunk_header(line: &str) -> Option<LineRange> {
    let mut parts = line.split_whitespace().skip(1);
    let (old_start, old_len) = parse_span(parts.next()?.strip_prefix('-')?)?;
    let (new_start, new_len) = parse_span(parts.next()?.strip_prefix('+')?)?;
    Some(LineRange {
        old_start,
        old_len,
        new_start,
        new_len,
    })
}

fn parse_span(span: &str) -> Option<(usize, usize)> {
    match span.split_once(',') {
        Some((start, len)) => Some((start.parse().ok()?, len.parse().ok()?)),
        None => Some((span.parse().ok()?, 1)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;
    use std::path::Path;

    const PATCH: &str = indoc! {r#"
        diff --git a/pkg/auth.py b/pkg/auth.py
        index 83db48f..bf269f4 100644
        --- a/pkg/auth.py
        +++ b/pkg/auth.py
        @@ -10,2 +10,3 @@ def login(user):
        -    return False
        -    pass
        +    return True
        +    # audited
        +    pass
        diff --git a/pkg/old.py b/pkg/old.py
        deleted file mode 100644
        --- a/pkg/old.py
        +++ /dev/null
        @@ -1 +0,0 @@
        -x = 1
    "#};

    #[test]
    fn test_parses_files_and_hunks() {
        let cs = parse_unified_diff(PATCH);
        assert_eq!(cs.len(), 2);

        let auth = cs.file(Path::new("pkg/auth.py")).unwrap();
        assert_eq!(auth.lines_added, 3);
        assert_eq!(auth.lines_removed, 2);
        assert_eq!(
            auth.line_deltas,
            vec![LineRange {
                old_start: 10,
                old_len: 2,
                new_start: 10,
                new_len: 3
            }]
        );
        assert!((auth.magnitude - 0.05).abs() < 1e-12);
        assert!(auth.is_whole_file());

        let deleted = cs.file(Path::new("pkg/old.py")).unwrap();
        assert_eq!(deleted.lines_removed, 1);
        assert_eq!(deleted.line_deltas[0].old_len, 1);
    }

    #[test]
    fn test_empty_patch_is_empty_change_set() {
        assert!(parse_unified_diff("").is_empty());
    }
}
