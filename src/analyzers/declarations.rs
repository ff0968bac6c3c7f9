//! Top-level declarations and their structural diff.
//!
//! Declarations are matched by structural identity (kind + name + signature),
//! never by position, so a declaration that moved without changing produces
//! no delta.

use crate::core::{DeclarationKind, DeltaKind, SymbolDelta};
use std::collections::{BTreeMap, BTreeSet};
use xxhash_rust::xxh64::xxh64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub kind: DeclarationKind,
    pub name: String,
    /// Normalized parameter list / base-class list; empty for imports
    pub signature: String,
    /// Digest of the normalized declaration text
    pub digest: u64,
    pub start_line: usize,
    pub end_line: usize,
}

impl Declaration {
    pub fn import(name: impl Into<String>, line: usize) -> Self {
        Self {
            kind: DeclarationKind::Import,
            name: name.into(),
            signature: String::new(),
            digest: 0,
            start_line: line,
            end_line: line,
        }
    }

    fn identity(&self) -> (DeclarationKind, &str, &str) {
        (self.kind, self.name.as_str(), self.signature.as_str())
    }
}

/// Digest of declaration text that ignores trailing whitespace and blank lines.
pub fn body_digest(text: &str) -> u64 {
    let normalized: Vec<&str> = text
        .lines()
        .map(str::trim_end)
        .filter(|l| !l.is_empty())
        .collect();
    xxh64(normalized.join("\n").as_bytes(), 0)
}

/// Collapse runs of whitespace to a single space.
pub fn normalize_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Diff two declaration lists.
///
/// A declaration whose signature changed shows up as one `Modified` delta
/// rather than a removed/added pair.
pub fn diff_declarations(old: &[Declaration], new: &[Declaration]) -> Vec<SymbolDelta> {
    let old_by_id: BTreeMap<_, u64> = old.iter().map(|d| (d.identity(), d.digest)).collect();
    let new_by_id: BTreeMap<_, u64> = new.iter().map(|d| (d.identity(), d.digest)).collect();

    let mut added: BTreeSet<(DeclarationKind, &str)> = BTreeSet::new();
    let mut removed: BTreeSet<(DeclarationKind, &str)> = BTreeSet::new();
    let mut deltas = BTreeSet::new();

    for (id, digest) in &new_by_id {
        match old_by_id.get(id) {
            None => {
                added.insert((id.0, id.1));
            }
            Some(old_digest) if old_digest != digest => {
                deltas.insert(SymbolDelta::new(id.0, id.1, DeltaKind::Modified));
            }
            Some(_) => {}
        }
    }
    for id in old_by_id.keys() {
        if !new_by_id.contains_key(id) {
            removed.insert((id.0, id.1));
        }
    }

    for key in added.union(&removed) {
        let delta = match (added.contains(key), removed.contains(key)) {
            (true, true) => DeltaKind::Modified,
            (true, false) => DeltaKind::Added,
            _ => DeltaKind::Removed,
        };
        deltas.insert(SymbolDelta::new(key.0, key.1, delta));
    }

    deltas.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn func(name: &str, signature: &str, body: &str, line: usize) -> Declaration {
        Declaration {
            kind: DeclarationKind::Function,
            name: name.to_string(),
            signature: signature.to_string(),
            digest: body_digest(body),
            start_line: line,
            end_line: line + 1,
        }
    }

    #[test]
    fn test_moved_declaration_yields_no_delta() {
        let old = vec![func("a", "()", "def a(): pass", 1), func("b", "()", "def b(): pass", 5)];
        let new = vec![func("b", "()", "def b(): pass", 1), func("a", "()", "def a(): pass", 9)];
        assert!(diff_declarations(&old, &new).is_empty());
    }

    #[test]
    fn test_signature_change_is_single_modification() {
        let old = vec![func("a", "(x)", "def a(x): pass", 1)];
        let new = vec![func("a", "(x, y)", "def a(x, y): pass", 1)];
        assert_eq!(
            diff_declarations(&old, &new),
            vec![SymbolDelta::new(DeclarationKind::Function, "a", DeltaKind::Modified)]
        );
    }

    #[test]
    fn test_added_removed_and_body_changes() {
        let old = vec![
            func("keep", "()", "def keep(): return 1", 1),
            func("gone", "()", "def gone(): pass", 3),
            Declaration::import("os", 1),
        ];
        let new = vec![
            func("keep", "()", "def keep(): return 2", 1),
            func("fresh", "()", "def fresh(): pass", 3),
            Declaration::import("sys", 1),
        ];
        let deltas = diff_declarations(&old, &new);
        assert!(deltas.contains(&SymbolDelta::new(
            DeclarationKind::Function,
            "keep",
            DeltaKind::Modified
        )));
        assert!(deltas.contains(&SymbolDelta::new(
            DeclarationKind::Function,
            "gone",
            DeltaKind::Removed
        )));
        assert!(deltas.contains(&SymbolDelta::new(
            DeclarationKind::Function,
            "fresh",
            DeltaKind::Added
        )));
        assert!(deltas.contains(&SymbolDelta::new(
            DeclarationKind::Import,
            "os",
            DeltaKind::Removed
        )));
        assert!(deltas.contains(&SymbolDelta::new(
            DeclarationKind::Import,
            "sys",
            DeltaKind::Added
        )));
        assert_eq!(deltas.len(), 5);
    }

    #[test]
    fn test_body_digest_ignores_trailing_whitespace() {
        assert_eq!(
            body_digest("def a():  \n\n    return 1\n"),
            body_digest("def a():\n    return 1")
        );
        assert_ne!(body_digest("def a():\n    return 1"), body_digest("def a():\n  return 1"));
    }
}
