//! Structured representation of a code modification between two source versions.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};
use xxhash_rust::xxh64::Xxh64;

/// Canonical spelling of a project-relative path: `./pkg/a.py` and
/// `pkg/./a.py` both become `pkg/a.py`.
pub fn normalize_path(path: &Path) -> PathBuf {
    path.components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect()
}

/// Kind of top-level declaration tracked by the change analyzer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeclarationKind {
    Function,
    Class,
    Import,
}

impl DeclarationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeclarationKind::Function => "function",
            DeclarationKind::Class => "class",
            DeclarationKind::Import => "import",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DeltaKind {
    Added,
    Removed,
    Modified,
}

/// A single declaration-level change
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SymbolDelta {
    pub kind: DeclarationKind,
    pub name: String,
    pub delta: DeltaKind,
}

impl SymbolDelta {
    pub fn new(kind: DeclarationKind, name: impl Into<String>, delta: DeltaKind) -> Self {
        Self {
            kind,
            name: name.into(),
            delta,
        }
    }
}

/// One changed hunk, 1-based line numbers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub old_start: usize,
    pub old_len: usize,
    pub new_start: usize,
    pub new_len: usize,
}

/// Analysis result for a single file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChange {
    pub path: PathBuf,
    pub symbol_deltas: Vec<SymbolDelta>,
    pub line_deltas: Vec<LineRange>,
    pub lines_added: usize,
    pub lines_removed: usize,
    /// Normalized change magnitude in [0, 1]
    pub magnitude: f64,
    /// Set when the file could not be analyzed structurally and is treated
    /// as changed in its entirety
    pub degraded: Option<String>,
}

impl FileChange {
    /// A file whose contents are considered changed in full.
    pub fn whole_file(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            symbol_deltas: Vec::new(),
            line_deltas: Vec::new(),
            lines_added: 0,
            lines_removed: 0,
            magnitude: 1.0,
            degraded: Some(reason.into()),
        }
    }

    pub fn is_whole_file(&self) -> bool {
        self.degraded.is_some()
    }

    pub fn lines_changed(&self) -> usize {
        self.lines_added + self.lines_removed
    }

    /// Count of changed function/class declarations (imports excluded)
    pub fn declarations_changed(&self) -> usize {
        self.symbol_deltas
            .iter()
            .filter(|d| d.kind != DeclarationKind::Import)
            .count()
    }

    pub fn changed_symbols(&self) -> impl Iterator<Item = &str> {
        self.symbol_deltas.iter().map(|d| d.name.as_str())
    }

    pub fn summary(&self) -> FileChangeSummary {
        let mut symbols: Vec<String> = self.changed_symbols().map(str::to_string).collect();
        symbols.sort();
        symbols.dedup();
        FileChangeSummary {
            path: self.path.clone(),
            lines_changed: self.lines_changed(),
            declarations_changed: self.declarations_changed(),
            magnitude: self.magnitude,
            symbols,
            whole_file: self.is_whole_file(),
        }
    }
}

/// Ordered, immutable set of file changes for one commit pair
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet {
    files: Vec<FileChange>,
}

impl ChangeSet {
    /// Build a change set. Files are ordered by path; a later entry for the
    /// same path replaces an earlier one.
    pub fn new(files: impl IntoIterator<Item = FileChange>) -> Self {
        let by_path: BTreeMap<PathBuf, FileChange> = files
            .into_iter()
            .map(|mut f| {
                f.path = normalize_path(&f.path);
                (f.path.clone(), f)
            })
            .collect();
        Self {
            files: by_path.into_values().collect(),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// Treat every listed path as changed in full.
    pub fn from_changed_paths<P: AsRef<Path>>(paths: &[P]) -> Self {
        Self::new(
            paths
                .iter()
                .map(|p| FileChange::whole_file(p.as_ref(), "no snapshot available")),
        )
    }

    pub fn files(&self) -> &[FileChange] {
        &self.files
    }

    pub fn file(&self, path: &Path) -> Option<&FileChange> {
        let path = normalize_path(path);
        self.files
            .binary_search_by(|f| f.path.cmp(&path))
            .ok()
            .map(|i| &self.files[i])
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn total_lines_changed(&self) -> usize {
        self.files.iter().map(FileChange::lines_changed).sum()
    }

    pub fn degraded_files(&self) -> impl Iterator<Item = &FileChange> {
        self.files.iter().filter(|f| f.is_whole_file())
    }

    pub fn summary(&self) -> ChangeSummary {
        ChangeSummary::from_files(self.files.iter().map(FileChange::summary).collect())
    }
}

/// Per-file portion of a [`ChangeSummary`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileChangeSummary {
    pub path: PathBuf,
    pub lines_changed: usize,
    pub declarations_changed: usize,
    pub magnitude: f64,
    pub symbols: Vec<String>,
    pub whole_file: bool,
}

/// Compact change description stored alongside each history entry
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeSummary {
    /// Content fingerprint; equal for identical change sets
    pub fingerprint: u64,
    pub files: Vec<FileChangeSummary>,
}

impl ChangeSummary {
    pub fn from_files(mut files: Vec<FileChangeSummary>) -> Self {
        for file in &mut files {
            file.path = normalize_path(&file.path);
        }
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let fingerprint = fingerprint(&files);
        Self { fingerprint, files }
    }

    pub fn file(&self, path: &Path) -> Option<&FileChangeSummary> {
        let path = normalize_path(path);
        self.files.iter().find(|f| f.path == path)
    }

    pub fn touches_any<'a>(&self, mut paths: impl Iterator<Item = &'a Path>) -> bool {
        paths.any(|p| self.file(p).is_some())
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

fn fingerprint(files: &[FileChangeSummary]) -> u64 {
    let mut hasher = Xxh64::new(0);
    for file in files {
        hasher.update(file.path.to_string_lossy().as_bytes());
        hasher.update(&[0]);
        hasher.update(&(file.lines_changed as u64).to_le_bytes());
        hasher.update(&(file.declarations_changed as u64).to_le_bytes());
        hasher.update(&[file.whole_file as u8]);
        for symbol in &file.symbols {
            hasher.update(symbol.as_bytes());
            hasher.update(&[0]);
        }
    }
    hasher.digest()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn modified(path: &str, symbol: &str) -> FileChange {
        FileChange {
            path: PathBuf::from(path),
            symbol_deltas: vec![SymbolDelta::new(
                DeclarationKind::Function,
                symbol,
                DeltaKind::Modified,
            )],
            line_deltas: vec![],
            lines_added: 2,
            lines_removed: 1,
            magnitude: 0.2,
            degraded: None,
        }
    }

    #[test]
    fn test_files_are_ordered_by_path() {
        let cs = ChangeSet::new(vec![modified("b.py", "f"), modified("a.py", "g")]);
        let paths: Vec<_> = cs.files().iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("a.py"), PathBuf::from("b.py")]);
        assert!(cs.file(Path::new("b.py")).is_some());
        assert!(cs.file(Path::new("c.py")).is_none());
    }

    #[test]
    fn test_fingerprint_ignores_input_order() {
        let a = ChangeSet::new(vec![modified("a.py", "f"), modified("b.py", "g")]);
        let b = ChangeSet::new(vec![modified("b.py", "g"), modified("a.py", "f")]);
        assert_eq!(a.summary().fingerprint, b.summary().fingerprint);

        let c = ChangeSet::new(vec![modified("a.py", "h"), modified("b.py", "g")]);
        assert_ne!(a.summary().fingerprint, c.summary().fingerprint);
    }

    #[test]
    fn test_paths_are_normalized() {
        let cs = ChangeSet::from_changed_paths(&["./pkg/auth.py", "pkg/./db.py"]);
        let paths: Vec<_> = cs.files().iter().map(|f| f.path.clone()).collect();
        assert_eq!(paths, vec![PathBuf::from("pkg/auth.py"), PathBuf::from("pkg/db.py")]);
        assert!(cs.file(Path::new("./pkg/db.py")).is_some());
        assert_eq!(
            cs.summary().fingerprint,
            ChangeSet::from_changed_paths(&["pkg/auth.py", "pkg/db.py"]).summary().fingerprint
        );
    }

    #[test]
    fn test_whole_file_change_has_full_magnitude() {
        let cs = ChangeSet::from_changed_paths(&["pkg/auth.py"]);
        let file = &cs.files()[0];
        assert!(file.is_whole_file());
        assert_eq!(file.magnitude, 1.0);
        assert!(cs.summary().files[0].whole_file);
    }

    #[test]
    fn test_imports_do_not_count_as_declarations() {
        let mut change = modified("a.py", "f");
        change
            .symbol_deltas
            .push(SymbolDelta::new(DeclarationKind::Import, "os", DeltaKind::Added));
        assert_eq!(change.declarations_changed(), 1);
        assert_eq!(change.summary().symbols, vec!["f".to_string(), "os".to_string()]);
    }
}
