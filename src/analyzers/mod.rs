//! Change analysis: turn old/new source snapshots into a [`ChangeSet`].
//!
//! Parsing is pluggable per language through [`LanguageParser`]; Python is
//! the only built-in. A file that fails to parse does not abort the change
//! set: it is recorded as a whole-file change and scoring continues.

pub mod declarations;
pub mod line_diff;
pub mod patch;
pub mod python;

use crate::core::{ChangeSet, DeclarationKind, FileChange};
use crate::errors::{Result, ResultExt};
use declarations::{diff_declarations, Declaration};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::{debug, debug_span, warn};
use walkdir::WalkDir;

pub use python::PythonParser;

/// Weight of the lines-changed ratio in the magnitude score
pub const LINE_WEIGHT: f64 = 0.6;
/// Weight of the changed-declaration component in the magnitude score.
/// Only function and class deltas count here; import edges still reach
/// coupled tests through the changed-symbol list and the lines ratio.
pub const DECLARATION_WEIGHT: f64 = 0.4;
/// Changed-declaration count at which the declaration component saturates
pub const DECLARATION_SATURATION: usize = 10;

/// Declarations and size of one parsed source version
#[derive(Debug, Clone, Default)]
pub struct ParsedSource {
    pub declarations: Vec<Declaration>,
    pub total_lines: usize,
}

/// Per-language syntax front end
pub trait LanguageParser: Send + Sync {
    fn language(&self) -> &'static str;
    fn handles(&self, path: &Path) -> bool;
    fn parse(&self, content: &str, path: &Path) -> Result<ParsedSource>;
    /// Test identifiers (relative to the file) defined in a test source
    fn test_names(&self, content: &str, path: &Path) -> Result<Vec<String>>;
}

/// Old/new contents of one file. `None` means the file is absent on that side.
#[derive(Debug, Clone)]
pub struct SourcePair {
    pub path: PathBuf,
    pub old: Option<String>,
    pub new: Option<String>,
}

impl SourcePair {
    pub fn new(path: impl Into<PathBuf>, old: Option<String>, new: Option<String>) -> Self {
        Self {
            path: path.into(),
            old,
            new,
        }
    }
}

pub struct ChangeAnalyzer {
    parser: Box<dyn LanguageParser>,
}

impl Default for ChangeAnalyzer {
    fn default() -> Self {
        Self::python()
    }
}

impl ChangeAnalyzer {
    pub fn new(parser: Box<dyn LanguageParser>) -> Self {
        Self { parser }
    }

    pub fn python() -> Self {
        Self::new(Box::new(PythonParser::new()))
    }

    pub fn parser(&self) -> &dyn LanguageParser {
        self.parser.as_ref()
    }

    /// Analyze a single file's two versions.
    pub fn analyze(&self, path: &Path, old: Option<&str>, new: Option<&str>) -> ChangeSet {
        ChangeSet::new(self.analyze_file_degrading(path, old, new))
    }

    /// Analyze many files; unparsable files degrade to whole-file changes.
    pub fn analyze_all(&self, pairs: &[SourcePair]) -> ChangeSet {
        let _span = debug_span!("analyze_change_set", files = pairs.len()).entered();
        ChangeSet::new(pairs.iter().filter_map(|pair| {
            self.analyze_file_degrading(&pair.path, pair.old.as_deref(), pair.new.as_deref())
        }))
    }

    /// Structural analysis of one file, failing with `Error::Parse` when
    /// either version is syntactically invalid. Returns `None` when both
    /// versions are identical or absent.
    pub fn try_analyze_file(
        &self,
        path: &Path,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Result<Option<FileChange>> {
        if old == new {
            return Ok(None);
        }
        let old_parsed = old
            .map(|src| self.parser.parse(src, path))
            .transpose()?
            .unwrap_or_default();
        let new_parsed = new
            .map(|src| self.parser.parse(src, path))
            .transpose()?
            .unwrap_or_default();

        let lines = line_diff::line_changes(old.unwrap_or(""), new.unwrap_or(""));
        let symbol_deltas = diff_declarations(&old_parsed.declarations, &new_parsed.declarations);
        let changed_decls = symbol_deltas
            .iter()
            .filter(|d| d.kind != DeclarationKind::Import)
            .count();
        let total_lines = old_parsed.total_lines.max(new_parsed.total_lines);
        let magnitude = change_magnitude(lines.added + lines.removed, total_lines, changed_decls);

        debug!(
            path = %path.display(),
            symbols = symbol_deltas.len(),
            magnitude,
            "analyzed file"
        );

        Ok(Some(FileChange {
            path: path.to_path_buf(),
            symbol_deltas,
            line_deltas: lines.ranges,
            lines_added: lines.added,
            lines_removed: lines.removed,
            magnitude,
            degraded: None,
        }))
    }

    fn analyze_file_degrading(
        &self,
        path: &Path,
        old: Option<&str>,
        new: Option<&str>,
    ) -> Option<FileChange> {
        match self.try_analyze_file(path, old, new) {
            Ok(change) => change,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "treating unparsable file as fully changed");
                let lines = line_diff::line_changes(old.unwrap_or(""), new.unwrap_or(""));
                let mut change = FileChange::whole_file(path, e.to_string());
                change.lines_added = lines.added;
                change.lines_removed = lines.removed;
                change.line_deltas = lines.ranges;
                Some(change)
            }
        }
    }

    /// Compare two checked-out source trees. Paths in the change set are
    /// relative to the tree roots.
    pub fn analyze_directories(&self, old_root: &Path, new_root: &Path) -> Result<ChangeSet> {
        let mut relative: BTreeSet<PathBuf> = self.source_files(old_root);
        relative.extend(self.source_files(new_root));

        let pairs = relative
            .into_iter()
            .map(|rel| {
                let old = read_optional(&old_root.join(&rel))?;
                let new = read_optional(&new_root.join(&rel))?;
                Ok(SourcePair::new(rel, old, new))
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(self.analyze_all(&pairs))
    }

    fn source_files(&self, root: &Path) -> BTreeSet<PathBuf> {
        WalkDir::new(root)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file() && self.parser.handles(e.path()))
            .filter_map(|e| e.path().strip_prefix(root).ok().map(Path::to_path_buf))
            .collect()
    }
}

fn read_optional(path: &Path) -> Result<Option<String>> {
    if !path.exists() {
        return Ok(None);
    }
    std::fs::read_to_string(path)
        .map(Some)
        .context(format!("reading {}", path.display()))
}

/// Weighted combination of lines-changed ratio and changed-declaration count, in [0, 1].
pub fn change_magnitude(lines_changed: usize, total_lines: usize, changed_declarations: usize) -> f64 {
    let line_ratio = if total_lines == 0 {
        if lines_changed > 0 {
            1.0
        } else {
            0.0
        }
    } else {
        (lines_changed as f64 / total_lines as f64).min(1.0)
    };
    let decl_ratio =
        (changed_declarations as f64 / DECLARATION_SATURATION as f64).min(1.0);
    (LINE_WEIGHT * line_ratio + DECLARATION_WEIGHT * decl_ratio).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeltaKind, SymbolDelta};
    use indoc::indoc;

    fn modified_functions(names: &[&str]) -> Vec<SymbolDelta> {
        names
            .iter()
            .map(|n| SymbolDelta::new(DeclarationKind::Function, *n, DeltaKind::Modified))
            .collect()
    }

    const OLD: &str = indoc! {r#"
        import os

        def login(user, password):
            return check(user, password)

        def logout(user):
            return True
    "#};

    #[test]
    fn test_moved_function_is_not_a_change() {
        let new = indoc! {r#"
            import os

            def logout(user):
                return True

            def login(user, password):
                return check(user, password)
        "#};
        let analyzer = ChangeAnalyzer::python();
        let change = analyzer
            .try_analyze_file(Path::new("auth.py"), Some(OLD), Some(new))
            .unwrap()
            .unwrap();
        assert!(change.symbol_deltas.is_empty());
        assert!(change.lines_changed() > 0);
        assert_eq!(change.declarations_changed(), 0);
    }

    #[test]
    fn test_modified_function_is_reported() {
        let new = OLD.replace("return True", "return False");
        let cs = ChangeAnalyzer::python().analyze(Path::new("auth.py"), Some(OLD), Some(&new));
        let file = &cs.files()[0];
        assert_eq!(file.symbol_deltas, modified_functions(&["logout"]));
        assert!(file.magnitude > 0.0 && file.magnitude < 1.0);
    }

    #[test]
    fn test_identical_sources_produce_empty_change_set() {
        let cs = ChangeAnalyzer::python().analyze(Path::new("auth.py"), Some(OLD), Some(OLD));
        assert!(cs.is_empty());
    }

    #[test]
    fn test_unparsable_file_degrades_without_blocking_others() {
        let analyzer = ChangeAnalyzer::python();
        let pairs = vec![
            SourcePair::new("broken.py", Some(OLD.to_string()), Some("def oops(:\n".to_string())),
            SourcePair::new(
                "auth.py",
                Some(OLD.to_string()),
                Some(OLD.replace("return True", "return None")),
            ),
        ];
        let cs = analyzer.analyze_all(&pairs);
        assert_eq!(cs.len(), 2);
        let broken = cs.file(Path::new("broken.py")).unwrap();
        assert!(broken.is_whole_file());
        assert_eq!(broken.magnitude, 1.0);
        let auth = cs.file(Path::new("auth.py")).unwrap();
        assert!(!auth.is_whole_file());
        assert_eq!(auth.declarations_changed(), 1);
    }

    #[test]
    fn test_new_file_adds_every_declaration() {
        let cs = ChangeAnalyzer::python().analyze(Path::new("auth.py"), None, Some(OLD));
        let file = &cs.files()[0];
        assert!(file.symbol_deltas.iter().all(|d| d.delta == DeltaKind::Added));
        assert_eq!(file.declarations_changed(), 2);
        assert_eq!(file.lines_removed, 0);
    }

    #[test]
    fn test_import_only_edit_moves_magnitude_through_lines() {
        let new = OLD.replace("import os", "import sys");
        let cs = ChangeAnalyzer::python().analyze(Path::new("auth.py"), Some(OLD), Some(&new));
        let file = &cs.files()[0];
        assert_eq!(file.declarations_changed(), 0);
        assert!(file.changed_symbols().any(|s| s == "sys"));
        assert!(file.magnitude > 0.0);
    }

    #[test]
    fn test_magnitude_is_bounded() {
        assert_eq!(change_magnitude(0, 100, 0), 0.0);
        assert_eq!(change_magnitude(500, 100, 50), 1.0);
        assert!((change_magnitude(10, 100, 5) - (0.6 * 0.1 + 0.4 * 0.5)).abs() < 1e-12);
        assert_eq!(change_magnitude(3, 0, 0), LINE_WEIGHT);
    }
}
