//! Test-to-source coupling index.
//!
//! A many-to-many relation between tests and the source files (and symbols
//! within them) they exercise. Both lookup directions are derived from one
//! edge list, so they cannot disagree.

pub mod discovery;

use crate::core::{ChangeSet, ChangeSummary, FileChangeSummary, TestId, normalize_path};
use crate::errors::{Result, ResultExt};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

pub use discovery::{discover, is_test_file, DIRECT_STRENGTH, IMPORT_STRENGTH};

/// One test→file coupling as stored on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingEdge {
    pub test: TestId,
    pub file: PathBuf,
    /// How strongly the test depends on the file, in (0, 1]
    pub strength: f64,
    /// Symbols of `file` the test is known to exercise; empty means file-level
    #[serde(default)]
    pub symbols: BTreeSet<String>,
}

#[derive(Debug, Clone, PartialEq)]
struct Coupling {
    strength: f64,
    symbols: BTreeSet<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CouplingFile {
    #[serde(default)]
    tests: Vec<TestId>,
    edges: Vec<CouplingEdge>,
}

/// Bidirectional coupling index
///
/// Every known test has an entry in `by_test`, possibly with no files.
/// `by_file` holds exactly the reverse of the non-empty `by_test` entries.
#[derive(Debug, Clone, PartialEq)]
pub struct CouplingIndex {
    by_test: BTreeMap<TestId, BTreeMap<PathBuf, Coupling>>,
    by_file: BTreeMap<PathBuf, BTreeSet<TestId>>,
    file_level_impact: f64,
}

impl Default for CouplingIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl CouplingIndex {
    pub fn new() -> Self {
        Self {
            by_test: BTreeMap::new(),
            by_file: BTreeMap::new(),
            file_level_impact: crate::config::CouplingConfig::default().file_level_impact,
        }
    }

    /// Impact factor applied when a coupled file changed but none of the
    /// coupled symbols did.
    pub fn with_file_level_impact(mut self, factor: f64) -> Self {
        self.file_level_impact = factor.clamp(0.0, 1.0);
        self
    }

    pub fn from_edges(tests: impl IntoIterator<Item = TestId>, edges: impl IntoIterator<Item = CouplingEdge>) -> Self {
        let mut index = Self::new();
        for test in tests {
            index.register_test(test);
        }
        for edge in edges {
            index.record(edge.test, &edge.file, edge.strength, edge.symbols);
        }
        index
    }

    /// Make a test known without coupling it to anything.
    pub fn register_test(&mut self, test: impl Into<TestId>) {
        self.by_test.entry(test.into()).or_default();
    }

    /// Record that `test` exercises `file`. Repeated records keep the
    /// strongest strength and union the symbols.
    pub fn record(
        &mut self,
        test: impl Into<TestId>,
        file: &Path,
        strength: f64,
        symbols: impl IntoIterator<Item = String>,
    ) {
        let test = test.into();
        let file = normalize_path(file);
        let strength = strength.clamp(0.0, 1.0);

        let coupling = self
            .by_test
            .entry(test.clone())
            .or_default()
            .entry(file.clone())
            .or_insert(Coupling {
                strength,
                symbols: BTreeSet::new(),
            });
        coupling.strength = coupling.strength.max(strength);
        coupling.symbols.extend(symbols);

        self.by_file.entry(file).or_default().insert(test);
    }

    pub fn tests(&self) -> impl Iterator<Item = &TestId> {
        self.by_test.keys()
    }

    pub fn test_count(&self) -> usize {
        self.by_test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_test.is_empty()
    }

    pub fn contains_test(&self, test: &str) -> bool {
        self.by_test.contains_key(test)
    }

    /// Tests coupled to a file
    pub fn tests_for(&self, file: &Path) -> impl Iterator<Item = &TestId> {
        self.by_file.get(&normalize_path(file)).into_iter().flatten()
    }

    /// Files a test is coupled to, with strengths
    pub fn files_for(&self, test: &str) -> impl Iterator<Item = (&Path, f64)> {
        self.by_test
            .get(test)
            .into_iter()
            .flatten()
            .map(|(path, c)| (path.as_path(), c.strength))
    }

    pub fn coupled_files(&self, test: &str) -> Vec<PathBuf> {
        self.files_for(test).map(|(p, _)| p.to_path_buf()).collect()
    }

    pub fn strength(&self, test: &str, file: &Path) -> f64 {
        self.by_test
            .get(test)
            .and_then(|files| files.get(&normalize_path(file)))
            .map_or(0.0, |c| c.strength)
    }

    /// Impact of a change on one test, in [0, 1].
    ///
    /// Zero when the test has no recorded coupling to any changed file.
    pub fn impact_of(&self, test: &str, change: &ChangeSummary) -> f64 {
        let Some(files) = self.by_test.get(test) else {
            return 0.0;
        };
        change
            .files
            .iter()
            .filter_map(|fc| files.get(&fc.path).map(|c| c.strength * self.change_factor(c, fc)))
            .fold(0.0_f64, f64::max)
            .clamp(0.0, 1.0)
    }

    fn change_factor(&self, coupling: &Coupling, change: &FileChangeSummary) -> f64 {
        let symbol_hit = change
            .symbols
            .iter()
            .any(|s| coupling.symbols.contains(s));
        if change.whole_file || symbol_hit {
            1.0
        } else {
            self.file_level_impact + (1.0 - self.file_level_impact) * change.magnitude
        }
    }

    /// Impact score for every known test. Uncoupled tests map to 0.
    pub fn map_to_tests(&self, change_set: &ChangeSet) -> BTreeMap<TestId, f64> {
        let summary = change_set.summary();
        self.by_test
            .keys()
            .map(|test| (test.clone(), self.impact_of(test, &summary)))
            .collect()
    }

    /// Tests with a non-zero impact from this change set.
    pub fn affected_tests(&self, change_set: &ChangeSet) -> BTreeSet<&TestId> {
        let summary = change_set.summary();
        change_set
            .files()
            .iter()
            .flat_map(|f| self.tests_for(&f.path))
            .filter(|test| self.impact_of(test, &summary) > 0.0)
            .collect()
    }

    pub fn edges(&self) -> Vec<CouplingEdge> {
        self.by_test
            .iter()
            .flat_map(|(test, files)| {
                files.iter().map(move |(file, c)| CouplingEdge {
                    test: test.clone(),
                    file: file.clone(),
                    strength: c.strength,
                    symbols: c.symbols.clone(),
                })
            })
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context(format!("creating {}", parent.display()))?;
        }
        let file = CouplingFile {
            tests: self.by_test.keys().cloned().collect(),
            edges: self.edges(),
        };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json).context(format!("writing {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents =
            std::fs::read_to_string(path).context(format!("reading {}", path.display()))?;
        let file: CouplingFile =
            serde_json::from_str(&contents).context(format!("parsing {}", path.display()))?;
        Ok(Self::from_edges(file.tests, file.edges))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{DeclarationKind, DeltaKind, FileChange, SymbolDelta};
    use pretty_assertions::assert_eq;

    fn symbol_change(path: &str, symbol: &str, magnitude: f64) -> FileChange {
        FileChange {
            path: PathBuf::from(path),
            symbol_deltas: vec![SymbolDelta::new(
                DeclarationKind::Function,
                symbol,
                DeltaKind::Modified,
            )],
            line_deltas: vec![],
            lines_added: 1,
            lines_removed: 1,
            magnitude,
            degraded: None,
        }
    }

    fn index() -> CouplingIndex {
        let mut index = CouplingIndex::new();
        index.record("test_auth.py::test_login", Path::new("auth.py"), 1.0, vec!["login".to_string()]);
        index.record("test_auth.py::test_logout", Path::new("./auth.py"), 1.0, vec!["logout".to_string()]);
        index.record("test_api.py::test_get", Path::new("utils.py"), 0.5, Vec::new());
        index.register_test("test_misc.py::test_noop");
        index
    }

    #[test]
    fn test_directions_agree() {
        let index = index();
        let tests: Vec<_> = index.tests_for(Path::new("auth.py")).cloned().collect();
        assert_eq!(tests, vec!["test_auth.py::test_login", "test_auth.py::test_logout"]);
        assert_eq!(index.coupled_files("test_api.py::test_get"), vec![PathBuf::from("utils.py")]);
        assert_eq!(index.test_count(), 4);
    }

    #[test]
    fn test_symbol_hit_gives_full_impact() {
        let cs = ChangeSet::new(vec![symbol_change("auth.py", "login", 0.1)]);
        let impacts = index().map_to_tests(&cs);
        assert_eq!(impacts["test_auth.py::test_login"], 1.0);
        // Coupled file changed, coupled symbol untouched
        assert!((impacts["test_auth.py::test_logout"] - 0.55).abs() < 1e-12);
        assert_eq!(impacts["test_api.py::test_get"], 0.0);
        assert_eq!(impacts["test_misc.py::test_noop"], 0.0);
    }

    #[test]
    fn test_strength_scales_impact() {
        let cs = ChangeSet::from_changed_paths(&["utils.py"]);
        let impacts = index().map_to_tests(&cs);
        assert_eq!(impacts["test_api.py::test_get"], 0.5);
    }

    #[test]
    fn test_dot_prefixed_changed_path_matches_coupling() {
        let index = index();
        let impacts = index.map_to_tests(&ChangeSet::from_changed_paths(&["./auth.py"]));
        assert_eq!(impacts["test_auth.py::test_login"], 1.0);
        assert_eq!(impacts["test_auth.py::test_logout"], 1.0);
        assert_eq!(index.tests_for(Path::new("./auth.py")).count(), 2);
        assert_eq!(index.strength("test_api.py::test_get", Path::new("./utils.py")), 0.5);
    }

    #[test]
    fn test_affected_tests_skip_zero_strength_edges() {
        let mut index = index();
        index.record("test_db.py::test_connect", Path::new("auth.py"), 0.0, Vec::new());
        let affected = index.affected_tests(&ChangeSet::from_changed_paths(&["auth.py"]));
        assert_eq!(affected.len(), 2);
        assert!(!affected.contains(&"test_db.py::test_connect".to_string()));
    }

    #[test]
    fn test_empty_change_set_has_zero_impact() {
        let impacts = index().map_to_tests(&ChangeSet::empty());
        assert!(impacts.values().all(|&v| v == 0.0));
    }

    #[test]
    fn test_save_and_load_keeps_both_directions() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coupling.json");
        let original = index();
        original.save(&path).unwrap();
        let loaded = CouplingIndex::load(&path).unwrap();
        assert_eq!(loaded, original);
    }
}
