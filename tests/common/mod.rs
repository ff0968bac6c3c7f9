// Shared fixtures for testimpact integration tests
#![allow(dead_code)]

use std::path::{Path, PathBuf};
use testimpact::config::{ModelFamily, SelectorConfig};
use testimpact::core::{ChangeSummary, FileChangeSummary, HistoryEntry, Outcome};
use testimpact::{CouplingIndex, HistoryStore, Orchestrator};

pub const AUTH: &str = "pkg/auth.py";
pub const MODULES: [(&str, &str, usize); 4] = [
    ("pkg/auth.py", "pkg/test_auth.py", 5),
    ("pkg/db.py", "pkg/test_db.py", 13),
    ("pkg/api.py", "pkg/test_api.py", 13),
    ("pkg/util.py", "pkg/test_util.py", 12),
];

/// (test id, module source, position within module)
pub fn fixture_tests() -> Vec<(String, &'static str, usize)> {
    MODULES
        .iter()
        .flat_map(|(source, test_file, count)| {
            (0..*count).map(move |i| (format!("{}::test_case_{:02}", test_file, i), *source, i))
        })
        .collect()
}

pub fn auth_tests() -> Vec<String> {
    fixture_tests()
        .into_iter()
        .filter(|(_, source, _)| *source == AUTH)
        .map(|(id, _, _)| id)
        .collect()
}

/// Every test is coupled to its own module only.
pub fn fixture_coupling() -> CouplingIndex {
    let mut index = CouplingIndex::new();
    for (id, source, _) in fixture_tests() {
        index.record(id, Path::new(source), 1.0, std::iter::empty());
    }
    index
}

/// Module changed in `run`: auth every third run, otherwise db or api.
pub fn changed_module(run: u64) -> &'static str {
    match run % 3 {
        0 => "pkg/auth.py",
        1 => "pkg/db.py",
        _ => "pkg/api.py",
    }
}

pub fn whole_file_change(path: &str) -> ChangeSummary {
    ChangeSummary::from_files(vec![FileChangeSummary {
        path: PathBuf::from(path),
        lines_changed: 40,
        declarations_changed: 2,
        magnitude: 0.5,
        symbols: Vec::new(),
        whole_file: true,
    }])
}

/// Deterministic history: auth tests fail whenever auth changes; other
/// tests occasionally fail when their own module changes.
pub fn fixture_history(runs: u64) -> HistoryStore {
    let store = HistoryStore::in_memory();
    for run in 1..=runs {
        let changed = changed_module(run);
        let change = whole_file_change(changed);
        for (id, source, i) in fixture_tests() {
            let own_change = source == changed;
            let failed = if source == AUTH {
                own_change
            } else {
                own_change && (run as usize + i) % 5 == 0
            };
            let outcome = if failed { Outcome::Fail } else { Outcome::Pass };
            let duration = 0.05 + i as f64 * 0.01 + if failed { 0.05 } else { 0.0 };
            let entry = HistoryEntry::new(run, outcome, duration, 0.3).with_change(change.clone());
            store.append(id, entry).unwrap();
        }
    }
    store
}

pub fn fixture_config() -> SelectorConfig {
    let mut config = SelectorConfig::default();
    config.model.family = ModelFamily::RandomForest;
    config.model.n_estimators = 25;
    config.model.synthesize_when_empty = false;
    config
}

pub fn fixture_orchestrator() -> Orchestrator {
    Orchestrator::new(fixture_config(), fixture_history(45), fixture_coupling())
}
