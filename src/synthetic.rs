//! Seeded synthetic execution history.
//!
//! Models a small four-module Python project (auth, database, api, utils)
//! with 43 tests, each coupled to the module it sits next to. Every run
//! changes one to three modules; tests of changed modules and flaky tests
//! fail more often. The same seed always produces the same history.

use crate::analyzers::change_magnitude;
use crate::core::{ChangeSummary, FileChangeSummary, HistoryEntry, Outcome, TestId};
use crate::coupling::{CouplingIndex, DIRECT_STRENGTH};
use crate::errors::Result;
use crate::history::HistoryStore;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::info;

pub const BASE_FAILURE_PROBABILITY: f64 = 0.05;
pub const CHANGED_SOURCE_PENALTY: f64 = 0.15;
pub const FLAKY_PENALTY: f64 = 0.20;
pub const FAILURE_NOISE: f64 = 0.02;
/// Assumed size of each sample module, for change magnitudes
const MODULE_LINES: usize = 200;

pub struct SampleModule {
    pub source: &'static str,
    pub test_file: &'static str,
    pub tests: &'static [&'static str],
}

pub const SAMPLE_PROJECT: [SampleModule; 4] = [
    SampleModule {
        source: "sample_project/auth.py",
        test_file: "sample_project/test_auth.py",
        tests: &[
            "test_register_user_success",
            "test_register_user_duplicate_username",
            "test_register_user_invalid_email",
            "test_register_user_weak_password",
            "test_login_success",
            "test_login_invalid_username",
            "test_login_wrong_password",
            "test_login_attempts_lockout",
            "test_logout_success",
            "test_validate_session_valid",
            "test_reset_password_success",
        ],
    },
    SampleModule {
        source: "sample_project/database.py",
        test_file: "sample_project/test_database.py",
        tests: &[
            "test_create_table_success",
            "test_create_table_duplicate",
            "test_insert_record",
            "test_find_by_id_success",
            "test_find_all",
            "test_update_record",
            "test_delete_record",
            "test_query_with_filter",
            "test_count",
            "test_export_to_json",
            "test_import_from_json",
        ],
    },
    SampleModule {
        source: "sample_project/api.py",
        test_file: "sample_project/test_api.py",
        tests: &[
            "test_client_initialization",
            "test_set_auth_token",
            "test_get_request",
            "test_post_request",
            "test_put_request",
            "test_delete_request",
            "test_limiter_initialization",
            "test_can_make_request_under_limit",
            "test_api_error_initialization",
        ],
    },
    SampleModule {
        source: "sample_project/utils.py",
        test_file: "sample_project/test_utils.py",
        tests: &[
            "test_valid_email",
            "test_sanitize_clean_string",
            "test_calculate_percentage_normal",
            "test_format_usd",
            "test_chunk_list_even",
            "test_flatten_nested_dict",
            "test_merge_two_dicts",
            "test_remove_duplicates_with_dupes",
            "test_is_palindrome_true",
            "test_truncate_long_string",
            "test_parse_query_string",
            "test_to_snake_case",
        ],
    },
];

/// One CI run: the change it carried and every test's result
#[derive(Debug, Clone)]
pub struct SyntheticRun {
    pub run_index: u64,
    pub change: ChangeSummary,
    pub results: Vec<(TestId, HistoryEntry)>,
}

#[derive(Debug, Clone)]
pub struct SyntheticHistory {
    pub runs: Vec<SyntheticRun>,
    pub coupling: CouplingIndex,
    pub flaky_tests: BTreeSet<TestId>,
}

impl SyntheticHistory {
    pub fn tests(&self) -> impl Iterator<Item = &TestId> {
        self.coupling.tests()
    }

    pub fn entry_count(&self) -> usize {
        self.runs.iter().map(|r| r.results.len()).sum()
    }

    pub fn failure_count(&self) -> usize {
        self.runs
            .iter()
            .flat_map(|r| &r.results)
            .filter(|(_, e)| e.failed())
            .count()
    }

    /// Append every run, in order, to `store`.
    pub fn load_into(&self, store: &HistoryStore) -> Result<usize> {
        let mut appended = 0;
        for run in &self.runs {
            for (test_id, entry) in &run.results {
                store.append(test_id.clone(), entry.clone())?;
                appended += 1;
            }
        }
        Ok(appended)
    }
}

pub fn test_id(test_file: &str, name: &str) -> TestId {
    format!("{}::{}", test_file, name)
}

pub struct HistoryGenerator {
    rng: StdRng,
}

impl HistoryGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Coupling of every sample test to its module.
    pub fn coupling() -> CouplingIndex {
        let mut index = CouplingIndex::new();
        for module in &SAMPLE_PROJECT {
            for name in module.tests {
                index.record(
                    test_id(module.test_file, name),
                    Path::new(module.source),
                    DIRECT_STRENGTH,
                    std::iter::empty(),
                );
            }
        }
        index
    }

    /// Generate `runs` consecutive runs numbered from `first_run`.
    pub fn generate(&mut self, runs: usize, first_run: u64) -> SyntheticHistory {
        let coupling = Self::coupling();
        let flaky_tests = self.pick_flaky(&coupling);
        let sources: Vec<&str> = SAMPLE_PROJECT.iter().map(|m| m.source).collect();

        let mut history = Vec::with_capacity(runs);
        for offset in 0..runs as u64 {
            let run_index = first_run + offset;
            let changed_count = self.rng.gen_range(1..=3);
            let changed: Vec<&str> = sources
                .choose_multiple(&mut self.rng, changed_count)
                .copied()
                .collect();
            let change = self.change_summary(&changed);

            let mut results = Vec::new();
            for module in &SAMPLE_PROJECT {
                let source_changed = changed.contains(&module.source);
                for name in module.tests {
                    let id = test_id(module.test_file, name);
                    let flaky = flaky_tests.contains(&id);
                    let entry = self.execute(run_index, source_changed, flaky, &change);
                    results.push((id, entry));
                }
            }
            history.push(SyntheticRun {
                run_index,
                change,
                results,
            });
        }

        let generated = SyntheticHistory {
            runs: history,
            coupling,
            flaky_tests,
        };
        info!(
            runs,
            entries = generated.entry_count(),
            failures = generated.failure_count(),
            "generated synthetic history"
        );
        generated
    }

    fn pick_flaky(&mut self, coupling: &CouplingIndex) -> BTreeSet<TestId> {
        let all: Vec<&TestId> = coupling.tests().collect();
        let count = (all.len() / 10).max(1);
        all.choose_multiple(&mut self.rng, count)
            .map(|t| (*t).clone())
            .collect()
    }

    fn change_summary(&mut self, changed: &[&str]) -> ChangeSummary {
        let files = changed
            .iter()
            .map(|path| {
                let lines_changed = self.rng.gen_range(5..=100);
                let declarations_changed = self.rng.gen_range(1..=10);
                FileChangeSummary {
                    path: PathBuf::from(path),
                    lines_changed,
                    declarations_changed,
                    magnitude: change_magnitude(lines_changed, MODULE_LINES, declarations_changed),
                    symbols: Vec::new(),
                    whole_file: false,
                }
            })
            .collect();
        ChangeSummary::from_files(files)
    }

    fn execute(&mut self, run_index: u64, source_changed: bool, flaky: bool, change: &ChangeSummary) -> HistoryEntry {
        let mut probability = BASE_FAILURE_PROBABILITY;
        if source_changed {
            probability += CHANGED_SOURCE_PENALTY;
        }
        if flaky {
            probability += FLAKY_PENALTY;
        }
        probability = (probability + self.rng.gen_range(-FAILURE_NOISE..=FAILURE_NOISE)).clamp(0.0, 1.0);

        let failed = self.rng.gen::<f64>() < probability;
        let base = self.rng.gen_range(0.01..=0.5);
        let duration = if failed {
            base * self.rng.gen_range(1.2..=2.0)
        } else {
            base
        };
        let coverage = self.rng.gen_range(0.7..=0.95);
        let outcome = if failed { Outcome::Fail } else { Outcome::Pass };

        HistoryEntry::new(run_index, outcome, duration, coverage)
            .with_change(change.clone())
            .flaky(flaky)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sample_project_has_43_tests() {
        assert_eq!(HistoryGenerator::coupling().test_count(), 43);
    }

    #[test]
    fn test_generation_is_seeded() {
        let a = HistoryGenerator::new(7).generate(5, 1);
        let b = HistoryGenerator::new(7).generate(5, 1);
        assert_eq!(a.flaky_tests, b.flaky_tests);
        for (ra, rb) in a.runs.iter().zip(&b.runs) {
            assert_eq!(ra.results, rb.results);
        }
    }

    #[test]
    fn test_runs_shape() {
        let history = HistoryGenerator::new(42).generate(20, 100);
        assert_eq!(history.runs.len(), 20);
        assert_eq!(history.entry_count(), 20 * 43);
        assert_eq!(history.flaky_tests.len(), 4);
        for (i, run) in history.runs.iter().enumerate() {
            assert_eq!(run.run_index, 100 + i as u64);
            assert!((1..=3).contains(&run.change.files.len()));
            for (_, entry) in &run.results {
                assert!((0.7..=0.95).contains(&entry.coverage));
                assert!(entry.duration_secs >= 0.01 && entry.duration_secs <= 1.0);
            }
        }
    }

    #[test]
    fn test_load_into_store() {
        let history = HistoryGenerator::new(1).generate(3, 1);
        let store = HistoryStore::in_memory();
        assert_eq!(history.load_into(&store).unwrap(), 3 * 43);
        assert_eq!(store.next_run_index(), 4);
    }
}
