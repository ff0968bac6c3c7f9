//! Execution history records.

use super::change_set::ChangeSummary;
use im::Vector;
use serde::{Deserialize, Serialize};

/// Test identifier, `<file>::<name>` by convention
pub type TestId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Pass,
    Fail,
}

impl Outcome {
    pub fn is_failure(&self) -> bool {
        matches!(self, Outcome::Fail)
    }
}

impl std::str::FromStr for Outcome {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pass" | "passed" | "ok" => Ok(Outcome::Pass),
            "fail" | "failed" | "error" => Ok(Outcome::Fail),
            other => Err(format!("unknown outcome '{}'", other)),
        }
    }
}

/// One recorded execution of a test. Immutable once written.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Global CI run counter
    pub run_index: u64,
    pub outcome: Outcome,
    pub duration_secs: f64,
    /// Fraction of code covered by this execution, in [0, 1]
    pub coverage: f64,
    pub change: ChangeSummary,
    /// Set by the executor when the outcome was known to be non-deterministic
    pub flaky: bool,
}

impl HistoryEntry {
    pub fn new(run_index: u64, outcome: Outcome, duration_secs: f64, coverage: f64) -> Self {
        Self {
            run_index,
            outcome,
            duration_secs,
            coverage,
            change: ChangeSummary::default(),
            flaky: false,
        }
    }

    pub fn with_change(mut self, change: ChangeSummary) -> Self {
        self.change = change;
        self
    }

    pub fn flaky(mut self, flaky: bool) -> Self {
        self.flaky = flaky;
        self
    }

    pub fn failed(&self) -> bool {
        self.outcome.is_failure()
    }
}

/// Chronological entry sequence of one test. Persistent, so clones and
/// prefixes share structure.
pub type EntryLog = Vector<HistoryEntry>;

/// Everything known about one test. Grows only by appending entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestRecord {
    pub test_id: TestId,
    /// Run index of the first observation
    pub created_at_run: u64,
    entries: EntryLog,
}

impl TestRecord {
    pub fn new(test_id: impl Into<TestId>, first: HistoryEntry) -> Self {
        Self {
            test_id: test_id.into(),
            created_at_run: first.run_index,
            entries: Vector::unit(first),
        }
    }

    pub fn entries(&self) -> &EntryLog {
        &self.entries
    }

    pub fn last_run(&self) -> Option<u64> {
        self.entries.last().map(|e| e.run_index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Append one entry. The caller has already checked ordering.
    pub(crate) fn push(&mut self, entry: HistoryEntry) {
        self.entries.push_back(entry);
    }
}
