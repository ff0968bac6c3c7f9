use super::aggregates::HistoryAggregates;
use crate::core::{HistoryEntry, TestId, TestRecord};
use crate::errors::{Error, Result, ResultExt};
use im::OrdMap;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One line of the on-disk journal
#[derive(Debug, Serialize, Deserialize)]
struct JournalLine {
    test_id: TestId,
    entry: HistoryEntry,
}

struct Journal {
    path: PathBuf,
    file: File,
}

/// Append-only execution history keyed by test identifier.
///
/// Appends take the write lock, so they are serialized; readers work on
/// [`HistorySnapshot`]s, which are O(1) to take and never block each other.
pub struct HistoryStore {
    records: RwLock<OrdMap<TestId, TestRecord>>,
    journal: Option<Mutex<Journal>>,
}

impl Default for HistoryStore {
    fn default() -> Self {
        Self::in_memory()
    }
}

impl HistoryStore {
    pub fn in_memory() -> Self {
        Self {
            records: RwLock::new(OrdMap::new()),
            journal: None,
        }
    }

    /// Open a durable store backed by a JSON Lines journal, replaying any
    /// existing entries.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context(format!("creating {}", parent.display()))?;
        }

        let mut records = OrdMap::new();
        let mut replayed = 0usize;
        if path.exists() {
            let reader = BufReader::new(
                File::open(path).context(format!("opening {}", path.display()))?,
            );
            for (n, line) in reader.lines().enumerate() {
                let line = line.context(format!("reading {}", path.display()))?;
                if line.trim().is_empty() {
                    continue;
                }
                let JournalLine { test_id, entry } = serde_json::from_str(&line)
                    .context(format!("{} line {}", path.display(), n + 1))?;
                insert_ordered(&mut records, test_id, entry)?;
                replayed += 1;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .context(format!("opening {} for append", path.display()))?;
        info!(path = %path.display(), entries = replayed, tests = records.len(), "opened history store");

        Ok(Self {
            records: RwLock::new(records),
            journal: Some(Mutex::new(Journal {
                path: path.to_path_buf(),
                file,
            })),
        })
    }

    /// Append one entry to a test's history.
    ///
    /// Fails with `HistoryOrder` unless `entry.run_index` is strictly greater
    /// than the test's last recorded run. A durable store writes the entry to
    /// its journal before it becomes visible to readers.
    pub fn append(&self, test_id: impl Into<TestId>, entry: HistoryEntry) -> Result<()> {
        let test_id = test_id.into();
        let mut records = self.records.write();
        check_order(&records, &test_id, entry.run_index)?;

        if let Some(journal) = &self.journal {
            let mut journal = journal.lock();
            let line = serde_json::to_string(&JournalLine {
                test_id: test_id.clone(),
                entry: entry.clone(),
            })?;
            let path = journal.path.display().to_string();
            writeln!(journal.file, "{}", line).context(format!("appending to {}", path))?;
            journal.file.flush().context(format!("flushing {}", path))?;
        }

        debug!(test = %test_id, run = entry.run_index, outcome = ?entry.outcome, "appended history entry");
        insert_ordered(&mut records, test_id, entry)
    }

    /// Consistent read-only view of the whole store.
    pub fn snapshot(&self) -> HistorySnapshot {
        HistorySnapshot {
            records: self.records.read().clone(),
        }
    }

    pub fn query(&self, test_id: &str) -> HistoryAggregates {
        self.snapshot().aggregates(test_id)
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// One past the highest run index recorded for any test.
    pub fn next_run_index(&self) -> u64 {
        self.snapshot().max_run_index().map_or(1, |r| r + 1)
    }

    pub fn path(&self) -> Option<PathBuf> {
        self.journal.as_ref().map(|j| j.lock().path.clone())
    }
}

fn check_order(records: &OrdMap<TestId, TestRecord>, test_id: &str, run_index: u64) -> Result<()> {
    match records.get(test_id).and_then(TestRecord::last_run) {
        Some(last_run) if run_index <= last_run => Err(Error::HistoryOrder {
            test_id: test_id.to_string(),
            last_run,
            attempted_run: run_index,
        }),
        _ => Ok(()),
    }
}

fn insert_ordered(
    records: &mut OrdMap<TestId, TestRecord>,
    test_id: TestId,
    entry: HistoryEntry,
) -> Result<()> {
    check_order(records, &test_id, entry.run_index)?;
    match records.get_mut(&test_id) {
        Some(record) => record.push(entry),
        None => {
            let record = TestRecord::new(test_id.clone(), entry);
            records.insert(test_id, record);
        }
    }
    Ok(())
}

/// Immutable point-in-time view of a [`HistoryStore`]
#[derive(Debug, Clone, Default)]
pub struct HistorySnapshot {
    records: OrdMap<TestId, TestRecord>,
}

impl HistorySnapshot {
    pub fn from_records(records: impl IntoIterator<Item = TestRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|r| (r.test_id.clone(), r))
                .collect(),
        }
    }

    pub fn get(&self, test_id: &str) -> Option<&TestRecord> {
        self.records.get(test_id)
    }

    /// Aggregates for a test; all-empty for an unknown test.
    pub fn aggregates(&self, test_id: &str) -> HistoryAggregates {
        self.get(test_id)
            .map(|r| HistoryAggregates::compute(r.entries()))
            .unwrap_or_default()
    }

    pub fn tests(&self) -> impl Iterator<Item = &TestId> {
        self.records.keys()
    }

    pub fn records(&self) -> impl Iterator<Item = &TestRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn total_entries(&self) -> usize {
        self.records.values().map(TestRecord::len).sum()
    }

    pub fn max_run_index(&self) -> Option<u64> {
        self.records.values().filter_map(TestRecord::last_run).max()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Outcome;

    fn entry(run: u64, outcome: Outcome) -> HistoryEntry {
        HistoryEntry::new(run, outcome, 0.2, 0.9)
    }

    #[test]
    fn test_append_rejects_out_of_order_runs() {
        let store = HistoryStore::in_memory();
        store.append("t::a", entry(3, Outcome::Pass)).unwrap();
        let err = store.append("t::a", entry(3, Outcome::Fail)).unwrap_err();
        assert_eq!(err.code(), "E050");
        // Other tests are independent
        store.append("t::b", entry(1, Outcome::Pass)).unwrap();
        assert_eq!(store.snapshot().get("t::a").unwrap().len(), 1);
    }

    #[test]
    fn test_snapshot_is_isolated_from_later_appends() {
        let store = HistoryStore::in_memory();
        store.append("t::a", entry(1, Outcome::Pass)).unwrap();
        let before = store.snapshot();
        store.append("t::a", entry(2, Outcome::Fail)).unwrap();
        assert_eq!(before.aggregates("t::a").runs, 1);
        assert_eq!(store.query("t::a").runs, 2);
        assert_eq!(store.next_run_index(), 3);
    }

    #[test]
    fn test_durable_store_replays_journal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("history/history.jsonl");
        {
            let store = HistoryStore::open(&path).unwrap();
            store.append("t::a", entry(1, Outcome::Fail)).unwrap();
            store.append("t::a", entry(2, Outcome::Pass)).unwrap();
            store.append("t::b", entry(2, Outcome::Pass)).unwrap();
        }
        let reopened = HistoryStore::open(&path).unwrap();
        let snapshot = reopened.snapshot();
        assert_eq!(snapshot.total_entries(), 3);
        assert_eq!(snapshot.get("t::a").unwrap().created_at_run, 1);
        assert_eq!(reopened.query("t::a").runs_since_last_failure, Some(1));

        // The order check survives a reopen
        assert!(reopened.append("t::a", entry(2, Outcome::Pass)).is_err());
    }

    #[test]
    fn test_unknown_test_has_empty_aggregates() {
        let store = HistoryStore::in_memory();
        assert!(store.query("nope").is_new());
        assert!(store.is_empty());
    }
}
