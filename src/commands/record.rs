use crate::config::SelectorConfig;
use crate::core::{HistoryEntry, Outcome};
use crate::history::HistoryStore;
use anyhow::{Context, Result};
use std::path::Path;

#[derive(Debug, Clone)]
pub struct RecordConfig {
    pub test: String,
    pub run: Option<u64>,
    pub outcome: Outcome,
    pub duration: f64,
    pub coverage: f64,
    pub flaky: bool,
}

/// Append one execution outcome. Without an explicit run index the entry is
/// recorded as the next run.
pub fn record_outcome(root: &Path, config: &SelectorConfig, record: RecordConfig) -> Result<u64> {
    if record.duration.is_nan() || record.duration < 0.0 {
        anyhow::bail!("duration must be a non-negative number of seconds");
    }
    if !(0.0..=1.0).contains(&record.coverage) {
        anyhow::bail!("coverage must be within [0, 1], got {}", record.coverage);
    }

    let history_path = root.join(&config.data.history_file);
    let store = HistoryStore::open(&history_path)
        .with_context(|| format!("Failed to open history {}", history_path.display()))?;
    let run = record.run.unwrap_or_else(|| store.next_run_index());

    let entry = HistoryEntry::new(run, record.outcome, record.duration, record.coverage).flaky(record.flaky);
    store
        .append(record.test.clone(), entry)
        .with_context(|| format!("Failed to record run {} of {}", run, record.test))?;
    tracing::info!(test = %record.test, run, outcome = ?record.outcome, "recorded outcome");
    Ok(run)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(run: Option<u64>) -> RecordConfig {
        RecordConfig {
            test: "pkg/test_a.py::test_one".to_string(),
            run,
            outcome: Outcome::Fail,
            duration: 0.2,
            coverage: 0.8,
            flaky: false,
        }
    }

    #[test]
    fn test_record_defaults_to_next_run() {
        let dir = tempfile::tempdir().unwrap();
        let config = SelectorConfig::default();
        assert_eq!(record_outcome(dir.path(), &config, record(Some(7))).unwrap(), 7);
        assert_eq!(record_outcome(dir.path(), &config, record(None)).unwrap(), 8);
        assert!(record_outcome(dir.path(), &config, record(Some(3))).is_err());
    }

    #[test]
    fn test_rejects_bad_coverage() {
        let dir = tempfile::tempdir().unwrap();
        let mut bad = record(None);
        bad.coverage = 1.5;
        assert!(record_outcome(dir.path(), &SelectorConfig::default(), bad).is_err());
    }
}
