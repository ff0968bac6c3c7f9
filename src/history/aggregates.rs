//! Aggregate queries over a test's entry log.
//!
//! Every aggregate is a pure function of the log. Nothing here is cached,
//! so an aggregate can never disagree with the entries it summarizes.

use crate::core::{EntryLog, HistoryEntry};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Entries considered by the recent-failure aggregates
pub const RECENT_WINDOW: usize = 10;

/// Snapshot of every aggregate for one test
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoryAggregates {
    /// Test age, in recorded runs
    pub runs: usize,
    pub failures: usize,
    /// `None` without history
    pub failure_rate: Option<f64>,
    pub recent_failures: usize,
    pub recent_failure_rate: Option<f64>,
    pub mean_duration: Option<f64>,
    pub duration_variance: Option<f64>,
    pub mean_coverage: Option<f64>,
    pub flaky: bool,
    pub failure_streak: usize,
    /// `None` if the test never failed
    pub runs_since_last_failure: Option<usize>,
}

impl HistoryAggregates {
    pub fn compute(log: &EntryLog) -> Self {
        Self {
            runs: log.len(),
            failures: failure_count(log),
            failure_rate: failure_rate(log),
            recent_failures: recent_failure_count(log),
            recent_failure_rate: recent_failure_rate(log),
            mean_duration: mean_duration(log),
            duration_variance: duration_variance(log),
            mean_coverage: mean_coverage(log),
            flaky: is_flaky(log),
            failure_streak: failure_streak(log),
            runs_since_last_failure: runs_since_last_failure(log),
        }
    }

    pub fn is_new(&self) -> bool {
        self.runs == 0
    }
}

fn recent(log: &EntryLog) -> impl Iterator<Item = &HistoryEntry> {
    log.iter().skip(log.len().saturating_sub(RECENT_WINDOW))
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    (n > 0).then(|| sum / n as f64)
}

pub fn failure_count(log: &EntryLog) -> usize {
    log.iter().filter(|e| e.failed()).count()
}

pub fn failure_rate(log: &EntryLog) -> Option<f64> {
    (!log.is_empty()).then(|| failure_count(log) as f64 / log.len() as f64)
}

pub fn recent_failure_count(log: &EntryLog) -> usize {
    recent(log).filter(|e| e.failed()).count()
}

/// Failure rate over the last `min(10, len)` entries.
pub fn recent_failure_rate(log: &EntryLog) -> Option<f64> {
    let window = log.len().min(RECENT_WINDOW);
    (window > 0).then(|| recent_failure_count(log) as f64 / window as f64)
}

pub fn mean_duration(log: &EntryLog) -> Option<f64> {
    mean(log.iter().map(|e| e.duration_secs))
}

/// Sample variance (n - 1 denominator); 0 for a single entry.
pub fn duration_variance(log: &EntryLog) -> Option<f64> {
    let mu = mean_duration(log)?;
    if log.len() < 2 {
        return Some(0.0);
    }
    let squares: f64 = log.iter().map(|e| (e.duration_secs - mu).powi(2)).sum();
    Some(squares / (log.len() - 1) as f64)
}

pub fn mean_coverage(log: &EntryLog) -> Option<f64> {
    mean(log.iter().map(|e| e.coverage))
}

/// Flagged by the executor, or observed both passing and failing under an
/// identical change set. Entries recorded without a change set never match
/// each other.
pub fn is_flaky(log: &EntryLog) -> bool {
    if log.iter().any(|e| e.flaky) {
        return true;
    }
    let mut seen: HashMap<u64, (bool, bool)> = HashMap::new();
    log.iter().filter(|e| !e.change.is_empty()).any(|e| {
        let outcomes = seen.entry(e.change.fingerprint).or_default();
        if e.failed() {
            outcomes.1 = true;
        } else {
            outcomes.0 = true;
        }
        outcomes.0 && outcomes.1
    })
}

/// Consecutive failures ending at the most recent entry.
pub fn failure_streak(log: &EntryLog) -> usize {
    log.iter().rev().take_while(|e| e.failed()).count()
}

/// Entries recorded after the most recent failure; 0 if the latest entry failed.
pub fn runs_since_last_failure(log: &EntryLog) -> Option<usize> {
    log.iter().rev().position(HistoryEntry::failed)
}

/// Fraction of entries whose change set touched any of `files`.
pub fn change_frequency(log: &EntryLog, files: &[PathBuf]) -> f64 {
    if log.is_empty() || files.is_empty() {
        return 0.0;
    }
    let touched = log
        .iter()
        .filter(|e| e.change.touches_any(files.iter().map(PathBuf::as_path)))
        .count();
    touched as f64 / log.len() as f64
}
