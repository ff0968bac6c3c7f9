use super::{FeatureName, FeatureVector, FEATURE_COUNT};
use crate::config::FeatureDefaults;
use crate::core::{ChangeSet, ChangeSummary, EntryLog, TestId};
use crate::coupling::CouplingIndex;
use crate::history::{change_frequency, HistoryAggregates, HistorySnapshot};
use rayon::prelude::*;
use serde::Serialize;
use std::path::PathBuf;
use tracing::debug;

/// Features of one test for one change set, with the inputs they came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TestFeatures {
    pub test_id: TestId,
    pub impact: f64,
    pub aggregates: HistoryAggregates,
    pub features: FeatureVector,
}

/// One labelled observation for training
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingSample {
    pub test_id: TestId,
    pub run_index: u64,
    pub features: FeatureVector,
    pub failed: bool,
}

/// Assemble a feature vector.
///
/// Current-change slots only count files the test is coupled to, so two
/// change sets that differ in unrelated files produce the same history and
/// change slots.
pub fn build_features(
    log: &EntryLog,
    coupled_files: &[PathBuf],
    impact: f64,
    change: &ChangeSummary,
    defaults: &FeatureDefaults,
) -> FeatureVector {
    let agg = HistoryAggregates::compute(log);
    let (lines, declarations) = change
        .files
        .iter()
        .filter(|f| coupled_files.contains(&f.path))
        .fold((0usize, 0usize), |(l, d), f| {
            (l + f.lines_changed, d + f.declarations_changed)
        });

    let mut values = [0.0; FEATURE_COUNT];
    let mut set = |name: FeatureName, value: f64| values[name.index()] = value;

    set(
        FeatureName::FailureRate,
        agg.failure_rate.unwrap_or(defaults.failure_rate_prior),
    );
    set(
        FeatureName::RecentFailureRate,
        agg.recent_failure_rate.unwrap_or(defaults.failure_rate_prior),
    );
    set(
        FeatureName::MeanDuration,
        agg.mean_duration.unwrap_or(defaults.duration_secs),
    );
    set(FeatureName::DurationVariance, agg.duration_variance.unwrap_or(0.0));
    set(FeatureName::ChangeFrequency, change_frequency(log, coupled_files));
    set(FeatureName::LinesChanged, lines as f64);
    set(FeatureName::DeclarationsChanged, declarations as f64);
    set(FeatureName::CouplingStrength, impact);
    set(FeatureName::Flaky, if agg.flaky { 1.0 } else { 0.0 });
    set(FeatureName::Age, agg.runs as f64);
    set(FeatureName::Coverage, agg.mean_coverage.unwrap_or(defaults.coverage));
    set(FeatureName::FailureStreak, agg.failure_streak as f64);
    set(
        FeatureName::RunsSinceLastFailure,
        agg.runs_since_last_failure
            .map_or(defaults.never_failed_sentinel, |n| n as f64),
    );

    FeatureVector::new(values)
}

/// Builds feature vectors against one history snapshot and coupling index
pub struct FeatureBuilder<'a> {
    history: &'a HistorySnapshot,
    coupling: &'a CouplingIndex,
    defaults: &'a FeatureDefaults,
}

impl<'a> FeatureBuilder<'a> {
    pub fn new(
        history: &'a HistorySnapshot,
        coupling: &'a CouplingIndex,
        defaults: &'a FeatureDefaults,
    ) -> Self {
        Self {
            history,
            coupling,
            defaults,
        }
    }

    pub fn build(&self, test_id: &str, change_set: &ChangeSet) -> FeatureVector {
        self.build_for_summary(test_id, &change_set.summary()).features
    }

    pub fn build_for_summary(&self, test_id: &str, change: &ChangeSummary) -> TestFeatures {
        let empty = EntryLog::new();
        let log = self
            .history
            .get(test_id)
            .map(|r| r.entries())
            .unwrap_or(&empty);
        let coupled = self.coupling.coupled_files(test_id);
        let impact = self.coupling.impact_of(test_id, change);

        TestFeatures {
            test_id: test_id.to_string(),
            impact,
            aggregates: HistoryAggregates::compute(log),
            features: build_features(log, &coupled, impact, change, self.defaults),
        }
    }

    /// Features for many tests, in input order.
    pub fn build_all(&self, tests: &[TestId], change_set: &ChangeSet) -> Vec<TestFeatures> {
        let summary = change_set.summary();
        tests
            .par_iter()
            .map(|test| self.build_for_summary(test, &summary))
            .collect()
    }

    /// One sample per history entry. Each sample's features see only the
    /// entries before it plus the change that entry ran against.
    pub fn training_samples(&self) -> Vec<TrainingSample> {
        let records: Vec<_> = self.history.records().collect();
        let samples: Vec<TrainingSample> = records
            .par_iter()
            .flat_map_iter(|record| {
                let coupled = self.coupling.coupled_files(&record.test_id);
                let log = record.entries();
                log.iter()
                    .enumerate()
                    .map(|(i, entry)| {
                        let prefix = log.take(i);
                        let impact = self.coupling.impact_of(&record.test_id, &entry.change);
                        TrainingSample {
                            test_id: record.test_id.clone(),
                            run_index: entry.run_index,
                            features: build_features(
                                &prefix,
                                &coupled,
                                impact,
                                &entry.change,
                                self.defaults,
                            ),
                            failed: entry.failed(),
                        }
                    })
                    .collect::<Vec<_>>()
            })
            .collect();
        debug!(samples = samples.len(), tests = records.len(), "built training samples");
        samples
    }
}
