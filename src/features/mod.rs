//! Fixed-layout feature vectors.
//!
//! The layout is versioned: [`FeatureSchema`] binds a vector to the models
//! trained on it. Reordering, adding or removing a slot requires bumping
//! [`FEATURE_SCHEMA_VERSION`].

mod builder;

pub use builder::{build_features, FeatureBuilder, TestFeatures, TrainingSample};

use serde::{Deserialize, Serialize};
use std::fmt;
use xxhash_rust::xxh64::xxh64;

pub const FEATURE_COUNT: usize = 13;
pub const FEATURE_SCHEMA_VERSION: u32 = 1;

/// Feature slots, in vector order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum FeatureName {
    FailureRate,
    RecentFailureRate,
    MeanDuration,
    DurationVariance,
    ChangeFrequency,
    LinesChanged,
    DeclarationsChanged,
    CouplingStrength,
    Flaky,
    Age,
    Coverage,
    FailureStreak,
    RunsSinceLastFailure,
}

impl FeatureName {
    pub const ALL: [FeatureName; FEATURE_COUNT] = [
        FeatureName::FailureRate,
        FeatureName::RecentFailureRate,
        FeatureName::MeanDuration,
        FeatureName::DurationVariance,
        FeatureName::ChangeFrequency,
        FeatureName::LinesChanged,
        FeatureName::DeclarationsChanged,
        FeatureName::CouplingStrength,
        FeatureName::Flaky,
        FeatureName::Age,
        FeatureName::Coverage,
        FeatureName::FailureStreak,
        FeatureName::RunsSinceLastFailure,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FeatureName::FailureRate => "historical_failure_rate",
            FeatureName::RecentFailureRate => "recent_failure_rate",
            FeatureName::MeanDuration => "mean_duration",
            FeatureName::DurationVariance => "duration_variance",
            FeatureName::ChangeFrequency => "code_change_frequency",
            FeatureName::LinesChanged => "lines_changed",
            FeatureName::DeclarationsChanged => "declarations_changed",
            FeatureName::CouplingStrength => "coupling_strength",
            FeatureName::Flaky => "is_flaky",
            FeatureName::Age => "test_age",
            FeatureName::Coverage => "coverage",
            FeatureName::FailureStreak => "failure_streak",
            FeatureName::RunsSinceLastFailure => "runs_since_last_failure",
        }
    }
}

impl fmt::Display for FeatureName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identifies a feature layout: version plus a digest of the slot names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureSchema {
    pub version: u32,
    pub layout: u64,
}

impl FeatureSchema {
    pub fn current() -> Self {
        let names: Vec<&str> = FeatureName::ALL.iter().map(FeatureName::as_str).collect();
        Self {
            version: FEATURE_SCHEMA_VERSION,
            layout: xxh64(names.join(",").as_bytes(), 0),
        }
    }
}

impl fmt::Display for FeatureSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}-{:016x}", self.version, self.layout)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    schema: FeatureSchema,
    values: [f64; FEATURE_COUNT],
}

impl FeatureVector {
    pub fn new(values: [f64; FEATURE_COUNT]) -> Self {
        Self {
            schema: FeatureSchema::current(),
            values,
        }
    }

    /// A vector with an explicit schema, for data produced elsewhere.
    pub fn with_schema(schema: FeatureSchema, values: [f64; FEATURE_COUNT]) -> Self {
        Self { schema, values }
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn get(&self, name: FeatureName) -> f64 {
        self.values[name.index()]
    }

    pub fn values(&self) -> &[f64; FEATURE_COUNT] {
        &self.values
    }

    pub fn named(&self) -> impl Iterator<Item = (FeatureName, f64)> + '_ {
        FeatureName::ALL.iter().map(move |&n| (n, self.get(n)))
    }

    /// Slot-by-slot comparison ignoring the given slots.
    pub fn equal_except(&self, other: &FeatureVector, ignored: &[FeatureName]) -> bool {
        self.schema == other.schema
            && FeatureName::ALL
                .iter()
                .filter(|n| !ignored.contains(n))
                .all(|&n| self.get(n) == other.get(n))
    }
}
