//! Weighted fusion of risk, impact and history into one priority score.

use crate::config::FusionWeights;
use crate::history::HistoryAggregates;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Recent failures at which the recent-failure signal saturates
pub const RECENT_FAILURE_SATURATION: f64 = 5.0;
/// A component must exceed this to be named as the reason for a score
const DOMINANT_SIGNAL: f64 = 0.5;

/// Why a test ranks where it does
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityReason {
    HighFailureRisk,
    CodeChanges,
    HistoricalFailures,
    RecentFailures,
    NewTest,
    General,
}

impl PriorityReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriorityReason::HighFailureRisk => "High failure risk",
            PriorityReason::CodeChanges => "Code changes",
            PriorityReason::HistoricalFailures => "Historical failures",
            PriorityReason::RecentFailures => "Recent failures",
            PriorityReason::NewTest => "New test",
            PriorityReason::General => "General testing",
        }
    }
}

impl fmt::Display for PriorityReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reporting band of a priority score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityBand {
    High,
    Medium,
    Low,
}

impl PriorityBand {
    pub fn of(score: f64) -> Self {
        if score > 0.7 {
            PriorityBand::High
        } else if score >= 0.3 {
            PriorityBand::Medium
        } else {
            PriorityBand::Low
        }
    }
}

/// Weighted contribution of each signal; sums to the score value
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreComponents {
    pub probability: f64,
    pub impact: f64,
    pub historical: f64,
    pub recent: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriorityScore {
    /// Fused score in [0, 1]
    pub value: f64,
    pub components: ScoreComponents,
    pub reason: PriorityReason,
}

impl PriorityScore {
    pub fn band(&self) -> PriorityBand {
        PriorityBand::of(self.value)
    }
}

/// Scores tests with fixed fusion weights. No randomness: equal inputs give
/// equal scores.
#[derive(Debug, Clone)]
pub struct Prioritizer {
    weights: FusionWeights,
    failure_rate_prior: f64,
}

impl Default for Prioritizer {
    fn default() -> Self {
        Self::new(FusionWeights::default())
    }
}

impl Prioritizer {
    pub fn new(weights: FusionWeights) -> Self {
        Self {
            weights,
            failure_rate_prior: crate::config::FeatureDefaults::default().failure_rate_prior,
        }
    }

    /// Historical failure rate used for tests with no history.
    pub fn with_failure_rate_prior(mut self, prior: f64) -> Self {
        self.failure_rate_prior = prior;
        self
    }

    pub fn weights(&self) -> &FusionWeights {
        &self.weights
    }

    pub fn score(&self, probability: f64, impact: f64, history: &HistoryAggregates) -> PriorityScore {
        let probability = probability.clamp(0.0, 1.0);
        let impact = impact.clamp(0.0, 1.0);
        let historical = history.failure_rate.unwrap_or(self.failure_rate_prior);
        let recent = normalized_recent_failures(history.recent_failures);

        let components = ScoreComponents {
            probability: self.weights.probability * probability,
            impact: self.weights.impact * impact,
            historical: self.weights.historical * historical,
            recent: self.weights.recent * recent,
        };
        let value = (components.probability + components.impact + components.historical + components.recent)
            .clamp(0.0, 1.0);

        PriorityScore {
            value,
            components,
            reason: dominant_reason(probability, impact, historical, recent, history.is_new()),
        }
    }
}

/// `min(recent_failures / 5, 1)`
pub fn normalized_recent_failures(recent_failures: usize) -> f64 {
    (recent_failures as f64 / RECENT_FAILURE_SATURATION).min(1.0)
}

fn dominant_reason(probability: f64, impact: f64, historical: f64, recent: f64, is_new: bool) -> PriorityReason {
    let signals = [
        (PriorityReason::HighFailureRisk, probability),
        (PriorityReason::CodeChanges, impact),
        (PriorityReason::HistoricalFailures, historical),
        (PriorityReason::RecentFailures, recent),
    ];
    let strongest = signals
        .iter()
        .fold(signals[0], |best, &s| if s.1 > best.1 { s } else { best });

    if strongest.1 > DOMINANT_SIGNAL {
        strongest.0
    } else if is_new {
        PriorityReason::NewTest
    } else {
        PriorityReason::General
    }
}
