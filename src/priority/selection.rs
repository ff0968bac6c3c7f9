//! Constraint-driven test selection.
//!
//! Candidates are ranked by score (descending), then by mean duration
//! (ascending), then by id. Selection runs in three passes over that ranking:
//!
//! 1. every test scoring above the threshold, up to `max_tests`;
//! 2. a greedy fill toward `min_tests` that stops at the first binding
//!    projection (time budget or coverage target);
//! 3. a floor that tops the set up to `min_tests` regardless of threshold.
//!
//! The result is never empty and never larger than `max_tests`.

use super::scorer::{PriorityBand, PriorityScore};
use crate::config::SelectionConfig;
use crate::core::TestId;
use crate::errors::{Error, Result};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Constraints {
    pub min_tests: usize,
    pub max_tests: usize,
    /// Seconds of projected execution the fill pass may use
    pub time_budget: Option<f64>,
    /// Projected coverage at which the fill pass stops
    pub coverage_target: Option<f64>,
    pub threshold: f64,
}

impl Default for Constraints {
    fn default() -> Self {
        Self::from_config(&SelectionConfig::default())
    }
}

impl Constraints {
    pub fn from_config(config: &SelectionConfig) -> Self {
        Self {
            min_tests: config.min_tests,
            max_tests: config.max_tests,
            time_budget: config.time_budget_secs,
            coverage_target: config.coverage_target,
            threshold: config.threshold,
        }
    }

    /// Reject mutually exclusive constraints instead of picking a side.
    pub fn validate(&self) -> Result<()> {
        if self.max_tests == 0 {
            return Err(Error::ConstraintUnsatisfiable(
                "max_tests is 0 but a selection may never be empty".to_string(),
            ));
        }
        if self.min_tests > self.max_tests {
            return Err(Error::ConstraintUnsatisfiable(format!(
                "min_tests ({}) exceeds max_tests ({})",
                self.min_tests, self.max_tests
            )));
        }
        if !(0.0..=1.0).contains(&self.threshold) {
            return Err(Error::ConstraintUnsatisfiable(format!(
                "threshold {} is outside [0, 1]",
                self.threshold
            )));
        }
        if let Some(target) = self.coverage_target {
            if !(0.0..=1.0).contains(&target) {
                return Err(Error::ConstraintUnsatisfiable(format!(
                    "coverage target {} is outside [0, 1]",
                    target
                )));
            }
        }
        if let Some(budget) = self.time_budget {
            if budget.is_nan() || budget < 0.0 {
                return Err(Error::ConstraintUnsatisfiable(format!(
                    "time budget {} is negative",
                    budget
                )));
            }
        }
        Ok(())
    }
}

/// A scored test with the history projections selection needs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub test_id: TestId,
    pub score: PriorityScore,
    pub mean_duration: f64,
    pub mean_coverage: f64,
}

/// The constraint that stopped selection from growing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindingConstraint {
    MaxTests,
    MinTests,
    TimeBudget,
    CoverageTarget,
}

impl fmt::Display for BindingConstraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BindingConstraint::MaxTests => "max tests",
            BindingConstraint::MinTests => "min tests",
            BindingConstraint::TimeBudget => "time budget",
            BindingConstraint::CoverageTarget => "coverage target",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    AboveThreshold,
    Fill,
    MinimumTests,
    /// Minimum already met and below threshold
    NotNeeded,
    MaxTests,
    TimeBudget,
    CoverageTarget,
}

impl DecisionReason {
    fn from_binding(binding: BindingConstraint) -> Self {
        match binding {
            BindingConstraint::MaxTests => DecisionReason::MaxTests,
            BindingConstraint::MinTests => DecisionReason::NotNeeded,
            BindingConstraint::TimeBudget => DecisionReason::TimeBudget,
            BindingConstraint::CoverageTarget => DecisionReason::CoverageTarget,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionDecision {
    pub test_id: TestId,
    /// 1-based position in the ranking
    pub rank: usize,
    pub score: f64,
    pub included: bool,
    pub reason: DecisionReason,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SelectionSummary {
    pub total_tests: usize,
    pub selected_tests: usize,
    pub reduction_percentage: f64,
    pub total_time_all: f64,
    pub total_time_selected: f64,
    pub time_saved: f64,
    pub time_reduction_percentage: f64,
    pub high_priority_count: usize,
    pub medium_priority_count: usize,
    pub low_priority_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Selected tests in rank order
    pub selected: Vec<TestId>,
    pub scores: BTreeMap<TestId, PriorityScore>,
    pub trace: Vec<SelectionDecision>,
    pub projected_duration: f64,
    pub projected_coverage: f64,
    pub binding_constraint: Option<BindingConstraint>,
    pub summary: SelectionSummary,
}

impl SelectionResult {
    pub fn contains(&self, test_id: &str) -> bool {
        self.selected.iter().any(|t| t == test_id)
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

/// Ranking order: higher score, then cheaper, then id.
fn rank_order(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .value
        .total_cmp(&a.score.value)
        .then_with(|| a.mean_duration.total_cmp(&b.mean_duration))
        .then_with(|| a.test_id.cmp(&b.test_id))
}

/// Running projection of the selected set
#[derive(Debug)]
struct Projection {
    count: usize,
    duration: f64,
    /// Π(1 - coverage) over the selected tests
    uncovered: f64,
}

impl Projection {
    fn new() -> Self {
        Self {
            count: 0,
            duration: 0.0,
            uncovered: 1.0,
        }
    }

    fn add(&mut self, candidate: &Candidate) {
        self.count += 1;
        self.duration += candidate.mean_duration.max(0.0);
        self.uncovered *= 1.0 - candidate.mean_coverage.clamp(0.0, 1.0);
    }

    fn coverage(&self) -> f64 {
        1.0 - self.uncovered
    }
}

/// Projected coverage of a set of tests: `1 - Π(1 - coverage_i)`.
pub fn projected_coverage<I: IntoIterator<Item = f64>>(coverages: I) -> f64 {
    1.0 - coverages
        .into_iter()
        .map(|c| 1.0 - c.clamp(0.0, 1.0))
        .product::<f64>()
}

pub fn select(candidates: Vec<Candidate>, constraints: &Constraints) -> Result<SelectionResult> {
    constraints.validate()?;
    if candidates.is_empty() {
        return Err(Error::EmptySelection(
            "no candidate tests to select from".to_string(),
        ));
    }

    let mut ranked = candidates;
    ranked.sort_by(rank_order);
    let n = ranked.len();
    // A selection is never empty, even with min_tests = 0.
    let floor = constraints.min_tests.max(1).min(n);

    let mut reasons: Vec<Option<DecisionReason>> = vec![None; n];
    let mut included = vec![false; n];
    let mut projection = Projection::new();
    let mut capped = false;

    for (i, candidate) in ranked.iter().enumerate() {
        if candidate.score.value <= constraints.threshold {
            continue;
        }
        if projection.count < constraints.max_tests {
            projection.add(candidate);
            included[i] = true;
            reasons[i] = Some(DecisionReason::AboveThreshold);
        } else {
            capped = true;
            reasons[i] = Some(DecisionReason::MaxTests);
        }
    }

    let mut stopped: Option<BindingConstraint> = None;
    for (i, candidate) in ranked.iter().enumerate() {
        if reasons[i].is_some() {
            continue;
        }
        if projection.count >= constraints.max_tests {
            capped = true;
            reasons[i] = Some(DecisionReason::MaxTests);
            continue;
        }

        if stopped.is_none() {
            stopped = fill_stop(&projection, candidate, constraints, floor);
        }

        match stopped {
            None => {
                projection.add(candidate);
                included[i] = true;
                reasons[i] = Some(DecisionReason::Fill);
            }
            Some(_) if projection.count < floor => {
                projection.add(candidate);
                included[i] = true;
                reasons[i] = Some(DecisionReason::MinimumTests);
            }
            Some(binding) => {
                reasons[i] = Some(DecisionReason::from_binding(binding));
            }
        }
    }

    let binding_constraint = if capped {
        Some(BindingConstraint::MaxTests)
    } else {
        stopped
    };

    let trace: Vec<SelectionDecision> = ranked
        .iter()
        .enumerate()
        .map(|(i, c)| SelectionDecision {
            test_id: c.test_id.clone(),
            rank: i + 1,
            score: c.score.value,
            included: included[i],
            reason: reasons[i].unwrap_or(DecisionReason::NotNeeded),
        })
        .collect();

    let selected: Vec<TestId> = ranked
        .iter()
        .zip(&included)
        .filter(|(_, &inc)| inc)
        .map(|(c, _)| c.test_id.clone())
        .collect();
    if selected.is_empty() {
        return Err(Error::EmptySelection(format!(
            "{} candidates produced an empty selection",
            n
        )));
    }

    let summary = summarize(&ranked, &included);
    if let Some(binding) = binding_constraint {
        info!(
            selected = selected.len(),
            candidates = n,
            binding = %binding,
            "selection bound by constraint"
        );
    } else {
        debug!(selected = selected.len(), candidates = n, "selection complete");
    }

    Ok(SelectionResult {
        selected,
        scores: ranked
            .iter()
            .map(|c| (c.test_id.clone(), c.score))
            .collect(),
        trace,
        projected_duration: projection.duration,
        projected_coverage: projection.coverage(),
        binding_constraint,
        summary,
    })
}

/// First constraint that stops the fill pass before `candidate` is added.
fn fill_stop(
    projection: &Projection,
    candidate: &Candidate,
    constraints: &Constraints,
    floor: usize,
) -> Option<BindingConstraint> {
    if projection.count >= floor {
        return Some(BindingConstraint::MinTests);
    }
    if let Some(budget) = constraints.time_budget {
        if projection.duration + candidate.mean_duration.max(0.0) > budget {
            return Some(BindingConstraint::TimeBudget);
        }
    }
    if let Some(target) = constraints.coverage_target {
        if projection.count > 0 && projection.coverage() >= target {
            return Some(BindingConstraint::CoverageTarget);
        }
    }
    None
}

fn summarize(ranked: &[Candidate], included: &[bool]) -> SelectionSummary {
    let mut summary = SelectionSummary {
        total_tests: ranked.len(),
        ..SelectionSummary::default()
    };
    for (candidate, &inc) in ranked.iter().zip(included) {
        summary.total_time_all += candidate.mean_duration;
        if !inc {
            continue;
        }
        summary.selected_tests += 1;
        summary.total_time_selected += candidate.mean_duration;
        match candidate.score.band() {
            PriorityBand::High => summary.high_priority_count += 1,
            PriorityBand::Medium => summary.medium_priority_count += 1,
            PriorityBand::Low => summary.low_priority_count += 1,
        }
    }
    summary.reduction_percentage =
        (1.0 - summary.selected_tests as f64 / summary.total_tests as f64) * 100.0;
    summary.time_saved = summary.total_time_all - summary.total_time_selected;
    summary.time_reduction_percentage = if summary.total_time_all > 0.0 {
        summary.time_saved / summary.total_time_all * 100.0
    } else {
        0.0
    };
    summary
}
