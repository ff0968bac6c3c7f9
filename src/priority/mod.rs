//! Priority scoring and constraint-driven test selection.
//!
//! [`Prioritizer::score`] fuses failure probability, change impact and test
//! history into one score per test; [`select`] turns the scored candidates
//! into a bounded, non-empty selection with a per-test decision trace.

pub mod scorer;
pub mod selection;

pub use scorer::{
    normalized_recent_failures, PriorityBand, PriorityReason, PriorityScore, Prioritizer,
    ScoreComponents, RECENT_FAILURE_SATURATION,
};
pub use selection::{
    projected_coverage, select, BindingConstraint, Candidate, Constraints, DecisionReason,
    SelectionDecision, SelectionResult, SelectionSummary,
};
