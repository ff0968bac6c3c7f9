// Export modules for library usage
pub mod analyzers;
pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod coupling;
pub mod errors;
pub mod features;
pub mod history;
pub mod model;
pub mod observability;
pub mod orchestrator;
pub mod priority;
pub mod synthetic;

// Re-export commonly used types
pub use crate::core::{
    ChangeSet, ChangeSummary, FileChange, HistoryEntry, LineRange, Outcome, SymbolDelta, TestId,
    TestRecord,
};

pub use crate::errors::{Error, Result};

pub use crate::analyzers::{patch::parse_unified_diff, ChangeAnalyzer, LanguageParser, PythonParser};

pub use crate::config::{load_config, SelectorConfig};

pub use crate::coupling::{discover, CouplingIndex};

pub use crate::features::{FeatureBuilder, FeatureName, FeatureSchema, FeatureVector};

pub use crate::history::{HistoryAggregates, HistorySnapshot, HistoryStore};

pub use crate::model::{train, ModelStore, RiskModel, TrainingBudget};

pub use crate::orchestrator::{ModelState, Orchestrator, SelectionOutcome, TestEvidence};

pub use crate::priority::{
    select, Candidate, Constraints, PriorityScore, Prioritizer, SelectionResult,
};
