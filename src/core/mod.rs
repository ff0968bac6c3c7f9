//! Shared data model: change sets and execution history entries.

pub mod change_set;
pub mod history;

pub use change_set::{
    ChangeSet, ChangeSummary, DeclarationKind, DeltaKind, FileChange, FileChangeSummary,
    LineRange, SymbolDelta, normalize_path,
};
pub use history::{EntryLog, HistoryEntry, Outcome, TestId, TestRecord};
