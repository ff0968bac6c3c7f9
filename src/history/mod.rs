//! Execution history: an append-only store plus pure aggregate queries.

pub mod aggregates;
mod store;

pub use aggregates::{change_frequency, HistoryAggregates, RECENT_WINDOW};
pub use store::{HistorySnapshot, HistoryStore};
