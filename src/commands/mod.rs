//! CLI command implementations.
//!
//! Each submodule handles one subcommand:
//! - **init**: write a default `.testimpact.toml`
//! - **generate_history**: append synthetic history for the sample project
//! - **train**: train and install a new risk model
//! - **select**: pick the tests to run for a change
//! - **record**: append one execution outcome to history
//! - **discover**: build the coupling index from a Python project

pub mod discover;
pub mod generate_history;
pub mod init;
pub mod record;
pub mod select;
pub mod train;

pub use discover::discover_coupling;
pub use generate_history::generate_history;
pub use init::init_config;
pub use record::record_outcome;
pub use select::{handle_select, read_change_set};
pub use train::handle_train;

use crate::config::{load_config_from, load_config_from_path, SelectorConfig};
use anyhow::{Context, Result};
use std::path::Path;

/// Explicit config file if given, otherwise the nearest one above `root`.
pub fn load_settings(root: &Path, config: Option<&Path>) -> Result<SelectorConfig> {
    match config {
        Some(path) => load_config_from_path(path)
            .with_context(|| format!("Failed to load config {}", path.display())),
        None => Ok(load_config_from(root)),
    }
}
