//! Configuration loading and the value types consumed by the pipeline.
//!
//! All sections are optional in `.testimpact.toml`; missing fields take the
//! `default_*` values defined next to each type.

mod core;
mod loader;
mod model;
mod scoring;
mod selection;

pub use self::core::{CouplingConfig, DataConfig, FeatureDefaults, SelectorConfig};
pub use loader::{
    directory_ancestors, load_config, load_config_from, load_config_from_path,
    parse_and_validate_config, CONFIG_FILE_NAME,
};
pub use model::{ModelConfig, ModelFamily};
pub use scoring::FusionWeights;
pub use selection::SelectionConfig;
