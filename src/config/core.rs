use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use super::model::ModelConfig;
use super::scoring::FusionWeights;
use super::selection::SelectionConfig;

/// Root configuration structure for testimpact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SelectorConfig {
    #[serde(default)]
    pub selection: SelectionConfig,

    /// Priority fusion weights
    #[serde(default)]
    pub scoring: FusionWeights,

    #[serde(default)]
    pub model: ModelConfig,

    /// Values used when a test has no history to aggregate
    #[serde(default)]
    pub features: FeatureDefaults,

    #[serde(default)]
    pub coupling: CouplingConfig,

    /// Where persisted state lives
    #[serde(default)]
    pub data: DataConfig,
}

impl SelectorConfig {
    /// Reject values no pipeline run could honour.
    pub fn validate(&self) -> Result<(), String> {
        let sel = &self.selection;
        if !(0.0..=1.0).contains(&sel.threshold) {
            return Err(format!("selection.threshold must be in [0, 1], got {}", sel.threshold));
        }
        if sel.max_tests == 0 {
            return Err("selection.max_tests must be at least 1".to_string());
        }
        if sel.min_tests > sel.max_tests {
            return Err(format!(
                "selection.min_tests ({}) exceeds selection.max_tests ({})",
                sel.min_tests, sel.max_tests
            ));
        }
        if let Some(target) = sel.coverage_target {
            if !(0.0..=1.0).contains(&target) {
                return Err(format!("selection.coverage_target must be in [0, 1], got {}", target));
            }
        }
        if sel.time_budget_secs.is_some_and(|b| b < 0.0) {
            return Err("selection.time_budget_secs must not be negative".to_string());
        }

        let model = &self.model;
        if model.min_training_samples == 0 {
            return Err("model.min_training_samples must be at least 1".to_string());
        }
        if !(0.0..1.0).contains(&model.validation_fraction) || model.validation_fraction == 0.0 {
            return Err(format!(
                "model.validation_fraction must be in (0, 1), got {}",
                model.validation_fraction
            ));
        }
        if model.n_estimators == 0 || model.max_depth == 0 {
            return Err("model.n_estimators and model.max_depth must be positive".to_string());
        }

        if !(0.0..=1.0).contains(&self.features.failure_rate_prior) {
            return Err("features.failure_rate_prior must be in [0, 1]".to_string());
        }
        if !(0.0..=1.0).contains(&self.coupling.file_level_impact) {
            return Err("coupling.file_level_impact must be in [0, 1]".to_string());
        }
        Ok(())
    }
}

/// `[features]` section: defaults for tests without history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureDefaults {
    /// Failure rate assumed for a test never observed
    #[serde(default = "default_failure_rate_prior")]
    pub failure_rate_prior: f64,

    #[serde(default = "default_duration_secs")]
    pub duration_secs: f64,

    #[serde(default = "default_coverage")]
    pub coverage: f64,

    /// Runs-since-last-failure for a test that never failed
    #[serde(default = "default_never_failed_sentinel")]
    pub never_failed_sentinel: f64,
}

pub fn default_failure_rate_prior() -> f64 {
    0.05
}

pub fn default_duration_secs() -> f64 {
    0.1
}

pub fn default_coverage() -> f64 {
    0.8
}

pub fn default_never_failed_sentinel() -> f64 {
    999.0
}

impl Default for FeatureDefaults {
    fn default() -> Self {
        Self {
            failure_rate_prior: default_failure_rate_prior(),
            duration_secs: default_duration_secs(),
            coverage: default_coverage(),
            never_failed_sentinel: default_never_failed_sentinel(),
        }
    }
}

/// `[coupling]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouplingConfig {
    /// Impact factor for a coupled file whose coupled symbols did not change
    #[serde(default = "default_file_level_impact")]
    pub file_level_impact: f64,
}

pub fn default_file_level_impact() -> f64 {
    0.5
}

impl Default for CouplingConfig {
    fn default() -> Self {
        Self {
            file_level_impact: default_file_level_impact(),
        }
    }
}

/// `[data]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataConfig {
    #[serde(default = "default_history_file")]
    pub history_file: PathBuf,

    #[serde(default = "default_model_dir")]
    pub model_dir: PathBuf,

    #[serde(default = "default_coupling_file")]
    pub coupling_file: PathBuf,
}

pub fn default_history_file() -> PathBuf {
    PathBuf::from(".testimpact/history.jsonl")
}

pub fn default_model_dir() -> PathBuf {
    PathBuf::from(".testimpact/models")
}

pub fn default_coupling_file() -> PathBuf {
    PathBuf::from(".testimpact/coupling.json")
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            history_file: default_history_file(),
            model_dir: default_model_dir(),
            coupling_file: default_coupling_file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(SelectorConfig::default().validate().is_ok());
    }

    #[test]
    fn test_min_above_max_is_rejected() {
        let mut config = SelectorConfig::default();
        config.selection.min_tests = 10;
        config.selection.max_tests = 3;
        assert!(config.validate().unwrap_err().contains("min_tests"));
    }

    #[test]
    fn test_zero_training_minimum_is_rejected() {
        let mut config = SelectorConfig::default();
        config.model.min_training_samples = 0;
        assert!(config.validate().is_err());
    }
}
