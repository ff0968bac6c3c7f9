use serde::{Deserialize, Serialize};

/// `[selection]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Scores strictly above this are always selected
    #[serde(default = "default_threshold")]
    pub threshold: f64,

    #[serde(default = "default_min_tests")]
    pub min_tests: usize,

    #[serde(default = "default_max_tests")]
    pub max_tests: usize,

    /// Projected-duration ceiling for the optional fill phase, in seconds
    #[serde(default)]
    pub time_budget_secs: Option<f64>,

    /// Fill stops once projected coverage reaches this fraction
    #[serde(default = "default_coverage_target")]
    pub coverage_target: Option<f64>,
}

pub fn default_threshold() -> f64 {
    0.7
}

pub fn default_min_tests() -> usize {
    5
}

pub fn default_max_tests() -> usize {
    100
}

pub fn default_coverage_target() -> Option<f64> {
    Some(0.85)
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            min_tests: default_min_tests(),
            max_tests: default_max_tests(),
            time_budget_secs: None,
            coverage_target: default_coverage_target(),
        }
    }
}
