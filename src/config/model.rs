use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Classifier family used for the risk model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    #[default]
    RandomForest,
    GradientBoosting,
    LogisticRegression,
}

impl ModelFamily {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelFamily::RandomForest => "random_forest",
            ModelFamily::GradientBoosting => "gradient_boosting",
            ModelFamily::LogisticRegression => "logistic_regression",
        }
    }
}

impl fmt::Display for ModelFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelFamily {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "random_forest" | "forest" => Ok(ModelFamily::RandomForest),
            "gradient_boosting" | "boosting" => Ok(ModelFamily::GradientBoosting),
            "logistic_regression" | "linear" => Ok(ModelFamily::LogisticRegression),
            other => Err(format!("unknown model family '{}'", other)),
        }
    }
}

/// `[model]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    #[serde(default)]
    pub family: ModelFamily,

    /// Trees for ensembles, ignored by the linear family
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    /// Shrinkage for boosting, step size for logistic regression
    #[serde(default = "default_learning_rate")]
    pub learning_rate: f64,

    #[serde(default = "default_seed")]
    pub seed: u64,

    #[serde(default = "default_validation_fraction")]
    pub validation_fraction: f64,

    #[serde(default = "default_min_training_samples")]
    pub min_training_samples: usize,

    /// A retrained model below this validation accuracy is not installed
    #[serde(default = "default_min_validation_accuracy")]
    pub min_validation_accuracy: f64,

    #[serde(default)]
    pub max_iterations: Option<usize>,

    #[serde(default)]
    pub max_training_secs: Option<f64>,

    /// Generate synthetic history when the store is empty and no model exists
    #[serde(default = "default_synthesize_when_empty")]
    pub synthesize_when_empty: bool,

    #[serde(default = "default_synthetic_runs")]
    pub synthetic_runs: usize,
}

pub fn default_n_estimators() -> usize {
    100
}

pub fn default_max_depth() -> usize {
    10
}

pub fn default_learning_rate() -> f64 {
    0.1
}

pub fn default_seed() -> u64 {
    42
}

pub fn default_validation_fraction() -> f64 {
    0.2
}

pub fn default_min_training_samples() -> usize {
    50
}

pub fn default_min_validation_accuracy() -> f64 {
    0.5
}

pub fn default_synthesize_when_empty() -> bool {
    true
}

pub fn default_synthetic_runs() -> usize {
    100
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            family: ModelFamily::default(),
            n_estimators: default_n_estimators(),
            max_depth: default_max_depth(),
            learning_rate: default_learning_rate(),
            seed: default_seed(),
            validation_fraction: default_validation_fraction(),
            min_training_samples: default_min_training_samples(),
            min_validation_accuracy: default_min_validation_accuracy(),
            max_iterations: None,
            max_training_secs: None,
            synthesize_when_empty: default_synthesize_when_empty(),
            synthetic_runs: default_synthetic_runs(),
        }
    }
}
