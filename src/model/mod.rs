//! Failure-risk classifiers.
//!
//! Three interchangeable families sit behind [`Classifier`]; callers only see
//! [`RiskModel::predict`], a probability in [0, 1]. A model is bound to the
//! [`FeatureSchema`] it was trained on and refuses vectors of any other
//! layout.

pub mod boosting;
pub mod forest;
pub mod linear;
pub mod metrics;
pub mod persistence;
pub mod scaler;
pub mod training;
pub mod tree;

use crate::config::{ModelConfig, ModelFamily};
use crate::errors::{Error, Result};
use crate::features::{FeatureName, FeatureSchema, FeatureVector};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub use boosting::GradientBoosting;
pub use forest::RandomForest;
pub use linear::LogisticRegression;
pub use metrics::ValidationReport;
pub use persistence::ModelStore;
pub use scaler::StandardScaler;
pub use training::{stratified_split, train, TrainingBudget};

/// Capability shared by every model family
pub trait Classifier: Send + Sync {
    /// Fit on standardized rows. Labels are `true` for failures.
    fn fit(rows: &[Vec<f64>], labels: &[bool], config: &ModelConfig, budget: &TrainingBudget) -> Self
    where
        Self: Sized;

    fn predict_proba(&self, row: &[f64]) -> f64;

    /// Relative contribution of each input feature, summing to 1
    fn feature_importance(&self) -> Option<Vec<f64>> {
        None
    }

    /// Trees or epochs actually fitted
    fn iterations(&self) -> usize;
}

/// Fitted parameters of whichever family was trained
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ClassifierParams {
    Forest(RandomForest),
    Boosted(GradientBoosting),
    Linear(LogisticRegression),
}

impl ClassifierParams {
    pub fn fit(
        family: ModelFamily,
        rows: &[Vec<f64>],
        labels: &[bool],
        config: &ModelConfig,
        budget: &TrainingBudget,
    ) -> Self {
        match family {
            ModelFamily::RandomForest => {
                ClassifierParams::Forest(RandomForest::fit(rows, labels, config, budget))
            }
            ModelFamily::GradientBoosting => {
                ClassifierParams::Boosted(GradientBoosting::fit(rows, labels, config, budget))
            }
            ModelFamily::LogisticRegression => {
                ClassifierParams::Linear(LogisticRegression::fit(rows, labels, config, budget))
            }
        }
    }

    pub fn family(&self) -> ModelFamily {
        match self {
            ClassifierParams::Forest(_) => ModelFamily::RandomForest,
            ClassifierParams::Boosted(_) => ModelFamily::GradientBoosting,
            ClassifierParams::Linear(_) => ModelFamily::LogisticRegression,
        }
    }

    pub fn as_classifier(&self) -> &dyn Classifier {
        match self {
            ClassifierParams::Forest(m) => m,
            ClassifierParams::Boosted(m) => m,
            ClassifierParams::Linear(m) => m,
        }
    }

    pub fn predict_proba(&self, row: &[f64]) -> f64 {
        self.as_classifier().predict_proba(row)
    }

    pub fn feature_importance(&self) -> Option<Vec<f64>> {
        self.as_classifier().feature_importance()
    }

    pub fn iterations(&self) -> usize {
        self.as_classifier().iterations()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub family: ModelFamily,
    pub sample_count: usize,
    pub training_samples: usize,
    pub validation_samples: usize,
    pub trained_at: DateTime<Utc>,
    pub training_millis: u64,
    /// Trees or epochs fitted, after any budget cut
    pub iterations: usize,
    pub validation: ValidationReport,
    pub feature_importance: Option<Vec<(FeatureName, f64)>>,
}

/// Versioned, self-contained risk model artifact
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskModel {
    version: u64,
    schema: FeatureSchema,
    scaler: StandardScaler,
    classifier: ClassifierParams,
    metadata: TrainingMetadata,
}

impl RiskModel {
    pub fn new(
        schema: FeatureSchema,
        scaler: StandardScaler,
        classifier: ClassifierParams,
        metadata: TrainingMetadata,
    ) -> Self {
        Self {
            version: 1,
            schema,
            scaler,
            classifier,
            metadata,
        }
    }

    /// Same model under a new version number.
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn schema(&self) -> FeatureSchema {
        self.schema
    }

    pub fn family(&self) -> ModelFamily {
        self.classifier.family()
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    /// Failure probability for one feature vector.
    pub fn predict(&self, features: &FeatureVector) -> Result<f64> {
        if features.schema() != self.schema {
            return Err(Error::schema_mismatch(self.schema, features.schema()));
        }
        if self.scaler.width() != features.values().len() {
            return Err(Error::schema_mismatch(
                format!("{} features", self.scaler.width()),
                format!("{} features", features.values().len()),
            ));
        }
        let row = self.scaler.transform(features.values());
        Ok(self.classifier.predict_proba(&row).clamp(0.0, 1.0))
    }

    pub fn predict_batch(&self, batch: &[FeatureVector]) -> Result<Vec<f64>> {
        batch.iter().map(|f| self.predict(f)).collect()
    }
}
