//! Training entry point: split, scale, fit, validate.

use super::metrics::ValidationReport;
use super::scaler::StandardScaler;
use super::{ClassifierParams, RiskModel, TrainingMetadata};
use crate::config::ModelConfig;
use crate::errors::{Error, Result};
use crate::features::{FeatureName, FeatureSchema, TrainingSample};
use chrono::Utc;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use std::time::{Duration, Instant};
use tracing::{info, info_span};

/// Caller-supplied bound on training work. Training stops early when the
/// budget runs out but always returns a complete model.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TrainingBudget {
    pub max_iterations: Option<usize>,
    pub max_duration: Option<Duration>,
}

impl TrainingBudget {
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn from_config(config: &ModelConfig) -> Self {
        Self {
            max_iterations: config.max_iterations,
            max_duration: config
                .max_training_secs
                .filter(|s| s.is_finite() && *s > 0.0)
                .map(Duration::from_secs_f64),
        }
    }

    /// Iterations to run when `requested` are wanted; never below 1.
    pub fn iterations(&self, requested: usize) -> usize {
        self.max_iterations
            .map_or(requested, |cap| requested.min(cap))
            .max(1)
    }

    pub fn start(&self) -> BudgetClock {
        BudgetClock {
            deadline: self.max_duration.map(|d| Instant::now() + d),
        }
    }
}

/// Running deadline for one training call
#[derive(Debug, Clone, Copy)]
pub struct BudgetClock {
    deadline: Option<Instant>,
}

impl BudgetClock {
    pub fn expired(&self) -> bool {
        self.deadline.is_some_and(|d| Instant::now() >= d)
    }
}

/// Seeded split that keeps the class ratio in both halves. Every class
/// keeps at least one training sample.
pub fn stratified_split(labels: &[bool], fraction: f64, seed: u64) -> (Vec<usize>, Vec<usize>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut validation = Vec::new();

    for class in [false, true] {
        let mut members: Vec<usize> = (0..labels.len()).filter(|&i| labels[i] == class).collect();
        members.shuffle(&mut rng);
        let wanted = (members.len() as f64 * fraction).round() as usize;
        let held_out = wanted.min(members.len().saturating_sub(1));
        validation.extend_from_slice(&members[..held_out]);
        train.extend_from_slice(&members[held_out..]);
    }
    train.sort_unstable();
    validation.sort_unstable();
    (train, validation)
}

/// Train a risk model on labelled samples.
///
/// Fails with `InsufficientData` below `config.min_training_samples` or when
/// every sample has the same outcome, and with `SchemaMismatch` when samples
/// were built against another feature layout.
pub fn train(samples: &[TrainingSample], config: &ModelConfig, budget: TrainingBudget) -> Result<RiskModel> {
    let _span = info_span!("train", family = %config.family, samples = samples.len()).entered();
    let started = Instant::now();

    if samples.len() < config.min_training_samples {
        return Err(Error::insufficient_data(
            "too few history entries to train",
            samples.len(),
            config.min_training_samples,
        ));
    }
    let schema = FeatureSchema::current();
    if let Some(other) = samples.iter().map(|s| s.features.schema()).find(|s| *s != schema) {
        return Err(Error::schema_mismatch(schema, other));
    }
    let failures = samples.iter().filter(|s| s.failed).count();
    if failures == 0 || failures == samples.len() {
        return Err(Error::insufficient_data(
            "training data needs both passing and failing outcomes",
            failures.min(samples.len() - failures),
            1,
        ));
    }

    let labels: Vec<bool> = samples.iter().map(|s| s.failed).collect();
    let (train_idx, valid_idx) = stratified_split(&labels, config.validation_fraction, config.seed);

    let raw: Vec<Vec<f64>> = samples.iter().map(|s| s.features.values().to_vec()).collect();
    let train_raw: Vec<Vec<f64>> = train_idx.iter().map(|&i| raw[i].clone()).collect();
    let scaler = StandardScaler::fit(&train_raw);
    let train_rows: Vec<Vec<f64>> = train_raw.iter().map(|r| scaler.transform(r)).collect();
    let train_labels: Vec<bool> = train_idx.iter().map(|&i| labels[i]).collect();

    let classifier = ClassifierParams::fit(config.family, &train_rows, &train_labels, config, &budget);
    let iterations = classifier.iterations();

    let valid_probs: Vec<f64> = valid_idx
        .iter()
        .map(|&i| classifier.predict_proba(&scaler.transform(&raw[i])))
        .collect();
    let valid_labels: Vec<bool> = valid_idx.iter().map(|&i| labels[i]).collect();
    let validation = ValidationReport::compute(&valid_probs, &valid_labels);

    let feature_importance = classifier.feature_importance().map(|imp| {
        FeatureName::ALL
            .iter()
            .zip(imp)
            .map(|(name, value)| (*name, value))
            .collect()
    });

    info!(
        accuracy = validation.accuracy,
        precision = validation.precision,
        recall = validation.recall,
        iterations,
        "trained risk model"
    );

    Ok(RiskModel::new(
        schema,
        scaler,
        classifier,
        TrainingMetadata {
            family: config.family,
            sample_count: samples.len(),
            training_samples: train_idx.len(),
            validation_samples: valid_idx.len(),
            trained_at: Utc::now(),
            training_millis: started.elapsed().as_millis() as u64,
            iterations,
            validation,
            feature_importance,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_is_stratified_and_seeded() {
        let labels: Vec<bool> = (0..100).map(|i| i % 4 == 0).collect();
        let (train, valid) = stratified_split(&labels, 0.2, 42);
        assert_eq!(train.len() + valid.len(), 100);
        assert_eq!(valid.iter().filter(|&&i| labels[i]).count(), 5);
        assert_eq!(valid.len(), 20);
        assert_eq!(stratified_split(&labels, 0.2, 42), (train, valid));
    }

    #[test]
    fn test_rare_class_stays_in_training() {
        let mut labels = vec![false; 30];
        labels[3] = true;
        let (train, valid) = stratified_split(&labels, 0.5, 1);
        assert!(train.contains(&3));
        assert!(!valid.contains(&3));
    }

    #[test]
    fn test_budget_caps_iterations() {
        let budget = TrainingBudget {
            max_iterations: Some(10),
            max_duration: None,
        };
        assert_eq!(budget.iterations(100), 10);
        assert_eq!(budget.iterations(3), 3);
        assert_eq!(TrainingBudget { max_iterations: Some(0), max_duration: None }.iterations(5), 1);
        assert!(!TrainingBudget::unbounded().start().expired());
    }
}
