//! Gradient-boosted regression trees on the log-loss.

use super::forest::normalize;
use super::training::TrainingBudget;
use super::tree::{Criterion, DecisionTree, TreeData, TreeParams};
use super::Classifier;
use crate::config::ModelConfig;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Boosted trees are kept shallow regardless of the configured depth
pub const MAX_BOOSTING_DEPTH: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    /// Log-odds of the training base rate
    base_score: f64,
    learning_rate: f64,
    trees: Vec<DecisionTree>,
    importance: Vec<f64>,
}

pub(crate) fn sigmoid(z: f64) -> f64 {
    1.0 / (1.0 + (-z).exp())
}

impl Classifier for GradientBoosting {
    fn fit(rows: &[Vec<f64>], labels: &[bool], config: &ModelConfig, budget: &TrainingBudget) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let y: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let rate = (y.iter().sum::<f64>() / y.len().max(1) as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (rate / (1.0 - rate)).ln();

        let params = TreeParams {
            max_depth: config.max_depth.min(MAX_BOOSTING_DEPTH),
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion: Criterion::Variance,
        };
        let indices: Vec<usize> = (0..rows.len()).collect();
        let mut scores = vec![base_score; rows.len()];
        let mut trees = Vec::new();
        let mut importance = vec![0.0; width];

        let rounds = budget.iterations(config.n_estimators);
        let clock = budget.start();
        for round in 0..rounds {
            let probs: Vec<f64> = scores.iter().map(|&s| sigmoid(s)).collect();
            let residuals: Vec<f64> = y.iter().zip(&probs).map(|(t, p)| t - p).collect();
            let hessians: Vec<f64> = probs.iter().map(|p| p * (1.0 - p)).collect();

            let data = TreeData {
                rows,
                targets: &residuals,
                hessians: Some(&hessians),
            };
            let mut rng = StdRng::seed_from_u64(config.seed.wrapping_add(round as u64));
            let tree = DecisionTree::fit(&data, &indices, params, &mut rng, &mut importance);

            for (score, row) in scores.iter_mut().zip(rows) {
                *score += config.learning_rate * tree.predict(row);
            }
            trees.push(tree);

            if clock.expired() {
                tracing::debug!(rounds = trees.len(), "boosting stopped by time budget");
                break;
            }
        }

        normalize(&mut importance);
        Self {
            base_score,
            learning_rate: config.learning_rate,
            trees,
            importance,
        }
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        let margin: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        sigmoid(self.base_score + self.learning_rate * margin)
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        Some(self.importance.clone())
    }

    fn iterations(&self) -> usize {
        self.trees.len()
    }
}
