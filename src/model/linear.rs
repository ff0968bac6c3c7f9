use super::boosting::sigmoid;
use super::forest::normalize;
use super::training::TrainingBudget;
use super::Classifier;
use crate::config::ModelConfig;
use serde::{Deserialize, Serialize};

/// Epochs of full-batch gradient descent when the budget allows
pub const MAX_EPOCHS: usize = 1000;
/// L2 penalty on the weights (bias excluded)
pub const L2_PENALTY: f64 = 1e-3;
const CONVERGENCE_TOLERANCE: f64 = 1e-7;

/// L2-regularized logistic regression
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    weights: Vec<f64>,
    bias: f64,
    epochs: usize,
}

impl LogisticRegression {
    fn margin(&self, row: &[f64]) -> f64 {
        self.bias + self.weights.iter().zip(row).map(|(w, x)| w * x).sum::<f64>()
    }
}

impl Classifier for LogisticRegression {
    fn fit(rows: &[Vec<f64>], labels: &[bool], config: &ModelConfig, budget: &TrainingBudget) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let n = rows.len().max(1) as f64;
        let mut model = Self {
            weights: vec![0.0; width],
            bias: 0.0,
            epochs: 0,
        };

        let epochs = budget.iterations(MAX_EPOCHS);
        let clock = budget.start();
        for _ in 0..epochs {
            let mut grad_w = vec![0.0; width];
            let mut grad_b = 0.0;
            for (row, &label) in rows.iter().zip(labels) {
                let err = sigmoid(model.margin(row)) - if label { 1.0 } else { 0.0 };
                for (g, x) in grad_w.iter_mut().zip(row) {
                    *g += err * x;
                }
                grad_b += err;
            }

            let mut norm = (grad_b / n).powi(2);
            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                let step = g / n + L2_PENALTY * *w;
                norm += step * step;
                *w -= config.learning_rate * step;
            }
            model.bias -= config.learning_rate * grad_b / n;
            model.epochs += 1;

            if norm.sqrt() < CONVERGENCE_TOLERANCE || clock.expired() {
                break;
            }
        }
        model
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        sigmoid(self.margin(row))
    }

    /// Absolute weights on standardized features, normalized
    fn feature_importance(&self) -> Option<Vec<f64>> {
        let mut importance: Vec<f64> = self.weights.iter().map(|w| w.abs()).collect();
        normalize(&mut importance);
        Some(importance)
    }

    fn iterations(&self) -> usize {
        self.epochs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_learns_sign_of_feature() {
        let rows: Vec<Vec<f64>> = (-20..20).map(|i| vec![i as f64 / 10.0, 0.0]).collect();
        let labels: Vec<bool> = (-20..20).map(|i| i > 0).collect();
        let model = LogisticRegression::fit(&rows, &labels, &ModelConfig::default(), &TrainingBudget::unbounded());
        assert!(model.predict_proba(&[1.5, 0.0]) > 0.8);
        assert!(model.predict_proba(&[-1.5, 0.0]) < 0.2);
        assert_eq!(model.feature_importance().unwrap()[1], 0.0);
    }
}
