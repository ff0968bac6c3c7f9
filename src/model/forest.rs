//! Bagged CART ensemble.

use super::training::TrainingBudget;
use super::tree::{Criterion, DecisionTree, TreeData, TreeParams};
use super::Classifier;
use crate::config::ModelConfig;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    importance: Vec<f64>,
}

/// Tree `i` always draws from `seed + i`, so the forest does not depend on
/// how rayon schedules the work.
fn fit_tree(data: &TreeData, n: usize, params: TreeParams, seed: u64, width: usize) -> (DecisionTree, Vec<f64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let bootstrap: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
    let mut importance = vec![0.0; width];
    let tree = DecisionTree::fit(data, &bootstrap, params, &mut rng, &mut importance);
    (tree, importance)
}

impl Classifier for RandomForest {
    fn fit(rows: &[Vec<f64>], labels: &[bool], config: &ModelConfig, budget: &TrainingBudget) -> Self {
        let width = rows.first().map_or(0, Vec::len);
        let targets: Vec<f64> = labels.iter().map(|&l| if l { 1.0 } else { 0.0 }).collect();
        let data = TreeData {
            rows,
            targets: &targets,
            hessians: None,
        };
        let params = TreeParams {
            max_depth: config.max_depth,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: Some(((width as f64).sqrt().round() as usize).max(1)),
            criterion: Criterion::Gini,
        };

        let n_trees = budget.iterations(config.n_estimators);
        let batch = rayon::current_num_threads().max(1);
        let clock = budget.start();
        let mut fitted: Vec<(DecisionTree, Vec<f64>)> = Vec::with_capacity(n_trees);

        // Fit in thread-sized batches so a time budget can stop between them
        while fitted.len() < n_trees {
            let start = fitted.len();
            let end = (start + batch).min(n_trees);
            let chunk: Vec<_> = (start..end)
                .into_par_iter()
                .map(|i| fit_tree(&data, rows.len(), params, config.seed.wrapping_add(i as u64), width))
                .collect();
            fitted.extend(chunk);
            if clock.expired() {
                tracing::debug!(trees = fitted.len(), "forest training stopped by time budget");
                break;
            }
        }

        let mut importance = vec![0.0; width];
        let mut trees = Vec::with_capacity(fitted.len());
        for (tree, imp) in fitted {
            for (total, v) in importance.iter_mut().zip(imp) {
                *total += v;
            }
            trees.push(tree);
        }
        normalize(&mut importance);
        Self { trees, importance }
    }

    fn predict_proba(&self, row: &[f64]) -> f64 {
        if self.trees.is_empty() {
            return 0.0;
        }
        self.trees.iter().map(|t| t.predict(row)).sum::<f64>() / self.trees.len() as f64
    }

    fn feature_importance(&self) -> Option<Vec<f64>> {
        Some(self.importance.clone())
    }

    fn iterations(&self) -> usize {
        self.trees.len()
    }
}

/// Scale to sum 1; all-zero stays all-zero.
pub(crate) fn normalize(values: &mut [f64]) {
    let total: f64 = values.iter().sum();
    if total > 0.0 {
        for v in values.iter_mut() {
            *v /= total;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> (Vec<Vec<f64>>, Vec<bool>) {
        let rows: Vec<Vec<f64>> = (0..60)
            .map(|i| vec![(i % 10) as f64, ((i * 7) % 5) as f64])
            .collect();
        let labels = rows.iter().map(|r| r[0] >= 7.0).collect();
        (rows, labels)
    }

    #[test]
    fn test_forest_learns_threshold_and_is_reproducible() {
        let (rows, labels) = dataset();
        let config = ModelConfig {
            n_estimators: 15,
            ..ModelConfig::default()
        };
        let a = RandomForest::fit(&rows, &labels, &config, &TrainingBudget::unbounded());
        let b = RandomForest::fit(&rows, &labels, &config, &TrainingBudget::unbounded());
        assert_eq!(a, b);
        assert_eq!(a.iterations(), 15);
        assert!(a.predict_proba(&[9.0, 1.0]) > 0.5);
        assert!(a.predict_proba(&[1.0, 1.0]) < 0.5);

        let importance = a.feature_importance().unwrap();
        assert!(importance[0] > importance[1]);
        assert!((importance.iter().sum::<f64>() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_iteration_budget_limits_trees() {
        let (rows, labels) = dataset();
        let budget = TrainingBudget {
            max_iterations: Some(4),
            max_duration: None,
        };
        let forest = RandomForest::fit(&rows, &labels, &ModelConfig::default(), &budget);
        assert_eq!(forest.iterations(), 4);
    }
}
