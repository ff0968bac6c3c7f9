//! CART decision trees shared by the ensemble families.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// Impurity used to choose splits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Criterion {
    /// Binary 0/1 targets; leaves hold the positive fraction
    Gini,
    /// Real-valued targets
    Variance,
}

#[derive(Debug, Clone, Copy)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    /// Features examined per split; `None` means all
    pub max_features: Option<usize>,
    pub criterion: Criterion,
}

/// A node in a decision tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: Box<TreeNode>,
        right: Box<TreeNode>,
    },
    Leaf {
        value: f64,
    },
}

/// Training data viewed through an index set (bootstrap samples reuse rows)
pub struct TreeData<'a> {
    pub rows: &'a [Vec<f64>],
    pub targets: &'a [f64],
    /// Per-row Newton denominators; leaves use `sum(t) / sum(h)` when present
    pub hessians: Option<&'a [f64]>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionTree {
    root: TreeNode,
}

struct Builder<'a, 'r> {
    data: &'a TreeData<'a>,
    params: TreeParams,
    rng: &'r mut StdRng,
    importance: Vec<f64>,
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    gain: f64,
}

impl DecisionTree {
    /// Fit on `indices` (repeats allowed). Impurity decrease per feature is
    /// added to `importance`.
    pub fn fit(
        data: &TreeData,
        indices: &[usize],
        params: TreeParams,
        rng: &mut StdRng,
        importance: &mut [f64],
    ) -> Self {
        let n_features = data.rows.first().map_or(0, Vec::len);
        let mut builder = Builder {
            data,
            params,
            rng,
            importance: vec![0.0; n_features],
        };
        let mut indices = indices.to_vec();
        let root = builder.build(&mut indices, 0);
        for (total, gained) in importance.iter_mut().zip(&builder.importance) {
            *total += gained;
        }
        Self { root }
    }

    pub fn predict(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        loop {
            match node {
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node = if row[*feature] <= *threshold {
                        left
                    } else {
                        right
                    };
                }
                TreeNode::Leaf { value } => return *value,
            }
        }
    }

    pub fn depth(&self) -> usize {
        fn depth(node: &TreeNode) -> usize {
            match node {
                TreeNode::Split { left, right, .. } => 1 + depth(left).max(depth(right)),
                TreeNode::Leaf { .. } => 0,
            }
        }
        depth(&self.root)
    }
}

impl Builder<'_, '_> {
    fn build(&mut self, indices: &mut [usize], depth: usize) -> TreeNode {
        let leaf = TreeNode::Leaf {
            value: self.leaf_value(indices),
        };
        if depth >= self.params.max_depth
            || indices.len() < self.params.min_samples_split
            || self.impurity(indices) <= f64::EPSILON
        {
            return leaf;
        }

        let Some(best) = self.best_split(indices) else {
            return leaf;
        };
        self.importance[best.feature] += best.gain;

        let rows = self.data.rows;
        let mid = partition(indices, |&i| rows[i][best.feature] <= best.threshold);
        let (left_idx, right_idx) = indices.split_at_mut(mid);
        let left = self.build(left_idx, depth + 1);
        let right = self.build(right_idx, depth + 1);
        TreeNode::Split {
            feature: best.feature,
            threshold: best.threshold,
            left: Box::new(left),
            right: Box::new(right),
        }
    }

    fn leaf_value(&self, indices: &[usize]) -> f64 {
        if indices.is_empty() {
            return 0.0;
        }
        let sum: f64 = indices.iter().map(|&i| self.data.targets[i]).sum();
        match self.data.hessians {
            Some(h) => {
                let denom: f64 = indices.iter().map(|&i| h[i]).sum();
                sum / denom.max(1e-12)
            }
            None => sum / indices.len() as f64,
        }
    }

    /// Total (count-weighted) impurity of a node
    fn impurity(&self, indices: &[usize]) -> f64 {
        let (sum, sum_sq) = indices.iter().fold((0.0, 0.0), |(s, q), &i| {
            let t = self.data.targets[i];
            (s + t, q + t * t)
        });
        node_impurity(self.params.criterion, indices.len() as f64, sum, sum_sq)
    }

    fn best_split(&mut self, indices: &[usize]) -> Option<BestSplit> {
        let n_features = self.importance.len();
        let mut features: Vec<usize> = (0..n_features).collect();
        if let Some(k) = self.params.max_features.filter(|&k| k < n_features) {
            features.shuffle(&mut *self.rng);
            features.truncate(k.max(1));
            features.sort_unstable();
        }

        let parent = self.impurity(indices);
        let n = indices.len() as f64;
        let (total_sum, total_sq) = indices.iter().fold((0.0, 0.0), |(s, q), &i| {
            let t = self.data.targets[i];
            (s + t, q + t * t)
        });
        let min_leaf = self.params.min_samples_leaf.max(1);
        let mut best: Option<BestSplit> = None;

        let mut order = indices.to_vec();
        for feature in features {
            let rows = self.data.rows;
            order.sort_by(|&a, &b| rows[a][feature].total_cmp(&rows[b][feature]));

            let (mut left_sum, mut left_sq) = (0.0, 0.0);
            for k in 0..order.len().saturating_sub(1) {
                let t = self.data.targets[order[k]];
                left_sum += t;
                left_sq += t * t;

                let here = rows[order[k]][feature];
                let next = rows[order[k + 1]][feature];
                let left_n = k + 1;
                let right_n = order.len() - left_n;
                if here == next || left_n < min_leaf || right_n < min_leaf {
                    continue;
                }

                let left = node_impurity(self.params.criterion, left_n as f64, left_sum, left_sq);
                let right = node_impurity(
                    self.params.criterion,
                    n - left_n as f64,
                    total_sum - left_sum,
                    total_sq - left_sq,
                );
                let gain = parent - left - right;
                if gain > best.as_ref().map_or(1e-12, |b| b.gain) {
                    best = Some(BestSplit {
                        feature,
                        threshold: here + (next - here) / 2.0,
                        gain,
                    });
                }
            }
        }
        best
    }
}

fn node_impurity(criterion: Criterion, n: f64, sum: f64, sum_sq: f64) -> f64 {
    if n <= 0.0 {
        return 0.0;
    }
    match criterion {
        Criterion::Gini => {
            let p = sum / n;
            n * 2.0 * p * (1.0 - p)
        }
        Criterion::Variance => (sum_sq - sum * sum / n).max(0.0),
    }
}

/// Stable in-place partition; returns the count of elements satisfying `pred`.
fn partition(items: &mut [usize], pred: impl Fn(&usize) -> bool) -> usize {
    let (yes, no): (Vec<usize>, Vec<usize>) = items.iter().partition(|i| pred(i));
    let mid = yes.len();
    for (slot, value) in items.iter_mut().zip(yes.into_iter().chain(no)) {
        *slot = value;
    }
    mid
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn params(criterion: Criterion) -> TreeParams {
        TreeParams {
            max_depth: 4,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: None,
            criterion,
        }
    }

    #[test]
    fn test_separable_data_is_learned() {
        let rows: Vec<Vec<f64>> = (0..20).map(|i| vec![i as f64, 0.0]).collect();
        let targets: Vec<f64> = (0..20).map(|i| if i >= 10 { 1.0 } else { 0.0 }).collect();
        let data = TreeData {
            rows: &rows,
            targets: &targets,
            hessians: None,
        };
        let indices: Vec<usize> = (0..20).collect();
        let mut importance = vec![0.0; 2];
        let tree = DecisionTree::fit(
            &data,
            &indices,
            params(Criterion::Gini),
            &mut StdRng::seed_from_u64(7),
            &mut importance,
        );

        assert_eq!(tree.predict(&[3.0, 0.0]), 0.0);
        assert_eq!(tree.predict(&[15.0, 0.0]), 1.0);
        assert_eq!(tree.depth(), 1);
        assert!(importance[0] > 0.0);
        assert_eq!(importance[1], 0.0);
    }

    #[test]
    fn test_pure_node_is_a_leaf() {
        let rows = vec![vec![1.0], vec![2.0]];
        let targets = vec![1.0, 1.0];
        let data = TreeData {
            rows: &rows,
            targets: &targets,
            hessians: None,
        };
        let tree = DecisionTree::fit(
            &data,
            &[0, 1],
            params(Criterion::Variance),
            &mut StdRng::seed_from_u64(1),
            &mut [0.0],
        );
        assert_eq!(tree.depth(), 0);
        assert_eq!(tree.predict(&[100.0]), 1.0);
    }
}
