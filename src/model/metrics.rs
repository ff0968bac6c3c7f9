//! Binary classification metrics for held-out validation.

use serde::{Deserialize, Serialize};

/// Probability at or above which a prediction counts as "fail"
pub const DECISION_THRESHOLD: f64 = 0.5;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    pub samples: usize,
    pub positives: usize,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    /// `None` when the validation split holds a single class
    pub roc_auc: Option<f64>,
}

impl ValidationReport {
    pub fn compute(probabilities: &[f64], labels: &[bool]) -> Self {
        let mut tp = 0usize;
        let mut fp = 0usize;
        let mut tn = 0usize;
        let mut fn_ = 0usize;
        for (&p, &actual) in probabilities.iter().zip(labels) {
            match (p >= DECISION_THRESHOLD, actual) {
                (true, true) => tp += 1,
                (true, false) => fp += 1,
                (false, false) => tn += 1,
                (false, true) => fn_ += 1,
            }
        }

        let ratio = |num: usize, den: usize| if den == 0 { 0.0 } else { num as f64 / den as f64 };
        let precision = ratio(tp, tp + fp);
        let recall = ratio(tp, tp + fn_);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            samples: labels.len(),
            positives: tp + fn_,
            accuracy: ratio(tp + tn, labels.len()),
            precision,
            recall,
            f1,
            roc_auc: roc_auc(probabilities, labels),
        }
    }
}

/// Area under the ROC curve via the rank-sum statistic, ties averaged.
pub fn roc_auc(probabilities: &[f64], labels: &[bool]) -> Option<f64> {
    let positives = labels.iter().filter(|&&l| l).count();
    let negatives = labels.len() - positives;
    if positives == 0 || negatives == 0 {
        return None;
    }

    let mut order: Vec<usize> = (0..probabilities.len()).collect();
    order.sort_by(|&a, &b| probabilities[a].total_cmp(&probabilities[b]));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start + 1;
        while end < order.len() && probabilities[order[end]] == probabilities[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; tied block shares the mean rank
        let mean_rank = (start + 1 + end) as f64 / 2.0;
        rank_sum += mean_rank * order[start..end].iter().filter(|&&i| labels[i]).count() as f64;
        start = end;
    }

    let p = positives as f64;
    Some((rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_confusion_metrics() {
        let probs = [0.9, 0.8, 0.2, 0.6, 0.1];
        let labels = [true, true, true, false, false];
        let report = ValidationReport::compute(&probs, &labels);
        assert_eq!(report.accuracy, 0.6);
        assert!((report.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((report.recall - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(report.positives, 3);
    }

    #[test]
    fn test_auc_perfect_and_tied() {
        assert_eq!(roc_auc(&[0.1, 0.9], &[false, true]), Some(1.0));
        assert_eq!(roc_auc(&[0.5, 0.5], &[false, true]), Some(0.5));
        assert_eq!(roc_auc(&[0.5, 0.5], &[true, true]), None);
    }

    #[test]
    fn test_empty_validation_is_all_zero() {
        let report = ValidationReport::compute(&[], &[]);
        assert_eq!(report.accuracy, 0.0);
        assert_eq!(report.roc_auc, None);
    }
}
