//! Fusion weights for priority scoring.

use serde::{Deserialize, Serialize};

/// Weights of the four priority components. Ship as 0.40 / 0.30 / 0.15 / 0.15.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FusionWeights {
    /// Weight for the model's failure probability (0.0-1.0)
    #[serde(default = "default_probability_weight")]
    pub probability: f64,

    /// Weight for the structural impact score (0.0-1.0)
    #[serde(default = "default_impact_weight")]
    pub impact: f64,

    /// Weight for the all-time failure rate (0.0-1.0)
    #[serde(default = "default_historical_weight")]
    pub historical: f64,

    /// Weight for the normalized recent failure count (0.0-1.0)
    #[serde(default = "default_recent_weight")]
    pub recent: f64,
}

pub fn default_probability_weight() -> f64 {
    0.40
}

pub fn default_impact_weight() -> f64 {
    0.30
}

pub fn default_historical_weight() -> f64 {
    0.15
}

pub fn default_recent_weight() -> f64 {
    0.15
}

impl Default for FusionWeights {
    fn default() -> Self {
        Self {
            probability: default_probability_weight(),
            impact: default_impact_weight(),
            historical: default_historical_weight(),
            recent: default_recent_weight(),
        }
    }
}

impl FusionWeights {
    pub fn is_valid_weight(weight: f64) -> bool {
        (0.0..=1.0).contains(&weight)
    }

    pub fn validate_weight(weight: f64, name: &str) -> Result<(), String> {
        if Self::is_valid_weight(weight) {
            Ok(())
        } else {
            Err(format!("{} weight must be between 0.0 and 1.0", name))
        }
    }

    fn sum(&self) -> f64 {
        self.probability + self.impact + self.historical + self.recent
    }

    /// Every weight in [0, 1] and at least one non-zero.
    pub fn validate(&self) -> Result<(), String> {
        Self::validate_weight(self.probability, "Probability")?;
        Self::validate_weight(self.impact, "Impact")?;
        Self::validate_weight(self.historical, "Historical")?;
        Self::validate_weight(self.recent, "Recent")?;
        if self.sum() <= 0.0 {
            return Err("At least one fusion weight must be positive".to_string());
        }
        Ok(())
    }

    /// Normalize weights to ensure they sum to 1.0
    pub fn normalize(&mut self) {
        let sum = self.sum();
        if sum > 0.0 && (sum - 1.0).abs() > 0.001 {
            self.probability /= sum;
            self.impact /= sum;
            self.historical /= sum;
            self.recent /= sum;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_sum_to_one() {
        let w = FusionWeights::default();
        assert!(w.validate().is_ok());
        assert!((w.sum() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_normalize_rescales() {
        let mut w = FusionWeights {
            probability: 0.8,
            impact: 0.6,
            historical: 0.3,
            recent: 0.3,
        };
        w.normalize();
        assert!((w.sum() - 1.0).abs() < 1e-9);
        assert!((w.probability - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_out_of_range_weight_is_rejected() {
        let w = FusionWeights {
            impact: 1.5,
            ..FusionWeights::default()
        };
        assert!(w.validate().unwrap_err().contains("Impact"));
    }
}
