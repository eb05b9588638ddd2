//! ClassificationResult (§3).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    Category,
    Severity,
    Stage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetPrediction {
    pub target: Target,
    pub prediction: Option<String>,
    pub confidence: f64,
    pub class_probabilities: BTreeMap<String, f64>,
    pub meets_threshold: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationResult {
    pub error_id: String,
    pub predictions: Vec<TargetPrediction>,
}

impl ClassificationResult {
    /// Arithmetic mean of per-target confidences.
    pub fn overall_confidence(&self) -> f64 {
        if self.predictions.is_empty() {
            return 0.0;
        }
        let sum: f64 = self.predictions.iter().map(|p| p.confidence).sum();
        sum / self.predictions.len() as f64
    }

    pub fn prediction_for(&self, target: Target) -> Option<&TargetPrediction> {
        self.predictions.iter().find(|p| p.target == target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pred(target: Target, confidence: f64) -> TargetPrediction {
        TargetPrediction {
            target,
            prediction: Some("x".to_string()),
            confidence,
            class_probabilities: BTreeMap::new(),
            meets_threshold: true,
        }
    }

    #[test]
    fn overall_confidence_is_arithmetic_mean() {
        let result = ClassificationResult {
            error_id: "e1".to_string(),
            predictions: vec![pred(Target::Category, 0.9), pred(Target::Severity, 0.5)],
        };
        assert!((result.overall_confidence() - 0.7).abs() < 1e-9);
    }

    #[test]
    fn overall_confidence_empty_is_zero() {
        let result = ClassificationResult {
            error_id: "e1".to_string(),
            predictions: vec![],
        };
        assert_eq!(result.overall_confidence(), 0.0);
    }
}
