//! Regression evaluation metrics

use crate::data::Target;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Held-out error of a central estimator
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Mean absolute error
    pub mae: f64,
    /// Root mean squared error
    pub rmse: f64,
    /// R-squared score
    pub r2: f64,
}

impl ModelMetrics {
    /// Calculate regression metrics; `None` for empty or mismatched input
    pub fn regression(y_true: &[f64], y_pred: &[f64]) -> Option<Self> {
        let n = y_true.len();
        if n == 0 || n != y_pred.len() {
            return None;
        }

        let mse: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).powi(2))
            .sum::<f64>()
            / n as f64;

        let mae: f64 = y_true
            .iter()
            .zip(y_pred.iter())
            .map(|(t, p)| (t - p).abs())
            .sum::<f64>()
            / n as f64;

        let mean_true: f64 = y_true.iter().sum::<f64>() / n as f64;
        let ss_tot: f64 = y_true.iter().map(|t| (t - mean_true).powi(2)).sum();
        let ss_res = mse * n as f64;

        let r2 = if ss_tot != 0.0 {
            1.0 - ss_res / ss_tot
        } else {
            0.0
        };

        Some(Self {
            mae,
            rmse: mse.sqrt(),
            r2,
        })
    }
}

/// Per-target metrics of a training run
pub type EvaluationReport = BTreeMap<Target, ModelMetrics>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_regression_metrics() {
        let y_true = [1.0, 2.0, 3.0, 4.0, 5.0];
        let y_pred = [1.1, 2.1, 2.9, 4.1, 4.9];

        let m = ModelMetrics::regression(&y_true, &y_pred).unwrap();
        assert!((m.mae - 0.1).abs() < 1e-9);
        assert!((m.rmse - 0.1).abs() < 1e-9);
        assert!((m.r2 - 0.995).abs() < 1e-9);
    }

    #[test]
    fn test_empty_or_mismatched() {
        assert!(ModelMetrics::regression(&[], &[]).is_none());
        assert!(ModelMetrics::regression(&[1.0], &[1.0, 2.0]).is_none());
    }

    #[test]
    fn test_constant_truth() {
        let m = ModelMetrics::regression(&[2.0, 2.0], &[1.0, 3.0]).unwrap();
        assert_eq!(m.r2, 0.0);
        assert_eq!(m.mae, 1.0);
    }
}
