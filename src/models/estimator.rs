//! Capability interface for trainable regressors

use crate::error::Result;
use ndarray::Array2;

/// Trait for regression models used by the trainer and the forecast engine
///
/// Any implementation must be deterministic for a fixed configuration so that
/// retraining on identical input reproduces identical predictions.
pub trait Estimator: Send + Sync {
    /// Fit the model to training data (rows = samples)
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()>;

    /// Predict a single sample
    fn predict_one(&self, x: &[f64]) -> Result<f64>;

    /// Make predictions for every row of `x`
    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        x.rows()
            .into_iter()
            .map(|row| self.predict_one(&row.to_vec()))
            .collect()
    }
}
