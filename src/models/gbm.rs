//! Gradient Boosting Machine implementation
//!
//! Stage-wise additive regression trees with a squared-error loss for point
//! estimates and a pinball (quantile) loss for interval bounds. All
//! randomness comes from a seeded ChaCha generator, so a fixed seed and fixed
//! input reproduce the same model bit for bit.

use super::estimator::Estimator;
use super::tree::{RegressionTree, TreeConfig};
use crate::error::{Error, Result};
use ndarray::{Array2, ArrayView1};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// GBM hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GbmParams {
    /// Number of boosting iterations (trees)
    pub n_estimators: usize,
    /// Maximum depth of each tree
    pub max_depth: usize,
    /// Learning rate (shrinkage)
    pub learning_rate: f64,
    /// Minimum samples required to split a node
    pub min_samples_split: usize,
    /// Minimum samples required in a leaf node
    pub min_samples_leaf: usize,
    /// Subsample ratio of the training instances
    pub subsample: f64,
    /// Random seed for reproducibility
    pub seed: u64,
}

impl Default for GbmParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_depth: 5,
            learning_rate: 0.1,
            min_samples_split: 2,
            min_samples_leaf: 1,
            subsample: 1.0,
            seed: 42,
        }
    }
}

impl GbmParams {
    pub fn validate(&self) -> Result<()> {
        if self.n_estimators == 0 {
            return Err(Error::Config("n_estimators must be at least 1".to_string()));
        }
        if self.max_depth == 0 {
            return Err(Error::Config("max_depth must be at least 1".to_string()));
        }
        if !(self.learning_rate > 0.0 && self.learning_rate.is_finite()) {
            return Err(Error::Config(format!(
                "learning_rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(self.subsample > 0.0 && self.subsample <= 1.0) {
            return Err(Error::Config(format!(
                "subsample must lie in (0, 1], got {}",
                self.subsample
            )));
        }
        if self.min_samples_leaf == 0 || self.min_samples_split < 2 {
            return Err(Error::Config(
                "min_samples_leaf must be >= 1 and min_samples_split >= 2".to_string(),
            ));
        }
        Ok(())
    }

    fn tree_config(&self) -> TreeConfig {
        TreeConfig {
            max_depth: self.max_depth,
            min_samples_split: self.min_samples_split,
            min_samples_leaf: self.min_samples_leaf,
        }
    }
}

/// Loss optimised by the booster
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Loss {
    /// Least squares; predicts the conditional mean
    SquaredError,
    /// Pinball loss; predicts the conditional `alpha` quantile
    Quantile { alpha: f64 },
}

impl Loss {
    pub fn validate(&self) -> Result<()> {
        match self {
            Loss::SquaredError => Ok(()),
            Loss::Quantile { alpha } if *alpha > 0.0 && *alpha < 1.0 => Ok(()),
            Loss::Quantile { alpha } => Err(Error::Config(format!(
                "quantile alpha must lie in (0, 1), got {}",
                alpha
            ))),
        }
    }

    /// Constant model minimising the loss
    fn initial_estimate(&self, y: &[f64]) -> f64 {
        match self {
            Loss::SquaredError => y.iter().sum::<f64>() / y.len() as f64,
            Loss::Quantile { alpha } => quantile(&mut y.to_vec(), *alpha),
        }
    }

    fn negative_gradient(&self, y: f64, f: f64) -> f64 {
        match self {
            Loss::SquaredError => y - f,
            Loss::Quantile { alpha } => {
                if y > f {
                    *alpha
                } else {
                    alpha - 1.0
                }
            }
        }
    }

    /// Loss of a single prediction
    pub fn value(&self, y: f64, f: f64) -> f64 {
        match self {
            Loss::SquaredError => (y - f).powi(2),
            Loss::Quantile { alpha } => {
                let diff = y - f;
                if diff > 0.0 {
                    alpha * diff
                } else {
                    (alpha - 1.0) * diff
                }
            }
        }
    }
}

/// Linear-interpolated quantile; sorts `values` in place
fn quantile(values: &mut [f64], alpha: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(f64::total_cmp);
    let pos = alpha * (values.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    values[lo] + (values[hi] - values[lo]) * (pos - lo as f64)
}

/// Gradient boosting regressor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GbmRegressor {
    params: GbmParams,
    loss: Loss,
    init: f64,
    trees: Vec<RegressionTree>,
    n_features: Option<usize>,
}

impl GbmRegressor {
    /// Create a squared-error regressor with default parameters
    pub fn new() -> Self {
        Self::with_params(GbmParams::default(), Loss::SquaredError)
    }

    /// Create a regressor with custom parameters and loss
    pub fn with_params(params: GbmParams, loss: Loss) -> Self {
        Self {
            params,
            loss,
            init: 0.0,
            trees: Vec::new(),
            n_features: None,
        }
    }

    pub fn params(&self) -> &GbmParams {
        &self.params
    }

    pub fn loss(&self) -> Loss {
        self.loss
    }

    /// Check if the model is trained
    pub fn is_trained(&self) -> bool {
        self.n_features.is_some()
    }

    /// Number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Input width the model was fitted on
    pub fn n_features(&self) -> Option<usize> {
        self.n_features
    }

    /// Check that a deserialized model can predict without panicking
    pub fn validate(&self) -> Result<()> {
        let n_features = self
            .n_features
            .ok_or_else(|| Error::data("model has not been trained"))?;
        if !self.init.is_finite() || !self.params.learning_rate.is_finite() {
            return Err(Error::data("model has a non-finite initial value or learning rate"));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.validate(n_features)
                .map_err(|e| Error::data(format!("tree {}: {}", i, e)))?;
        }
        Ok(())
    }

    fn predict_view(&self, row: ArrayView1<f64>) -> f64 {
        let lr = self.params.learning_rate;
        self.trees
            .iter()
            .fold(self.init, |acc, tree| acc + lr * tree.predict(row))
    }

    fn sample_rows(&self, n: usize, rng: &mut ChaCha8Rng) -> Vec<usize> {
        if self.params.subsample >= 1.0 {
            return (0..n).collect();
        }
        let k = ((n as f64 * self.params.subsample).round() as usize).clamp(1, n);
        let mut rows = rand::seq::index::sample(rng, n, k).into_vec();
        rows.sort_unstable();
        rows
    }
}

impl Default for GbmRegressor {
    fn default() -> Self {
        Self::new()
    }
}

impl Estimator for GbmRegressor {
    fn fit(&mut self, x: &Array2<f64>, y: &[f64]) -> Result<()> {
        self.params.validate()?;
        self.loss.validate()?;

        let (n_samples, n_features) = x.dim();
        if n_samples == 0 {
            return Err(Error::Training("empty training set".to_string()));
        }
        if n_samples != y.len() {
            return Err(Error::Training(format!(
                "{} feature rows but {} targets",
                n_samples,
                y.len()
            )));
        }
        if let Some(bad) = y.iter().position(|v| !v.is_finite()) {
            return Err(Error::Training(format!("non-finite target at row {}", bad)));
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.params.seed);
        let tree_config = self.params.tree_config();
        let lr = self.params.learning_rate;

        self.init = self.loss.initial_estimate(y);
        self.trees = Vec::with_capacity(self.params.n_estimators);
        let mut current = vec![self.init; n_samples];
        let mut feature_order: Vec<usize> = (0..n_features).collect();

        for _ in 0..self.params.n_estimators {
            let gradients: Vec<f64> = y
                .iter()
                .zip(current.iter())
                .map(|(&yi, &fi)| self.loss.negative_gradient(yi, fi))
                .collect();

            let rows = self.sample_rows(n_samples, &mut rng);
            feature_order.shuffle(&mut rng);

            let mut tree =
                RegressionTree::fit(x.view(), &gradients, &rows, &tree_config, &feature_order);

            // Quantile leaves take the alpha-quantile of their residuals
            if let Loss::Quantile { alpha } = self.loss {
                let mut residuals: std::collections::BTreeMap<usize, Vec<f64>> =
                    std::collections::BTreeMap::new();
                for &i in &rows {
                    residuals
                        .entry(tree.apply(x.row(i)))
                        .or_default()
                        .push(y[i] - current[i]);
                }
                for (leaf, mut values) in residuals {
                    tree.set_leaf_value(leaf, quantile(&mut values, alpha));
                }
            }

            for (i, f) in current.iter_mut().enumerate() {
                *f += lr * tree.predict(x.row(i));
            }
            self.trees.push(tree);
        }

        self.n_features = Some(n_features);

        let train_loss = y
            .iter()
            .zip(current.iter())
            .map(|(&yi, &fi)| self.loss.value(yi, fi))
            .sum::<f64>()
            / n_samples as f64;
        debug!(
            "Fitted {:?} booster: {} trees, {} samples, {} features, train loss {:.6}",
            self.loss,
            self.trees.len(),
            n_samples,
            n_features,
            train_loss
        );

        Ok(())
    }

    fn predict_one(&self, x: &[f64]) -> Result<f64> {
        let n_features = self
            .n_features
            .ok_or_else(|| Error::Training("model not trained".to_string()))?;
        if x.len() != n_features {
            return Err(Error::data(format!(
                "expected {} features, got {}",
                n_features,
                x.len()
            )));
        }
        Ok(self.predict_view(ArrayView1::from(x)))
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Vec<f64>> {
        let n_features = self
            .n_features
            .ok_or_else(|| Error::Training("model not trained".to_string()))?;
        if x.ncols() != n_features {
            return Err(Error::data(format!(
                "expected {} features, got {}",
                n_features,
                x.ncols()
            )));
        }
        Ok(x.rows().into_iter().map(|row| self.predict_view(row)).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    fn create_test_data(n: usize, seed: u64) -> (Array2<f64>, Vec<f64>) {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let x = Array2::from_shape_fn((n, 2), |(i, j)| {
            if j == 0 {
                i as f64 / n as f64 * 10.0
            } else {
                (i as f64 * 0.5).sin()
            }
        });
        let y = (0..n)
            .map(|i| x[[i, 0]] * 0.5 + x[[i, 1]] * 2.0 + rng.gen_range(-1.0..1.0))
            .collect();
        (x, y)
    }

    fn small_params() -> GbmParams {
        GbmParams {
            n_estimators: 60,
            max_depth: 3,
            min_samples_leaf: 5,
            ..Default::default()
        }
    }

    #[test]
    fn test_gbm_regressor_fits() {
        let (x, y) = create_test_data(200, 1);
        let mut model = GbmRegressor::with_params(small_params(), Loss::SquaredError);
        model.fit(&x, &y).unwrap();

        assert!(model.is_trained());
        assert_eq!(model.n_trees(), 60);

        let pred = model.predict(&x).unwrap();
        let mse: f64 = pred.iter().zip(&y).map(|(p, t)| (p - t).powi(2)).sum::<f64>() / 200.0;
        let mean = y.iter().sum::<f64>() / 200.0;
        let var: f64 = y.iter().map(|t| (t - mean).powi(2)).sum::<f64>() / 200.0;
        assert!(mse < var * 0.5);
    }

    #[test]
    fn test_quantile_coverage() {
        let (x, y) = create_test_data(400, 2);
        let mut low = GbmRegressor::with_params(small_params(), Loss::Quantile { alpha: 0.1 });
        let mut high = GbmRegressor::with_params(small_params(), Loss::Quantile { alpha: 0.9 });
        low.fit(&x, &y).unwrap();
        high.fit(&x, &y).unwrap();

        let lo = low.predict(&x).unwrap();
        let hi = high.predict(&x).unwrap();
        let below = y.iter().zip(&lo).filter(|(t, l)| t < l).count() as f64 / 400.0;
        let above = y.iter().zip(&hi).filter(|(t, h)| t > h).count() as f64 / 400.0;

        assert!(below < 0.25, "too many points below low quantile: {}", below);
        assert!(above < 0.25, "too many points above high quantile: {}", above);
        let mean_width = hi.iter().zip(&lo).map(|(h, l)| h - l).sum::<f64>() / 400.0;
        assert!(mean_width > 0.0);
    }

    #[test]
    fn test_deterministic_with_seed() {
        let (x, y) = create_test_data(150, 3);
        let params = GbmParams {
            subsample: 0.7,
            ..small_params()
        };

        let mut a = GbmRegressor::with_params(params.clone(), Loss::Quantile { alpha: 0.9 });
        let mut b = GbmRegressor::with_params(params, Loss::Quantile { alpha: 0.9 });
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();

        assert_eq!(a, b);
        let row = [3.3, 0.1];
        assert_eq!(a.predict_one(&row).unwrap(), b.predict_one(&row).unwrap());
    }

    #[test]
    fn test_untrained_and_width_mismatch() {
        let model = GbmRegressor::new();
        assert!(model.predict_one(&[1.0, 2.0]).is_err());

        let (x, y) = create_test_data(50, 4);
        let mut model = GbmRegressor::with_params(small_params(), Loss::SquaredError);
        model.fit(&x, &y).unwrap();
        assert!(model.predict_one(&[1.0]).unwrap_err().is_data_error());
    }

    #[test]
    fn test_invalid_params() {
        let (x, y) = create_test_data(20, 5);
        let params = GbmParams {
            n_estimators: 0,
            ..Default::default()
        };
        assert!(GbmRegressor::with_params(params, Loss::SquaredError).fit(&x, &y).is_err());
        assert!(GbmRegressor::with_params(GbmParams::default(), Loss::Quantile { alpha: 1.5 })
            .fit(&x, &y)
            .is_err());
    }

    #[test]
    fn test_quantile_helper() {
        let mut v = vec![4.0, 1.0, 3.0, 2.0, 5.0];
        assert_eq!(quantile(&mut v, 0.5), 3.0);
        assert_eq!(quantile(&mut v, 0.0), 1.0);
        assert!((quantile(&mut v, 0.1) - 1.4).abs() < 1e-12);
        assert_eq!(Loss::Quantile { alpha: 0.9 }.value(1.0, 0.0), 0.9);
        assert!((Loss::Quantile { alpha: 0.9 }.value(0.0, 1.0) - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_validate_stored_model() {
        assert!(GbmRegressor::new().validate().unwrap_err().is_data_error());

        let (x, y) = create_test_data(60, 6);
        let mut model = GbmRegressor::with_params(small_params(), Loss::SquaredError);
        model.fit(&x, &y).unwrap();
        model.validate().unwrap();

        // Trees fitted on two columns cannot serve a one-column model
        model.n_features = Some(1);
        assert!(model.validate().unwrap_err().is_data_error());
    }
}
