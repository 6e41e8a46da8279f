//! Regression models
//!
//! This module provides:
//! - The `Estimator` seam used by training and forecasting
//! - A gradient boosting regressor with squared-error and quantile losses
//! - The keyed set of trained estimators and evaluation metrics

pub mod estimator;
pub mod gbm;
pub mod metrics;
pub mod model_set;
pub mod tree;

pub use estimator::Estimator;
pub use gbm::{GbmParams, GbmRegressor, Loss};
pub use metrics::{EvaluationReport, ModelMetrics};
pub use model_set::{ModelSet, QuantileLevels, QuantilePrediction, QuantileRole};
pub use tree::{RegressionTree, TreeConfig};
