//! Quantile Gradient Boosting Weather Forecasts
//!
//! This library turns a history of periodic temperature, humidity and
//! pressure readings into a multi-step forecast with prediction intervals.
//! Each target gets three gradient boosting models (low quantile, central
//! estimate, high quantile) and the forecast rolls forward one period at a
//! time, feeding each step's central prediction back in as the next lag.
//!
//! # Modules
//!
//! - [`data`] - Readings table, targets and range validation
//! - [`features`] - Calendar, rolling window and lag features
//! - [`models`] - Regression trees, gradient boosting and model sets
//! - [`training`] - Per-target quantile model training and evaluation
//! - [`forecast`] - Autoregressive rollout and forecast export
//! - [`registry`] - Model set persistence
//! - [`utils`] - Configuration and logging
//!
//! # Example
//!
//! ```rust,no_run
//! use weather_gbm::prelude::*;
//!
//! fn main() -> weather_gbm::Result<()> {
//!     // 1. Load and validate readings
//!     let table = ReadingTable::from_csv_path("weather.csv")?;
//!     ReadingValidator::default().validate(&table)?;
//!
//!     // 2. Build features and train
//!     let features = FeatureBuilder::new().build(&table)?;
//!     let trainer = QuantileModelTrainer::default();
//!     let (models, report) = trainer.train_and_evaluate(&features)?;
//!
//!     // 3. Forecast three days ahead
//!     let points = ForecastEngine::default().forecast(&models, &table, 3, 0.9)?;
//!     for p in &points {
//!         let t = p.get(Target::Temperature);
//!         println!("{}: {:.1} [{:.1}, {:.1}]", p.target_date, t.pred, t.low, t.high);
//!     }
//!
//!     // 4. Persist
//!     FileModelRegistry::new("models").save(&models, Some(&report))?;
//!     Ok(())
//! }
//! ```

pub mod data;
pub mod error;
pub mod features;
pub mod forecast;
pub mod models;
pub mod registry;
pub mod training;
pub mod utils;

// Re-export commonly used items at the crate level
pub use error::{Error, Result};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::data::{ObservedRanges, Reading, ReadingTable, ReadingValidator, Target};
    pub use crate::error::{Error, Result};
    pub use crate::features::{FeatureBuilder, FeatureConfig, FeatureTable};
    pub use crate::forecast::{save_forecast, ForecastConfig, ForecastEngine, ForecastPoint};
    pub use crate::models::{
        Estimator, EvaluationReport, GbmParams, GbmRegressor, ModelSet, QuantileRole,
    };
    pub use crate::registry::{FileModelRegistry, ModelStore};
    pub use crate::training::{QuantileModelTrainer, TrainingConfig};
    pub use crate::utils::{setup_logging, Config};
}
