//! Forecast generation
//!
//! This module provides:
//! - The autoregressive rollout engine with interval rescaling
//! - CSV export of forecast points

pub mod engine;
pub mod output;

pub use engine::{ForecastConfig, ForecastEngine, ForecastPoint, IntervalScale, TargetForecast};
pub use output::{forecast_header, save_forecast, write_forecast_csv};
