//! Error types for the forecasting pipeline

use crate::data::Target;
use crate::models::QuantileRole;
use thiserror::Error;

/// Result type alias for this crate
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by validation, feature building, training and forecasting.
///
/// Every variant is fatal to the current run: input is never repaired and no
/// partial output is produced.
#[derive(Error, Debug)]
pub enum Error {
    /// Malformed, missing or out-of-range input data
    #[error("Data error: {0}")]
    Data(String),

    /// A model set lacks the estimator for a (target, role) pair
    #[error("Model set incomplete: no {role} estimator for {target}")]
    ModelSetIncomplete { target: Target, role: QuantileRole },

    /// Forecast horizon must be a positive number of steps
    #[error("Invalid horizon: {0} (must be at least 1)")]
    InvalidHorizon(usize),

    /// Requested interval level outside (0.5, 1)
    #[error("Invalid quantile level: {0} (must lie strictly between 0.5 and 1)")]
    InvalidQuantile(f64),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Estimator fitting or prediction failed
    #[error("Training failed: {0}")]
    Training(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV reading or writing error
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// JSON serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error
    #[error("TOML parse error: {0}")]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),
}

impl Error {
    /// Shorthand for a [`Error::Data`] with a formatted message
    pub fn data(msg: impl Into<String>) -> Self {
        Error::Data(msg.into())
    }

    /// Whether the error stems from invalid input data
    pub fn is_data_error(&self) -> bool {
        matches!(self, Error::Data(_))
    }
}
