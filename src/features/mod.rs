//! Feature engineering module
//!
//! This module provides:
//! - Trailing window statistics and calendar encodings
//! - The causal feature table consumed by training and forecasting

pub mod engineering;
pub mod rolling;

pub use engineering::{
    parse_local_timestamp, parse_timestamp, FeatureBuilder, FeatureConfig, FeatureRow,
    FeatureSchema, FeatureTable,
};
pub use rolling::SeasonalEncoding;
