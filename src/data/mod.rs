//! Data module for loading and checking readings
//!
//! This module provides:
//! - The raw, column-oriented readings table (CSV input)
//! - Typed readings and the forecast targets
//! - Range and completeness validation

pub mod table;
pub mod types;
pub mod validator;

pub use table::{ReadingTable, TIMESTAMP_COLUMN};
pub use types::{Reading, Target};
pub use validator::{ObservedRanges, ReadingValidator, ValueRange};
