//! Precondition checks on a loaded readings table

use super::table::{ReadingTable, TIMESTAMP_COLUMN};
use super::types::Target;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Inclusive plausible range for one target
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    pub min: f64,
    pub max: f64,
}

impl ValueRange {
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }
}

/// Plausible ranges for every target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservedRanges {
    pub temperature: ValueRange,
    pub humidity: ValueRange,
    pub pressure: ValueRange,
}

impl Default for ObservedRanges {
    fn default() -> Self {
        Self {
            temperature: ValueRange::new(1.6, 20.6),
            humidity: ValueRange::new(40.0, 96.0),
            pressure: ValueRange::new(998.1, 1032.7),
        }
    }
}

impl ObservedRanges {
    pub fn get(&self, target: Target) -> ValueRange {
        match target {
            Target::Temperature => self.temperature,
            Target::Humidity => self.humidity,
            Target::Pressure => self.pressure,
        }
    }

    /// Reject inverted or non-finite bounds
    pub fn validate(&self) -> Result<()> {
        for target in Target::ALL {
            let range = self.get(target);
            if !range.min.is_finite() || !range.max.is_finite() || range.min > range.max {
                return Err(Error::Config(format!(
                    "invalid range for {}: [{}, {}]",
                    target, range.min, range.max
                )));
            }
        }
        Ok(())
    }
}

/// Checks required columns, completeness and value plausibility
#[derive(Debug, Clone, Default)]
pub struct ReadingValidator {
    ranges: ObservedRanges,
}

impl ReadingValidator {
    pub fn new(ranges: ObservedRanges) -> Self {
        Self { ranges }
    }

    pub fn ranges(&self) -> &ObservedRanges {
        &self.ranges
    }

    /// Validate a table without modifying it
    pub fn validate(&self, table: &ReadingTable) -> Result<()> {
        let missing: Vec<&str> = std::iter::once(TIMESTAMP_COLUMN)
            .chain(Target::ALL.iter().map(|t| t.column()))
            .filter(|name| !table.has_column(name))
            .collect();
        if !missing.is_empty() {
            return Err(Error::data(format!(
                "missing required columns: {:?}",
                missing
            )));
        }

        for target in Target::ALL {
            let range = self.ranges.get(target);
            let values = table.numeric_column(target.column())?;

            for (row, value) in values.iter().enumerate() {
                match value {
                    None => {
                        return Err(Error::data(format!(
                            "missing {} value at row {}",
                            target, row
                        )))
                    }
                    Some(v) if !range.contains(*v) => {
                        return Err(Error::data(format!(
                            "{} value {} at row {} outside observed range ({} to {})",
                            target, v, row, range.min, range.max
                        )))
                    }
                    Some(_) => {}
                }
            }
        }

        debug!("Validated {} rows", table.len());
        Ok(())
    }
}
