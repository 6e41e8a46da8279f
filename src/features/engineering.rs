//! Feature engineering for the forecasting models
//!
//! This module transforms a readings table into a causal feature table:
//! calendar encodings, trailing window statistics and one-step lags per
//! target. A row for time `t` never depends on readings after `t`.

use super::rolling::{lag_1, rolling_max, rolling_mean, rolling_min, rolling_std, SeasonalEncoding};
use crate::data::{Reading, ReadingTable, Target, TIMESTAMP_COLUMN};
use crate::error::{Error, Result};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Offset, TimeZone, Utc};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Calendar feature names, in row order
const SEASONAL_FEATURES: [&str; 4] = ["sin_month", "cos_month", "sin_day", "cos_day"];

/// Window statistics computed per target, in row order
const ROLLING_STATS: [&str; 4] = ["mean", "std", "min", "max"];

/// Naive timestamp layouts accepted besides RFC 3339
const NAIVE_FORMATS: [&str; 4] = [
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
];

/// Feature engineering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Trailing window length for rolling statistics
    pub window: usize,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self { window: 7 }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.window == 0 {
            return Err(Error::Config("rolling window must be at least 1".to_string()));
        }
        Ok(())
    }
}

/// Names of the model input columns
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSchema {
    names: Vec<String>,
}

impl FeatureSchema {
    /// Schema for a given rolling window
    pub fn new(window: usize) -> Self {
        let mut names: Vec<String> = SEASONAL_FEATURES.iter().map(|s| s.to_string()).collect();

        for target in Target::ALL {
            for stat in ROLLING_STATS {
                names.push(format!("{}_rolling_{}_{}", target, stat, window));
            }
        }

        for target in Target::ALL {
            names.push(lag_name(target));
        }

        Self { names }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Column holding the previous period's value of `target`
    pub fn lag_index(&self, target: Target) -> Option<usize> {
        self.index_of(&lag_name(target))
    }
}

fn lag_name(target: Target) -> String {
    format!("{}_lag_1", target)
}

/// One feature row; model inputs exclude the observed target values
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureRow {
    /// Timestamp of the reading this row describes
    pub timestamp: DateTime<Utc>,
    /// Model inputs in schema order
    pub inputs: Vec<f64>,
    /// Raw target values at `timestamp`, in [`Target::ALL`] order
    pub observed: [f64; 3],
}

impl FeatureRow {
    pub fn observed(&self, target: Target) -> f64 {
        self.observed[target.index()]
    }

    /// Copy of this row with every lag column replaced by `lags`
    pub fn with_lags(&self, schema: &FeatureSchema, lags: [f64; 3]) -> Result<FeatureRow> {
        let mut inputs = self.inputs.clone();
        for target in Target::ALL {
            let idx = schema
                .lag_index(target)
                .filter(|&i| i < inputs.len())
                .ok_or_else(|| Error::data(format!("feature row has no lag column for {}", target)))?;
            inputs[idx] = lags[target.index()];
        }

        Ok(FeatureRow {
            timestamp: self.timestamp,
            inputs,
            observed: self.observed,
        })
    }
}

/// Chronologically ordered feature rows sharing one schema
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureTable {
    schema: FeatureSchema,
    rows: Vec<FeatureRow>,
}

impl FeatureTable {
    pub fn new(schema: FeatureSchema) -> Self {
        Self {
            schema,
            rows: Vec::new(),
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    pub fn rows(&self) -> &[FeatureRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Most recent row
    pub fn last(&self) -> Option<&FeatureRow> {
        self.rows.last()
    }

    /// Value of a named column (inputs or raw targets) for every row
    pub fn column(&self, name: &str) -> Option<Vec<f64>> {
        if let Some(target) = Target::from_column(name) {
            return Some(self.targets(target));
        }
        let idx = self.schema.index_of(name)?;
        Some(self.rows.iter().map(|r| r.inputs[idx]).collect())
    }

    /// Model input matrix (rows = samples, cols = schema columns)
    pub fn input_matrix(&self) -> Result<Array2<f64>> {
        let n_cols = self.schema.len();
        if let Some((i, row)) = self
            .rows
            .iter()
            .enumerate()
            .find(|(_, r)| r.inputs.len() != n_cols)
        {
            return Err(Error::data(format!(
                "feature row {} has {} inputs, schema has {}",
                i,
                row.inputs.len(),
                n_cols
            )));
        }
        let flat: Vec<f64> = self.rows.iter().flat_map(|r| r.inputs.iter().copied()).collect();
        Array2::from_shape_vec((self.rows.len(), n_cols), flat)
            .map_err(|e| Error::data(format!("feature matrix: {}", e)))
    }

    /// Observed values of one target
    pub fn targets(&self, target: Target) -> Vec<f64> {
        self.rows.iter().map(|r| r.observed(target)).collect()
    }

    pub fn timestamps(&self) -> Vec<DateTime<Utc>> {
        self.rows.iter().map(|r| r.timestamp).collect()
    }

    /// Chronological split: the first `n` rows and the remainder
    pub fn split_at(&self, n: usize) -> (FeatureTable, FeatureTable) {
        let n = n.min(self.rows.len());
        let head = FeatureTable {
            schema: self.schema.clone(),
            rows: self.rows[..n].to_vec(),
        };
        let tail = FeatureTable {
            schema: self.schema.clone(),
            rows: self.rows[n..].to_vec(),
        };
        (head, tail)
    }

    fn push(&mut self, row: FeatureRow) {
        self.rows.push(row);
    }
}

/// Builds feature tables from readings
#[derive(Debug, Clone, Default)]
pub struct FeatureBuilder {
    config: FeatureConfig,
}

impl FeatureBuilder {
    /// Create a feature builder with the default window
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn with_window(window: usize) -> Self {
        Self::with_config(FeatureConfig { window })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(self.config.window)
    }

    /// Parse, sort and de-duplicate the readings of a table
    pub fn readings(&self, table: &ReadingTable) -> Result<Vec<Reading>> {
        let stamps = table
            .column(TIMESTAMP_COLUMN)
            .ok_or_else(|| Error::data(format!("missing column '{}'", TIMESTAMP_COLUMN)))?;

        let values = Target::ALL
            .iter()
            .map(|t| table.numeric_column(t.column()))
            .collect::<Result<Vec<_>>>()?;

        let mut readings = Vec::with_capacity(table.len());
        for (row, stamp) in stamps.iter().enumerate() {
            let text = stamp
                .as_deref()
                .ok_or_else(|| Error::data(format!("missing timestamp at row {}", row)))?;
            let local = parse_local_timestamp(text).ok_or_else(|| {
                Error::data(format!("malformed timestamp '{}' at row {}", text, row))
            })?;

            let mut target_values = [0.0; 3];
            for target in Target::ALL {
                target_values[target.index()] = values[target.index()][row].ok_or_else(|| {
                    Error::data(format!("missing {} value at row {}", target, row))
                })?;
            }

            readings.push(
                Reading::new(
                    local.with_timezone(&Utc),
                    target_values[0],
                    target_values[1],
                    target_values[2],
                )
                .with_offset(*local.offset()),
            );
        }

        readings.sort_by_key(|r| r.timestamp);

        if let Some(pair) = readings.windows(2).find(|w| w[0].timestamp == w[1].timestamp) {
            return Err(Error::data(format!(
                "duplicate timestamp {}",
                pair[0].timestamp.to_rfc3339()
            )));
        }

        Ok(readings)
    }

    /// Build the feature table for a readings table
    pub fn build(&self, table: &ReadingTable) -> Result<FeatureTable> {
        self.config.validate()?;
        if table.is_empty() {
            return Ok(FeatureTable::new(self.schema()));
        }

        let readings = self.readings(table)?;
        Ok(self.build_from_readings(&readings))
    }

    /// Build features from readings already sorted by timestamp
    pub fn build_from_readings(&self, readings: &[Reading]) -> FeatureTable {
        let window = self.config.window.max(1);
        let mut table = FeatureTable::new(self.schema());

        let series: Vec<Vec<f64>> = Target::ALL
            .iter()
            .map(|t| readings.iter().map(|r| r.value(*t)).collect())
            .collect();

        let stats: Vec<[Vec<f64>; 4]> = series
            .iter()
            .map(|s| {
                [
                    rolling_mean(s, window),
                    rolling_std(s, window),
                    rolling_min(s, window),
                    rolling_max(s, window),
                ]
            })
            .collect();

        let lags: Vec<Vec<Option<f64>>> = series.iter().map(|s| lag_1(s)).collect();

        for (i, reading) in readings.iter().enumerate() {
            // Rows without a previous reading carry no lag
            let row_lags: Option<Vec<f64>> = lags.iter().map(|l| l[i]).collect();
            let Some(row_lags) = row_lags else {
                continue;
            };

            let mut inputs = Vec::with_capacity(table.schema.len());
            inputs.extend(SeasonalEncoding::from_timestamp(&reading.local_timestamp()).values());
            for target_stats in &stats {
                inputs.extend(target_stats.iter().map(|s| s[i]));
            }
            inputs.extend(row_lags);

            table.push(FeatureRow {
                timestamp: reading.timestamp,
                inputs,
                observed: reading.values(),
            });
        }

        debug!(
            "Built {} feature rows with {} inputs from {} readings",
            table.len(),
            table.schema.len(),
            readings.len()
        );

        table
    }
}

/// Parse a timestamp cell; naive values are taken as UTC
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    parse_local_timestamp(text).map(|ts| ts.with_timezone(&Utc))
}

/// Parse a timestamp cell keeping its UTC offset (zero for naive values)
pub fn parse_local_timestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(text) {
        return Some(ts);
    }
    if let Ok(ts) = DateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%:z") {
        return Some(ts);
    }
    let utc = Utc.fix();
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| utc.from_utc_datetime(&naive))
}
