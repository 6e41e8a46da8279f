//! Core data types for environmental readings
//!
//! This module defines the forecast targets and the typed reading record
//! produced once the raw table has been validated and parsed.

use chrono::{DateTime, FixedOffset, Offset, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Physical quantity predicted by the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// Air temperature (°C)
    Temperature,
    /// Relative humidity (%)
    Humidity,
    /// Air pressure (hPa)
    Pressure,
}

impl Target {
    /// All targets in column order
    pub const ALL: [Target; 3] = [Target::Temperature, Target::Humidity, Target::Pressure];

    /// Column name of this target in input and feature tables
    pub fn column(&self) -> &'static str {
        match self {
            Target::Temperature => "temperature",
            Target::Humidity => "humidity",
            Target::Pressure => "pressure",
        }
    }

    /// Position of this target in [`Target::ALL`]
    pub fn index(&self) -> usize {
        match self {
            Target::Temperature => 0,
            Target::Humidity => 1,
            Target::Pressure => 2,
        }
    }

    /// Look a target up by its column name
    pub fn from_column(name: &str) -> Option<Target> {
        Target::ALL.into_iter().find(|t| t.column() == name)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

/// One periodic observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// Observation time
    pub timestamp: DateTime<Utc>,
    /// Temperature (°C)
    pub temperature: f64,
    /// Relative humidity (%)
    pub humidity: f64,
    /// Pressure (hPa)
    pub pressure: f64,
    /// Offset of the source clock from UTC, in seconds east
    #[serde(default)]
    pub utc_offset: i32,
}

impl Reading {
    pub fn new(timestamp: DateTime<Utc>, temperature: f64, humidity: f64, pressure: f64) -> Self {
        Self {
            timestamp,
            temperature,
            humidity,
            pressure,
            utc_offset: 0,
        }
    }

    /// Same reading as recorded on a clock at `offset`
    pub fn with_offset(mut self, offset: FixedOffset) -> Self {
        self.utc_offset = offset.local_minus_utc();
        self
    }

    /// Observation time on the source clock; calendar fields come from here
    pub fn local_timestamp(&self) -> DateTime<FixedOffset> {
        let offset = FixedOffset::east_opt(self.utc_offset).unwrap_or_else(|| Utc.fix());
        self.timestamp.with_timezone(&offset)
    }

    /// Value of the given target
    pub fn value(&self, target: Target) -> f64 {
        match target {
            Target::Temperature => self.temperature,
            Target::Humidity => self.humidity,
            Target::Pressure => self.pressure,
        }
    }

    /// All target values in [`Target::ALL`] order
    pub fn values(&self) -> [f64; 3] {
        [self.temperature, self.humidity, self.pressure]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_target_columns() {
        for target in Target::ALL {
            assert_eq!(Target::from_column(target.column()), Some(target));
            assert_eq!(Target::ALL[target.index()], target);
        }
        assert_eq!(Target::from_column("wind"), None);
        assert_eq!(Target::Humidity.to_string(), "humidity");
    }

    #[test]
    fn test_reading_values() {
        let ts = Utc.with_ymd_and_hms(2025, 2, 28, 0, 0, 0).unwrap();
        let reading = Reading::new(ts, 3.4, 96.0, 1020.8);

        assert_eq!(reading.value(Target::Temperature), 3.4);
        assert_eq!(reading.value(Target::Pressure), 1020.8);
        assert_eq!(reading.values(), [3.4, 96.0, 1020.8]);
        assert_eq!(reading.local_timestamp(), ts);
    }

    #[test]
    fn test_local_timestamp_keeps_calendar_day() {
        use chrono::Datelike;

        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2025, 3, 1, 0, 30, 0).unwrap();
        let reading = Reading::new(local.with_timezone(&Utc), 5.0, 80.0, 1010.0).with_offset(offset);

        assert_eq!(reading.timestamp.month(), 2);
        assert_eq!(reading.local_timestamp().month(), 3);
        assert_eq!(reading.local_timestamp().day(), 1);
    }
}
