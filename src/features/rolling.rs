//! Trailing window statistics and calendar encodings
//!
//! Every statistic at index `i` is computed from `values[..=i]` only, with a
//! minimum of one observation, so early rows still receive a value.

use chrono::{DateTime, Datelike, TimeZone};
use std::f64::consts::PI;

/// Start of the trailing window ending at `i`
fn window_start(i: usize, window: usize) -> usize {
    (i + 1).saturating_sub(window)
}

/// Trailing mean
pub fn rolling_mean(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let slice = &values[window_start(i, window)..=i];
            slice.iter().sum::<f64>() / slice.len() as f64
        })
        .collect()
}

/// Trailing sample standard deviation (ddof = 1)
///
/// A single-observation window has no sample deviation and yields NaN.
pub fn rolling_std(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let slice = &values[window_start(i, window)..=i];
            let n = slice.len();
            if n < 2 {
                return f64::NAN;
            }
            let mean = slice.iter().sum::<f64>() / n as f64;
            let var = slice.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
            var.sqrt()
        })
        .collect()
}

/// Trailing minimum
pub fn rolling_min(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            values[window_start(i, window)..=i]
                .iter()
                .cloned()
                .fold(f64::INFINITY, f64::min)
        })
        .collect()
}

/// Trailing maximum
pub fn rolling_max(values: &[f64], window: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            values[window_start(i, window)..=i]
                .iter()
                .cloned()
                .fold(f64::NEG_INFINITY, f64::max)
        })
        .collect()
}

/// Value one period earlier; `None` for the first element
pub fn lag_1(values: &[f64]) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|i| i.checked_sub(1).map(|j| values[j]))
        .collect()
}

/// Cyclical month and day-of-year encoding
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SeasonalEncoding {
    pub sin_month: f64,
    pub cos_month: f64,
    pub sin_day: f64,
    pub cos_day: f64,
}

impl SeasonalEncoding {
    /// Encode the calendar fields of `ts` in its own time zone
    pub fn from_timestamp<Tz: TimeZone>(ts: &DateTime<Tz>) -> Self {
        let month = 2.0 * PI * ts.month() as f64 / 12.0;
        let day = 2.0 * PI * ts.ordinal() as f64 / 365.0;
        Self {
            sin_month: month.sin(),
            cos_month: month.cos(),
            sin_day: day.sin(),
            cos_day: day.cos(),
        }
    }

    pub fn values(&self) -> [f64; 4] {
        [self.sin_month, self.cos_month, self.sin_day, self.cos_day]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, FixedOffset, Utc};

    #[test]
    fn test_rolling_mean_min_periods() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(rolling_mean(&values, 2), vec![1.0, 1.5, 2.5, 3.5]);
        assert_eq!(rolling_mean(&values, 7), vec![1.0, 1.5, 2.0, 2.5]);
    }

    #[test]
    fn test_rolling_std_single_sample_is_nan() {
        let std = rolling_std(&[2.0, 4.0, 4.0, 4.0], 3);
        assert!(std[0].is_nan());
        assert!((std[1] - 2.0_f64.sqrt()).abs() < 1e-12);
        assert!((std[3] - 0.0).abs() < 1e-12);

        assert!(rolling_std(&[1.0, 2.0, 3.0], 1).iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_rolling_min_max() {
        let values = [5.0, 1.0, 3.0, 7.0, 2.0];
        assert_eq!(rolling_min(&values, 3), vec![5.0, 1.0, 1.0, 1.0, 2.0]);
        assert_eq!(rolling_max(&values, 3), vec![5.0, 5.0, 5.0, 7.0, 7.0]);
    }

    #[test]
    fn test_lag() {
        assert_eq!(lag_1(&[1.0, 2.0, 3.0]), vec![None, Some(1.0), Some(2.0)]);
        assert_eq!(lag_1(&[4.0]), vec![None]);
        assert!(lag_1(&[]).is_empty());
    }

    #[test]
    fn test_window_ignores_future_values() {
        let mut values: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let before = rolling_mean(&values, 5)[9];
        values[10] = 1000.0;
        assert_eq!(rolling_mean(&values, 5)[9], before);
    }

    #[test]
    fn test_seasonal_bounds() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        for d in 0..366 {
            let enc = SeasonalEncoding::from_timestamp(&(start + Duration::days(d)));
            assert!(enc.values().iter().all(|v| (-1.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn test_seasonal_uses_local_calendar() {
        let offset = FixedOffset::east_opt(2 * 3600).unwrap();
        let local = offset.with_ymd_and_hms(2024, 4, 1, 0, 15, 0).unwrap();
        let april = Utc.with_ymd_and_hms(2024, 4, 1, 12, 0, 0).unwrap();

        assert_eq!(
            SeasonalEncoding::from_timestamp(&local),
            SeasonalEncoding::from_timestamp(&april)
        );
        assert_ne!(
            SeasonalEncoding::from_timestamp(&local.with_timezone(&Utc)),
            SeasonalEncoding::from_timestamp(&april)
        );
    }
}
