//! Forecast CSV export

use super::engine::ForecastPoint;
use crate::data::Target;
use crate::error::Result;
use crate::models::QuantileRole;
use std::io::Write;
use std::path::Path;
use tracing::info;

/// Date layout of the `target_date` column
pub const DATE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Header row: `target_date` then pred/low/high per target
pub fn forecast_header() -> Vec<String> {
    let mut header = vec!["target_date".to_string()];
    for target in Target::ALL {
        for role in [QuantileRole::Central, QuantileRole::Low, QuantileRole::High] {
            header.push(format!("{}_{}", target, role.column_suffix()));
        }
    }
    header
}

/// Write forecast points as CSV, one row per step
pub fn write_forecast_csv<W: Write>(points: &[ForecastPoint], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(forecast_header())?;

    for point in points {
        let mut record = vec![point.target_date.format(DATE_FORMAT).to_string()];
        for target in Target::ALL {
            let f = point.get(target);
            record.push(f.pred.to_string());
            record.push(f.low.to_string());
            record.push(f.high.to_string());
        }
        wtr.write_record(&record)?;
    }

    wtr.flush()?;
    Ok(())
}

/// Save forecast points to a CSV file
pub fn save_forecast<P: AsRef<Path>>(points: &[ForecastPoint], path: P) -> Result<()> {
    let file = std::fs::File::create(path.as_ref())?;
    write_forecast_csv(points, file)?;
    info!("Saved {} forecast rows to {}", points.len(), path.as_ref().display());
    Ok(())
}
