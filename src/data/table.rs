//! Column-oriented table of raw readings
//!
//! Cells are kept as raw text until validation and feature building parse
//! them, so malformed input surfaces as a [`Error::Data`] naming the column
//! and row instead of a generic parse failure at load time.

use super::types::Reading;
use crate::error::{Error, Result};
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Name of the timestamp column
pub const TIMESTAMP_COLUMN: &str = "timestamp";

/// Header accepted in place of `timestamp`
const TIMESTAMP_ALIAS: &str = "time";

/// Cell spellings treated as a missing value
const MISSING_MARKERS: [&str; 6] = ["", "na", "n/a", "nan", "null", "none"];

/// Raw readings table with named columns of optional cells
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadingTable {
    names: Vec<String>,
    columns: Vec<Vec<Option<String>>>,
    len: usize,
}

impl ReadingTable {
    /// Create an empty table with the given column names
    pub fn new(names: Vec<String>) -> Self {
        let columns = vec![Vec::new(); names.len()];
        Self {
            names,
            columns,
            len: 0,
        }
    }

    /// Load a table from a CSV file with a header row
    pub fn from_csv_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(&path).map_err(|e| {
            Error::Io(std::io::Error::new(
                e.kind(),
                format!("failed to open {}: {}", path.as_ref().display(), e),
            ))
        })?;
        let table = Self::from_reader(file)?;
        info!("Loaded {} records from {}", table.len(), path.as_ref().display());
        Ok(table)
    }

    /// Read a table from any CSV source with a header row
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);

        let mut names: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
        if !names.iter().any(|n| n == TIMESTAMP_COLUMN) {
            if let Some(alias) = names.iter_mut().find(|n| n.as_str() == TIMESTAMP_ALIAS) {
                debug!("Using '{}' column as '{}'", TIMESTAMP_ALIAS, TIMESTAMP_COLUMN);
                *alias = TIMESTAMP_COLUMN.to_string();
            }
        }

        let mut table = Self::new(names);
        for record in reader.records() {
            let record = record?;
            table.push_row(record.iter().map(parse_cell).collect())?;
        }

        Ok(table)
    }

    /// Build a table from typed readings, in the given order
    pub fn from_readings(readings: &[Reading]) -> Self {
        let names = [TIMESTAMP_COLUMN, "temperature", "humidity", "pressure"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        let mut table = Self::new(names);

        for r in readings {
            table.columns[0].push(Some(r.local_timestamp().to_rfc3339()));
            table.columns[1].push(Some(r.temperature.to_string()));
            table.columns[2].push(Some(r.humidity.to_string()));
            table.columns[3].push(Some(r.pressure.to_string()));
            table.len += 1;
        }

        table
    }

    /// Append one row; the cell count must match the column count
    pub fn push_row(&mut self, cells: Vec<Option<String>>) -> Result<()> {
        if cells.len() != self.names.len() {
            return Err(Error::data(format!(
                "row {} has {} cells, expected {}",
                self.len,
                cells.len(),
                self.names.len()
            )));
        }
        for (column, cell) in self.columns.iter_mut().zip(cells) {
            column.push(cell);
        }
        self.len += 1;
        Ok(())
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.len
    }

    /// Check if the table has no rows
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Column names in source order
    pub fn column_names(&self) -> &[String] {
        &self.names
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Raw cells of a column
    pub fn column(&self, name: &str) -> Option<&[Option<String>]> {
        self.position(name).map(|i| self.columns[i].as_slice())
    }

    /// Parse a column as numbers; missing cells stay `None`
    pub fn numeric_column(&self, name: &str) -> Result<Vec<Option<f64>>> {
        let cells = self
            .column(name)
            .ok_or_else(|| Error::data(format!("missing column '{}'", name)))?;

        cells
            .iter()
            .enumerate()
            .map(|(row, cell)| match cell {
                None => Ok(None),
                Some(text) => text.parse::<f64>().map(Some).map_err(|_| {
                    Error::data(format!(
                        "column '{}' row {}: '{}' is not numeric",
                        name, row, text
                    ))
                }),
            })
            .collect()
    }

    /// Replace a single cell
    pub fn set_cell(&mut self, name: &str, row: usize, value: Option<String>) -> Result<()> {
        let col = self
            .position(name)
            .ok_or_else(|| Error::data(format!("missing column '{}'", name)))?;
        let cell = self.columns[col]
            .get_mut(row)
            .ok_or_else(|| Error::data(format!("row {} out of bounds ({} rows)", row, self.len)))?;
        *cell = value;
        Ok(())
    }

    /// Remove a row, shifting later rows up
    pub fn remove_row(&mut self, row: usize) -> Result<()> {
        if row >= self.len {
            return Err(Error::data(format!(
                "row {} out of bounds ({} rows)",
                row, self.len
            )));
        }
        for column in &mut self.columns {
            column.remove(row);
        }
        self.len -= 1;
        Ok(())
    }

    /// Drop a column by name, returning whether it existed
    pub fn remove_column(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(i) => {
                self.names.remove(i);
                self.columns.remove(i);
                true
            }
            None => false,
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

fn parse_cell(raw: &str) -> Option<String> {
    let lowered = raw.to_ascii_lowercase();
    if MISSING_MARKERS.contains(&lowered.as_str()) {
        None
    } else {
        Some(raw.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
time,lat,temperature,humidity,pressure
2025-02-28,55.75,3.4,96,1020.8
2025-03-01,55.75,,88,1029.5
2025-03-02,55.75,3.5,NaN,1032.7
";

    #[test]
    fn test_from_reader_renames_time_alias() {
        let table = ReadingTable::from_reader(SAMPLE.as_bytes()).unwrap();

        assert_eq!(table.len(), 3);
        assert!(table.has_column(TIMESTAMP_COLUMN));
        assert!(!table.has_column("time"));
        assert!(table.has_column("lat"));
    }

    #[test]
    fn test_missing_cells() {
        let table = ReadingTable::from_reader(SAMPLE.as_bytes()).unwrap();

        let temps = table.numeric_column("temperature").unwrap();
        assert_eq!(temps, vec![Some(3.4), None, Some(3.5)]);

        let humidity = table.numeric_column("humidity").unwrap();
        assert_eq!(humidity[2], None);
    }

    #[test]
    fn test_non_numeric_cell_is_data_error() {
        let mut table = ReadingTable::from_reader(SAMPLE.as_bytes()).unwrap();
        table.set_cell("pressure", 1, Some("high".to_string())).unwrap();

        let err = table.numeric_column("pressure").unwrap_err();
        assert!(err.is_data_error());
        assert!(err.to_string().contains("row 1"));
    }

    #[test]
    fn test_remove_row_and_column() {
        let mut table = ReadingTable::from_reader(SAMPLE.as_bytes()).unwrap();
        table.remove_row(0).unwrap();
        assert_eq!(table.len(), 2);
        assert_eq!(table.numeric_column("pressure").unwrap()[0], Some(1029.5));

        assert!(table.remove_column("lat"));
        assert!(!table.remove_column("lat"));
        assert!(table.remove_row(5).is_err());
    }
}
