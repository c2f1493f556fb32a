//! Thermal sensor grids and their false-color rendering.
//!
//! The thermal camera exports one delimited text file per frame: a few
//! free-form header lines followed by rows of temperatures. A row counts as
//! data only when every non-empty field parses as a number.

mod false_color;
mod grid;

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

pub use false_color::{decode, jet_color, ramp_color, Colormap, FLAT_GRAY};
pub use grid::ThermalGrid;


/// Field delimiter of the thermal camera exports.
pub const DEFAULT_DELIMITER: u8 = b';';

/// Errors that can occur when reading a thermal grid.
#[derive(Debug, thiserror::Error)]
pub enum GridError {
    #[error("Failed to read grid file '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Malformed delimited text in '{path}': {source}")]
    Csv { path: PathBuf, source: csv::Error },

    #[error("No numeric rows found in '{path}'")]
    Empty { path: PathBuf },

    #[error("Row {row} of '{path}' has {found} values, expected {expected}")]
    Ragged {
        path: PathBuf,
        row: usize,
        expected: usize,
        found: usize,
    },
}

/// Reads a delimited text grid from disk.
pub fn read_grid(path: &Path, delimiter: u8) -> Result<ThermalGrid, GridError> {
    let file = File::open(path).map_err(|source| GridError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_grid_from(file, delimiter, path)
}

/// Reads a delimited text grid from any reader. `origin` is only used in errors.
pub fn read_grid_from<R: Read>(
    reader: R,
    delimiter: u8,
    origin: &Path,
) -> Result<ThermalGrid, GridError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .quoting(false)
        .delimiter(delimiter)
        .from_reader(reader);

    let mut rows: Vec<Vec<f32>> = Vec::new();
    let mut skipped = 0usize;

    for record in csv_reader.byte_records() {
        let record = record.map_err(|source| GridError::Csv {
            path: origin.to_path_buf(),
            source,
        })?;

        match parse_data_row(&record) {
            Some(values) => {
                if let Some(first) = rows.first() {
                    if first.len() != values.len() {
                        return Err(GridError::Ragged {
                            path: origin.to_path_buf(),
                            row: rows.len(),
                            expected: first.len(),
                            found: values.len(),
                        });
                    }
                }
                rows.push(values);
            }
            None => skipped += 1,
        }
    }

    if skipped > 0 {
        tracing::trace!("Skipped {} non-numeric rows in {}", skipped, origin.display());
    }

    ThermalGrid::from_rows(rows).ok_or_else(|| GridError::Empty {
        path: origin.to_path_buf(),
    })
}

/// Parses a record as a data row, or returns `None` for header-like rows.
fn parse_data_row(record: &csv::ByteRecord) -> Option<Vec<f32>> {
    let mut values = Vec::with_capacity(record.len());
    for field in record.iter() {
        let text = std::str::from_utf8(field).ok()?.trim();
        if text.is_empty() {
            continue;
        }
        values.push(text.parse::<f32>().ok()?);
    }
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}
