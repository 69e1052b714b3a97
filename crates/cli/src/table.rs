//! CSV loading into the engine's [`Table`].

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use outlier_core::{CellValue, Table};

/// Error type for dataset loading.
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Unsupported file format: {0} (expected .csv)")]
    UnsupportedFormat(String),

    #[error("Failed to parse CSV: {0}")]
    CsvError(String),

    #[error("File has no data columns")]
    NoColumns,
}

/// Load a CSV file. With `has_index` the first column supplies the row ids
/// and is not treated as data; otherwise rows are numbered from 0.
pub fn load_csv(path: &Path, has_index: bool) -> Result<Table, LoadError> {
    let is_csv = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(LoadError::UnsupportedFormat(path.display().to_string()));
    }

    let file = File::open(path).map_err(|e| LoadError::FileNotFound(format!("{}: {}", path.display(), e)))?;
    read_table(BufReader::new(file), has_index)
}

/// Parse CSV text from any reader. The first record is the header.
pub fn read_table<R: Read>(reader: R, has_index: bool) -> Result<Table, LoadError> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = reader
        .headers()
        .map_err(|e| LoadError::CsvError(e.to_string()))?
        .clone();

    let skip = usize::from(has_index);
    let columns: Vec<String> = headers.iter().skip(skip).map(String::from).collect();
    if columns.is_empty() {
        return Err(LoadError::NoColumns);
    }

    let mut table = Table::new(columns);
    for (i, result) in reader.records().enumerate() {
        let record = result.map_err(|e| LoadError::CsvError(e.to_string()))?;
        let id = if has_index {
            record.get(0).unwrap_or_default().to_string()
        } else {
            i.to_string()
        };
        let cells = record.iter().skip(skip).map(CellValue::parse).collect();
        table.push_row(id, cells);
    }

    Ok(table)
}
