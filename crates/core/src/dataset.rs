use serde::{Deserialize, Serialize};

/// Stable row identifier, preserved from the caller's original index.
pub type RowId = String;

/// Typed cell value. Raw input arrives as text; numbers keep their type.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum CellValue {
    Number(f64),
    Text(String),
    Missing,
}

impl CellValue {
    /// Parse a raw text cell. Empty strings and the usual NA markers become
    /// [`CellValue::Missing`]; anything that parses as `f64` becomes a number.
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.is_empty() || is_na_marker(trimmed) {
            return CellValue::Missing;
        }
        match trimmed.parse::<f64>() {
            Ok(v) => CellValue::Number(v),
            Err(_) => CellValue::Text(trimmed.to_owned()),
        }
    }

    /// Extract as a finite number, returning None for text, missing or NaN/inf.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    /// Missing cells and non-finite numbers both count as missing.
    pub fn is_missing(&self) -> bool {
        match self {
            CellValue::Missing => true,
            CellValue::Number(v) => !v.is_finite(),
            CellValue::Text(_) => false,
        }
    }
}

fn is_na_marker(s: &str) -> bool {
    matches!(
        s.to_ascii_lowercase().as_str(),
        "na" | "n/a" | "nan" | "null" | "none"
    )
}

/// A single input row: caller-supplied identifier plus one cell per column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Row {
    pub id: RowId,
    pub cells: Vec<CellValue>,
}

/// Rectangular input table handed to the engine by the caller.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Table {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }

    /// Append a row. Short rows are padded with missing cells, long rows truncated,
    /// so the table stays rectangular.
    pub fn push_row(&mut self, id: impl Into<RowId>, mut cells: Vec<CellValue>) {
        cells.resize(self.columns.len(), CellValue::Missing);
        self.rows.push(Row {
            id: id.into(),
            cells,
        });
    }

    /// Build an all-numeric table with positional row ids ("0", "1", ...).
    pub fn from_numeric(columns: &[&str], values: &[Vec<f64>]) -> Self {
        let mut table = Self::new(columns.iter().map(|c| c.to_string()).collect());
        for (i, row) in values.iter().enumerate() {
            let cells = row.iter().map(|&v| CellValue::Number(v)).collect();
            table.push_row(i.to_string(), cells);
        }
        table
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_columns(&self) -> usize {
        self.columns.len()
    }
}

/// Dense numeric matrix with row identifiers and column names.
///
/// Produced by the preprocessor; this is the only shape detectors see.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NumericMatrix {
    pub columns: Vec<String>,
    pub row_ids: Vec<RowId>,
    pub values: Vec<Vec<f64>>,
}

impl NumericMatrix {
    pub fn new(columns: Vec<String>, row_ids: Vec<RowId>, values: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(row_ids.len(), values.len(), "row id / value count mismatch");
        Self {
            columns,
            row_ids,
            values,
        }
    }

    pub fn n_rows(&self) -> usize {
        self.values.len()
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn row(&self, i: usize) -> &[f64] {
        &self.values[i]
    }

    /// Copy out one column, or None if `j` is out of range.
    pub fn column(&self, j: usize) -> Option<Vec<f64>> {
        if j >= self.n_features() {
            return None;
        }
        Some(self.values.iter().map(|row| row[j]).collect())
    }

    /// New matrix holding the given rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            row_ids: indices.iter().map(|&i| self.row_ids[i].clone()).collect(),
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }

    /// Same rows and columns, replaced values (used by scalers).
    pub fn with_values(&self, values: Vec<Vec<f64>>) -> Self {
        debug_assert_eq!(values.len(), self.n_rows());
        Self {
            columns: self.columns.clone(),
            row_ids: self.row_ids.clone(),
            values,
        }
    }
}
