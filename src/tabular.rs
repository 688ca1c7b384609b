// src/tabular.rs

//! CSV ingestion for the statistics views.
//!
//! Parsing is two-pass. The first pass reads every record and classifies each
//! cell as missing, numeric or text. The second pass decides per column: a
//! column is numeric iff none of its non-missing cells is text. Missing cells
//! never disqualify a column.
//!
//! Header handling follows the pandas-style conventions clients expect: blank
//! names become `Unnamed: {index}`, repeated names are made unique as `name.1`,
//! `name.2`, and short rows are padded with missing values while long rows are
//! rejected.

use crate::error::{ComputeError, Result};
use log::{debug, trace};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::collections::HashSet;

/// Cell contents treated as missing (compared after trimming whitespace).
pub const DEFAULT_MISSING_MARKERS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN", "<NA>",
    "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

/// Ordered string-keyed mapping that serializes as a JSON object in insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderedMap<V>(pub Vec<(String, V)>);

impl<V> OrderedMap<V> {
    pub fn get(&self, key: &str) -> Option<&V> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(k, _)| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<V: Serialize> Serialize for OrderedMap<V> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, value) in &self.0 {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

/// A present cell value as it appears in a preview row.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(untagged)]
pub enum CellValue {
    Number(f64),
    Text(String),
}

/// One preview row: column name to value, `None` for missing.
pub type PreviewRow = OrderedMap<Option<CellValue>>;

/// First-pass classification of a single cell.
#[derive(Debug, Clone, PartialEq)]
enum RawCell {
    Missing,
    Number(f64),
    Text(String),
}

fn classify_cell(raw: &str) -> RawCell {
    let trimmed = raw.trim();
    if DEFAULT_MISSING_MARKERS.contains(&trimmed) {
        return RawCell::Missing;
    }
    match trimmed.parse::<f64>() {
        Ok(v) if v.is_finite() => RawCell::Number(v),
        // NaN/inf spellings that parse but carry no usable value
        Ok(_) => RawCell::Missing,
        Err(_) => RawCell::Text(raw.to_string()),
    }
}

#[derive(Debug, Clone)]
enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    fn from_cells(cells: Vec<RawCell>, n_rows: usize) -> Self {
        let is_numeric = n_rows > 0 && cells.iter().all(|c| !matches!(c, RawCell::Text(_)));
        if is_numeric {
            ColumnData::Numeric(
                cells
                    .into_iter()
                    .map(|c| match c {
                        RawCell::Number(v) => Some(v),
                        _ => None,
                    })
                    .collect(),
            )
        } else {
            ColumnData::Text(
                cells
                    .into_iter()
                    .map(|c| match c {
                        RawCell::Missing => None,
                        RawCell::Number(v) => Some(v.to_string()),
                        RawCell::Text(s) => Some(s),
                    })
                    .collect(),
            )
        }
    }

    fn cell(&self, row: usize) -> Option<CellValue> {
        match self {
            ColumnData::Numeric(values) => values[row].map(CellValue::Number),
            ColumnData::Text(values) => values[row].clone().map(CellValue::Text),
        }
    }
}

/// Parsed tabular data.
#[derive(Debug, Clone)]
pub struct Dataset {
    names: Vec<String>,
    columns: Vec<ColumnData>,
    n_rows: usize,
}

/// Wire summary of a dataset returned by the upload operation.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DatasetSummary {
    pub columns: Vec<String>,
    pub shape: [usize; 2],
    pub preview: Vec<PreviewRow>,
    pub numeric_columns: Vec<String>,
}

impl Dataset {
    /// Parses CSV bytes with a header row.
    ///
    /// # Errors
    /// Returns `InvalidUpload` for an empty file, undecodable bytes, or a row
    /// with more fields than the header.
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(bytes);

        let headers = reader
            .headers()
            .map_err(|e| ComputeError::invalid_upload(format!("Error parsing CSV: {}", e)))?
            .clone();
        if headers.is_empty() {
            return Err(ComputeError::invalid_upload(
                "Error parsing CSV: No columns to parse from file",
            ));
        }
        let names = dedupe_header(headers.iter());
        let n_cols = names.len();

        let mut cells: Vec<Vec<RawCell>> = vec![Vec::new(); n_cols];
        let mut n_rows = 0usize;
        for result in reader.records() {
            let record =
                result.map_err(|e| ComputeError::invalid_upload(format!("Error parsing CSV: {}", e)))?;
            if record.len() > n_cols {
                let line = record.position().map_or(n_rows + 2, |p| p.line() as usize);
                return Err(ComputeError::invalid_upload(format!(
                    "Error parsing CSV: Expected {} fields in line {}, saw {}",
                    n_cols,
                    line,
                    record.len()
                )));
            }
            for (col, column_cells) in cells.iter_mut().enumerate() {
                column_cells.push(record.get(col).map_or(RawCell::Missing, classify_cell));
            }
            n_rows += 1;
        }

        let columns: Vec<ColumnData> = cells
            .into_iter()
            .map(|column_cells| ColumnData::from_cells(column_cells, n_rows))
            .collect();
        for (name, column) in names.iter().zip(&columns) {
            trace!(
                "Column '{}' classified as {}",
                name,
                if matches!(column, ColumnData::Numeric(_)) { "numeric" } else { "text" }
            );
        }
        debug!("Parsed CSV with {} rows and {} columns", n_rows, n_cols);

        Ok(Self { names, columns, n_rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.names
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.names.len()
    }

    pub fn shape(&self) -> [usize; 2] {
        [self.n_rows, self.n_cols()]
    }

    pub fn numeric_columns(&self) -> Vec<&str> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter(|(_, c)| matches!(c, ColumnData::Numeric(_)))
            .map(|(n, _)| n.as_str())
            .collect()
    }

    pub fn is_numeric(&self, name: &str) -> bool {
        self.column_index(name)
            .is_some_and(|idx| matches!(self.columns[idx], ColumnData::Numeric(_)))
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Values of a numeric column, `None` where missing.
    ///
    /// # Errors
    /// `NotFound` if the column does not exist, `InvalidUpload` if it is not numeric.
    pub fn numeric_column(&self, name: &str) -> Result<&[Option<f64>]> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| ComputeError::not_found(format!("Column '{}' not found in dataset", name)))?;
        match &self.columns[idx] {
            ColumnData::Numeric(values) => Ok(values),
            ColumnData::Text(_) => Err(ComputeError::invalid_upload(format!(
                "Column '{}' is not numeric",
                name
            ))),
        }
    }

    /// All numeric columns in header order.
    pub fn numeric_column_values(&self) -> Vec<(&str, &[Option<f64>])> {
        self.names
            .iter()
            .zip(&self.columns)
            .filter_map(|(name, column)| match column {
                ColumnData::Numeric(values) => Some((name.as_str(), values.as_slice())),
                ColumnData::Text(_) => None,
            })
            .collect()
    }

    /// The first `limit` rows, keyed by column name.
    pub fn preview(&self, limit: usize) -> Vec<PreviewRow> {
        (0..self.n_rows.min(limit))
            .map(|row| {
                OrderedMap(
                    self.names
                        .iter()
                        .zip(&self.columns)
                        .map(|(name, column)| (name.clone(), column.cell(row)))
                        .collect(),
                )
            })
            .collect()
    }

    pub fn summary(&self, preview_rows: usize) -> DatasetSummary {
        DatasetSummary {
            columns: self.names.clone(),
            shape: self.shape(),
            preview: self.preview(preview_rows),
            numeric_columns: self.numeric_columns().into_iter().map(String::from).collect(),
        }
    }
}

fn dedupe_header<'a>(raw: impl Iterator<Item = &'a str>) -> Vec<String> {
    let raw: Vec<String> = raw
        .enumerate()
        .map(|(idx, name)| {
            if name.trim().is_empty() {
                format!("Unnamed: {}", idx)
            } else {
                name.to_string()
            }
        })
        .collect();

    let mut used: HashSet<String> = HashSet::with_capacity(raw.len());
    let mut names = Vec::with_capacity(raw.len());
    for name in raw {
        if used.insert(name.clone()) {
            names.push(name);
            continue;
        }
        let mut suffix = 1;
        let unique = loop {
            let candidate = format!("{}.{}", name, suffix);
            if !used.contains(&candidate) {
                break candidate;
            }
            suffix += 1;
        };
        used.insert(unique.clone());
        names.push(unique);
    }
    names
}
