//! Raw record model and dataset loading
//!
//! Mission catalogs arrive as messy CSV exports: commented headers, missing
//! cells, and per-mission column names. This module loads them into
//! [`RawRecord`] rows, the unit the preprocessor consumes. Loading is plain
//! synchronous local IO; failures surface whole to the caller.

use crate::error::{Result, TransitError};
use crate::schema::Schema;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;

/// One raw cell value. `Null` covers both empty CSV cells and JSON nulls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawValue {
    Null,
    Number(f64),
    Text(String),
}

impl RawValue {
    /// Whether the cell counts as a missing value
    pub fn is_missing(&self) -> bool {
        match self {
            RawValue::Null => true,
            RawValue::Text(s) => s.trim().is_empty(),
            RawValue::Number(n) => n.is_nan(),
        }
    }

    /// Numeric view: numbers pass through, text is parsed, missing is `None`.
    /// Unparseable text is also `None`; whether that counts as missing is a
    /// per-column decision frozen at fit time.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            RawValue::Number(n) if !n.is_nan() => Some(*n),
            RawValue::Text(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Categorical view: the stable string key used by code tables
    pub fn category_key(&self) -> Option<String> {
        if self.is_missing() {
            return None;
        }
        match self {
            RawValue::Number(n) => Some(format!("{n}")),
            RawValue::Text(s) => Some(s.trim().to_string()),
            RawValue::Null => None,
        }
    }
}

impl From<&serde_json::Value> for RawValue {
    fn from(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => RawValue::Null,
            serde_json::Value::Number(n) => RawValue::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::Bool(b) => RawValue::Number(if *b { 1.0 } else { 0.0 }),
            serde_json::Value::String(s) => RawValue::Text(s.clone()),
            other => RawValue::Text(other.to_string()),
        }
    }
}

/// One raw row: column name -> raw value. Arbitrary width; column identity
/// varies per mission dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RawRecord(HashMap<String, RawValue>);

impl RawRecord {
    pub fn new() -> Self {
        Self(HashMap::new())
    }

    pub fn insert(&mut self, column: impl Into<String>, value: RawValue) {
        self.0.insert(column.into(), value);
    }

    pub fn get(&self, column: &str) -> Option<&RawValue> {
        self.0.get(column)
    }

    /// Whether the column is present at all (a present-but-null cell is a
    /// missing value, not an absent column)
    pub fn has_column(&self, column: &str) -> bool {
        self.0.contains_key(column)
    }

    pub fn columns(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    /// Rewrite mission-specific column names onto the schema's canonical
    /// names. A canonical column already present wins over its alias.
    pub fn canonicalize(&self, schema: &Schema) -> RawRecord {
        let mut out = RawRecord::new();
        for (name, value) in &self.0 {
            let canonical = schema.canonical_column(name);
            if canonical != name && self.0.contains_key(canonical) {
                continue;
            }
            out.insert(canonical.to_string(), value.clone());
        }
        out
    }

    /// First identifier column present on this record, as a display string
    pub fn identifier(&self, schema: &Schema) -> Option<String> {
        schema
            .identifier_columns()
            .iter()
            .find_map(|col| self.0.get(col).and_then(|v| v.category_key()))
    }

    pub fn from_json_map(map: &serde_json::Map<String, serde_json::Value>) -> RawRecord {
        let mut record = RawRecord::new();
        for (key, value) in map {
            record.insert(key.clone(), RawValue::from(value));
        }
        record
    }
}

/// Dataset loader for mission CSV exports
pub struct DataLoader;

impl DataLoader {
    /// Load a CSV file into a DataFrame. Header row expected; `#`-prefixed
    /// comment lines (NASA archive exports lead with them) are skipped.
    pub fn load_csv(path: &str) -> Result<DataFrame> {
        let file = File::open(path)
            .map_err(|e| TransitError::DataError(format!("cannot open '{path}': {e}")))?;

        let parse_opts = CsvParseOptions::default().with_comment_prefix(Some("#"));

        CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(Some(100))
            .with_parse_options(parse_opts)
            .into_reader_with_file_handle(file)
            .finish()
            .map_err(|e| TransitError::DataError(e.to_string()))
    }

    /// Load a CSV file as raw records
    pub fn read_records(path: &str) -> Result<Vec<RawRecord>> {
        let df = Self::load_csv(path)?;
        Self::dataframe_to_records(&df)
    }

    /// Convert a DataFrame into row records
    pub fn dataframe_to_records(df: &DataFrame) -> Result<Vec<RawRecord>> {
        let height = df.height();
        let mut records = vec![RawRecord::new(); height];

        for col in df.get_columns() {
            let name = col.name().to_string();
            match col.dtype() {
                DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
                | DataType::Float32
                | DataType::Float64
                | DataType::Boolean => {
                    let casted = col
                        .cast(&DataType::Float64)
                        .map_err(|e| TransitError::DataError(e.to_string()))?;
                    let ca = casted
                        .f64()
                        .map_err(|e| TransitError::DataError(e.to_string()))?;
                    for (i, value) in ca.into_iter().enumerate() {
                        let cell = value.map(RawValue::Number).unwrap_or(RawValue::Null);
                        records[i].insert(name.clone(), cell);
                    }
                }
                DataType::String => {
                    let ca = col
                        .str()
                        .map_err(|e| TransitError::DataError(e.to_string()))?;
                    for (i, value) in ca.into_iter().enumerate() {
                        let cell = value
                            .map(|s| RawValue::Text(s.to_string()))
                            .unwrap_or(RawValue::Null);
                        records[i].insert(name.clone(), cell);
                    }
                }
                _ => {
                    for record in records.iter_mut() {
                        record.insert(name.clone(), RawValue::Null);
                    }
                }
            }
        }

        Ok(records)
    }

    /// Parse a JSON array of objects into records (the inference wire format)
    pub fn records_from_json(value: &serde_json::Value) -> Result<Vec<RawRecord>> {
        let rows = value.as_array().ok_or_else(|| {
            TransitError::DataError("expected a JSON array of records".to_string())
        })?;

        rows.iter()
            .enumerate()
            .map(|(i, row)| {
                row.as_object().map(RawRecord::from_json_map).ok_or_else(|| {
                    TransitError::DataError(format!("record {i} is not a JSON object"))
                })
            })
            .collect()
    }
}
