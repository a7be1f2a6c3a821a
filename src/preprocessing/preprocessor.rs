//! Fitted preprocessing state and its fit/transform contract

use super::{CATEGORICAL_CARDINALITY_MAX, MISSING_DROP_THRESHOLD, UNKNOWN_CATEGORY};
use crate::data::RawRecord;
use crate::error::{Result, TransitError};
use crate::schema::Schema;
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Per-column fitted parameters.
///
/// The numeric/categorical classification is made once at fit time and
/// frozen here; transform never re-derives it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ColumnState {
    /// Median imputation plus standard scaling
    Numeric { median: f64, mean: f64, std: f64 },
    /// Mode imputation plus a stable category -> code table in first-seen
    /// order; values unseen at fit time map to the reserved code
    /// `codes.len()`.
    Categorical { mode: String, codes: Vec<String> },
    /// Dropped at fit time for exceeding the missing-value threshold;
    /// recorded so callers can see the column is not used.
    Dropped { missing_fraction: f64 },
}

/// Preprocessing parameters learned from one training partition.
///
/// Travels inside the model artifact next to the classifier it was fitted
/// with; the two are never applied independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedPreprocessor {
    /// Schema feature order, one state per declared feature column
    columns: Vec<(String, ColumnState)>,
}

impl FittedPreprocessor {
    /// Learn imputation, encoding, and scaling parameters from training
    /// rows. Columns outside the schema's feature set are ignored entirely.
    pub fn fit(rows: &[RawRecord], schema: &Schema) -> Result<Self> {
        if rows.is_empty() {
            return Err(TransitError::EmptyDataset);
        }

        let columns = schema
            .feature_columns()
            .iter()
            .map(|name| Ok((name.clone(), Self::fit_column(name, rows)?)))
            .collect::<Result<Vec<_>>>()?;

        Ok(Self { columns })
    }

    fn fit_column(name: &str, rows: &[RawRecord]) -> Result<ColumnState> {
        let cells: Vec<Option<&crate::data::RawValue>> = rows
            .iter()
            .map(|row| row.get(name).filter(|v| !v.is_missing()))
            .collect();

        let present: Vec<&crate::data::RawValue> =
            cells.iter().filter_map(|c| *c).collect();
        let missing_fraction = 1.0 - present.len() as f64 / rows.len() as f64;

        if missing_fraction > MISSING_DROP_THRESHOLD {
            return Ok(ColumnState::Dropped { missing_fraction });
        }

        // A column whose present values all parse as numbers is numeric; a
        // column carrying text is categorical, encodable only up to the
        // fixed cardinality threshold
        let all_numeric = present.iter().all(|v| v.as_number().is_some());
        if !all_numeric {
            let mut codes: Vec<String> = Vec::new();
            let mut counts: Vec<usize> = Vec::new();
            for value in &present {
                let key = value
                    .category_key()
                    .expect("present value has a category key");
                match codes.iter().position(|c| *c == key) {
                    Some(idx) => counts[idx] += 1,
                    None => {
                        codes.push(key);
                        counts.push(1);
                    }
                }
            }

            if codes.len() > CATEGORICAL_CARDINALITY_MAX {
                return Err(TransitError::DataError(format!(
                    "column '{name}' has {} distinct non-numeric values (at most {} can be encoded)",
                    codes.len(),
                    CATEGORICAL_CARDINALITY_MAX
                )));
            }

            let (mode_idx, mode_count) = counts
                .iter()
                .enumerate()
                .fold((0, 0), |(bi, bc), (i, &c)| if c > bc { (i, c) } else { (bi, bc) });
            // No recurring value: impute with the reserved sentinel instead
            // of an arbitrary pick
            let mode = if mode_count > 1 {
                codes[mode_idx].clone()
            } else {
                UNKNOWN_CATEGORY.to_string()
            };
            return Ok(ColumnState::Categorical { mode, codes });
        }

        let mut parsed: Vec<f64> = present.iter().filter_map(|v| v.as_number()).collect();

        parsed.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let median = if parsed.len() % 2 == 0 {
            (parsed[parsed.len() / 2 - 1] + parsed[parsed.len() / 2]) / 2.0
        } else {
            parsed[parsed.len() / 2]
        };

        // Scaling parameters are computed post-imputation over every row
        let imputed: Vec<f64> = cells
            .iter()
            .map(|cell| cell.and_then(|v| v.as_number()).unwrap_or(median))
            .collect();
        let n = imputed.len() as f64;
        let mean = imputed.iter().sum::<f64>() / n;
        let var = if imputed.len() > 1 {
            imputed.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0)
        } else {
            0.0
        };
        let std = var.sqrt();
        let std = if std == 0.0 { 1.0 } else { std };

        Ok(ColumnState::Numeric { median, mean, std })
    }

    /// Apply the stored drops, imputation, encoding, and scaling.
    ///
    /// A row missing a retained feature column entirely (not just a missing
    /// value) fails the whole call with `SchemaMismatch`. Rows are never
    /// excluded: an all-missing row enters the matrix fully imputed.
    pub fn transform(&self, rows: &[RawRecord]) -> Result<Array2<f64>> {
        let retained: Vec<(&str, &ColumnState)> = self
            .columns
            .iter()
            .filter(|(_, state)| !matches!(state, ColumnState::Dropped { .. }))
            .map(|(name, state)| (name.as_str(), state))
            .collect();

        let mut matrix = Array2::zeros((rows.len(), retained.len()));

        for (i, row) in rows.iter().enumerate() {
            for (j, &(name, state)) in retained.iter().enumerate() {
                if !row.has_column(name) {
                    return Err(TransitError::SchemaMismatch {
                        column: name.to_string(),
                        row: Some(i),
                    });
                }
                let value = row.get(name).expect("column presence checked");
                matrix[[i, j]] = match state {
                    ColumnState::Numeric { median, mean, std } => {
                        let v = value.as_number().unwrap_or(*median);
                        (v - mean) / std
                    }
                    ColumnState::Categorical { mode, codes } => {
                        let key = value.category_key().unwrap_or_else(|| mode.clone());
                        codes
                            .iter()
                            .position(|c| *c == key)
                            .unwrap_or(codes.len()) as f64
                    }
                    ColumnState::Dropped { .. } => unreachable!("dropped columns filtered"),
                };
            }
        }

        Ok(matrix)
    }

    /// Feature names that survived fitting, in schema order. This is the
    /// column order of transformed matrices and of the model's importance
    /// vector.
    pub fn retained_features(&self) -> Vec<String> {
        self.columns
            .iter()
            .filter(|(_, state)| !matches!(state, ColumnState::Dropped { .. }))
            .map(|(name, _)| name.clone())
            .collect()
    }

    /// Columns dropped at fit time, with the missing fraction that caused it
    pub fn dropped_features(&self) -> Vec<(String, f64)> {
        self.columns
            .iter()
            .filter_map(|(name, state)| match state {
                ColumnState::Dropped { missing_fraction } => {
                    Some((name.clone(), *missing_fraction))
                }
                _ => None,
            })
            .collect()
    }

    /// Fitted state for one column, if the column is in the schema
    pub fn column_state(&self, name: &str) -> Option<&ColumnState> {
        self.columns
            .iter()
            .find(|(col, _)| col == name)
            .map(|(_, state)| state)
    }

    pub fn n_retained(&self) -> usize {
        self.columns
            .iter()
            .filter(|(_, state)| !matches!(state, ColumnState::Dropped { .. }))
            .count()
    }
}
