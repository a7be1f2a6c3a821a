//! Data preprocessing
//!
//! Turns raw mission records into a model-ready numeric matrix:
//! - schema filtering (identifier/provenance columns never reach the model)
//! - missing-heavy column dropping
//! - median / mode imputation
//! - stable categorical code tables with a reserved unknown code
//! - zero-mean/unit-variance scaling of numeric columns
//!
//! All statistics are learned once at fit time and frozen into
//! [`FittedPreprocessor`]; transform replays the stored state and never
//! recomputes anything from its input.

mod preprocessor;

pub use preprocessor::{ColumnState, FittedPreprocessor};

/// A feature column is dropped when more than this fraction of its training
/// values are missing.
pub const MISSING_DROP_THRESHOLD: f64 = 0.5;

/// A text-bearing column is encodable as categorical only while its
/// training-time distinct-value count is at most this.
pub const CATEGORICAL_CARDINALITY_MAX: usize = 10;

/// Imputation sentinel for a categorical column where no value recurs
pub const UNKNOWN_CATEGORY: &str = "Unknown";
