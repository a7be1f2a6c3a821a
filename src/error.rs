//! Error types for the classification pipeline

use thiserror::Error;

/// Crate-wide result alias
pub type Result<T> = std::result::Result<T, TransitError>;

/// Errors surfaced by the pipeline.
///
/// Preprocessing and inference errors are never recovered locally; they carry
/// the column (and row index where applicable) so the caller can act on them.
#[derive(Error, Debug)]
pub enum TransitError {
    /// A required feature column is absent from a row or batch
    #[error("schema mismatch: required column '{column}' is absent{}", row_context(.row))]
    SchemaMismatch { column: String, row: Option<usize> },

    /// A declared focus feature was dropped upstream (configuration/data defect)
    #[error("focus feature '{0}' is not available in the trained feature set")]
    MissingFocusFeature(String),

    /// A disposition class has too few rows for a stratified split
    #[error("insufficient data: class '{class}' has {count} row(s), need at least {min}")]
    InsufficientData {
        class: String,
        count: usize,
        min: usize,
    },

    /// No labeled rows remain after schema filtering
    #[error("dataset is empty after schema filtering")]
    EmptyDataset,

    /// Inference attempted before any artifact is loaded
    #[error("no model artifact is loaded")]
    ModelNotLoaded,

    /// A persisted bundle failed integrity or version checks on load
    #[error("corrupt artifact: {0}")]
    CorruptArtifact(String),

    /// Malformed or inconsistent input data
    #[error("data error: {0}")]
    DataError(String),

    /// Dimension mismatch between inputs
    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeError { expected: String, actual: String },

    /// Numerical computation failure
    #[error("computation error: {0}")]
    ComputationError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

fn row_context(row: &Option<usize>) -> String {
    match row {
        Some(i) => format!(" (row {i})"),
        None => String::new(),
    }
}

impl TransitError {
    /// Stable machine-readable error kind for the request/response boundary
    pub fn kind(&self) -> &'static str {
        match self {
            TransitError::SchemaMismatch { .. } => "schema_mismatch",
            TransitError::MissingFocusFeature(_) => "missing_focus_feature",
            TransitError::InsufficientData { .. } => "insufficient_data",
            TransitError::EmptyDataset => "empty_dataset",
            TransitError::ModelNotLoaded => "model_not_loaded",
            TransitError::CorruptArtifact(_) => "corrupt_artifact",
            TransitError::DataError(_) => "data_error",
            TransitError::ShapeError { .. } => "shape_error",
            TransitError::ComputationError(_) => "computation_error",
            TransitError::Io(_) => "io_error",
            TransitError::Json(_) => "json_error",
        }
    }
}
