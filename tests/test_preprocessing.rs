//! Integration test: preprocessing contract on a small labeled dataset

use transitml::prelude::*;
use transitml::preprocessing::{ColumnState, FittedPreprocessor};

fn depth_schema() -> Schema {
    Schema::new(
        vec!["koi_depth".to_string()],
        "koi_disposition",
        vec!["koi_depth".to_string()],
    )
    .unwrap()
}

/// Ten rows, five CONFIRMED and five FALSE POSITIVE, one numeric feature
/// with two missing entries.
fn ten_row_dataset() -> Vec<RawRecord> {
    let depths = [
        Some(100.0),
        Some(200.0),
        None,
        Some(400.0),
        Some(500.0),
        Some(600.0),
        None,
        Some(800.0),
        Some(900.0),
        Some(1000.0),
    ];
    depths
        .iter()
        .enumerate()
        .map(|(i, depth)| {
            let mut r = RawRecord::new();
            r.insert(
                "koi_depth",
                depth.map(RawValue::Number).unwrap_or(RawValue::Null),
            );
            let label = if i < 5 { "CONFIRMED" } else { "FALSE POSITIVE" };
            r.insert("koi_disposition", RawValue::Text(label.to_string()));
            r
        })
        .collect()
}

#[test]
fn test_median_imputes_missing_entries() {
    let rows = ten_row_dataset();
    let state = FittedPreprocessor::fit(&rows, &depth_schema()).unwrap();

    // Present values 100,200,400,500,600,800,900,1000 -> median 550
    let (median, mean, std) = match state.column_state("koi_depth").unwrap() {
        ColumnState::Numeric { median, mean, std } => (*median, *mean, *std),
        other => panic!("expected numeric state, got {other:?}"),
    };
    assert_eq!(median, 550.0);

    let matrix = state.transform(&rows).unwrap();
    assert_eq!(matrix.nrows(), 10);
    assert_eq!(matrix.ncols(), 1);

    // The two missing entries carry the scaled median
    let scaled_median = (median - mean) / std;
    assert_eq!(matrix[[2, 0]], scaled_median);
    assert_eq!(matrix[[6, 0]], scaled_median);
}

#[test]
fn test_held_out_row_without_feature_is_mismatch() {
    let rows = ten_row_dataset();
    let state = FittedPreprocessor::fit(&rows, &depth_schema()).unwrap();

    // The column is absent entirely, not just null
    let mut held_out = RawRecord::new();
    held_out.insert("koi_disposition", RawValue::Text("CANDIDATE".to_string()));

    match state.transform(&[held_out]) {
        Err(TransitError::SchemaMismatch { column, row }) => {
            assert_eq!(column, "koi_depth");
            assert_eq!(row, Some(0));
        }
        other => panic!("expected SchemaMismatch, got {other:?}"),
    }
}

#[test]
fn test_null_valued_row_is_imputed_not_rejected() {
    let rows = ten_row_dataset();
    let state = FittedPreprocessor::fit(&rows, &depth_schema()).unwrap();

    let mut null_row = RawRecord::new();
    null_row.insert("koi_depth", RawValue::Null);

    let matrix = state.transform(&[null_row]).unwrap();
    assert_eq!(matrix.nrows(), 1);
    assert!(matrix[[0, 0]].is_finite());
}

#[test]
fn test_identifier_columns_never_reach_the_matrix() {
    let mut rows = ten_row_dataset();
    for (i, row) in rows.iter_mut().enumerate() {
        row.insert("kepid", RawValue::Number(700000.0 + i as f64));
        row.insert("kepoi_name", RawValue::Text(format!("K{i:05}.01")));
    }

    let state = FittedPreprocessor::fit(&rows, &depth_schema()).unwrap();
    let matrix = state.transform(&rows).unwrap();
    assert_eq!(matrix.ncols(), 1);
    assert_eq!(state.retained_features(), vec!["koi_depth".to_string()]);
}

#[test]
fn test_whole_dataset_trains_and_evaluates() {
    // The same ten rows drive a full training run: stratified split keeps
    // one row of each class for test, the confusion matrix accounts for
    // every test row
    let rows = ten_row_dataset();
    let trainer = ModelTrainer::new(depth_schema());
    let (artifact, report) = trainer.train(&rows).unwrap();

    assert_eq!(report.n_test_rows, 2);
    assert_eq!(report.class_total(Disposition::Confirmed), 1);
    assert_eq!(report.class_total(Disposition::FalsePositive), 1);
    assert_eq!(report.class_total(Disposition::Candidate), 0);
    assert_eq!(artifact.metadata().n_training_rows, 8);
}
