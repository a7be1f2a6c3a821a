//! Integration test: CSV ingestion through training, persistence, and inference

use std::io::Write;

use transitml::prelude::*;

/// A small Kepler-style export: archive comment header, identifier column,
/// the six focus features, and raw disposition strings.
fn kepler_csv() -> String {
    let mut out = String::new();
    out.push_str("# This file was produced by the NASA Exoplanet Archive\n");
    out.push_str("# Column definitions follow the cumulative KOI table\n");
    out.push_str(
        "kepid,koi_model_snr,koi_depth,koi_prad,koi_teq,koi_duration,koi_period,koi_disposition\n",
    );

    for i in 0..10 {
        out.push_str(&format!(
            "{},{:.1},{:.1},{:.2},{:.1},{:.2},{:.3},CONFIRMED\n",
            100000 + i,
            55.0 + i as f64,
            820.0 + 11.0 * i as f64,
            1.1 + 0.13 * i as f64,
            480.0 + 7.0 * i as f64,
            3.1 + 0.21 * i as f64,
            9.5 + 1.1 * i as f64,
        ));
    }
    for i in 0..10 {
        out.push_str(&format!(
            "{},{:.1},{:.1},{:.2},{:.1},{:.2},{:.3},CANDIDATE\n",
            200000 + i,
            22.0 + i as f64,
            430.0 + 9.0 * i as f64,
            2.4 + 0.17 * i as f64,
            780.0 + 6.0 * i as f64,
            5.6 + 0.19 * i as f64,
            24.0 + 1.3 * i as f64,
        ));
    }
    for i in 0..10 {
        out.push_str(&format!(
            "{},{:.1},{:.1},{:.2},{:.1},{:.2},{:.3},FALSE POSITIVE\n",
            300000 + i,
            6.0 + i as f64,
            95.0 + 7.0 * i as f64,
            9.0 + 0.29 * i as f64,
            1400.0 + 9.0 * i as f64,
            1.2 + 0.11 * i as f64,
            2.0 + 0.7 * i as f64,
        ));
    }
    out
}

fn write_csv(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn candidate_record(snr: f64, depth: f64, prad: f64, teq: f64, duration: f64, period: f64) -> RawRecord {
    let mut r = RawRecord::new();
    r.insert("koi_model_snr", RawValue::Number(snr));
    r.insert("koi_depth", RawValue::Number(depth));
    r.insert("koi_prad", RawValue::Number(prad));
    r.insert("koi_teq", RawValue::Number(teq));
    r.insert("koi_duration", RawValue::Number(duration));
    r.insert("koi_period", RawValue::Number(period));
    r
}

#[test]
fn test_train_persist_load_predict() {
    let csv = write_csv(&kepler_csv());
    let rows = DataLoader::read_records(csv.path().to_str().unwrap()).unwrap();
    assert_eq!(rows.len(), 30);

    let trainer = ModelTrainer::new(Schema::kepler());
    let (artifact, report) = trainer.train(&rows).unwrap();
    assert!(report.accuracy > 0.5, "accuracy {} too low", report.accuracy);

    // Stellar columns absent from the export were dropped, focus features
    // survived
    let dropped: Vec<String> = artifact
        .preprocessor()
        .dropped_features()
        .into_iter()
        .map(|(name, _)| name)
        .collect();
    assert!(dropped.contains(&"koi_steff".to_string()));
    for focus in artifact.schema().focus_features() {
        assert!(!dropped.contains(focus));
    }

    // Round-trip through the store, then serve
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let key = store.save(&artifact).unwrap();
    let loaded = store.load(&key).unwrap();

    let service = InferenceService::new();
    service.load_artifact(loaded).unwrap();

    let mut confirmed_like = candidate_record(60.0, 870.0, 1.5, 510.0, 3.9, 14.0);
    confirmed_like.insert("kepid", RawValue::Number(100003.0));
    let fp_like = candidate_record(8.0, 120.0, 9.8, 1430.0, 1.5, 3.1);

    let results = service.predict(&[confirmed_like, fp_like]).unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].id.as_deref(), Some("100003"));
    assert_eq!(results[0].label, Disposition::Confirmed);
    assert_eq!(results[1].label, Disposition::FalsePositive);
    for result in &results {
        assert!(result.confidence > 0.0 && result.confidence <= 1.0);
        assert_eq!(result.focus_features.len(), 6);
    }
}

#[test]
fn test_repeated_runs_are_identical() {
    let csv = write_csv(&kepler_csv());
    let rows = DataLoader::read_records(csv.path().to_str().unwrap()).unwrap();

    let trainer = ModelTrainer::new(Schema::kepler());
    let (artifact_a, report_a) = trainer.train(&rows).unwrap();
    let (artifact_b, report_b) = trainer.train(&rows).unwrap();

    assert_eq!(report_a, report_b);
    assert_eq!(artifact_a.preprocessor(), artifact_b.preprocessor());
    assert_eq!(
        artifact_a.model().feature_importances(),
        artifact_b.model().feature_importances()
    );

    // Same rows through the same fitted state twice: identical matrices
    let matrix_a = artifact_a.preprocessor().transform(&rows).unwrap();
    let matrix_b = artifact_a.preprocessor().transform(&rows).unwrap();
    assert_eq!(matrix_a, matrix_b);
}

#[test]
fn test_focus_values_appear_verbatim_in_full_ranking() {
    let csv = write_csv(&kepler_csv());
    let rows = DataLoader::read_records(csv.path().to_str().unwrap()).unwrap();
    let (artifact, _) = ModelTrainer::new(Schema::kepler()).train(&rows).unwrap();

    let full = Explainer::rank(
        artifact.model(),
        &artifact.preprocessor().retained_features(),
    )
    .unwrap();
    let focus = Explainer::focus_rank(&full, artifact.schema().focus_features()).unwrap();

    assert_eq!(focus.len(), 6);
    for entry in &focus {
        let original = full.iter().find(|f| f.feature == entry.feature).unwrap();
        assert_eq!(entry.importance, original.importance);
    }
    for pair in focus.windows(2) {
        assert!(pair[0].importance >= pair[1].importance);
    }

    let full_sum: f64 = full.iter().map(|f| f.importance).sum();
    assert!((full_sum - 1.0).abs() < 1e-9);
}

#[test]
fn test_toi_export_trains_through_aliases() {
    let mut out = String::new();
    out.push_str("toi,pl_orbper,pl_trandurh,pl_trandep,pl_rade,pl_eqt,tfopwg_disp\n");
    for i in 0..8 {
        out.push_str(&format!(
            "{}.01,{:.2},{:.2},{:.1},{:.2},{:.1},CP\n",
            1000 + i,
            8.0 + 0.9 * i as f64,
            2.8 + 0.15 * i as f64,
            900.0 + 12.0 * i as f64,
            1.2 + 0.11 * i as f64,
            450.0 + 8.0 * i as f64,
        ));
    }
    for i in 0..8 {
        out.push_str(&format!(
            "{}.01,{:.2},{:.2},{:.1},{:.2},{:.1},FP\n",
            2000 + i,
            1.5 + 0.4 * i as f64,
            0.9 + 0.12 * i as f64,
            110.0 + 9.0 * i as f64,
            11.0 + 0.3 * i as f64,
            1600.0 + 11.0 * i as f64,
        ));
    }

    let csv = write_csv(&out);
    let rows = DataLoader::read_records(csv.path().to_str().unwrap()).unwrap();

    // koi_model_snr has no TOI counterpart in this export; relax the focus
    // set to what the mission ships
    let schema = Schema::toi();
    let trainer = ModelTrainer::new(schema);
    match trainer.train(&rows) {
        // The canonical focus set includes koi_model_snr, which this export
        // cannot provide; training must refuse rather than silently omit it
        Err(TransitError::MissingFocusFeature(feature)) => {
            assert_eq!(feature, "koi_model_snr");
        }
        other => panic!("expected MissingFocusFeature, got {other:?}"),
    }

    // With the SNR column supplied, the aliased export trains fine
    let mut out_with_snr = String::new();
    out_with_snr.push_str(
        "toi,koi_model_snr,pl_orbper,pl_trandurh,pl_trandep,pl_rade,pl_eqt,tfopwg_disp\n",
    );
    for i in 0..8 {
        out_with_snr.push_str(&format!(
            "{}.01,{:.1},{:.2},{:.2},{:.1},{:.2},{:.1},CP\n",
            1000 + i,
            40.0 + i as f64,
            8.0 + 0.9 * i as f64,
            2.8 + 0.15 * i as f64,
            900.0 + 12.0 * i as f64,
            1.2 + 0.11 * i as f64,
            450.0 + 8.0 * i as f64,
        ));
    }
    for i in 0..8 {
        out_with_snr.push_str(&format!(
            "{}.01,{:.1},{:.2},{:.2},{:.1},{:.2},{:.1},FP\n",
            2000 + i,
            6.0 + i as f64,
            1.5 + 0.4 * i as f64,
            0.9 + 0.12 * i as f64,
            110.0 + 9.0 * i as f64,
            11.0 + 0.3 * i as f64,
            1600.0 + 11.0 * i as f64,
        ));
    }
    let csv = write_csv(&out_with_snr);
    let rows = DataLoader::read_records(csv.path().to_str().unwrap()).unwrap();
    let (artifact, _) = ModelTrainer::new(Schema::toi()).train(&rows).unwrap();

    // Aliased and canonical spellings of the same record classify identically
    let service = InferenceService::new();
    service.load_artifact(artifact).unwrap();

    let mut aliased = RawRecord::new();
    aliased.insert("koi_model_snr", RawValue::Number(43.0));
    aliased.insert("pl_orbper", RawValue::Number(9.0));
    aliased.insert("pl_trandurh", RawValue::Number(3.0));
    aliased.insert("pl_trandep", RawValue::Number(930.0));
    aliased.insert("pl_rade", RawValue::Number(1.4));
    aliased.insert("pl_eqt", RawValue::Number(470.0));

    let mut canonical = RawRecord::new();
    canonical.insert("koi_model_snr", RawValue::Number(43.0));
    canonical.insert("koi_period", RawValue::Number(9.0));
    canonical.insert("koi_duration", RawValue::Number(3.0));
    canonical.insert("koi_depth", RawValue::Number(930.0));
    canonical.insert("koi_prad", RawValue::Number(1.4));
    canonical.insert("koi_teq", RawValue::Number(470.0));

    let results = service.predict(&[aliased, canonical]).unwrap();
    assert_eq!(results[0].label, results[1].label);
    assert_eq!(results[0].confidence, results[1].confidence);
}
