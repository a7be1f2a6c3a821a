//! Model training
//!
//! One training run is a single non-preemptible batch computation: label
//! extraction, a seeded stratified split, preprocessor fitting on the train
//! partition only, a class-weighted forest fit, and held-out evaluation.
//! Identical rows and seed always produce an identical artifact.

mod decision_tree;
mod random_forest;

pub use decision_tree::{Criterion, DecisionTree, TreeNode};
pub use random_forest::RandomForest;

use crate::artifact::{ModelArtifact, TrainingMetadata};
use crate::data::RawRecord;
use crate::error::{Result, TransitError};
use crate::evaluation::{EvaluationReport, Evaluator};
use crate::explain::Explainer;
use crate::schema::{Disposition, Schema};
use ndarray::Array1;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Training hyperparameters. The defaults are the pipeline's fixed contract;
/// only the seed is expected to vary between runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainerConfig {
    pub n_trees: usize,
    pub max_depth: usize,
    pub test_fraction: f64,
    pub seed: u64,
    /// Minimum rows per observed class for a stratified split
    pub min_class_rows: usize,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        Self {
            n_trees: 100,
            max_depth: 10,
            test_fraction: 0.2,
            seed: 42,
            min_class_rows: 2,
        }
    }
}

impl TrainerConfig {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Fits a disposition classifier from raw mission records
pub struct ModelTrainer {
    config: TrainerConfig,
    schema: Schema,
}

impl ModelTrainer {
    pub fn new(schema: Schema) -> Self {
        Self {
            config: TrainerConfig::default(),
            schema,
        }
    }

    pub fn with_config(schema: Schema, config: TrainerConfig) -> Self {
        Self { config, schema }
    }

    /// Train end to end and return the artifact plus its held-out
    /// evaluation. Any failure aborts the run; nothing partial escapes.
    pub fn train(&self, rows: &[RawRecord]) -> Result<(ModelArtifact, EvaluationReport)> {
        let (labeled_rows, labels) = self.extract_labeled(rows)?;
        if labeled_rows.is_empty() {
            return Err(TransitError::EmptyDataset);
        }
        self.check_class_counts(&labels)?;

        let (train_idx, test_idx) = self.stratified_split(&labels);
        info!(
            n_rows = labeled_rows.len(),
            n_train = train_idx.len(),
            n_test = test_idx.len(),
            seed = self.config.seed,
            "training split"
        );

        let train_rows: Vec<RawRecord> =
            train_idx.iter().map(|&i| labeled_rows[i].clone()).collect();
        let test_rows: Vec<RawRecord> =
            test_idx.iter().map(|&i| labeled_rows[i].clone()).collect();

        // Fit on the train partition only; the test partition must never
        // leak into imputation or scaling statistics
        let preprocessor = crate::preprocessing::FittedPreprocessor::fit(&train_rows, &self.schema)?;

        let x_train = preprocessor.transform(&train_rows)?;
        let x_test = preprocessor.transform(&test_rows)?;
        let y_train: Array1<f64> =
            Array1::from_iter(train_idx.iter().map(|&i| labels[i] as f64));
        let y_test: Array1<f64> =
            Array1::from_iter(test_idx.iter().map(|&i| labels[i] as f64));

        let mut model = RandomForest::new(self.config.n_trees, Disposition::ALL.len())
            .with_max_depth(self.config.max_depth)
            .with_seed(self.config.seed);
        model.fit(&x_train, &y_train)?;

        let report = Evaluator::evaluate(&model, &x_test, &y_test)?;
        info!(accuracy = report.accuracy, "evaluation complete");

        // A dropped focus feature is a defect; fail here rather than at the
        // first explanation request
        let full_ranking = Explainer::rank(&model, &preprocessor.retained_features())?;
        Explainer::focus_rank(&full_ranking, self.schema.focus_features())?;

        let metadata = TrainingMetadata {
            seed: self.config.seed,
            test_fraction: self.config.test_fraction,
            trained_at: chrono::Utc::now(),
            n_training_rows: train_idx.len(),
            n_test_rows: test_idx.len(),
        };

        let artifact = ModelArtifact::new(
            self.schema.clone(),
            preprocessor,
            model,
            metadata,
            report.clone(),
        );

        Ok((artifact, report))
    }

    /// Canonicalize records and keep those with a usable disposition label.
    /// A row lacking the target column entirely is a schema mismatch; a row
    /// whose target value is missing or unmappable is excluded as unlabeled.
    fn extract_labeled(&self, rows: &[RawRecord]) -> Result<(Vec<RawRecord>, Vec<usize>)> {
        let target = self.schema.target_column();
        let mut labeled_rows = Vec::new();
        let mut labels = Vec::new();

        for (i, row) in rows.iter().enumerate() {
            let row = row.canonicalize(&self.schema);
            if !row.has_column(target) {
                return Err(TransitError::SchemaMismatch {
                    column: target.to_string(),
                    row: Some(i),
                });
            }
            let value = row.get(target).expect("target presence checked");
            let disposition = value
                .category_key()
                .and_then(|key| Disposition::parse(&key));
            if let Some(d) = disposition {
                labeled_rows.push(row);
                labels.push(d.index());
            }
        }

        Ok((labeled_rows, labels))
    }

    fn check_class_counts(&self, labels: &[usize]) -> Result<()> {
        let mut counts = [0usize; Disposition::ALL.len()];
        for &label in labels {
            counts[label] += 1;
        }
        for (class, &count) in counts.iter().enumerate() {
            if count > 0 && count < self.config.min_class_rows {
                return Err(TransitError::InsufficientData {
                    class: Disposition::ALL[class].as_str().to_string(),
                    count,
                    min: self.config.min_class_rows,
                });
            }
        }
        Ok(())
    }

    /// Class-stratified train/test partition. Indices are grouped by class
    /// in enumeration order and shuffled with a seeded ChaCha8 stream, so
    /// the split is a pure function of (rows, seed).
    fn stratified_split(&self, labels: &[usize]) -> (Vec<usize>, Vec<usize>) {
        let mut per_class: Vec<Vec<usize>> = vec![Vec::new(); Disposition::ALL.len()];
        for (i, &label) in labels.iter().enumerate() {
            per_class[label].push(i);
        }

        let mut rng = ChaCha8Rng::seed_from_u64(self.config.seed);
        let mut train_idx = Vec::new();
        let mut test_idx = Vec::new();

        for indices in per_class.iter_mut() {
            if indices.is_empty() {
                continue;
            }
            indices.shuffle(&mut rng);
            let n_test = ((indices.len() as f64) * self.config.test_fraction).round() as usize;
            let n_test = n_test.clamp(1, indices.len() - 1);
            let split = indices.len() - n_test;
            train_idx.extend_from_slice(&indices[..split]);
            test_idx.extend_from_slice(&indices[split..]);
        }

        (train_idx, test_idx)
    }
}
