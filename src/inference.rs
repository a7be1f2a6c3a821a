//! Inference service
//!
//! Holds at most one loaded artifact behind an atomically swappable slot.
//! Requests share the artifact read-only; a retrain produces a new artifact
//! and a new load, never an in-place update. Training and serving are
//! separate lifecycles: a request against an unloaded service fails rather
//! than lazily training.

use crate::artifact::ModelArtifact;
use crate::data::RawRecord;
use crate::error::{Result, TransitError};
use crate::explain::{Explainer, FeatureImportance};
use crate::schema::Disposition;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

/// Per-class probability, reported in the schema's label order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassProbability {
    pub label: Disposition,
    pub probability: f64,
}

/// One classified record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PredictionResult {
    /// Identifier column value, when the record carries one
    pub id: Option<String>,
    pub label: Disposition,
    /// Probability of the predicted class
    pub confidence: f64,
    pub probabilities: Vec<ClassProbability>,
    /// Global focus-feature ranking; a per-artifact property shared by every
    /// result in the batch
    pub focus_features: Vec<FeatureImportance>,
}

/// An artifact prepared for serving. The rankings are global properties of
/// the model, computed once per load instead of per request.
struct LoadedArtifact {
    artifact: ModelArtifact,
    full_ranking: Vec<FeatureImportance>,
    focus_ranking: Vec<FeatureImportance>,
}

/// Serves predictions against the currently loaded artifact
pub struct InferenceService {
    current: RwLock<Option<Arc<LoadedArtifact>>>,
}

impl Default for InferenceService {
    fn default() -> Self {
        Self::new()
    }
}

impl InferenceService {
    /// Create an unloaded service
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// Prepare an artifact and swap it in. In-flight requests keep the
    /// artifact they started with; new requests see the new one. A dropped
    /// focus feature fails the load before any request can observe it.
    pub fn load_artifact(&self, artifact: ModelArtifact) -> Result<()> {
        let feature_names = artifact.preprocessor().retained_features();
        let full_ranking = Explainer::rank(artifact.model(), &feature_names)?;
        let focus_ranking =
            Explainer::focus_rank(&full_ranking, artifact.schema().focus_features())?;

        info!(
            n_features = feature_names.len(),
            seed = artifact.metadata().seed,
            "artifact loaded"
        );

        *self.current.write() = Some(Arc::new(LoadedArtifact {
            artifact,
            full_ranking,
            focus_ranking,
        }));
        Ok(())
    }

    pub fn is_loaded(&self) -> bool {
        self.current.read().is_some()
    }

    fn snapshot(&self) -> Result<Arc<LoadedArtifact>> {
        self.current
            .read()
            .as_ref()
            .cloned()
            .ok_or(TransitError::ModelNotLoaded)
    }

    /// Classify a batch. Order-preserving and all-or-nothing: the first
    /// record missing a required feature column fails the whole call.
    pub fn predict(&self, records: &[RawRecord]) -> Result<Vec<PredictionResult>> {
        let loaded = self.snapshot()?;
        let schema = loaded.artifact.schema();

        let canonical: Vec<RawRecord> =
            records.iter().map(|r| r.canonicalize(schema)).collect();

        let matrix = loaded.artifact.preprocessor().transform(&canonical)?;
        let proba = loaded.artifact.model().predict_proba(&matrix)?;

        let results = canonical
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let row = proba.row(i);
                let mut best = 0usize;
                for (class, &p) in row.iter().enumerate() {
                    if p > row[best] {
                        best = class;
                    }
                }
                let label = Disposition::from_index(best).ok_or_else(|| {
                    TransitError::ComputationError(format!("class index {best} out of range"))
                })?;

                let probabilities = Disposition::ALL
                    .iter()
                    .map(|d| ClassProbability {
                        label: *d,
                        probability: row[d.index()],
                    })
                    .collect();

                Ok(PredictionResult {
                    id: record.identifier(schema),
                    label,
                    confidence: row[best],
                    probabilities,
                    focus_features: loaded.focus_ranking.clone(),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(results)
    }

    /// Focus-feature ranking of the loaded artifact
    pub fn focus_ranking(&self) -> Result<Vec<FeatureImportance>> {
        Ok(self.snapshot()?.focus_ranking.clone())
    }

    /// Full ranking of the loaded artifact
    pub fn full_ranking(&self) -> Result<Vec<FeatureImportance>> {
        Ok(self.snapshot()?.full_ranking.clone())
    }

    /// Metadata and evaluation of the loaded artifact
    pub fn loaded_summary(&self) -> Result<serde_json::Value> {
        let loaded = self.snapshot()?;
        Ok(serde_json::json!({
            "metadata": loaded.artifact.metadata(),
            "evaluation": loaded.artifact.evaluation(),
            "features": loaded.artifact.preprocessor().retained_features(),
            "dropped_features": loaded.artifact.preprocessor().dropped_features(),
            "focus_importance": loaded.focus_ranking,
        }))
    }
}
