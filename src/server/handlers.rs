//! Request handlers

use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

use crate::artifact::ModelArtifact;
use crate::data::DataLoader;
use crate::explain::Explainer;
use crate::inference::PredictionResult;
use crate::schema::Schema;
use crate::training::{ModelTrainer, TrainerConfig};

use super::error::{Result, ServerError};
use super::state::AppState;

/// Health check
pub async fn health(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "model_loaded": state.service.is_loaded(),
    }))
}

#[derive(Deserialize)]
pub struct TrainRequest {
    /// CSV dataset location
    pub data_path: String,
    /// Bundle destination; defaults to a key in the store directory
    pub artifact_path: Option<String>,
    /// Ranking-table destination; defaults next to the bundle
    pub ranking_path: Option<String>,
    /// Schema preset: kepler (default), k2, or toi
    pub mission: Option<String>,
    pub seed: Option<u64>,
}

/// Train a model from a dataset on disk, persist the bundle and the
/// human-readable ranking table, and swap the new artifact into the service.
pub async fn train(
    State(state): State<Arc<AppState>>,
    Json(request): Json<TrainRequest>,
) -> Result<Json<serde_json::Value>> {
    let response = tokio::task::spawn_blocking(move || run_training(&state, request))
        .await
        .map_err(|e| ServerError::Internal(format!("training task failed: {e}")))??;
    Ok(Json(response))
}

fn run_training(state: &AppState, request: TrainRequest) -> Result<serde_json::Value> {
    let schema = Schema::for_mission(request.mission.as_deref().unwrap_or("kepler"))?;
    let rows = DataLoader::read_records(&request.data_path)?;

    let mut config = TrainerConfig::default();
    if let Some(seed) = request.seed {
        config = config.with_seed(seed);
    }

    let trainer = ModelTrainer::with_config(schema, config);
    let (artifact, report) = trainer.train(&rows)?;

    let artifact_key = match &request.artifact_path {
        Some(path) => {
            artifact.save_to(Path::new(path))?;
            path.clone()
        }
        None => {
            let key = state.store.save(&artifact)?;
            state.store.path_for(&key).display().to_string()
        }
    };

    let full_ranking =
        Explainer::rank(artifact.model(), &artifact.preprocessor().retained_features())?;
    let focus_ranking =
        Explainer::focus_rank(&full_ranking, artifact.schema().focus_features())?;

    let ranking_path = request
        .ranking_path
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(format!("{artifact_key}.importance.csv")));
    std::fs::write(&ranking_path, Explainer::ranking_table(&full_ranking))
        .map_err(crate::error::TransitError::from)?;

    state.service.load_artifact(artifact)?;
    info!(artifact = %artifact_key, accuracy = report.accuracy, "training run complete");

    Ok(json!({
        "artifact_key": artifact_key,
        "ranking_path": ranking_path.display().to_string(),
        "accuracy": report.accuracy,
        "confusion_matrix": report.confusion_matrix,
        "labels": report.labels,
        "focus_importance": focus_ranking,
    }))
}

#[derive(Deserialize)]
pub struct PredictRequest {
    /// Array of column -> value objects, one per candidate record
    pub records: serde_json::Value,
}

/// Classify a batch of records. Order-preserving; the whole batch fails on
/// the first structurally invalid record.
pub async fn predict(
    State(state): State<Arc<AppState>>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<Vec<PredictionResult>>> {
    let records = DataLoader::records_from_json(&request.records)?;
    let results = state.service.predict(&records)?;
    Ok(Json(results))
}

#[derive(Deserialize)]
pub struct LoadModelRequest {
    pub artifact_path: String,
}

/// Load a persisted bundle and swap it in
pub async fn load_model(
    State(state): State<Arc<AppState>>,
    Json(request): Json<LoadModelRequest>,
) -> Result<Json<serde_json::Value>> {
    let artifact = ModelArtifact::load_from(Path::new(&request.artifact_path))?;
    state.service.load_artifact(artifact)?;
    Ok(Json(json!({ "loaded": true })))
}

/// Metadata, evaluation, and focus ranking of the loaded artifact
pub async fn model_info(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    Ok(Json(state.service.loaded_summary()?))
}

/// Full importance ranking of the loaded artifact
pub async fn importance(State(state): State<Arc<AppState>>) -> Result<Json<serde_json::Value>> {
    Ok(Json(json!({
        "full": state.service.full_ranking()?,
        "focus": state.service.focus_ranking()?,
    })))
}
