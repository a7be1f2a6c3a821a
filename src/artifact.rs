//! Artifact persistence
//!
//! A trained classifier and the preprocessing parameters it was fitted with
//! are mutually dependent; they persist and load as one versioned,
//! checksummed bundle. Writes go through a temp file and rename, so a
//! partial write never produces a loadable artifact.

use crate::error::{Result, TransitError};
use crate::evaluation::EvaluationReport;
use crate::preprocessing::FittedPreprocessor;
use crate::schema::Schema;
use crate::training::RandomForest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use xxhash_rust::xxh3::xxh3_64;

/// Bumped whenever the persisted layout changes incompatibly
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Provenance of one training run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub seed: u64,
    pub test_fraction: f64,
    pub trained_at: DateTime<Utc>,
    pub n_training_rows: usize,
    pub n_test_rows: usize,
}

/// Immutable bundle: fitted classifier, its paired preprocessing state, the
/// schema snapshot, and training provenance. One artifact is one
/// reproducible inference function.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    schema: Schema,
    preprocessor: FittedPreprocessor,
    model: RandomForest,
    metadata: TrainingMetadata,
    evaluation: EvaluationReport,
}

impl ModelArtifact {
    pub fn new(
        schema: Schema,
        preprocessor: FittedPreprocessor,
        model: RandomForest,
        metadata: TrainingMetadata,
        evaluation: EvaluationReport,
    ) -> Self {
        Self {
            schema,
            preprocessor,
            model,
            metadata,
            evaluation,
        }
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn preprocessor(&self) -> &FittedPreprocessor {
        &self.preprocessor
    }

    pub fn model(&self) -> &RandomForest {
        &self.model
    }

    pub fn metadata(&self) -> &TrainingMetadata {
        &self.metadata
    }

    pub fn evaluation(&self) -> &EvaluationReport {
        &self.evaluation
    }

    /// Persist to an explicit path (all-or-nothing)
    pub fn save_to(&self, path: &Path) -> Result<()> {
        write_bundle(path, self)
    }

    /// Load from an explicit path, verifying version and checksum
    pub fn load_from(path: &Path) -> Result<Self> {
        read_bundle(path)
    }
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    format_version: u32,
    checksum: u64,
    payload: serde_json::Value,
}

fn write_bundle(path: &Path, artifact: &ModelArtifact) -> Result<()> {
    // serde_json's number parser is not a bit-exact inverse of its printer, so
    // a value's serialized bytes can change after one JSON round trip. The
    // reader only ever sees the payload post-parse, so checksum it in that same
    // normalized form — otherwise the integrity check rejects valid bundles.
    let payload: serde_json::Value =
        serde_json::from_slice(&serde_json::to_vec(&serde_json::to_value(artifact)?)?)?;
    let checksum = xxh3_64(&serde_json::to_vec(&payload)?);
    let envelope = Envelope {
        format_version: ARTIFACT_FORMAT_VERSION,
        checksum,
        payload,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Write next to the destination, then rename: readers see either the
    // old bundle or the new one, never a torn write
    let tmp = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    std::fs::write(&tmp, serde_json::to_string_pretty(&envelope)?)?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        TransitError::Io(e)
    })?;

    Ok(())
}

fn read_bundle(path: &Path) -> Result<ModelArtifact> {
    let raw = std::fs::read_to_string(path)?;
    let envelope: Envelope = serde_json::from_str(&raw)
        .map_err(|e| TransitError::CorruptArtifact(format!("invalid bundle JSON: {e}")))?;

    if envelope.format_version != ARTIFACT_FORMAT_VERSION {
        return Err(TransitError::CorruptArtifact(format!(
            "format version {} (expected {})",
            envelope.format_version, ARTIFACT_FORMAT_VERSION
        )));
    }

    let payload_bytes = serde_json::to_vec(&envelope.payload)
        .map_err(|e| TransitError::CorruptArtifact(e.to_string()))?;
    let checksum = xxh3_64(&payload_bytes);
    if checksum != envelope.checksum {
        return Err(TransitError::CorruptArtifact(format!(
            "checksum mismatch: stored {:#x}, computed {:#x}",
            envelope.checksum, checksum
        )));
    }

    serde_json::from_value(envelope.payload)
        .map_err(|e| TransitError::CorruptArtifact(format!("payload does not decode: {e}")))
}

/// Directory-backed artifact store
pub struct ArtifactStore {
    dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Persist an artifact and return its storage key
    pub fn save(&self, artifact: &ModelArtifact) -> Result<String> {
        let key = format!("model-{}.json", &uuid::Uuid::new_v4().simple().to_string()[..8]);
        write_bundle(&self.path_for(&key), artifact)?;
        Ok(key)
    }

    /// Load an artifact by storage key
    pub fn load(&self, key: &str) -> Result<ModelArtifact> {
        read_bundle(&self.path_for(key))
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(key)
    }
}
