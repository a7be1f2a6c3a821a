//! Application state management

use crate::artifact::ArtifactStore;
use crate::inference::InferenceService;

use super::ServerConfig;

/// State shared across handlers. The inference service owns the swappable
/// artifact slot; handlers never hold a model of their own.
pub struct AppState {
    pub config: ServerConfig,
    pub service: InferenceService,
    pub store: ArtifactStore,
}

impl AppState {
    pub fn new(config: ServerConfig) -> Self {
        let store = ArtifactStore::new(&config.models_dir);
        Self {
            config,
            service: InferenceService::new(),
            store,
        }
    }
}
