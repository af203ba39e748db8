//! Application state.

use std::path::PathBuf;
use std::sync::Arc;

use rally_media::ModelContext;
use rally_worker::JobOrchestrator;

use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub orchestrator: Arc<JobOrchestrator>,
    pub models: Arc<ModelContext>,
}

impl AppState {
    pub fn new(config: ApiConfig, orchestrator: JobOrchestrator, models: Arc<ModelContext>) -> Self {
        Self {
            config,
            orchestrator: Arc::new(orchestrator),
            models,
        }
    }

    /// Directory served under `/outputs`.
    pub fn output_dir(&self) -> PathBuf {
        self.orchestrator.config().output_dir.clone()
    }
}
