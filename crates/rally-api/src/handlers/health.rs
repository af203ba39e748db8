//! Health check handlers.

use axum::extract::State;
use axum::Json;
use rally_media::ModelHealth;
use serde::Serialize;

use crate::state::AppState;

#[derive(Serialize)]
pub struct RootResponse {
    pub message: &'static str,
    pub status: &'static str,
}

/// Service banner.
pub async fn root() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Rally Vision API is running",
        status: "healthy",
    })
}

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub models: ModelHealth,
}

/// Health check endpoint, reporting which model handles are loaded.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        models: state.models.health(),
    })
}
