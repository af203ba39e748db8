//! Job status handler.

use axum::extract::{Path, State};
use axum::Json;
use rally_models::Job;

use crate::error::ApiResult;
use crate::state::AppState;

/// Current state of an analysis job.
pub async fn job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<Job>> {
    let job = state.orchestrator.status(&job_id).await?;
    Ok(Json(job))
}
