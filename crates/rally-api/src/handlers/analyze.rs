//! Video upload handler.

use axum::extract::{Multipart, State};
use axum::Json;
use serde::Serialize;
use tracing::info;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Multipart field carrying the video.
const FILE_FIELD: &str = "file";

#[derive(Debug, Serialize)]
pub struct SubmitResponse {
    pub job_id: String,
    pub status: &'static str,
}

/// Accept an uploaded video and queue it for analysis.
pub async fn analyze(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<Json<SubmitResponse>> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::bad_request(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().unwrap_or("upload").to_string();
        let job_id = state.orchestrator.submit(Box::pin(field)).await?;
        info!(job_id = %job_id, filename = %filename, "Analysis job submitted");

        return Ok(Json(SubmitResponse {
            job_id: job_id.to_string(),
            status: "pending",
        }));
    }

    Err(ApiError::bad_request("Missing 'file' field"))
}
