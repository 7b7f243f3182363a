//! Handlers for the `/workers` admin surface.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct ScaleRequest {
    pub count: usize,
}

#[derive(Serialize)]
pub struct ScaleResponse {
    /// Effective concurrency bound after clamping to `[min, max]`.
    pub concurrency: usize,
}

/// GET /api/v1/workers/status
pub async fn workers_status(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let status = state.pipeline.worker_status().await?;
    Ok(Json(DataResponse { data: status }))
}

/// POST /api/v1/workers/scale
///
/// Manually set the concurrency bound. Out-of-range values are clamped,
/// never rejected; the response carries the effective bound.
pub async fn scale_workers(
    State(state): State<AppState>,
    Json(input): Json<ScaleRequest>,
) -> AppResult<impl IntoResponse> {
    let concurrency = state.pipeline.scale(input.count);
    Ok(Json(DataResponse {
        data: ScaleResponse { concurrency },
    }))
}
