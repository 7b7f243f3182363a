//! Handlers for the `/render` resource.

use std::convert::Infallible;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::Json;
use estudio_core::JobId;
use estudio_pipeline::SubmitRender;
use futures::StreamExt;
use serde::Serialize;

use crate::error::AppResult;
use crate::response::DataResponse;
use crate::state::AppState;

/// Body of a cancellation response.
#[derive(Serialize)]
pub struct CancelResponse {
    /// Whether the request was accepted. `false` means the job had already
    /// reached a terminal state; cancellation is best-effort either way.
    pub accepted: bool,
}

/// POST /api/v1/render
///
/// Validate the options and enqueue a render job. Returns 201 with the
/// created job, or 400 with the full list of validation problems.
pub async fn submit_render(
    State(state): State<AppState>,
    Json(input): Json<SubmitRender>,
) -> AppResult<impl IntoResponse> {
    let job = state.pipeline.submit(input).await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: job })))
}

/// GET /api/v1/render/{id}
///
/// Current snapshot of a render job.
pub async fn get_render(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.pipeline.status(id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// DELETE /api/v1/render/{id}
///
/// Request cooperative cancellation.
pub async fn cancel_render(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let accepted = state.pipeline.cancel(id).await?;
    Ok(Json(DataResponse {
        data: CancelResponse { accepted },
    }))
}

/// GET /api/v1/render/stats
///
/// Per-status job counts.
pub async fn render_stats(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    let counts = state.pipeline.counts().await?;
    Ok(Json(DataResponse { data: counts }))
}

/// GET /api/v1/render/{id}/stream
///
/// Server-sent events: one full job snapshot per event, starting with the
/// current state and ending after the first terminal snapshot. Unknown ids
/// are rejected with 404 before the stream opens.
pub async fn stream_render(
    State(state): State<AppState>,
    Path(id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let snapshots = state.pipeline.subscribe(id).await?;

    let events = snapshots.map(|job| {
        let data = match serde_json::to_string(&job) {
            Ok(json) => json,
            Err(e) => serde_json::json!({ "error": e.to_string() }).to_string(),
        };
        Ok::<Event, Infallible>(Event::default().data(data))
    });

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}
