//! Route definitions for the `/workers` admin surface.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::workers;
use crate::state::AppState;

/// Routes mounted at `/workers`.
///
/// ```text
/// GET  /status  -> workers_status
/// POST /scale   -> scale_workers
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/status", get(workers::workers_status))
        .route("/scale", post(workers::scale_workers))
}
