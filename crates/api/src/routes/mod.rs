pub mod health;
pub mod render;
pub mod workers;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// ```text
/// /render                     submit (POST)
/// /render/stats               counts by status (GET)
/// /render/{id}                status (GET), cancel (DELETE)
/// /render/{id}/stream         progress SSE (GET)
///
/// /workers/status             pool snapshot (GET)
/// /workers/scale              set concurrency bound (POST)
/// ```
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .nest("/render", render::router())
        .nest("/workers", workers::router())
}
