//! Route definitions for the `/render` resource.

use axum::routing::get;
use axum::Router;

use crate::handlers::render;
use crate::state::AppState;

/// Routes mounted at `/render`.
///
/// ```text
/// POST   /                -> submit_render
/// GET    /stats           -> render_stats
/// GET    /{id}            -> get_render
/// DELETE /{id}            -> cancel_render
/// GET    /{id}/stream     -> stream_render (SSE)
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", axum::routing::post(render::submit_render))
        .route("/stats", get(render::render_stats))
        .route(
            "/{id}",
            get(render::get_render).delete(render::cancel_render),
        )
        .route("/{id}/stream", get(render::stream_render))
}
