use std::sync::Arc;

use estudio_pipeline::RenderPipeline;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything mutable lives behind the pipeline.
#[derive(Clone)]
pub struct AppState {
    /// The render pipeline facade (store, worker pool, autoscaler).
    pub pipeline: Arc<RenderPipeline>,
    /// Server configuration.
    pub config: Arc<ServerConfig>,
}
