//! Integration tests for the `/workers` admin surface.

mod common;

use std::sync::Arc;

use axum::http::StatusCode;
use common::{body_json, build_app_with, get, post_json};
use estudio_encoder::SimulatedEncoder;
use estudio_pipeline::PipelineConfig;

fn config() -> PipelineConfig {
    PipelineConfig {
        min_workers: 1,
        max_workers: 4,
        ..common::pipeline_config(1)
    }
}

#[tokio::test]
async fn status_reports_the_pool_snapshot() {
    let (app, _pipeline) =
        build_app_with(Arc::new(SimulatedEncoder::instant()), config(), true);

    let response = get(&app, "/api/v1/workers/status").await;
    assert_eq!(response.status(), StatusCode::OK);

    let status = body_json(response).await["data"].clone();
    assert_eq!(status["running"], true);
    assert_eq!(status["concurrency"], 1);
    assert_eq!(status["busy"], 0);
    assert_eq!(status["min"], 1);
    assert_eq!(status["max"], 4);
    assert_eq!(status["queue_depth"], 0);
}

#[tokio::test]
async fn scale_clamps_to_the_configured_range() {
    let (app, _pipeline) =
        build_app_with(Arc::new(SimulatedEncoder::instant()), config(), true);

    let response = post_json(&app, "/api/v1/workers/scale", serde_json::json!({"count": 99})).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["concurrency"], 4);

    let response = post_json(&app, "/api/v1/workers/scale", serde_json::json!({"count": 0})).await;
    assert_eq!(body_json(response).await["data"]["concurrency"], 1);

    let response = post_json(&app, "/api/v1/workers/scale", serde_json::json!({"count": 3})).await;
    assert_eq!(body_json(response).await["data"]["concurrency"], 3);

    // The status endpoint reports the adjusted bound.
    let response = get(&app, "/api/v1/workers/status").await;
    assert_eq!(body_json(response).await["data"]["concurrency"], 3);
}
