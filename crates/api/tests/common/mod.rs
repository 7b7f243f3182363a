#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::header::{AUTHORIZATION, CONTENT_TYPE};
use axum::http::{HeaderName, Method, Request, Response, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use tower::ServiceExt;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use estudio_api::config::ServerConfig;
use estudio_api::routes;
use estudio_api::state::AppState;
use estudio_db::MemoryJobStore;
use estudio_encoder::{Encoder, SimulatedEncoder};
use estudio_events::ProgressBus;
use estudio_pipeline::{PipelineConfig, RenderPipeline};
use tokio_util::sync::CancellationToken;

/// Build a test `ServerConfig` with safe defaults.
pub fn test_config() -> ServerConfig {
    ServerConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
        cors_origins: vec!["http://localhost:5173".to_string()],
        request_timeout_secs: 30,
    }
}

/// Pipeline configuration paced for tests: fast polling, a fixed worker
/// count, and the autoscaler effectively parked.
pub fn pipeline_config(workers: usize) -> PipelineConfig {
    PipelineConfig {
        min_workers: workers,
        max_workers: workers,
        cancel_grace_period: Duration::from_millis(500),
        claim_poll_interval: Duration::from_millis(10),
        cancel_poll_interval: Duration::from_millis(10),
        autoscale_interval: Duration::from_secs(60),
        ..PipelineConfig::default()
    }
}

/// Build the full application router with all middleware layers, backed by
/// the in-memory store and the given encoder.
///
/// Mirrors the router construction in `main.rs` so integration tests
/// exercise the same middleware stack (CORS, request ID, timeout, tracing,
/// panic recovery) that production uses. When `start` is false the worker
/// pool is never spawned, so submitted jobs stay queued.
pub fn build_app_with(
    encoder: Arc<dyn Encoder>,
    config: PipelineConfig,
    start: bool,
) -> (Router, Arc<RenderPipeline>) {
    let bus = Arc::new(ProgressBus::new(config.progress_buffer_size));
    let store = Arc::new(MemoryJobStore::new(Arc::clone(&bus)));
    let pipeline = Arc::new(RenderPipeline::new(store, bus, encoder, config));

    if start {
        // The token's clones live in the spawned tasks; they stop when the
        // test runtime is torn down.
        pipeline.start(&CancellationToken::new());
    }

    let state = AppState {
        pipeline: Arc::clone(&pipeline),
        config: Arc::new(test_config()),
    };

    let cors = CorsLayer::new()
        .allow_origin(["http://localhost:5173".parse().unwrap()])
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true)
        .max_age(Duration::from_secs(3600));

    let request_id_header = HeaderName::from_static("x-request-id");

    let router = Router::new()
        .merge(routes::health::router())
        .nest("/api/v1", routes::api_routes())
        .layer(CatchPanicLayer::new())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(30),
        ))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
        .layer(cors)
        .with_state(state);

    (router, pipeline)
}

/// Default test app: two workers, encoder paced to finish jobs in a few
/// milliseconds.
pub fn build_test_app() -> (Router, Arc<RenderPipeline>) {
    build_app_with(
        Arc::new(SimulatedEncoder::instant()),
        pipeline_config(2),
        true,
    )
}

pub async fn get(app: &Router, path: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method(Method::GET)
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn post_json(app: &Router, path: &str, body: serde_json::Value) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method(Method::POST)
                .uri(path)
                .header(CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap()
}

pub async fn delete(app: &Router, path: &str) -> Response<Body> {
    app.clone()
        .oneshot(
            Request::builder()
                .method(Method::DELETE)
                .uri(path)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap()
}

/// Collect a response body and parse it as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// Collect a response body as text (for SSE streams, which only end once
/// the job stream closes).
pub async fn body_text(response: Response<Body>) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// A valid render submission body.
pub fn submit_body() -> serde_json::Value {
    serde_json::json!({
        "project_id": "proj-1",
        "user_id": "user-1",
        "options": {
            "resolution": "1080p",
            "fps": 30,
            "quality": "high",
            "format": "mp4",
            "codec": "h264"
        }
    })
}

/// Poll a job's status until the predicate holds, failing after `within`.
pub async fn wait_for_job(
    app: &Router,
    id: &str,
    within: Duration,
    predicate: impl Fn(&serde_json::Value) -> bool,
) -> serde_json::Value {
    tokio::time::timeout(within, async {
        loop {
            let response = get(app, &format!("/api/v1/render/{id}")).await;
            assert_eq!(response.status(), StatusCode::OK);
            let json = body_json(response).await;
            if predicate(&json["data"]) {
                return json["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("job did not reach the expected state in time")
}

pub fn is_terminal(job: &serde_json::Value) -> bool {
    matches!(
        job["status"].as_str(),
        Some("completed") | Some("failed") | Some("cancelled")
    )
}
