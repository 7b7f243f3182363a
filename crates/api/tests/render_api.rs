//! Integration tests for the `/render` resource: submission, status,
//! cancellation, stats, and the SSE progress stream.

mod common;

use std::sync::Arc;
use std::time::Duration;

use axum::http::StatusCode;
use common::{
    body_json, body_text, build_app_with, build_test_app, delete, get, is_terminal,
    pipeline_config, post_json, submit_body, wait_for_job,
};
use estudio_encoder::SimulatedEncoder;

#[tokio::test]
async fn submit_runs_to_completion() {
    let (app, _pipeline) = build_test_app();

    let response = post_json(&app, "/api/v1/render", submit_body()).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let job = &json["data"];
    assert_eq!(job["status"], "queued");
    assert_eq!(job["progress"], 0);
    let id = job["id"].as_str().unwrap().to_string();

    let done = wait_for_job(&app, &id, Duration::from_secs(5), is_terminal).await;
    assert_eq!(done["status"], "completed");
    assert_eq!(done["progress"], 100);
    let output = done["output_location"].as_str().unwrap();
    assert!(!output.is_empty());
    assert!(output.ends_with(".mp4"));
}

#[tokio::test]
async fn incompatible_codec_is_rejected_with_details() {
    let (app, pipeline) = build_test_app();

    let mut body = submit_body();
    body["options"]["format"] = "webm".into(); // webm cannot carry h264

    let response = post_json(&app, "/api/v1/render", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "INVALID_OPTIONS");
    let details = json["details"].as_array().unwrap();
    assert!(!details.is_empty());

    // No job record was created.
    assert_eq!(pipeline.counts().await.unwrap().total(), 0);
}

#[tokio::test]
async fn fps_out_of_range_is_rejected() {
    let (app, _pipeline) = build_test_app();

    let mut body = submit_body();
    body["options"]["fps"] = 500.into();

    let response = post_json(&app, "/api/v1/render", body).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn cancel_before_claim_is_immediate() {
    // Worker pool not started: the job cannot be claimed.
    let (app, _pipeline) = build_app_with(
        Arc::new(SimulatedEncoder::instant()),
        pipeline_config(1),
        false,
    );

    let response = post_json(&app, "/api/v1/render", submit_body()).await;
    let id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    let response = delete(&app, &format!("/api/v1/render/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["accepted"], true);

    let response = get(&app, &format!("/api/v1/render/{id}")).await;
    let job = body_json(response).await["data"].clone();
    assert_eq!(job["status"], "cancelled");
    assert_eq!(job["progress"], 0);
}

#[tokio::test]
async fn cancel_mid_processing_lands_within_the_grace_period() {
    let config = pipeline_config(1);
    let grace = config.cancel_grace_period;
    // Slow enough that the job is still running when we cancel.
    let (app, _pipeline) = build_app_with(
        Arc::new(SimulatedEncoder::new(Duration::from_millis(50))),
        config,
        true,
    );

    let response = post_json(&app, "/api/v1/render", submit_body()).await;
    let id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    wait_for_job(&app, &id, Duration::from_secs(5), |job| {
        job["status"] == "processing"
    })
    .await;

    let response = delete(&app, &format!("/api/v1/render/{id}")).await;
    assert_eq!(body_json(response).await["data"]["accepted"], true);

    let done = wait_for_job(&app, &id, grace + Duration::from_secs(1), is_terminal).await;
    assert_eq!(done["status"], "cancelled");
}

#[tokio::test]
async fn cancel_after_completion_is_not_accepted() {
    let (app, _pipeline) = build_test_app();

    let response = post_json(&app, "/api/v1/render", submit_body()).await;
    let id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    wait_for_job(&app, &id, Duration::from_secs(5), is_terminal).await;

    let response = delete(&app, &format!("/api/v1/render/{id}")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["data"]["accepted"], false);
}

#[tokio::test]
async fn concurrency_never_exceeds_two_workers() {
    let (app, pipeline) = build_app_with(
        Arc::new(SimulatedEncoder::new(Duration::from_millis(5))),
        pipeline_config(2),
        true,
    );

    for _ in 0..7 {
        let response = post_json(&app, "/api/v1/render", submit_body()).await;
        assert_eq!(response.status(), StatusCode::CREATED);
    }

    let deadline = tokio::time::Instant::now() + Duration::from_secs(10);
    loop {
        let counts = pipeline.counts().await.unwrap();
        assert!(
            counts.processing <= 2,
            "bound violated: {} jobs processing",
            counts.processing
        );
        if counts.completed == 7 {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "batch did not drain in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn unknown_id_is_404_for_status_stream_and_cancel() {
    let (app, _pipeline) = build_test_app();
    let id = uuid::Uuid::now_v7();

    for path in [
        format!("/api/v1/render/{id}"),
        format!("/api/v1/render/{id}/stream"),
    ] {
        let response = get(&app, &path).await;
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{path}");
        let json = body_json(response).await;
        assert_eq!(json["code"], "NOT_FOUND");
    }

    let response = delete(&app, &format!("/api/v1/render/{id}")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn stats_reports_counts_by_status() {
    let (app, _pipeline) = build_test_app();

    let response = post_json(&app, "/api/v1/render", submit_body()).await;
    let id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    wait_for_job(&app, &id, Duration::from_secs(5), is_terminal).await;

    let response = get(&app, "/api/v1/render/stats").await;
    assert_eq!(response.status(), StatusCode::OK);
    let counts = body_json(response).await["data"].clone();
    assert_eq!(counts["completed"], 1);
    assert_eq!(counts["queued"], 0);
}

#[tokio::test]
async fn stream_ends_after_exactly_one_terminal_snapshot() {
    let (app, _pipeline) = build_app_with(
        Arc::new(SimulatedEncoder::new(Duration::from_millis(2))),
        pipeline_config(1),
        true,
    );

    let response = post_json(&app, "/api/v1/render", submit_body()).await;
    let id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();

    // The SSE body only completes once the stream closes after the
    // terminal snapshot, so collecting it is itself the EOF assertion.
    let response = get(&app, &format!("/api/v1/render/{id}/stream")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "text/event-stream"
    );
    let body = tokio::time::timeout(Duration::from_secs(5), body_text(response))
        .await
        .expect("stream did not close after the terminal snapshot");

    let snapshots: Vec<serde_json::Value> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|json| serde_json::from_str(json).unwrap())
        .collect();

    assert!(!snapshots.is_empty());
    assert_eq!(snapshots[0]["id"].as_str().unwrap(), id);

    let terminal: Vec<_> = snapshots.iter().filter(|s| is_terminal(s)).collect();
    assert_eq!(terminal.len(), 1, "exactly one terminal snapshot");
    assert_eq!(snapshots.last().unwrap()["status"], "completed");

    // Progress is monotone along the stream.
    let mut last = 0;
    for snapshot in &snapshots {
        let progress = snapshot["progress"].as_u64().unwrap();
        assert!(progress >= last);
        last = progress;
    }
}

#[tokio::test]
async fn stream_on_a_finished_job_yields_one_snapshot() {
    let (app, _pipeline) = build_test_app();

    let response = post_json(&app, "/api/v1/render", submit_body()).await;
    let id = body_json(response).await["data"]["id"]
        .as_str()
        .unwrap()
        .to_string();
    wait_for_job(&app, &id, Duration::from_secs(5), is_terminal).await;

    let response = get(&app, &format!("/api/v1/render/{id}/stream")).await;
    let body = tokio::time::timeout(Duration::from_secs(2), body_text(response))
        .await
        .unwrap();

    let snapshots: Vec<serde_json::Value> = body
        .lines()
        .filter_map(|line| line.strip_prefix("data: "))
        .map(|json| serde_json::from_str(json).unwrap())
        .collect();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0]["status"], "completed");
}
