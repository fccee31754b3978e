//! HTTP round trip: upload a file, poll until the worker finishes, read it back

mod common;

use std::sync::Arc;
use std::time::Duration;

use airq_server::api::{create_router, AppState};
use airq_server::ingest::IngestionOrchestrator;
use airq_server::measurements::MemoryMeasurementStore;
use airq_server::queue::{JobQueue, MemoryJobStore, QueueConfig};
use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use common::{csv, missing_date_row, valid_row};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "airq-http-boundary";

fn upload_request(content: &str) -> Request<Body> {
    let body = format!(
        "--{BOUNDARY}\r\n\
         Content-Disposition: form-data; name=\"file\"; filename=\"AirQualityUCI.csv\"\r\n\
         Content-Type: text/csv\r\n\r\n\
         {content}\r\n\
         --{BOUNDARY}--\r\n"
    );
    Request::builder()
        .method("POST")
        .uri("/api/v1/ingest")
        .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
        .body(Body::from(body))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn app(upload_dir: &std::path::Path, max_upload_bytes: usize) -> (Router, JobQueue) {
    let measurements = Arc::new(MemoryMeasurementStore::new());
    let queue = JobQueue::new(
        Arc::new(MemoryJobStore::new()),
        IngestionOrchestrator::new(measurements.clone()),
        QueueConfig {
            poll_interval: Duration::from_millis(10),
            backoff_base: Duration::from_millis(10),
            ..QueueConfig::default()
        },
    );
    let state = AppState {
        queue: queue.clone(),
        measurements,
        upload_dir: upload_dir.to_path_buf(),
    };
    (create_router(state, max_upload_bytes), queue)
}

#[tokio::test]
async fn test_upload_then_poll_then_query() {
    let dir = tempfile::tempdir().unwrap();
    let (app, queue) = app(dir.path(), 1024 * 1024);
    let workers = queue.start();

    let rows = (0..30).map(valid_row).chain(std::iter::once(missing_date_row()));
    let response = app
        .clone()
        .oneshot(upload_request(&csv(rows)))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);

    let body = json_body(response).await;
    let tracking_url = body["data"]["trackingUrl"].as_str().unwrap().to_string();

    let status = tokio::time::timeout(Duration::from_secs(10), async {
        loop {
            let response = app.clone().oneshot(get(&tracking_url)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
            let body = json_body(response).await;
            if body["data"]["state"] == "completed" {
                return body["data"].clone();
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .expect("job did not complete");

    assert_eq!(status["result"]["processed"], 30);
    assert_eq!(status["result"]["failed"], 1);
    assert_eq!(status["result"]["errors"][0]["row"], 31);
    assert_eq!(status["progress"]["percentage"], 100);

    let response = app.clone().oneshot(get("/api/v1/air-quality/summary")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["totalMeasurements"], 30);

    let response = app
        .clone()
        .oneshot(get("/api/v1/air-quality/timeseries?parameter=temperature"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["meta"]["dataPoints"], 30);
    assert_eq!(body["meta"]["unit"], "°C");

    let response = app.oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    workers.shutdown().await;
}

#[tokio::test]
async fn test_upload_over_limit_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let (app, _queue) = app(dir.path(), 512);

    let content = csv((0..20).map(valid_row));
    let response = app.oneshot(upload_request(&content)).await.unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
}
