//! Route tests for upload and status polling
//!
//! The queue is built without workers, so submitted jobs stay `queued`.

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use std::sync::Arc;

    use axum::{
        body::Body,
        extract::DefaultBodyLimit,
        http::{header, Request, StatusCode},
        Router,
    };
    use serde_json::Value;
    use tower::ServiceExt;

    use crate::features::ingestion::{ingestion_routes, IngestionState};
    use crate::ingest::IngestionOrchestrator;
    use crate::measurements::MemoryMeasurementStore;
    use crate::queue::{JobQueue, MemoryJobStore, QueueConfig};

    const BOUNDARY: &str = "airq-test-boundary";

    fn create_test_router(upload_dir: &std::path::Path) -> (Router, JobQueue) {
        let orchestrator = IngestionOrchestrator::new(Arc::new(MemoryMeasurementStore::new()));
        let queue = JobQueue::new(
            Arc::new(MemoryJobStore::new()),
            orchestrator,
            QueueConfig::default(),
        );
        let state = IngestionState {
            queue: queue.clone(),
            upload_dir: upload_dir.to_path_buf(),
        };
        (ingestion_routes().with_state(state), queue)
    }

    fn multipart_body(field: &str, file_name: &str, content_type: &str, content: &str) -> Body {
        Body::from(format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\n\
             Content-Type: {content_type}\r\n\r\n\
             {content}\r\n\
             --{BOUNDARY}--\r\n"
        ))
    }

    fn upload_request(body: Body) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/")
            .header(header::CONTENT_TYPE, format!("multipart/form-data; boundary={BOUNDARY}"))
            .body(body)
            .unwrap()
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_returns_accepted_with_job_id() {
        let dir = tempfile::tempdir().unwrap();
        let (app, queue) = create_test_router(dir.path());

        let csv = "Date;Time;CO(GT)\n10/03/2004;18.00.00;2,6\n";
        let response = app
            .oneshot(upload_request(multipart_body("file", "AirQualityUCI.csv", "text/csv", csv)))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = json_body(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Data ingestion started");
        assert_eq!(body["data"]["status"], "processing");

        let job_id: uuid::Uuid = body["data"]["jobId"].as_str().unwrap().parse().unwrap();
        assert_eq!(
            body["data"]["trackingUrl"],
            format!("/api/v1/ingest/status/{}", job_id)
        );

        let status = queue.status(job_id).await.unwrap().unwrap();
        assert_eq!(status.original_file_name, "AirQualityUCI.csv");

        // Upload is stored until a worker finishes with it
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_submit_without_file_field() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _queue) = create_test_router(dir.path());

        let response = app
            .oneshot(upload_request(multipart_body("document", "data.csv", "text/csv", "a;b")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(body["error"]["message"], "No file uploaded");
    }

    #[tokio::test]
    async fn test_submit_rejects_non_csv() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _queue) = create_test_router(dir.path());

        let response = app
            .oneshot(upload_request(multipart_body("file", "photo.png", "image/png", "xyz")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["error"]["message"], "Invalid file type. Only CSV files are allowed");
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_submit_rejects_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _queue) = create_test_router(dir.path());

        let response = app
            .oneshot(upload_request(multipart_body("file", "empty.csv", "text/csv", "")))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_oversized_trailing_field_removes_stored_upload() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _queue) = create_test_router(dir.path());
        let app = app.layer(DefaultBodyLimit::max(1024));

        let csv = "Date;Time;CO(GT)\n10/03/2004;18.00.00;2,6\n";
        // the file part arrives whole before the trailing field breaks the limit
        let head = format!(
            "--{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"file\"; filename=\"AirQualityUCI.csv\"\r\n\
             Content-Type: text/csv\r\n\r\n\
             {csv}\r\n\
             --{BOUNDARY}\r\n\
             Content-Disposition: form-data; name=\"notes\"\r\n\r\n"
        );
        let tail = format!("{}\r\n--{BOUNDARY}--\r\n", "x".repeat(4096));
        let body = Body::from_stream(futures::stream::iter([
            Ok::<_, std::io::Error>(head),
            Ok(tail),
        ]));

        let response = app.oneshot(upload_request(body)).await.unwrap();

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        let body = json_body(response).await;
        assert_eq!(body["success"], false);
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_status_of_unknown_job() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _queue) = create_test_router(dir.path());

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/status/{}", uuid::Uuid::new_v4()))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["error"]["message"], "Job not found");
    }

    #[tokio::test]
    async fn test_status_with_malformed_id() {
        let dir = tempfile::tempdir().unwrap();
        let (app, _queue) = create_test_router(dir.path());

        let response = app
            .oneshot(Request::builder().uri("/status/not-a-job").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_status_of_queued_job() {
        let dir = tempfile::tempdir().unwrap();
        let (app, queue) = create_test_router(dir.path());

        let job_id = queue
            .submit(crate::queue::JobData {
                file_path: dir.path().join("upload.csv"),
                original_file_name: "upload.csv".to_string(),
                uploaded_at: chrono::Utc::now(),
                submitted_by: "anonymous".to_string(),
            })
            .await
            .unwrap();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/status/{}", job_id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = json_body(response).await;
        assert_eq!(body["data"]["jobId"], job_id.to_string());
        assert_eq!(body["data"]["state"], "queued");
        assert_eq!(body["data"]["progress"]["percentage"], 0);
    }
}
