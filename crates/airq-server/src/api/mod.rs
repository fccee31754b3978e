//! HTTP surface
//!
//! Mounts the feature routers under `/api/v1`, a liveness probe at `/health`,
//! the upload body limit and request tracing.

pub mod response;

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;

use crate::features;
use crate::measurements::MeasurementRepository;
use crate::middleware;
use crate::queue::JobQueue;

/// Process-scoped handles shared by every route
#[derive(Clone)]
pub struct AppState {
    pub queue: JobQueue,
    pub measurements: Arc<dyn MeasurementRepository>,
    pub upload_dir: PathBuf,
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let feature_state = features::FeatureState {
        queue: state.queue.clone(),
        measurements: state.measurements.clone(),
        upload_dir: state.upload_dir.clone(),
    };

    Router::new()
        .route("/health", get(health_check))
        .with_state(state)
        .nest("/api/v1", features::router(feature_state))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(middleware::tracing_layer())
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Response {
    let database = state.measurements.count().await;
    let queue = state.queue.ping().await;

    match (&database, &queue) {
        (Ok(_), Ok(_)) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "database": "connected",
                "queue": "connected",
                "version": env!("CARGO_PKG_VERSION"),
            })),
        )
            .into_response(),
        _ => {
            if let Err(e) = &database {
                tracing::error!("Database health check failed: {:?}", e);
            }
            if let Err(e) = &queue {
                tracing::error!("Job queue health check failed: {:?}", e);
            }

            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unhealthy",
                    "database": if database.is_ok() { "connected" } else { "unavailable" },
                    "queue": if queue.is_ok() { "connected" } else { "unavailable" },
                })),
            )
                .into_response()
        },
    }
}
