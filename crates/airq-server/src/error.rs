//! Server-specific error types

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::features::air_quality::queries::AirQualityQueryError;
use crate::features::ingestion::commands::SubmitIngestionError;
use crate::features::ingestion::queries::GetIngestionStatusError;
use crate::measurements::QueryError;
use crate::queue::QueueError;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    #[error("Internal server error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Database(ref e) => {
                tracing::error!("Database error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "A database error occurred".to_string())
            },
            AppError::NotFound(ref message) => (StatusCode::NOT_FOUND, message.clone()),
            AppError::Validation(ref message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::BadRequest(ref message) => (StatusCode::BAD_REQUEST, message.clone()),
            AppError::PayloadTooLarge(ref message) => {
                (StatusCode::PAYLOAD_TOO_LARGE, message.clone())
            },
            AppError::Unavailable(ref message) => {
                tracing::warn!("Service unavailable: {}", message);
                (StatusCode::SERVICE_UNAVAILABLE, message.clone())
            },
            AppError::Internal(ref message) => {
                tracing::error!("Internal error: {}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, message.clone())
            },
            AppError::Io(ref e) => {
                tracing::error!("IO error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "An IO error occurred".to_string())
            },
            AppError::Queue(ref e) => {
                tracing::error!("Queue error: {:?}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "A job queue error occurred".to_string())
            },
        };

        let body = Json(json!({
            "success": false,
            "error": {
                "message": error_message,
                "status": status.as_u16(),
            }
        }));

        (status, body).into_response()
    }
}

impl From<QueryError> for AppError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Database(e) => AppError::Database(e),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<AirQualityQueryError> for AppError {
    fn from(err: AirQualityQueryError) -> Self {
        match err {
            AirQualityQueryError::Query(e) => e.into(),
            other => AppError::Validation(other.to_string()),
        }
    }
}

impl From<SubmitIngestionError> for AppError {
    fn from(err: SubmitIngestionError) -> Self {
        match err {
            SubmitIngestionError::Queue(e) => AppError::Queue(e),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

impl From<GetIngestionStatusError> for AppError {
    fn from(err: GetIngestionStatusError) -> Self {
        match err {
            GetIngestionStatusError::NotFound => AppError::NotFound(err.to_string()),
            GetIngestionStatusError::Queue(e) => AppError::Queue(e),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        let cases = [
            (AppError::NotFound("Job not found".into()), StatusCode::NOT_FOUND),
            (AppError::BadRequest("No file uploaded".into()), StatusCode::BAD_REQUEST),
            (AppError::PayloadTooLarge("too big".into()), StatusCode::PAYLOAD_TOO_LARGE),
            (AppError::Unavailable("db down".into()), StatusCode::SERVICE_UNAVAILABLE),
        ];

        for (error, expected) in cases {
            assert_eq!(error.into_response().status(), expected);
        }
    }

    #[test]
    fn test_query_error_maps_to_validation() {
        let err: AppError = QueryError::InvalidParameter("ozone".into()).into();
        assert!(matches!(err, AppError::Validation(ref m) if m == "Invalid parameter: ozone"));
    }

    #[test]
    fn test_status_not_found_message() {
        let err: AppError = GetIngestionStatusError::NotFound.into();
        assert!(matches!(err, AppError::NotFound(ref m) if m == "Job not found"));
    }
}
