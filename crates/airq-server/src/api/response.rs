//! API response types
//!
//! Every successful JSON body uses the same envelope:
//! `{ "success": true, "message"?: ..., "data": ..., "meta"?: ... }`.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

/// Standard success response wrapper
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub data: T,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<serde_json::Value>,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new success response
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data,
            meta: None,
        }
    }

    /// Create a success response with metadata
    pub fn success_with_meta(data: T, meta: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            data,
            meta: Some(meta),
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    /// Respond with a status other than 200
    pub fn with_status(self, status: StatusCode) -> Response {
        (status, Json(self)).into_response()
    }
}

impl<T: Serialize> IntoResponse for ApiResponse<T> {
    fn into_response(self) -> Response {
        (StatusCode::OK, Json(self)).into_response()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelope_skips_empty_fields() {
        let value = serde_json::to_value(ApiResponse::success(json!({"count": 3}))).unwrap();
        assert_eq!(value, json!({"success": true, "data": {"count": 3}}));
    }

    #[test]
    fn test_envelope_with_message_and_meta() {
        let response = ApiResponse::success_with_meta(vec![1, 2], json!({"dataPoints": 2}))
            .with_message("ok");
        let value = serde_json::to_value(response).unwrap();

        assert_eq!(value["message"], "ok");
        assert_eq!(value["meta"]["dataPoints"], 2);
    }

    #[test]
    fn test_with_status() {
        let response = ApiResponse::success(()).with_status(StatusCode::ACCEPTED);
        assert_eq!(response.status(), StatusCode::ACCEPTED);
    }
}
