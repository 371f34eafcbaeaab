//! API Error Handling

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use livepoll_core::PollError;
use serde_json::json;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Storage failure")]
    StorageFailure,

    #[error("Aggregation failure")]
    AggregationFailure,
}

impl From<PollError> for ApiError {
    fn from(e: PollError) -> Self {
        match e {
            PollError::InvalidArgument(msg) => ApiError::BadRequest(msg),
            PollError::NotFound(_) => ApiError::NotFound("Poll not found".to_string()),
            PollError::Forbidden(msg) => ApiError::Forbidden(msg),
            // Internal detail is logged, never returned
            PollError::Storage(source) => {
                tracing::error!(error = %source, "storage_failure");
                ApiError::StorageFailure
            }
            PollError::Aggregation(source) => {
                tracing::error!(error = %source, "aggregation_failure");
                ApiError::AggregationFailure
            }
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("Invalid request body: {}", rejection.body_text()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_type, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "invalid_argument", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "already_voted", msg),
            ApiError::StorageFailure => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_failure",
                "The vote store is unavailable".to_string(),
            ),
            ApiError::AggregationFailure => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "aggregation_failure",
                "Failed to fetch votes".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_type,
            "message": message,
        }));

        (status, body).into_response()
    }
}
