//! Common error types for the generation queue

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application-wide error type
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    /// Width or height is not a positive multiple of 8
    #[error("Invalid dimensions: {0}")]
    Dimension(String),

    /// The generator ran but produced no images
    #[error("Model failed: {0}")]
    ModelFailed(String),

    #[error("Generation was interrupted")]
    Interrupted,

    #[error("Job queue is full ({0} jobs pending)")]
    QueueFull(usize),

    #[error("No generator configured for backend: {0}")]
    BackendNotFound(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Backend error: {0}")]
    BackendError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error response body
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub message: String,
    pub r#type: String,
    pub code: Option<String>,
}

impl AppError {
    fn classify(&self) -> (StatusCode, &'static str, Option<&'static str>) {
        match self {
            AppError::Config(_) | AppError::Internal(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "server_error", None)
            }
            AppError::HttpClient(_) | AppError::BackendError(_) => {
                (StatusCode::BAD_GATEWAY, "backend_error", None)
            }
            AppError::Dimension(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("invalid_dimensions")),
            AppError::ModelFailed(_) => (StatusCode::INTERNAL_SERVER_ERROR, "server_error", Some("model_failed")),
            AppError::Interrupted => (StatusCode::CONFLICT, "interrupted", Some("generation_interrupted")),
            AppError::QueueFull(_) => (StatusCode::SERVICE_UNAVAILABLE, "server_error", Some("queue_full")),
            AppError::BackendNotFound(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", Some("backend_not_configured")),
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request_error", None),
        }
    }

    /// HTTP status this error is reported with
    pub fn status_code(&self) -> StatusCode {
        self.classify().0
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, code) = self.classify();

        let body = Json(ErrorResponse {
            error: ErrorDetail {
                message: self.to_string(),
                r#type: error_type.to_string(),
                code: code.map(|c| c.to_string()),
            },
        });

        (status, body).into_response()
    }
}

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
