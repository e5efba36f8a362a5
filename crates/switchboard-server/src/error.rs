//! Unified error handling for the API

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;

use switchboard_core::Error;

/// API error response body
#[derive(Serialize)]
pub struct ApiError {
    pub error: String,
    pub code: String,
}

/// Application error types
#[derive(Debug)]
pub enum AppError {
    Unauthorized(String),
    NotFound(String),
    BadRequest(String),
    /// The completion engine failed the turn
    Engine(String),
    Unavailable(String),
    Internal(String),
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Engine(_) => StatusCode::BAD_GATEWAY,
            AppError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (code, message) = match self {
            AppError::Unauthorized(msg) => ("UNAUTHORIZED", msg),
            AppError::NotFound(msg) => ("NOT_FOUND", msg),
            AppError::BadRequest(msg) => ("BAD_REQUEST", msg),
            AppError::Engine(msg) => ("ENGINE_ERROR", msg),
            AppError::Unavailable(msg) => ("UNAVAILABLE", msg),
            AppError::Internal(msg) => ("INTERNAL_ERROR", msg),
        };

        (
            status,
            Json(ApiError {
                error: message,
                code: code.to_string(),
            }),
        )
            .into_response()
    }
}

impl From<Error> for AppError {
    fn from(err: Error) -> Self {
        match err {
            Error::Unauthorized => AppError::Unauthorized(err.to_string()),
            Error::SessionNotFound(_) => AppError::NotFound(err.to_string()),
            e if e.is_engine_failure() => {
                tracing::error!("Turn failed: {}", e);
                AppError::Engine(e.to_string())
            }
            e => {
                tracing::error!("Internal error: {:?}", e);
                AppError::Internal(e.to_string())
            }
        }
    }
}
