//! Error types for initd-server

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use thiserror::Error;

use crate::api::response::ApiResponse;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// System configuration has not been loaded yet (503)
    #[error("System config not initialized")]
    NotInitialized,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::NotInitialized => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = Json(ApiResponse::<()>::error(status, self.to_string()));
        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
