//! Maps [`panther_core::StoreError`] onto HTTP responses.
use std::any::Any;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use panther_core::StoreError;

/// Request-handling failure surfaced to an API client.
#[derive(Error, Debug)]
pub enum ApiError {
    /// The request body or query parameters were malformed.
    #[error("{0}")]
    BadRequest(String),
    /// The requested resource does not exist.
    #[error("resource not found")]
    NotFound,
    /// The write lost its compare-and-swap race; the client should retry.
    #[error("concurrent conflicting update occurred")]
    Conflict,
    /// A storage failure not meaningful to surface to the client verbatim.
    #[error("database failure")]
    Internal,
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound => ApiError::NotFound,
            StoreError::AlreadyExists | StoreError::Conflict => ApiError::Conflict,
            StoreError::InvalidWatch(msg) => ApiError::BadRequest(msg),
            StoreError::Serde(_) | StoreError::Internal(_) => ApiError::Internal,
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound => StatusCode::NOT_FOUND,
            ApiError::Conflict => StatusCode::CONFLICT,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(ErrorBody { error: self.to_string() })).into_response()
    }
}

/// Converts a caught request-handler panic into a plain 500, never leaking
/// the panic message (which may contain internal paths or state) to clients.
pub fn handle_panic(_err: Box<dyn Any + Send + 'static>) -> Response {
    tracing::error!("request handler panicked");
    ApiError::Internal.into_response()
}
