//! API error responses.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::application::services::{RETRIEVAL_FAILURE_MESSAGE, RetrievalError};

/// Message for a request missing any of the four query parameters.
pub const MISSING_PARAMS_MESSAGE: &str = "Symbol, period, start, and end parameters are required";

/// Message for unknown routes and unsupported methods.
pub const ROUTE_NOT_FOUND_MESSAGE: &str = "Route not found!";

/// Error body: `{"status": false, "message": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Always `false`.
    pub status: bool,
    /// Human-readable message.
    pub message: String,
}

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad query parameters.
    #[error("{0}")]
    Validation(&'static str),

    /// The series could not be produced.
    #[error(transparent)]
    Retrieval(#[from] RetrievalError),

    /// No route matched.
    #[error("Route not found!")]
    NotFound,
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Retrieval(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::NotFound => StatusCode::NOT_FOUND,
        }
    }

    /// Message placed in the response body.
    #[must_use]
    pub const fn message(&self) -> &'static str {
        match self {
            Self::Validation(message) => *message,
            Self::Retrieval(_) => RETRIEVAL_FAILURE_MESSAGE,
            Self::NotFound => ROUTE_NOT_FOUND_MESSAGE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let body = ErrorBody {
            status: false,
            message: self.message().to_string(),
        };
        (self.status_code(), Json(body)).into_response()
    }
}
