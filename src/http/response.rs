//! Error responses.
//!
//! # Responsibilities
//! - Map handler errors to HTTP status codes
//! - Render every error as a JSON `{"error": ...}` body
//!
//! # Design Decisions
//! - Handler errors stop at the route boundary; the pipeline only sees a response
//! - Messages are the client-facing text; sources stay in logs

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;

use crate::users::StoreError;

/// Errors a route handler can return.
#[derive(Debug, Error)]
pub enum ApiError {
    /// A required field is missing.
    #[error("name and email required")]
    Validation,

    /// The addressed user does not exist.
    #[error("User not found")]
    NotFound,

    /// The request body is not valid JSON for this route.
    #[error("invalid JSON body")]
    InvalidBody(#[source] serde_json::Error),

    /// No route matched the request.
    #[error("Not found")]
    RouteNotFound,

    /// The handler panicked.
    #[error("Internal server error")]
    Internal,
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Validation | ApiError::InvalidBody(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Validation => ApiError::Validation,
            StoreError::NotFound(_) => ApiError::NotFound,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

/// Fallback for requests no route matched.
pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}
