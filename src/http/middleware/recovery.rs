//! Panic recovery.

use std::any::Any;

use axum::response::{IntoResponse, Response};

use crate::http::response::ApiError;

/// Turn a handler panic into a 500 so the request still completes normally.
pub fn panic_response(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = if let Some(s) = panic.downcast_ref::<String>() {
        s.as_str()
    } else if let Some(s) = panic.downcast_ref::<&str>() {
        s
    } else {
        "unknown panic payload"
    };

    tracing::error!(panic = %detail, "Handler panicked");
    ApiError::Internal.into_response()
}
