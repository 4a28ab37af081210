//! Request spans with W3C trace-context propagation.
//!
//! One span per request, opened before anything else in the pipeline runs and
//! closed when the response body is finished. An incoming `traceparent` header
//! becomes the span's remote parent.

use std::time::Duration;

use axum::extract::MatchedPath;
use axum::http::{Request, Response};
use tower_http::trace::{MakeSpan, OnResponse};
use tracing::Span;
use tracing_opentelemetry::OpenTelemetrySpanExt;

use crate::observability::tracing::extract_context;

/// Opens the `http_request` span.
#[derive(Debug, Clone, Copy, Default)]
pub struct RequestSpan;

impl<B> MakeSpan<B> for RequestSpan {
    fn make_span(&mut self, request: &Request<B>) -> Span {
        let path = request.uri().path();
        let route = request
            .extensions()
            .get::<MatchedPath>()
            .map(MatchedPath::as_str)
            .unwrap_or(path);

        let span = tracing::info_span!(
            "http_request",
            otel.name = %format!("{} {}", request.method(), route),
            otel.kind = "server",
            otel.status_code = tracing::field::Empty,
            http.request.method = %request.method(),
            http.route = %route,
            url.path = %path,
            http.response.status_code = tracing::field::Empty,
        );
        span.set_parent(extract_context(request.headers()));
        span
    }
}

/// Attaches the response status to the request span.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecordStatus;

impl<B> OnResponse<B> for RecordStatus {
    fn on_response(self, response: &Response<B>, _latency: Duration, span: &Span) {
        let status = response.status();
        span.record("http.response.status_code", status.as_u16());
        if status.is_server_error() {
            span.record("otel.status_code", "ERROR");
        }
    }
}
