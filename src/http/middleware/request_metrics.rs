//! Request counting and the `request_completed` event.
//!
//! The counter increment and the log event are tied to the response body, not
//! to the handler's return: they run once the body has been fully produced,
//! and never if the body is dropped part way (client went away).

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Instant;

use axum::{
    body::{Body, Bytes},
    extract::{MatchedPath, Request, State},
    http::Method,
    middleware::Next,
    response::Response,
};
use http_body::{Body as _, Frame, SizeHint};

use crate::config::MetricsConfig;
use crate::observability::metrics::{MetricsError, MetricsRegistry, HTTP_REQUESTS_TOTAL};

/// Route label used for unmatched requests when bucketing is enabled.
pub const UNMATCHED_ROUTE: &str = "<unmatched>";

/// Label names of [`HTTP_REQUESTS_TOTAL`], in order.
pub const REQUEST_LABELS: [&str; 3] = ["method", "route", "status"];

/// Shared state of the request metrics middleware.
#[derive(Clone)]
pub struct RequestMetrics {
    registry: Arc<MetricsRegistry>,
    bucket_unmatched: bool,
}

/// Outcome of one request, as recorded on completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedRequest {
    pub method: String,
    pub route: String,
    pub status: u16,
    pub duration_ms: u64,
}

impl RequestMetrics {
    /// Declare the request counter on `registry`.
    pub fn new(registry: Arc<MetricsRegistry>, config: &MetricsConfig) -> Result<Self, MetricsError> {
        registry.register_counter(HTTP_REQUESTS_TOTAL, "Total HTTP requests", &REQUEST_LABELS)?;
        Ok(Self {
            registry,
            bucket_unmatched: config.bucket_unmatched_routes,
        })
    }

    pub fn registry(&self) -> &Arc<MetricsRegistry> {
        &self.registry
    }

    /// Matched route pattern, or the raw path (or a constant) when nothing matched.
    pub fn route_label(&self, request: &Request) -> String {
        match request.extensions().get::<MatchedPath>() {
            Some(matched) => matched.as_str().to_string(),
            None if self.bucket_unmatched => UNMATCHED_ROUTE.to_string(),
            None => request.uri().path().to_string(),
        }
    }

    /// Count the request, then log it. Metric first, log second.
    pub fn record(&self, completed: &CompletedRequest) {
        let status = completed.status.to_string();
        if let Err(e) = self.registry.increment(
            HTTP_REQUESTS_TOTAL,
            &[&completed.method, &completed.route, &status],
        ) {
            tracing::warn!(error = %e, "Failed to record request metric");
        }

        tracing::info!(
            method = %completed.method,
            route = %completed.route,
            status = completed.status,
            duration_ms = completed.duration_ms,
            "request_completed"
        );
    }
}

/// Middleware function recording every completed request.
pub async fn track_requests(
    State(metrics): State<RequestMetrics>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let is_head = request.method() == Method::HEAD;
    let method = request.method().to_string();
    let route = metrics.route_label(&request);

    let response = next.run(request).await;
    let status = response.status().as_u16();

    let finish = move || {
        metrics.record(&CompletedRequest {
            method,
            route,
            status,
            duration_ms: u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
        });
    };

    // HEAD bodies are discarded by the router without being polled.
    if is_head {
        finish();
        return response;
    }

    response.map(|body| Body::new(CompletionBody::new(body, finish)))
}

/// Response body that runs a hook once the inner body is exhausted.
///
/// The hook runs at most once: when the inner body yields end-of-stream, or on
/// drop if the inner body already reports end-of-stream. A body that errors or
/// is dropped early never runs it.
pub struct CompletionBody {
    inner: Body,
    on_complete: Option<Box<dyn FnOnce() + Send>>,
}

impl CompletionBody {
    pub fn new<F>(inner: Body, on_complete: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            inner,
            on_complete: Some(Box::new(on_complete)),
        }
    }

    fn complete(&mut self) {
        if let Some(hook) = self.on_complete.take() {
            hook();
        }
    }
}

impl http_body::Body for CompletionBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Self::Data>, Self::Error>>> {
        let this = self.get_mut();
        let polled = Pin::new(&mut this.inner).poll_frame(cx);

        match &polled {
            Poll::Ready(None) => this.complete(),
            Poll::Ready(Some(Err(_))) => this.on_complete = None,
            _ => {}
        }

        polled
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for CompletionBody {
    fn drop(&mut self) {
        if self.inner.is_end_stream() {
            self.complete();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_hook() -> (Arc<AtomicUsize>, impl FnOnce() + Send + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let hook_calls = calls.clone();
        (calls, move || {
            hook_calls.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[tokio::test]
    async fn test_hook_runs_once_after_full_read() {
        let (calls, hook) = counting_hook();
        let body = CompletionBody::new(Body::from("hello"), hook);

        let bytes = axum::body::to_bytes(Body::new(body), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"hello");
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hook_runs_for_empty_body_on_drop() {
        let (calls, hook) = counting_hook();
        drop(CompletionBody::new(Body::empty(), hook));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_hook_skipped_when_dropped_mid_stream() {
        use futures_util::StreamExt;

        let (calls, hook) = counting_hook();
        let chunks = futures_util::stream::iter(vec![
            Ok::<_, std::io::Error>(Bytes::from_static(b"a")),
            Ok(Bytes::from_static(b"b")),
        ]);
        let body = Body::new(CompletionBody::new(Body::from_stream(chunks), hook));

        let mut stream = body.into_data_stream();
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b"a");
        drop(stream);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_hook_skipped_on_body_error() {
        let (calls, hook) = counting_hook();
        let chunks = futures_util::stream::iter(vec![Err::<Bytes, _>(std::io::Error::other(
            "connection reset",
        ))]);
        let body = Body::new(CompletionBody::new(Body::from_stream(chunks), hook));

        assert!(axum::body::to_bytes(body, usize::MAX).await.is_err());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_route_label_for_unmatched() {
        let request = Request::builder()
            .uri("/nowhere/123")
            .body(Body::empty())
            .unwrap();

        let raw = RequestMetrics::new(
            Arc::new(MetricsRegistry::new(false).unwrap()),
            &MetricsConfig::default(),
        )
        .unwrap();
        assert_eq!(raw.route_label(&request), "/nowhere/123");

        let bucketed = RequestMetrics::new(
            Arc::new(MetricsRegistry::new(false).unwrap()),
            &MetricsConfig {
                bucket_unmatched_routes: true,
                ..MetricsConfig::default()
            },
        )
        .unwrap();
        assert_eq!(bucketed.route_label(&request), UNMATCHED_ROUTE);
    }
}
