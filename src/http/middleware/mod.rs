//! Request pipeline.
//!
//! # Layer Order (outermost first)
//! ```text
//! trace.rs            span open (parent from traceparent) ... span close
//!   request id        x-request-id generated / propagated
//!     access_log.rs   one combined-format line per response
//!       request_metrics.rs  counter increment, then request_completed log
//!         cors        permissive CORS (preflights are counted too)
//!           recovery.rs     handler panic → 500
//!             handler
//! ```
//!
//! # Design Decisions
//! - Applied with `Router::layer`, so every route and the fallback get the
//!   full stack and the matched route pattern is visible to each layer
//! - Metrics and the completion log run off the response body's end-of-stream,
//!   so aborted responses record nothing

pub mod access_log;
pub mod recovery;
pub mod request_metrics;
pub mod trace;

use axum::{middleware, Router};
use tower::ServiceBuilder;
use tower_http::{
    catch_panic::CatchPanicLayer,
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

pub use access_log::access_log;
pub use request_metrics::{track_requests, CompletedRequest, CompletionBody, RequestMetrics};
pub use trace::{RecordStatus, RequestSpan};

/// Wrap every route of `router` in the observability pipeline.
pub fn apply_pipeline(router: Router, metrics: RequestMetrics) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(
                TraceLayer::new_for_http()
                    .make_span_with(RequestSpan)
                    .on_request(())
                    .on_response(RecordStatus)
                    .on_failure(()),
            )
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(middleware::from_fn(access_log))
            .layer(middleware::from_fn_with_state(metrics, track_requests))
            .layer(CorsLayer::permissive())
            .layer(CatchPanicLayer::custom(recovery::panic_response)),
    )
}
