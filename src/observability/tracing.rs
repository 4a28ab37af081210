//! Distributed tracing support.
//!
//! # Responsibilities
//! - Export `tracing` spans to an OTLP/HTTP collector
//! - Extract W3C trace context from incoming requests
//! - Flush pending spans at process exit
//!
//! # Design Decisions
//! - Batch export on the Tokio runtime; request handling never waits on the collector
//! - Startup failure is reported to the caller, who may run without tracing
//! - Shutdown flushes on a blocking thread and is bounded by a timeout

use std::time::Duration;

use axum::http::HeaderMap;
use opentelemetry::propagation::{Extractor, TextMapPropagator};
use opentelemetry::trace::{TraceError, TracerProvider as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Config, Tracer, TracerProvider};
use opentelemetry_sdk::{runtime, Resource};
use thiserror::Error;
use tracing::Subscriber;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

use crate::config::TracingConfig;

/// Instrumentation scope name reported with every span.
const TRACER_NAME: &str = "user-service";

/// Per-request timeout of the exporter's HTTP client.
const EXPORT_TIMEOUT: Duration = Duration::from_secs(10);

/// Errors from the trace provider lifecycle.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The exporter or provider could not be built.
    #[error("failed to start trace export: {0}")]
    Init(#[source] TraceError),

    /// Pending spans could not be exported during shutdown.
    #[error("failed to flush pending spans: {0}")]
    Flush(#[source] TraceError),

    /// The flush did not settle in time.
    #[error("trace shutdown did not finish within {0:?}")]
    Timeout(Duration),

    /// The blocking flush task panicked or was cancelled.
    #[error("trace shutdown task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Process-wide span exporter.
///
/// Owned by the entry point; consumed by [`TraceProvider::shutdown`].
pub struct TraceProvider {
    provider: TracerProvider,
    tracer: Tracer,
}

impl TraceProvider {
    /// Build the OTLP exporter and batch processor.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(config: &TracingConfig) -> Result<Self, TelemetryError> {
        let exporter = opentelemetry_otlp::new_exporter()
            .http()
            .with_endpoint(config.collector_endpoint.clone())
            .with_timeout(EXPORT_TIMEOUT)
            .build_span_exporter()
            .map_err(TelemetryError::Init)?;

        let resource = Resource::new([KeyValue::new(
            "service.name",
            config.service_name.clone(),
        )]);

        let provider = TracerProvider::builder()
            .with_batch_exporter(exporter, runtime::Tokio)
            .with_config(Config::default().with_resource(resource))
            .build();
        let tracer = provider.tracer(TRACER_NAME);

        Ok(Self { provider, tracer })
    }

    /// Layer turning `tracing` spans into exported spans.
    pub fn layer<S>(&self) -> OpenTelemetryLayer<S, Tracer>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        tracing_opentelemetry::layer().with_tracer(self.tracer.clone())
    }

    /// Flush pending spans and release the exporter.
    ///
    /// Waits at most `timeout` for the flush to settle.
    pub async fn shutdown(self, timeout: Duration) -> Result<(), TelemetryError> {
        let provider = self.provider;
        drop(self.tracer);

        let flush = tokio::task::spawn_blocking(move || {
            let results = provider.force_flush();
            drop(provider);
            results.into_iter().collect::<Result<Vec<()>, TraceError>>()
        });

        match tokio::time::timeout(timeout, flush).await {
            Ok(joined) => joined?.map(|_| ()).map_err(TelemetryError::Flush),
            Err(_) => Err(TelemetryError::Timeout(timeout)),
        }
    }
}

/// Parent context carried by `traceparent`/`tracestate` headers.
///
/// Returns an empty context when the headers are absent or malformed.
pub fn extract_context(headers: &HeaderMap) -> Context {
    TraceContextPropagator::new().extract(&HeaderExtractor(headers))
}

struct HeaderExtractor<'a>(&'a HeaderMap);

impl Extractor for HeaderExtractor<'_> {
    fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|value| value.to_str().ok())
    }

    fn keys(&self) -> Vec<&str> {
        self.0.keys().map(|name| name.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use opentelemetry::trace::{TraceContextExt, TraceId};

    #[test]
    fn test_extract_traceparent() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "traceparent",
            HeaderValue::from_static("00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"),
        );

        let cx = extract_context(&headers);
        let span = cx.span();
        let span_context = span.span_context();
        assert!(span_context.is_valid());
        assert!(span_context.is_remote());
        assert_eq!(
            span_context.trace_id(),
            TraceId::from_hex("4bf92f3577b34da6a3ce929d0e0e4736").unwrap()
        );
    }

    #[test]
    fn test_extract_without_headers_is_empty() {
        let cx = extract_context(&HeaderMap::new());
        assert!(!cx.span().span_context().is_valid());

        let mut headers = HeaderMap::new();
        headers.insert("traceparent", HeaderValue::from_static("garbage"));
        assert!(!extract_context(&headers).span().span_context().is_valid());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_start_and_shutdown_without_spans() {
        let config = TracingConfig {
            enabled: true,
            collector_endpoint: "http://127.0.0.1:4318".to_string(),
            service_name: "user-service-test".to_string(),
        };

        let provider = TraceProvider::start(&config).unwrap();
        let result = provider.shutdown(Duration::from_secs(5)).await;
        assert!(result.is_ok(), "unexpected shutdown error: {:?}", result.err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_shutdown_reports_failed_export() {
        use tracing_subscriber::layer::SubscriberExt;

        let config = TracingConfig {
            enabled: true,
            collector_endpoint: "http://127.0.0.1:1".to_string(),
            service_name: "user-service-test".to_string(),
        };
        let provider = TraceProvider::start(&config).unwrap();

        let subscriber = tracing_subscriber::registry().with(provider.layer());
        tracing::subscriber::with_default(subscriber, || {
            tracing::info_span!("http_request").in_scope(|| {});
        });

        let result = provider.shutdown(Duration::from_secs(5)).await;
        assert!(
            matches!(result, Err(TelemetryError::Flush(_))),
            "unexpected shutdown result: {:?}",
            result
        );
    }
}
