//! Startup orchestration.
//!
//! # Order
//! 1. Trace provider (failure is logged once logging is up, then ignored)
//! 2. Structured logger, with the span exporter layer when tracing started
//! 3. Metrics registry and request counter
//! 4. User collection
//!
//! The listener is bound by the caller, last, so traffic only arrives when
//! everything above is ready.

use std::sync::Arc;

use thiserror::Error;
use tracing_subscriber::Layer;

use crate::config::ServiceConfig;
use crate::http::middleware::RequestMetrics;
use crate::http::AppState;
use crate::observability::{logging, MetricsError, MetricsRegistry, TelemetryError, TraceProvider};
use crate::users::UserStore;

/// Fatal startup errors.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to initialize metrics: {0}")]
    Metrics(#[from] MetricsError),
}

/// Everything the entry point owns for the lifetime of the process.
pub struct Services {
    pub state: AppState,
    pub request_metrics: RequestMetrics,
    pub trace_provider: Option<TraceProvider>,
}

/// Initialize subsystems in dependency order.
///
/// Must be called from within a Tokio runtime.
pub fn bootstrap(config: &ServiceConfig) -> Result<Services, StartupError> {
    let attempt = config
        .tracing
        .enabled
        .then(|| TraceProvider::start(&config.tracing));
    let (trace_provider, trace_error) = split_trace_start(attempt);

    let telemetry_layer: Option<logging::RegistryLayer> =
        trace_provider.as_ref().map(|p| p.layer().boxed());
    if let Err(e) = logging::init(&config.logging, telemetry_layer) {
        eprintln!("user-service: logger already initialized: {}", e);
    }

    build_services(config, trace_provider, trace_error)
}

/// Separate a trace start attempt into the provider and the error to report.
///
/// `None` means tracing was disabled and nothing was attempted.
pub fn split_trace_start(
    attempt: Option<Result<TraceProvider, TelemetryError>>,
) -> (Option<TraceProvider>, Option<TelemetryError>) {
    match attempt {
        Some(Ok(provider)) => (Some(provider), None),
        Some(Err(e)) => (None, Some(e)),
        None => (None, None),
    }
}

/// Everything after logging: report tracing, then metrics and users.
pub fn build_services(
    config: &ServiceConfig,
    trace_provider: Option<TraceProvider>,
    trace_error: Option<TelemetryError>,
) -> Result<Services, StartupError> {
    report_tracing(config, trace_provider.is_some(), trace_error);

    let registry = Arc::new(MetricsRegistry::new(config.metrics.process_metrics)?);
    let request_metrics = RequestMetrics::new(registry.clone(), &config.metrics)?;

    let users = if config.users.seed {
        UserStore::seeded()
    } else {
        UserStore::new()
    };
    tracing::info!(users = users.len(), "User collection ready");

    Ok(Services {
        state: AppState {
            users: Arc::new(users),
            metrics: registry,
        },
        request_metrics,
        trace_provider,
    })
}

fn report_tracing(config: &ServiceConfig, started: bool, error: Option<TelemetryError>) {
    match error {
        Some(e) => tracing::error!(
            error = %e,
            endpoint = %config.tracing.collector_endpoint,
            "Error starting OpenTelemetry, continuing without tracing"
        ),
        None if started => tracing::info!(
            endpoint = %config.tracing.collector_endpoint,
            service_name = %config.tracing.service_name,
            "OpenTelemetry initialized"
        ),
        None => tracing::info!("Tracing disabled"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpServer;
    use crate::observability::logging::test_support::CapturedLogs;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use opentelemetry::trace::TraceError;
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_failed_trace_start_keeps_serving() {
        let config = ServiceConfig::default();
        let logs = CapturedLogs::default();
        let subscriber = logging::subscriber(&config.logging, logs.clone(), None);
        let _guard = tracing::subscriber::set_default(subscriber);

        let failed = Err(TelemetryError::Init(TraceError::Other(
            "collector unreachable".into(),
        )));
        let (trace_provider, trace_error) = split_trace_start(Some(failed));
        assert!(trace_provider.is_none());
        assert!(trace_error.is_some());

        let services = build_services(&config, trace_provider, trace_error).unwrap();
        assert!(services.trace_provider.is_none());

        let reported = logs.with_message("Error starting OpenTelemetry, continuing without tracing");
        assert_eq!(reported.len(), 1);
        assert_eq!(reported[0]["level"], "ERROR");
        assert!(reported[0]["error"]
            .as_str()
            .unwrap()
            .contains("collector unreachable"));

        let server = HttpServer::new(services.state, services.request_metrics);
        let response = server
            .router()
            .clone()
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[test]
    fn test_disabled_tracing_attempts_nothing() {
        let (provider, error) = split_trace_start(None);
        assert!(provider.is_none());
        assert!(error.is_none());
    }
}
