//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up the observability pipeline
//! - Bind server to listener
//! - Stop accepting and drain on the shutdown signal

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio::sync::broadcast;

use crate::http::middleware::{apply_pipeline, RequestMetrics};
use crate::http::response::not_found;
use crate::observability::MetricsRegistry;
use crate::system::setup_system_router;
use crate::users::{setup_users_router, UserStore};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub users: Arc<UserStore>,
    pub metrics: Arc<MetricsRegistry>,
}

/// HTTP server for the user service.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server over the given state.
    pub fn new(state: AppState, request_metrics: RequestMetrics) -> Self {
        Self {
            router: Self::build_router(state, request_metrics),
        }
    }

    /// Build the Axum router with all middleware layers.
    pub fn build_router(state: AppState, request_metrics: RequestMetrics) -> Router {
        let routes = Router::new()
            .merge(setup_system_router())
            .merge(setup_users_router())
            .fallback(not_found)
            .with_state(state);

        apply_pipeline(routes, request_metrics)
    }

    /// Run the server until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, port = addr.port(), "Backend listening");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();

        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The fully layered router.
    pub fn router(&self) -> &Router {
        &self.router
    }
}
