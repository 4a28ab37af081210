//! User Service
//!
//! A JSON user-management API instrumented with structured logs, Prometheus
//! metrics and OpenTelemetry traces.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ trace ─▶ request id ─▶ access log ─▶ metrics ─▶ cors ─▶ recovery ─▶ router
//!                                                                                          │
//!                                                      ┌───────────────────────────────────┤
//!                                                      ▼                                   ▼
//!                                               ┌─────────────┐                   ┌─────────────────┐
//!                                               │   system    │                   │      users      │
//!                                               │ /health     │                   │ /users          │
//!                                               │ /hello      │                   │ /users/{id}     │
//!                                               │ /metrics    │                   │ (in-memory)     │
//!                                               └─────────────┘                   └─────────────────┘
//!
//!     Cross-cutting: config, observability (logs, metrics, traces), lifecycle
//! ```
//!
//! # Exit Codes
//! - 0: clean shutdown
//! - 1: trace exporter failed to flush (or timed out) during shutdown
//! - 2: fatal startup error (invalid configuration, port unavailable)

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use user_service::config::resolve_config;
use user_service::http::HttpServer;
use user_service::lifecycle::shutdown::EXIT_STARTUP_FAILED;
use user_service::lifecycle::{bootstrap, flush_telemetry, signals, Shutdown};

#[derive(Parser)]
#[command(name = "user-service", version, about = "User management API")]
struct Cli {
    /// Path to a TOML configuration file
    #[arg(short, long, env = "USER_SERVICE_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let config = match resolve_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("user-service: {}", e);
            return ExitCode::from(EXIT_STARTUP_FAILED);
        }
    };

    let services = match bootstrap(&config) {
        Ok(services) => services,
        Err(e) => {
            tracing::error!(error = %e, "Startup failed");
            return ExitCode::from(EXIT_STARTUP_FAILED);
        }
    };

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        bind_address = %config.listener.bind_address(),
        tracing_enabled = services.trace_provider.is_some(),
        "user-service starting"
    );

    let listener = match TcpListener::bind(config.listener.bind_address()).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(
                error = %e,
                bind_address = %config.listener.bind_address(),
                "Failed to bind listener"
            );
            return ExitCode::from(EXIT_STARTUP_FAILED);
        }
    };

    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    signals::spawn_signal_listener(shutdown.clone());

    let server = HttpServer::new(services.state, services.request_metrics);
    if let Err(e) = server.run(listener, server_shutdown).await {
        tracing::error!(error = %e, "HTTP server error");
    }

    let timeout = Duration::from_secs(config.lifecycle.shutdown_timeout_secs);
    let code = flush_telemetry(services.trace_provider, timeout).await;

    tracing::info!("Shutdown complete");
    code
}
