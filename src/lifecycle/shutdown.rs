//! Shutdown coordination for the service.

use std::process::ExitCode;
use std::time::Duration;

use tokio::sync::broadcast;

use crate::observability::TraceProvider;

/// Exit code after a clean shutdown.
pub const EXIT_OK: u8 = 0;
/// Exit code when pending spans could not be flushed.
pub const EXIT_SHUTDOWN_FAILED: u8 = 1;
/// Exit code for fatal startup errors (bad config, bind failure).
pub const EXIT_STARTUP_FAILED: u8 = 2;

/// Coordinator for graceful shutdown.
///
/// Provides a broadcast channel that all long-running tasks can subscribe to.
#[derive(Clone)]
pub struct Shutdown {
    /// Broadcast channel sender.
    tx: broadcast::Sender<()>,
}

impl Shutdown {
    /// Create a new shutdown coordinator.
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self { tx }
    }

    /// Subscribe to the shutdown signal.
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal.
    pub fn trigger(&self) {
        let _ = self.tx.send(());
    }

    /// Get the number of active subscribers (tasks still running).
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Flush the trace provider, if any, and pick the process exit code.
///
/// Waits at most `timeout`; a timeout counts as a failed shutdown.
pub async fn flush_telemetry(provider: Option<TraceProvider>, timeout: Duration) -> ExitCode {
    let Some(provider) = provider else {
        return ExitCode::from(EXIT_OK);
    };

    match provider.shutdown(timeout).await {
        Ok(()) => {
            tracing::info!("OpenTelemetry shutdown complete");
            ExitCode::from(EXIT_OK)
        }
        Err(e) => {
            tracing::error!(error = %e, "Error shutting down OpenTelemetry");
            ExitCode::from(EXIT_SHUTDOWN_FAILED)
        }
    }
}
