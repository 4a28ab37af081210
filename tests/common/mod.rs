//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use user_service::config::MetricsConfig;
use user_service::http::middleware::RequestMetrics;
use user_service::http::{AppState, HttpServer};
use user_service::lifecycle::Shutdown;
use user_service::observability::MetricsRegistry;
use user_service::users::UserStore;

/// A server running on an ephemeral local port.
pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub shutdown: Shutdown,
    pub handle: JoinHandle<std::io::Result<()>>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

/// Start a server over `users`, without process gauges or tracing.
pub async fn start_server(users: UserStore) -> TestServer {
    let registry = Arc::new(MetricsRegistry::new(false).unwrap());
    let request_metrics = RequestMetrics::new(registry.clone(), &MetricsConfig::default()).unwrap();
    let state = AppState {
        users: Arc::new(users),
        metrics: registry,
    };

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let server = HttpServer::new(state.clone(), request_metrics);
    let server_shutdown = shutdown.subscribe();
    let handle = tokio::spawn(async move { server.run(listener, server_shutdown).await });

    TestServer {
        addr,
        state,
        shutdown,
        handle,
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
