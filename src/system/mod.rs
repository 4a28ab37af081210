//! Service endpoints outside the user collection: liveness, greeting, metrics scrape.

pub mod handlers;

use axum::{routing::get, Router};

use self::handlers::*;
use crate::http::server::AppState;

pub fn setup_system_router() -> Router<AppState> {
    Router::new()
        .route("/health", get(get_health))
        .route("/hello", get(get_hello))
        .route("/metrics", get(get_metrics))
}
