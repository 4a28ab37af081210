use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use crate::http::server::AppState;
use crate::observability::metrics::EXPOSITION_CONTENT_TYPE;

#[derive(Serialize)]
pub struct HealthStatus {
    pub status: &'static str,
}

#[derive(Serialize)]
pub struct Greeting {
    pub message: &'static str,
}

pub async fn get_health() -> Json<HealthStatus> {
    Json(HealthStatus { status: "ok" })
}

pub async fn get_hello() -> Json<Greeting> {
    Json(Greeting {
        message: "Hello from CI/CD test!",
    })
}

pub async fn get_metrics(State(state): State<AppState>) -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)],
        state.metrics.collect().into_string(),
    )
}
