//! Health check endpoint
//!
//! Besides liveness, reports whether a system config has been published and
//! which version token clients are currently being handed.

use axum::{extract::State, routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
    pub system_version: String,
    pub config_loaded: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub buffer_id: Option<String>,
    pub active_models: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let snapshot = state.system.snapshot();

    Json(HealthResponse {
        status: "ok".to_string(),
        module: "initd-server".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        system_version: state.system.system_version(),
        config_loaded: snapshot.is_some(),
        buffer_id: snapshot.as_ref().and_then(|s| s.buffer_id.clone()),
        active_models: snapshot.map(|s| s.active_models.len()).unwrap_or(0),
    })
}

/// Build health check routes
pub fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(health_check))
}
