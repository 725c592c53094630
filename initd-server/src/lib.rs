//! initd-server library - system configuration bootstrap service
//!
//! Loads the merged system configuration once per process and serves it to
//! front-end clients through a version-token guarded endpoint.

use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub mod api;
pub mod error;
pub mod init;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use init::{InitOutcome, InitSettings, SystemInitializer};
pub use state::{SystemState, SYSTEM_STATE};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Cached system configuration
    pub system: Arc<SystemState>,
}

impl AppState {
    /// Create new application state
    pub fn new(system: Arc<SystemState>) -> Self {
        Self { system }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    use axum::routing::get;

    Router::new()
        .route(
            "/api/common/system/getInitData",
            get(api::get_init_data),
        )
        .route("/api/buildinfo", get(api::get_build_info))
        .merge(api::health_routes())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
