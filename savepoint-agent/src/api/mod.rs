//! HTTP API module for the snapshot agent.

pub mod backup;
pub mod error;
pub mod health;

use crate::ws::NoticeBroadcaster;
use axum::{
    routing::{get, post},
    Router,
};
use savepoint_core::scheduler::SchedulerHandle;
use tower_http::trace::TraceLayer;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub scheduler: SchedulerHandle,
    pub notices: NoticeBroadcaster,
}

/// Create the API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(health::health))
        .route("/version", get(health::version))
        // Backup endpoints
        .route("/backup/status", get(backup::status))
        .route("/backup/request", post(backup::request_backup))
        .route("/backup/start", post(backup::start_backup))
        .route("/config/reload", post(backup::reload_config))
        // Notice stream
        .route("/ws", get(crate::ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
