//! Backup trigger endpoints.

use super::error::ApiError;
use super::AppState;
use axum::{extract::State, http::StatusCode, Json};
use savepoint_core::config::BackupConfig;
use savepoint_core::scheduler::SchedulerStatus;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct TriggerResponse {
    pub status: String,
}

/// GET /backup/status
pub async fn status(State(state): State<AppState>) -> Json<SchedulerStatus> {
    Json(state.scheduler.status())
}

/// POST /backup/request - Fire-and-forget; coalesces with pending requests
pub async fn request_backup(State(state): State<AppState>) -> (StatusCode, Json<TriggerResponse>) {
    state.scheduler.request_backup();
    tracing::info!("Backup requested");
    (
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            status: "requested".to_string(),
        }),
    )
}

/// POST /backup/start - Like request, but rejected while a backup runs
pub async fn start_backup(
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<TriggerResponse>), ApiError> {
    state.scheduler.start_backup()?;
    tracing::info!("Backup start requested");
    Ok((
        StatusCode::ACCEPTED,
        Json(TriggerResponse {
            status: "requested".to_string(),
        }),
    ))
}

/// POST /config/reload
pub async fn reload_config(State(state): State<AppState>) -> Result<Json<BackupConfig>, ApiError> {
    let config = state.scheduler.reload_config()?;
    Ok(Json(BackupConfig::clone(&config)))
}
