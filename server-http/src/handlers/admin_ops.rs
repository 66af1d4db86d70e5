use super::{run_blocking, store_error};
use crate::models::{ApiError, CleanupRequest, CleanupResponse};
use crate::state::AppState;
use axum::{extract::State, Json};
use tracing::info;

/// POST /admin/cleanup
pub async fn cleanup_artifacts(
    State(state): State<AppState>,
    Json(req): Json<CleanupRequest>,
) -> Result<Json<CleanupResponse>, ApiError> {
    let days = req.older_than_days.unwrap_or(state.retention_days);
    info!("Cleaning up artifacts older than {} days", days);

    let artifacts = state.artifacts.clone();
    let report = run_blocking(move || artifacts.cleanup(chrono::Duration::days(i64::from(days))))
        .await?
        .map_err(store_error)?;

    Ok(Json(CleanupResponse {
        older_than_days: days,
        removed: report.removed,
        failed: report.failed,
    }))
}
