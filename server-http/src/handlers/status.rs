use super::run_blocking;
use crate::models::{ApiError, StatusResponse};
use crate::state::AppState;
use axum::{extract::State, Json};

/// GET /status
///
/// Each section degrades to `{"error": ...}` on its own.
pub async fn status(State(state): State<AppState>) -> Result<Json<StatusResponse>, ApiError> {
    let cache = state.cache.clone();
    let artifacts = state.artifacts.clone();

    let (cache_stats, storage_stats) =
        run_blocking(move || (cache.stats(), artifacts.stats())).await?;

    Ok(Json(StatusResponse {
        cache: cache_stats.into(),
        storage: storage_stats.into(),
    }))
}
