use super::{run_blocking, store_error};
use crate::models::{api_error, ApiError, SavedResponse};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;
use tracing::info;

/// PUT /records/{hash}
pub async fn put_record(
    State(state): State<AppState>,
    Path(hash): Path<String>,
    Json(record): Json<Value>,
) -> Result<Json<SavedResponse>, ApiError> {
    info!("PUT record: hash={}", hash);

    let artifacts = state.artifacts.clone();
    let location = run_blocking(move || artifacts.save_record(&hash, &record))
        .await?
        .map_err(store_error)?;

    Ok(Json(SavedResponse {
        saved: true,
        location: location.display().to_string(),
    }))
}

/// GET /records/{hash}
pub async fn get_record(
    State(state): State<AppState>,
    Path(hash): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let artifacts = state.artifacts.clone();
    run_blocking(move || artifacts.load_record(&hash))
        .await?
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Record not found"))
}
