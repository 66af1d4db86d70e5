use super::{run_blocking, store_error};
use crate::models::{
    api_error, ApiError, DeleteResponse, FingerprintResponse, GetResponse, PurgeResponse,
    PutRequest, PutResponse,
};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use harbor::CacheEntry;
use serde_json::Value;
use tracing::info;

/// POST /cache/fingerprint
pub async fn fingerprint_body(Json(body): Json<Value>) -> Json<FingerprintResponse> {
    Json(FingerprintResponse {
        fingerprint: harbor::fingerprint(&body),
    })
}

/// PUT /cache/{key}
pub async fn put_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
    Json(req): Json<PutRequest>,
) -> Result<Json<PutResponse>, ApiError> {
    info!("PUT: key={}", key);

    let cache = state.cache.clone();
    run_blocking(move || cache.set(&key, &req.value))
        .await?
        .map_err(store_error)?;

    Ok(Json(PutResponse { ok: true }))
}

/// GET /cache/{key}
///
/// A store failure reads as a miss.
pub async fn get_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<GetResponse>, ApiError> {
    info!("GET: key={}", key);

    let cache = state.cache.clone();
    let value = run_blocking(move || cache.get(&key))
        .await?
        .unwrap_or(None);

    Ok(Json(GetResponse {
        found: value.is_some(),
        value,
    }))
}

/// GET /cache/{key}/meta
pub async fn get_entry_meta(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<CacheEntry>, ApiError> {
    let cache = state.cache.clone();
    let lookup = key.clone();
    run_blocking(move || cache.entry(&lookup))
        .await?
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, format!("No live entry for '{}'", key)))
}

/// DELETE /cache/{key}
pub async fn delete_value(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<DeleteResponse>, ApiError> {
    info!("DELETE: key={}", key);

    let cache = state.cache.clone();
    run_blocking(move || cache.delete(&key))
        .await?
        .map_err(store_error)?;

    Ok(Json(DeleteResponse { deleted: true }))
}

/// DELETE /cache
pub async fn clear_cache(State(state): State<AppState>) -> Result<Json<DeleteResponse>, ApiError> {
    info!("Clearing cache");

    let cache = state.cache.clone();
    run_blocking(move || cache.clear())
        .await?
        .map_err(store_error)?;

    Ok(Json(DeleteResponse { deleted: true }))
}

/// POST /cache/purge
pub async fn purge_expired(State(state): State<AppState>) -> Result<Json<PurgeResponse>, ApiError> {
    let cache = state.cache.clone();
    let purged = run_blocking(move || cache.purge_expired())
        .await?
        .map_err(store_error)?;

    Ok(Json(PurgeResponse { purged }))
}
