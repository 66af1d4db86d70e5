use super::{run_blocking, store_error};
use crate::models::{api_error, ApiError, SavedResponse};
use crate::state::AppState;
use axum::{
    extract::{Path, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::Utc;
use serde_json::{Map, Value};
use tracing::info;

/// Optional JSON object merged into the stored metadata.
pub const METADATA_HEADER: &str = "x-artifact-metadata";

const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// PUT /artifacts/{id}/{kind}
pub async fn put_artifact(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<SavedResponse>, ApiError> {
    info!("PUT artifact: id={}, kind={}, bytes={}", id, kind, body.len());

    let mut metadata = caller_metadata(&headers)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or(DEFAULT_CONTENT_TYPE);

    metadata.insert("id".into(), Value::from(id.as_str()));
    metadata.insert("kind".into(), Value::from(kind.as_str()));
    metadata.insert("content_type".into(), Value::from(content_type));
    metadata.insert("size_bytes".into(), Value::from(body.len()));
    metadata.insert("saved_at".into(), Value::from(Utc::now().to_rfc3339()));

    let artifacts = state.artifacts.clone();
    let metadata = Value::Object(metadata);
    let location = run_blocking(move || artifacts.save(&id, &kind, &body, &metadata))
        .await?
        .map_err(store_error)?;

    Ok(Json(SavedResponse {
        saved: true,
        location: location.display().to_string(),
    }))
}

/// GET /artifacts/{id}/{kind}
pub async fn get_artifact(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let artifacts = state.artifacts.clone();
    let (payload, metadata) = run_blocking(move || {
        let payload = artifacts.load(&id, &kind)?;
        let metadata = artifacts.load_metadata(&id, &kind)?;
        Ok::<_, shared::Error>((payload, metadata))
    })
    .await?
    .map_err(store_error)?;

    let payload =
        payload.ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Artifact not found"))?;

    let content_type = metadata
        .as_ref()
        .and_then(|m| m.get("content_type"))
        .and_then(Value::as_str)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
        .to_string();

    Ok(([(header::CONTENT_TYPE, content_type)], payload).into_response())
}

/// GET /artifacts/{id}/{kind}/metadata
pub async fn get_artifact_metadata(
    State(state): State<AppState>,
    Path((id, kind)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let artifacts = state.artifacts.clone();
    run_blocking(move || artifacts.load_metadata(&id, &kind))
        .await?
        .map_err(store_error)?
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::NOT_FOUND, "Artifact metadata not found"))
}

fn caller_metadata(headers: &HeaderMap) -> Result<Map<String, Value>, ApiError> {
    let Some(raw) = headers.get(METADATA_HEADER) else {
        return Ok(Map::new());
    };

    let parsed = raw
        .to_str()
        .ok()
        .and_then(|s| serde_json::from_str::<Value>(s).ok());

    match parsed {
        Some(Value::Object(map)) => Ok(map),
        _ => Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("{} must be a JSON object", METADATA_HEADER),
        )),
    }
}
