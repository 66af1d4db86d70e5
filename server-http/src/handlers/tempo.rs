use super::run_blocking;
use crate::models::{
    api_error, ApiError, Collection, CollectionsResponse, TempoDataResponse,
};
use crate::provider::{ProviderError, TempoDataRequest};
use crate::state::AppState;
use crate::validation::validate_tempo_request;
use axum::{extract::State, http::StatusCode, Json};
use serde_json::Value;
use tracing::{info, warn};

pub const TEMPO_L2_COLLECTION: &str = "C2930730944-LARC_CLOUD";

/// POST /tempo/data
///
/// Identical requests are answered from the cache. Fresh answers are cached
/// and also kept as a query record under the request fingerprint.
pub async fn fetch_tempo_data(
    State(state): State<AppState>,
    Json(request): Json<TempoDataRequest>,
) -> Result<Json<TempoDataResponse>, ApiError> {
    validate_tempo_request(&request)
        .map_err(|e| api_error(StatusCode::BAD_REQUEST, e.to_string()))?;

    let key = harbor::fingerprint_of(&request)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    let cache = state.cache.clone();
    let lookup = key.clone();
    if let Ok(Some(hit)) = run_blocking(move || cache.get(&lookup)).await? {
        match serde_json::from_value::<TempoDataResponse>(hit) {
            Ok(mut response) => {
                info!(fingerprint = %key, "Serving TEMPO data from cache");
                response.cached = true;
                return Ok(Json(response));
            }
            Err(e) => warn!(fingerprint = %key, error = %e, "Ignoring unreadable cached response"),
        }
    }

    let provider = state.provider.clone().ok_or_else(|| {
        api_error(
            StatusCode::SERVICE_UNAVAILABLE,
            ProviderError::Unavailable.to_string(),
        )
    })?;

    let result = match provider.fetch(&request).await {
        Ok(result) => result,
        Err(ProviderError::Unavailable) => {
            return Err(api_error(
                StatusCode::SERVICE_UNAVAILABLE,
                ProviderError::Unavailable.to_string(),
            ))
        }
        Err(ProviderError::InvalidRequest(reason)) => {
            return Err(api_error(StatusCode::BAD_REQUEST, reason))
        }
        // Reported in the body and never cached.
        Err(ProviderError::Failed(reason)) => {
            warn!(fingerprint = %key, error = %reason, "TEMPO fetch failed");
            return Ok(Json(TempoDataResponse {
                success: false,
                data: None,
                message: Some(format!("Error fetching TEMPO data: {}", reason)),
                job_id: None,
                cached: false,
            }));
        }
    };

    let files = result
        .data
        .get("files_processed")
        .and_then(Value::as_u64)
        .unwrap_or(0);

    let response = TempoDataResponse {
        success: true,
        data: Some(result.data),
        message: Some(format!("Successfully processed {} files", files)),
        job_id: Some(result.job_id),
        cached: false,
    };

    match serde_json::to_value(&response) {
        Ok(value) => {
            let cache = state.cache.clone();
            let artifacts = state.artifacts.clone();
            // Both stores log their own failures; the caller still gets the data.
            run_blocking(move || {
                let _ = cache.set(&key, &value);
                let _ = artifacts.save_record(&key, &value);
            })
            .await?;
        }
        Err(e) => warn!(error = %e, "Could not serialize TEMPO response for caching"),
    }

    Ok(Json(response))
}

/// GET /tempo/collections
pub async fn list_collections() -> Json<CollectionsResponse> {
    Json(CollectionsResponse {
        success: true,
        collections: vec![Collection {
            id: TEMPO_L2_COLLECTION,
            name: "TEMPO Level 2 Data",
            description: "TEMPO Level 2 atmospheric composition data",
        }],
    })
}
