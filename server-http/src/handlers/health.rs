use crate::models::HealthResponse;
use crate::state::AppState;
use axum::{extract::State, Json};
use chrono::Utc;

/// GET /
pub async fn root(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        timestamp: Utc::now().to_rfc3339(),
        version: state.api_version.to_string(),
    })
}

/// GET /health
///
/// Reports `unhealthy` when no data provider is wired; cached data is still served.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: if state.provider.is_some() {
            "healthy"
        } else {
            "unhealthy"
        },
        timestamp: Utc::now().to_rfc3339(),
        version: state.api_version.to_string(),
    })
}
