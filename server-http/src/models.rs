use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// === Shared ===

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub error: String,
}

/// What every handler returns on failure.
pub type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn api_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: message.into(),
        }),
    )
}

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub timestamp: String,
    pub version: String,
}

/// One section of `/status`: the stats, or why they could not be read.
#[derive(Serialize)]
#[serde(untagged)]
pub enum StatsSection<T> {
    Available(T),
    Unavailable { error: String },
}

impl<T> From<shared::Result<T>> for StatsSection<T> {
    fn from(result: shared::Result<T>) -> Self {
        match result {
            Ok(stats) => StatsSection::Available(stats),
            Err(e) => StatsSection::Unavailable {
                error: e.to_string(),
            },
        }
    }
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub cache: StatsSection<harbor::CacheStats>,
    pub storage: StatsSection<harbor::ArtifactStats>,
}

// === Cache Operation Models ===

#[derive(Deserialize)]
pub struct PutRequest {
    pub value: Value,
}

#[derive(Serialize)]
pub struct PutResponse {
    pub ok: bool,
}

#[derive(Serialize)]
pub struct GetResponse {
    pub found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
}

#[derive(Serialize)]
pub struct DeleteResponse {
    pub deleted: bool,
}

#[derive(Serialize)]
pub struct FingerprintResponse {
    pub fingerprint: String,
}

#[derive(Serialize)]
pub struct PurgeResponse {
    pub purged: usize,
}

// === Artifact Models ===

#[derive(Serialize)]
pub struct SavedResponse {
    pub saved: bool,
    pub location: String,
}

#[derive(Deserialize, Default)]
pub struct CleanupRequest {
    #[serde(default)]
    pub older_than_days: Option<u32>,
}

#[derive(Serialize)]
pub struct CleanupResponse {
    pub older_than_days: u32,
    pub removed: usize,
    pub failed: usize,
}

// === TEMPO Models ===

/// Body of a `/tempo/data` answer; also the value cached under the request fingerprint.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct TempoDataResponse {
    pub success: bool,
    #[serde(default)]
    pub data: Option<Value>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub cached: bool,
}

#[derive(Serialize)]
pub struct Collection {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
}

#[derive(Serialize)]
pub struct CollectionsResponse {
    pub success: bool,
    pub collections: Vec<Collection>,
}
