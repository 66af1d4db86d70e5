//! Boundary to the remote data provider.
//!
//! The provider submits a long-running fetch job for a time window and
//! bounding box and reports what it downloaded. The gateway only caches and
//! stores what comes back; it never talks to the remote service itself.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct TempoDataRequest {
    /// ISO 8601 start of the window.
    pub start_time: String,
    /// ISO 8601 end of the window.
    pub end_time: String,
    /// `[west, south, east, north]`
    #[serde(default)]
    pub bbox: Option<Vec<f64>>,
    #[serde(default)]
    pub variables: Option<Vec<String>>,
}

/// What a finished provider job produced.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct ProviderResult {
    pub job_id: String,
    pub data: Value,
}

#[derive(thiserror::Error, Debug)]
pub enum ProviderError {
    #[error("data provider not available")]
    Unavailable,
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("provider request failed: {0}")]
    Failed(String),
}

#[async_trait]
pub trait DataProvider: Send + Sync + 'static {
    async fn fetch(&self, request: &TempoDataRequest) -> Result<ProviderResult, ProviderError>;
}
