use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A cache entry as seen from outside the store.
#[derive(Clone, Debug, Serialize)]
pub struct CacheEntry {
    pub key: String,
    pub value: Value,
    pub created_at: DateTime<Utc>,
    pub access_count: u64,
    pub last_accessed: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize)]
pub struct CacheStats {
    /// Entries a `get` would still return.
    pub total_entries: usize,
    /// Entries past their TTL that have not been swept yet.
    pub expired_pending: usize,
    pub max_size: usize,
    pub ttl_hours: u64,
    pub total_accesses: u64,
    pub avg_accesses: f64,
    pub oldest_entry: Option<DateTime<Utc>>,
    pub newest_entry: Option<DateTime<Utc>>,
    pub cache_dir: String,
    pub db_size_mb: f64,
}

/// The subdirectories of the artifact data directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ArtifactCategory {
    Visualizations,
    Queries,
    Metadata,
}

impl ArtifactCategory {
    pub const ALL: [ArtifactCategory; 3] = [
        ArtifactCategory::Visualizations,
        ArtifactCategory::Queries,
        ArtifactCategory::Metadata,
    ];

    pub fn dir_name(self) -> &'static str {
        match self {
            ArtifactCategory::Visualizations => "visualizations",
            ArtifactCategory::Queries => "queries",
            ArtifactCategory::Metadata => "metadata",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct ArtifactStats {
    pub visualizations: usize,
    pub queries: usize,
    pub metadata: usize,
    pub total_files: usize,
    pub total_size_mb: f64,
}

impl ArtifactStats {
    pub(crate) fn count_mut(&mut self, category: ArtifactCategory) -> &mut usize {
        match category {
            ArtifactCategory::Visualizations => &mut self.visualizations,
            ArtifactCategory::Queries => &mut self.queries,
            ArtifactCategory::Metadata => &mut self.metadata,
        }
    }
}

/// Outcome of an artifact cleanup pass.
#[derive(Clone, Copy, Debug, Default, Serialize, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub failed: usize,
}

/// Round a byte count to megabytes with two decimals.
pub(crate) fn bytes_to_mb(bytes: u64) -> f64 {
    round2(bytes as f64 / (1024.0 * 1024.0))
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
