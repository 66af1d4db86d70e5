#![deny(clippy::all)]

use crate::domain::{ArtifactStats, CacheEntry, CacheStats, CleanupReport};
use chrono::Duration;
use serde_json::Value;
use shared::Result;
use std::path::PathBuf;

// Ports are the seams request handlers program against; the persistence
// module provides the on-disk implementations.

/// Durable key/value cache with TTL expiry and bounded size.
///
/// Every operation is total: failures come back as `Err` after being logged
/// by the store, and absence is `Ok(None)`.
pub trait CacheStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> Result<Option<Value>>;
    fn set(&self, key: &str, value: &Value) -> Result<()>;
    /// Deleting a missing key succeeds.
    fn delete(&self, key: &str) -> Result<()>;
    fn clear(&self) -> Result<()>;
    /// Read an entry without counting it as an access.
    fn entry(&self, key: &str) -> Result<Option<CacheEntry>>;
    /// Remove every entry already past its TTL, returning how many went.
    fn purge_expired(&self) -> Result<usize>;
    fn stats(&self) -> Result<CacheStats>;
}

/// Durable store for rendered artifacts and saved query records.
pub trait ArtifactStore: Send + Sync + 'static {
    fn save(&self, id: &str, kind: &str, payload: &[u8], metadata: &Value) -> Result<PathBuf>;
    fn load(&self, id: &str, kind: &str) -> Result<Option<Vec<u8>>>;
    fn load_metadata(&self, id: &str, kind: &str) -> Result<Option<Value>>;
    fn save_record(&self, hash: &str, record: &Value) -> Result<PathBuf>;
    fn load_record(&self, hash: &str) -> Result<Option<Value>>;
    /// Best-effort removal of every file last modified before `now - older_than`.
    fn cleanup(&self, older_than: Duration) -> Result<CleanupReport>;
    fn stats(&self) -> Result<ArtifactStats>;
}
