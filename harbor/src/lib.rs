//! Durable cache and artifact storage for the data gateway.
//!
//! Two independent stores live here: a sled-backed key/value cache with
//! TTL expiry and recency-based eviction, and a filesystem artifact store
//! for rendered images and saved query results.

pub mod clock;
pub mod domain;
pub mod fingerprint;
pub mod persistence;
pub mod ports;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{ArtifactStats, CacheEntry, CacheStats, CleanupReport};
pub use fingerprint::{fingerprint, fingerprint_of};
pub use persistence::{FileArtifactStore, SledCacheStore};
pub use ports::{ArtifactStore, CacheStore};
