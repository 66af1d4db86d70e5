//! Background upkeep for the stores.

use harbor::{ArtifactStore, CacheStore};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Periodically delete artifacts older than `retention_days`.
pub fn spawn_artifact_cleanup(
    artifacts: Arc<dyn ArtifactStore>,
    every: Duration,
    retention_days: u32,
) -> JoinHandle<()> {
    let retention = chrono::Duration::days(i64::from(retention_days));

    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let store = artifacts.clone();
            match tokio::task::spawn_blocking(move || store.cleanup(retention)).await {
                Ok(Ok(report)) if report.removed > 0 || report.failed > 0 => info!(
                    removed = report.removed,
                    failed = report.failed,
                    retention_days,
                    "Artifact cleanup finished"
                ),
                Ok(Ok(_)) => debug!("Artifact cleanup found nothing to remove"),
                // Already logged by the store.
                Ok(Err(_)) => {}
                Err(e) => warn!(error = %e, "Artifact cleanup task panicked"),
            }
        }
    })
}

/// Periodically drop cache entries that are past their TTL.
pub fn spawn_cache_sweep(cache: Arc<dyn CacheStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + every, every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;

            let store = cache.clone();
            match tokio::task::spawn_blocking(move || store.purge_expired()).await {
                Ok(Ok(purged)) if purged > 0 => info!(purged, "Cache sweep removed expired entries"),
                Ok(Ok(_)) => debug!("Cache sweep found nothing expired"),
                Ok(Err(_)) => {}
                Err(e) => warn!(error = %e, "Cache sweep task panicked"),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use harbor::{FileArtifactStore, ManualClock, SledCacheStore};
    use serde_json::json;
    use shared::config::{ArtifactSettings, CacheSettings};
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cache_sweep_purges_expired_entries() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(
            SledCacheStore::open(CacheSettings::new(dir.path(), 10, 1), clock.clone()).unwrap(),
        );

        store.set("old", &json!(1)).unwrap();
        clock.advance(chrono::Duration::hours(2));
        store.set("fresh", &json!(2)).unwrap();

        let handle = spawn_cache_sweep(store.clone(), Duration::from_millis(20));

        for _ in 0..100 {
            if store.len() == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert_eq!(store.len(), 1);
        assert!(store.entry("fresh").unwrap().is_some());
    }

    #[tokio::test]
    async fn test_artifact_cleanup_runs_on_schedule() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let store = Arc::new(
            FileArtifactStore::open(
                ArtifactSettings {
                    data_dir: dir.path().to_path_buf(),
                },
                clock.clone(),
            )
            .unwrap(),
        );

        store.save_record("abc", &json!({"a": 1})).unwrap();
        clock.advance(chrono::Duration::days(31));

        let handle = spawn_artifact_cleanup(store.clone(), Duration::from_millis(20), 30);

        for _ in 0..100 {
            if store.load_record("abc").unwrap().is_none() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(store.load_record("abc").unwrap().is_none());
    }
}
