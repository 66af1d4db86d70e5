use crate::provider::DataProvider;
use harbor::{ArtifactStore, CacheStore, Clock, FileArtifactStore, SledCacheStore};
use shared::config::Config;
use std::sync::Arc;
use tracing::info;

/// Server state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<dyn CacheStore>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub provider: Option<Arc<dyn DataProvider>>,
    pub api_version: Arc<str>,
    /// Default window for `POST /admin/cleanup` when the body names none.
    pub retention_days: u32,
}

impl AppState {
    pub fn new(
        cache: Arc<dyn CacheStore>,
        artifacts: Arc<dyn ArtifactStore>,
        provider: Option<Arc<dyn DataProvider>>,
        config: &Config,
    ) -> Self {
        Self {
            cache,
            artifacts,
            provider,
            api_version: Arc::from(config.api_version.as_str()),
            retention_days: config.artifact_retention_days,
        }
    }

    /// Open both stores under the configured directories.
    pub fn open(
        config: &Config,
        clock: Arc<dyn Clock>,
        provider: Option<Arc<dyn DataProvider>>,
    ) -> shared::Result<Self> {
        let cache = SledCacheStore::open(config.cache_settings(), clock.clone())?;
        info!(entries = cache.len(), "Cache store ready");

        let artifacts = FileArtifactStore::open(config.artifact_settings(), clock)?;
        info!(data_dir = %artifacts.data_dir().display(), "Artifact store ready");

        Ok(Self::new(
            Arc::new(cache),
            Arc::new(artifacts),
            provider,
            config,
        ))
    }
}
