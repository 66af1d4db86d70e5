use std::path::PathBuf;
use tracing::warn;

/// Settings consumed by the cache store.
#[derive(Clone, Debug)]
pub struct CacheSettings {
    pub cache_dir: PathBuf,
    pub max_size: usize,
    pub ttl_hours: u64,
    /// Extra entries removed per eviction pass, capped at a tenth of `max_size`.
    pub eviction_margin: usize,
}

impl CacheSettings {
    pub fn new(cache_dir: impl Into<PathBuf>, max_size: usize, ttl_hours: u64) -> Self {
        Self {
            cache_dir: cache_dir.into(),
            max_size,
            ttl_hours,
            eviction_margin: Config::DEFAULT_EVICTION_MARGIN,
        }
    }
}

/// Settings consumed by the artifact store.
#[derive(Clone, Debug)]
pub struct ArtifactSettings {
    pub data_dir: PathBuf,
}

pub struct Config {
    pub host: String,
    pub http_port: u16,
    pub cache_dir: String,
    pub cache_max_size: usize,
    pub cache_ttl_hours: u64,
    pub cache_eviction_margin: usize,
    pub cache_sweep_interval_secs: u64,
    pub data_dir: String,
    pub artifact_retention_days: u32,
    pub cleanup_interval_secs: u64,
    pub api_token: String,
    pub allowed_origins: Vec<String>,
    pub api_version: String,
}

impl Config {
    const DEFAULT_HOST: &str = "0.0.0.0";
    const DEFAULT_HTTP_PORT: u16 = 8000;
    const DEFAULT_CACHE_DIR: &str = "./cache";
    const DEFAULT_CACHE_MAX_SIZE: usize = 1000;
    const DEFAULT_CACHE_TTL_HOURS: u64 = 24;
    const DEFAULT_EVICTION_MARGIN: usize = 10;
    const DEFAULT_DATA_DIR: &str = "./data";
    const DEFAULT_RETENTION_DAYS: u32 = 30;
    const DEFAULT_CLEANUP_INTERVAL_SECS: u64 = 3600;
    const DEFAULT_API_TOKEN: &str = "default-token";

    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let string = |name: &str, default: &str| lookup(name).unwrap_or_else(|| default.to_string());

        Self {
            host: string("HARBOR_HOST", Self::DEFAULT_HOST),
            http_port: parse_or(&lookup, "HARBOR_HTTP_PORT", Self::DEFAULT_HTTP_PORT),
            cache_dir: string("HARBOR_CACHE_DIR", Self::DEFAULT_CACHE_DIR),
            cache_max_size: parse_or(&lookup, "HARBOR_CACHE_MAX_SIZE", Self::DEFAULT_CACHE_MAX_SIZE)
                .max(1),
            cache_ttl_hours: parse_or(
                &lookup,
                "HARBOR_CACHE_TTL_HOURS",
                Self::DEFAULT_CACHE_TTL_HOURS,
            ),
            cache_eviction_margin: parse_or(
                &lookup,
                "HARBOR_CACHE_EVICTION_MARGIN",
                Self::DEFAULT_EVICTION_MARGIN,
            ),
            cache_sweep_interval_secs: parse_or(&lookup, "HARBOR_CACHE_SWEEP_INTERVAL_SECS", 0),
            data_dir: string("HARBOR_DATA_DIR", Self::DEFAULT_DATA_DIR),
            artifact_retention_days: parse_or(
                &lookup,
                "HARBOR_ARTIFACT_RETENTION_DAYS",
                Self::DEFAULT_RETENTION_DAYS,
            ),
            cleanup_interval_secs: parse_or(
                &lookup,
                "HARBOR_CLEANUP_INTERVAL_SECS",
                Self::DEFAULT_CLEANUP_INTERVAL_SECS,
            ),
            api_token: lookup("HARBOR_API_TOKEN").unwrap_or_else(|| {
                warn!("HARBOR_API_TOKEN not set, using the default token");
                warn!("Set HARBOR_API_TOKEN before exposing this service");
                Self::DEFAULT_API_TOKEN.to_string()
            }),
            allowed_origins: string("HARBOR_ALLOWED_ORIGINS", "*")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            api_version: string("HARBOR_API_VERSION", env!("CARGO_PKG_VERSION")),
        }
    }

    pub fn cache_settings(&self) -> CacheSettings {
        CacheSettings {
            cache_dir: PathBuf::from(&self.cache_dir),
            max_size: self.cache_max_size,
            ttl_hours: self.cache_ttl_hours,
            eviction_margin: self.cache_eviction_margin,
        }
    }

    pub fn artifact_settings(&self) -> ArtifactSettings {
        ArtifactSettings {
            data_dir: PathBuf::from(&self.data_dir),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.http_port)
    }

    pub fn allows_any_origin(&self) -> bool {
        self.allowed_origins.iter().any(|o| o == "*")
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(name) {
        Some(raw) => raw.trim().parse::<T>().unwrap_or_else(|_| {
            warn!(variable = name, value = %raw, "unparseable value, using default");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]);

        assert_eq!(config.http_port, 8000);
        assert_eq!(config.cache_dir, "./cache");
        assert_eq!(config.cache_max_size, 1000);
        assert_eq!(config.cache_ttl_hours, 24);
        assert_eq!(config.data_dir, "./data");
        assert_eq!(config.artifact_retention_days, 30);
        assert_eq!(config.api_token, "default-token");
        assert!(config.allows_any_origin());
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
    }

    #[test]
    fn test_overrides_and_projections() {
        let config = config_from(&[
            ("HARBOR_CACHE_DIR", "/var/cache/harbor"),
            ("HARBOR_CACHE_MAX_SIZE", "250"),
            ("HARBOR_CACHE_TTL_HOURS", "6"),
            ("HARBOR_DATA_DIR", "/srv/harbor"),
            ("HARBOR_ALLOWED_ORIGINS", "https://a.example, https://b.example"),
        ]);

        let cache = config.cache_settings();
        assert_eq!(cache.cache_dir, PathBuf::from("/var/cache/harbor"));
        assert_eq!(cache.max_size, 250);
        assert_eq!(cache.ttl_hours, 6);
        assert_eq!(cache.eviction_margin, 10);

        assert_eq!(config.artifact_settings().data_dir, PathBuf::from("/srv/harbor"));
        assert_eq!(
            config.allowed_origins,
            vec!["https://a.example".to_string(), "https://b.example".to_string()]
        );
        assert!(!config.allows_any_origin());
    }

    #[test]
    fn test_invalid_numbers_fall_back() {
        let config = config_from(&[
            ("HARBOR_HTTP_PORT", "not-a-port"),
            ("HARBOR_CACHE_MAX_SIZE", "0"),
        ]);

        assert_eq!(config.http_port, 8000);
        // zero is clamped so eviction always has room for the new entry
        assert_eq!(config.cache_max_size, 1);
    }
}
