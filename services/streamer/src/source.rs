//! Range source construction.

use anyhow::{Context, Result};
use progressive_fetch::{FetchConfig, HttpRangeSource};
use range_cache::{CacheConfig, CachedSource, MemoryRangeStore, RangeCache, RangeStore, SqliteRangeStore};
use std::sync::Arc;
use tracing::info;

/// HTTP reads behind the range cache.
pub type StreamSource = CachedSource<HttpRangeSource>;

/// Open the range cache: SQLite when a database path is configured,
/// otherwise in memory for the lifetime of the process.
pub async fn open_cache(config: &CacheConfig) -> Result<Arc<RangeCache>> {
    config.validate()?;

    let store: Arc<dyn RangeStore> = match &config.db_path {
        Some(path) => {
            info!(path = %path.display(), "Opening SQLite range cache");
            Arc::new(
                SqliteRangeStore::open(path)
                    .await
                    .with_context(|| format!("failed to open cache database {}", path.display()))?,
            )
        }
        None => {
            info!("Using in-memory range cache");
            Arc::new(MemoryRangeStore::new())
        }
    };

    Ok(Arc::new(RangeCache::open(store, config).await?))
}

pub fn build_source(fetch_config: &FetchConfig, cache: Arc<RangeCache>) -> Result<Arc<StreamSource>> {
    fetch_config.validate()?;
    let http = HttpRangeSource::new(fetch_config)?;
    Ok(Arc::new(CachedSource::new(http, cache)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sqlite_cache_created_in_nested_dir() {
        let dir = test_utils::temp_cache_dir();
        let config = CacheConfig {
            db_path: Some(dir.path().join("nested").join("cache.db")),
            ..CacheConfig::default()
        };
        let cache = open_cache(&config).await.unwrap();
        assert_eq!(cache.stats(None).await.unwrap().entries, 0);
        assert!(dir.path().join("nested").exists());
    }

    #[tokio::test]
    async fn test_invalid_cache_config_rejected() {
        let config = CacheConfig {
            namespace_prefix: String::new(),
            ..CacheConfig::default()
        };
        assert!(open_cache(&config).await.is_err());
    }
}
