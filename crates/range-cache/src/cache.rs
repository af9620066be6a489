//! Layer-partitioned range cache with lazy expiry.

use bytes::Bytes;
use chrono::{DateTime, Duration, Utc};
use metrics::counter;
use std::sync::Arc;
use stream_common::{ByteRange, CacheLayer};
use tracing::{debug, info};

use crate::config::CacheConfig;
use crate::error::Result;
use crate::key::{cache_key, request_path};
use crate::policy::CachePolicy;
use crate::store::{CacheEntry, CacheStats, EntrySummary, LayerStats, RangeStore};

/// Byte-range cache over a [`RangeStore`].
///
/// Each layer lives in its own namespace `"{prefix}-v{version}-{layer}"`.
/// Opening the cache with a new schema version drops the namespaces left
/// behind by older versions. Expired entries are never scanned for; a read
/// simply treats them as absent until `evict_older_than` or `clear` removes
/// them.
pub struct RangeCache {
    store: Arc<dyn RangeStore>,
    policy: CachePolicy,
    prefix: String,
    version: u32,
}

impl RangeCache {
    /// Open the cache and drop namespaces written by other schema versions.
    pub async fn open(store: Arc<dyn RangeStore>, config: &CacheConfig) -> Result<Self> {
        let cache = Self {
            store,
            policy: config.policy(),
            prefix: config.namespace_prefix.clone(),
            version: config.schema_version,
        };
        cache.drop_stale_namespaces().await?;
        Ok(cache)
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// Namespace holding one layer's entries for the current schema version.
    pub fn namespace(&self, layer: CacheLayer) -> String {
        format!("{}-v{}-{}", self.prefix, self.version, layer)
    }

    async fn drop_stale_namespaces(&self) -> Result<()> {
        let own_prefix = format!("{}-v", self.prefix);
        let current = format!("{}-v{}-", self.prefix, self.version);

        for namespace in self.store.namespaces().await? {
            if namespace.starts_with(&own_prefix) && !namespace.starts_with(&current) {
                let removed = self.store.clear(&namespace).await?;
                info!(namespace = %namespace, removed, "Dropped stale cache namespace");
            }
        }
        Ok(())
    }

    /// Fresh entry for `(path, range)` in `layer`, if any.
    pub async fn get(
        &self,
        layer: CacheLayer,
        url: &str,
        range: &ByteRange,
    ) -> Result<Option<CacheEntry>> {
        self.get_at(layer, url, range, Utc::now()).await
    }

    pub async fn get_at(
        &self,
        layer: CacheLayer,
        url: &str,
        range: &ByteRange,
        now: DateTime<Utc>,
    ) -> Result<Option<CacheEntry>> {
        let key = cache_key(url, range);
        let Some(entry) = self.store.get(&self.namespace(layer), &key).await? else {
            counter!("range_cache_misses_total", "layer" => layer.as_str()).increment(1);
            return Ok(None);
        };

        let is_past = CachePolicy::is_past_path(&entry.path, now);
        if !self.policy.is_entry_valid(now, entry.cached_at, is_past) {
            counter!("range_cache_expired_total", "layer" => layer.as_str()).increment(1);
            debug!(
                layer = %layer,
                key = %key,
                cached_at = %entry.cached_at,
                is_past,
                "Cached range expired"
            );
            return Ok(None);
        }

        counter!("range_cache_hits_total", "layer" => layer.as_str()).increment(1);
        Ok(Some(entry))
    }

    /// Store a network response. Last writer wins for an existing key.
    pub async fn put(
        &self,
        layer: CacheLayer,
        url: &str,
        range: &ByteRange,
        body: Bytes,
        original_status: u16,
    ) -> Result<()> {
        self.put_at(layer, url, range, body, original_status, Utc::now())
            .await
    }

    pub async fn put_at(
        &self,
        layer: CacheLayer,
        url: &str,
        range: &ByteRange,
        body: Bytes,
        original_status: u16,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let entry = CacheEntry {
            key: cache_key(url, range),
            path: request_path(url),
            range: range.to_string(),
            body,
            cached_at: now,
            original_status,
            layer,
        };
        self.store.put(&self.namespace(layer), entry).await
    }

    /// Remove entries of one layer, or of all layers. Returns the number removed.
    pub async fn clear(&self, layer: Option<CacheLayer>) -> Result<u64> {
        let mut removed = 0;
        for layer in layers(layer) {
            removed += self.store.clear(&self.namespace(layer)).await?;
        }
        info!(layer = ?layer, removed, "Cleared range cache");
        Ok(removed)
    }

    /// Entry count and byte total for one layer or the whole cache.
    pub async fn stats(&self, layer: Option<CacheLayer>) -> Result<CacheStats> {
        let mut total = CacheStats::default();
        for layer in layers(layer) {
            total = total.merge(self.store.stats(&self.namespace(layer)).await?);
        }
        Ok(total)
    }

    /// Per-layer breakdown of the whole cache.
    pub async fn layer_stats(&self) -> Result<Vec<LayerStats>> {
        let mut out = Vec::with_capacity(CacheLayer::ALL.len());
        for layer in CacheLayer::ALL {
            out.push(LayerStats {
                layer,
                stats: self.store.stats(&self.namespace(layer)).await?,
            });
        }
        Ok(out)
    }

    pub async fn items(&self, layer: CacheLayer) -> Result<Vec<EntrySummary>> {
        self.store.list(&self.namespace(layer)).await
    }

    /// Delete entries cached more than `days` days ago, across all layers.
    pub async fn evict_older_than(&self, days: u32) -> Result<u64> {
        self.evict_older_than_at(days, Utc::now()).await
    }

    pub async fn evict_older_than_at(&self, days: u32, now: DateTime<Utc>) -> Result<u64> {
        let cutoff = now - Duration::days(days as i64);
        let mut removed = 0;
        for layer in CacheLayer::ALL {
            removed += self
                .store
                .remove_cached_before(&self.namespace(layer), cutoff)
                .await?;
        }
        info!(days, removed, cutoff = %cutoff, "Evicted old cache entries");
        Ok(removed)
    }
}

fn layers(layer: Option<CacheLayer>) -> Vec<CacheLayer> {
    match layer {
        Some(layer) => vec![layer],
        None => CacheLayer::ALL.to_vec(),
    }
}
