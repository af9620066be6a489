//! Storage backends for cached ranges.

mod memory;
mod sqlite;

pub use memory::MemoryRangeStore;
pub use sqlite::SqliteRangeStore;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use stream_common::CacheLayer;

use crate::error::Result;

/// A stored range response.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: String,
    /// Request path, kept to recompute past/future validity.
    pub path: String,
    /// Normalized range expression.
    pub range: String,
    pub body: Bytes,
    pub cached_at: DateTime<Utc>,
    pub original_status: u16,
    pub layer: CacheLayer,
}

impl CacheEntry {
    pub fn size(&self) -> u64 {
        self.body.len() as u64
    }

    pub fn summary(&self) -> EntrySummary {
        EntrySummary {
            key: self.key.clone(),
            path: self.path.clone(),
            range: self.range.clone(),
            size: self.size(),
            cached_at: self.cached_at,
            original_status: self.original_status,
        }
    }
}

/// Entry metadata without the body, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntrySummary {
    pub key: String,
    pub path: String,
    pub range: String,
    pub size: u64,
    pub cached_at: DateTime<Utc>,
    pub original_status: u16,
}

/// Entry count and byte total.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheStats {
    pub entries: u64,
    pub total_bytes: u64,
}

impl CacheStats {
    pub fn merge(self, other: CacheStats) -> CacheStats {
        CacheStats {
            entries: self.entries + other.entries,
            total_bytes: self.total_bytes + other.total_bytes,
        }
    }
}

/// Stats for one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayerStats {
    pub layer: CacheLayer,
    #[serde(flatten)]
    pub stats: CacheStats,
}

/// Namespaced key/value storage for cache entries.
///
/// Namespaces are opaque strings; the cache derives one per layer and
/// schema version. Writes to an existing key replace it.
#[async_trait]
pub trait RangeStore: Send + Sync {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>>;

    async fn put(&self, namespace: &str, entry: CacheEntry) -> Result<()>;

    /// Remove every entry of a namespace. Returns the number removed.
    async fn clear(&self, namespace: &str) -> Result<u64>;

    async fn stats(&self, namespace: &str) -> Result<CacheStats>;

    async fn list(&self, namespace: &str) -> Result<Vec<EntrySummary>>;

    /// Remove entries cached strictly before `cutoff`. Returns the number removed.
    async fn remove_cached_before(&self, namespace: &str, cutoff: DateTime<Utc>) -> Result<u64>;

    /// All namespaces currently holding entries.
    async fn namespaces(&self) -> Result<Vec<String>>;
}
