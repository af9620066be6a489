//! In-process store, lost on restart.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use tokio::sync::RwLock;

use super::{CacheEntry, CacheStats, EntrySummary, RangeStore};
use crate::error::Result;

/// Range store backed by nested maps.
///
/// `BTreeMap` keeps listings in a stable order.
#[derive(Default)]
pub struct MemoryRangeStore {
    namespaces: RwLock<BTreeMap<String, BTreeMap<String, CacheEntry>>>,
}

impl MemoryRangeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RangeStore for MemoryRangeStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.get(namespace).and_then(|ns| ns.get(key)).cloned())
    }

    async fn put(&self, namespace: &str, entry: CacheEntry) -> Result<()> {
        let mut namespaces = self.namespaces.write().await;
        namespaces
            .entry(namespace.to_string())
            .or_default()
            .insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> Result<u64> {
        let mut namespaces = self.namespaces.write().await;
        Ok(namespaces
            .remove(namespace)
            .map(|ns| ns.len() as u64)
            .unwrap_or(0))
    }

    async fn stats(&self, namespace: &str) -> Result<CacheStats> {
        let namespaces = self.namespaces.read().await;
        let stats = namespaces
            .get(namespace)
            .map(|ns| CacheStats {
                entries: ns.len() as u64,
                total_bytes: ns.values().map(CacheEntry::size).sum(),
            })
            .unwrap_or_default();
        Ok(stats)
    }

    async fn list(&self, namespace: &str) -> Result<Vec<EntrySummary>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces
            .get(namespace)
            .map(|ns| ns.values().map(CacheEntry::summary).collect())
            .unwrap_or_default())
    }

    async fn remove_cached_before(&self, namespace: &str, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut namespaces = self.namespaces.write().await;
        let Some(ns) = namespaces.get_mut(namespace) else {
            return Ok(0);
        };
        let before = ns.len();
        ns.retain(|_, entry| entry.cached_at >= cutoff);
        let removed = (before - ns.len()) as u64;
        if ns.is_empty() {
            namespaces.remove(namespace);
        }
        Ok(removed)
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let namespaces = self.namespaces.read().await;
        Ok(namespaces.keys().cloned().collect())
    }
}
