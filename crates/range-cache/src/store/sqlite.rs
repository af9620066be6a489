//! Range store persisted in SQLite with sqlx.
//!
//! One table holds every namespace; `(namespace, cache_key)` is the primary
//! key so a write to an existing key replaces it.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;
use stream_common::CacheLayer;
use tracing::{debug, info};

use super::{CacheEntry, CacheStats, EntrySummary, RangeStore};
use crate::error::{CacheError, Result};

pub struct SqliteRangeStore {
    pool: SqlitePool,
}

impl SqliteRangeStore {
    /// Open or create the cache database at the given path.
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        info!(path = %path.display(), "Opened range cache database");
        Ok(store)
    }

    /// Private in-memory database, mostly for tests.
    pub async fn in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;

        // Every connection to :memory: is a separate database, so keep one.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS range_cache (
                namespace TEXT NOT NULL,
                cache_key TEXT NOT NULL,
                layer TEXT NOT NULL,
                path TEXT NOT NULL,
                range_spec TEXT NOT NULL,
                body BLOB NOT NULL,
                cached_at INTEGER NOT NULL,
                original_status INTEGER NOT NULL,
                PRIMARY KEY (namespace, cache_key)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_range_cache_cached_at ON range_cache(namespace, cached_at)",
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    fn row_to_entry(row: &SqliteRow) -> Result<CacheEntry> {
        let key: String = row.try_get("cache_key")?;
        let layer: String = row.try_get("layer")?;
        let layer = CacheLayer::from_str(&layer).map_err(|e| CacheError::corrupt(&key, e))?;
        let body: Vec<u8> = row.try_get("body")?;
        let cached_at = millis_to_datetime(row.try_get("cached_at")?)
            .ok_or_else(|| CacheError::corrupt(&key, "cached_at out of range"))?;
        let original_status: i64 = row.try_get("original_status")?;

        Ok(CacheEntry {
            path: row.try_get("path")?,
            range: row.try_get("range_spec")?,
            body: Bytes::from(body),
            cached_at,
            original_status: u16::try_from(original_status)
                .map_err(|_| CacheError::corrupt(&key, "status out of range"))?,
            layer,
            key,
        })
    }

    fn row_to_summary(row: &SqliteRow) -> Result<EntrySummary> {
        let key: String = row.try_get("cache_key")?;
        let size: i64 = row.try_get("size")?;
        let cached_at = millis_to_datetime(row.try_get("cached_at")?)
            .ok_or_else(|| CacheError::corrupt(&key, "cached_at out of range"))?;
        let original_status: i64 = row.try_get("original_status")?;

        Ok(EntrySummary {
            path: row.try_get("path")?,
            range: row.try_get("range_spec")?,
            size: size.max(0) as u64,
            cached_at,
            original_status: u16::try_from(original_status)
                .map_err(|_| CacheError::corrupt(&key, "status out of range"))?,
            key,
        })
    }
}

fn millis_to_datetime(millis: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(millis).single()
}

#[async_trait]
impl RangeStore for SqliteRangeStore {
    async fn get(&self, namespace: &str, key: &str) -> Result<Option<CacheEntry>> {
        let row = sqlx::query(
            r#"
            SELECT cache_key, layer, path, range_spec, body, cached_at, original_status
            FROM range_cache
            WHERE namespace = ? AND cache_key = ?
            "#,
        )
        .bind(namespace)
        .bind(key)
        .fetch_optional(&self.pool)
        .await?;

        row.as_ref().map(Self::row_to_entry).transpose()
    }

    async fn put(&self, namespace: &str, entry: CacheEntry) -> Result<()> {
        sqlx::query(
            r#"
            INSERT OR REPLACE INTO range_cache
                (namespace, cache_key, layer, path, range_spec, body, cached_at, original_status)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(namespace)
        .bind(&entry.key)
        .bind(entry.layer.as_str())
        .bind(&entry.path)
        .bind(&entry.range)
        .bind(entry.body.as_ref())
        .bind(entry.cached_at.timestamp_millis())
        .bind(entry.original_status as i64)
        .execute(&self.pool)
        .await?;

        debug!(namespace, key = %entry.key, bytes = entry.body.len(), "Stored range");
        Ok(())
    }

    async fn clear(&self, namespace: &str) -> Result<u64> {
        let result = sqlx::query("DELETE FROM range_cache WHERE namespace = ?")
            .bind(namespace)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn stats(&self, namespace: &str) -> Result<CacheStats> {
        let row = sqlx::query(
            r#"
            SELECT COUNT(*) AS entries, COALESCE(SUM(LENGTH(body)), 0) AS total_bytes
            FROM range_cache
            WHERE namespace = ?
            "#,
        )
        .bind(namespace)
        .fetch_one(&self.pool)
        .await?;

        let entries: i64 = row.try_get("entries")?;
        let total_bytes: i64 = row.try_get("total_bytes")?;
        Ok(CacheStats {
            entries: entries.max(0) as u64,
            total_bytes: total_bytes.max(0) as u64,
        })
    }

    async fn list(&self, namespace: &str) -> Result<Vec<EntrySummary>> {
        let rows = sqlx::query(
            r#"
            SELECT cache_key, path, range_spec, LENGTH(body) AS size, cached_at, original_status
            FROM range_cache
            WHERE namespace = ?
            ORDER BY cache_key
            "#,
        )
        .bind(namespace)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(Self::row_to_summary).collect()
    }

    async fn remove_cached_before(&self, namespace: &str, cutoff: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM range_cache WHERE namespace = ? AND cached_at < ?")
            .bind(namespace)
            .bind(cutoff.timestamp_millis())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn namespaces(&self) -> Result<Vec<String>> {
        let rows = sqlx::query("SELECT DISTINCT namespace FROM range_cache ORDER BY namespace")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| row.try_get::<String, _>("namespace").map_err(CacheError::from))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(key: &str, cached_at: DateTime<Utc>) -> CacheEntry {
        CacheEntry {
            key: key.to_string(),
            path: "/data/2025-01-01T0000.om".to_string(),
            range: "bytes=0-3".to_string(),
            body: Bytes::from_static(b"abcd"),
            cached_at,
            original_status: 206,
            layer: CacheLayer::Temp,
        }
    }

    #[tokio::test]
    async fn test_sqlite_put_get_roundtrip() {
        let store = SqliteRangeStore::in_memory().await.unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        store.put("ns", entry("k1", now)).await.unwrap();
        let loaded = store.get("ns", "k1").await.unwrap().unwrap();
        assert_eq!(loaded, entry("k1", now));
        assert!(store.get("other", "k1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sqlite_stats_and_eviction() {
        let store = SqliteRangeStore::in_memory().await.unwrap();
        let now = Utc.with_ymd_and_hms(2025, 1, 10, 0, 0, 0).unwrap();

        store.put("ns", entry("old", now - Duration::days(5))).await.unwrap();
        store.put("ns", entry("new", now)).await.unwrap();

        let stats = store.stats("ns").await.unwrap();
        assert_eq!(stats, CacheStats { entries: 2, total_bytes: 8 });

        let removed = store
            .remove_cached_before("ns", now - Duration::days(1))
            .await
            .unwrap();
        assert_eq!(removed, 1);

        let listed = store.list("ns").await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].key, "new");
        assert_eq!(listed[0].size, 4);
    }

    #[tokio::test]
    async fn test_sqlite_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache").join("ranges.db");
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();

        {
            let store = SqliteRangeStore::open(&path).await.unwrap();
            store.put("ns", entry("k1", now)).await.unwrap();
        }

        let reopened = SqliteRangeStore::open(&path).await.unwrap();
        assert!(reopened.get("ns", "k1").await.unwrap().is_some());
        assert_eq!(reopened.namespaces().await.unwrap(), vec!["ns".to_string()]);
    }
}
