//! The byte-range transport seam.
//!
//! Everything that reads remote containers goes through [`RangeSource`], so
//! the HTTP client, the caching wrapper and in-memory test sources are
//! interchangeable.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::debug;

use crate::error::{SourceError, SourceResult};
use crate::layer::CacheLayer;
use crate::range::ByteRange;

/// Request-side header naming the logical cache layer. Stripped before the
/// request is forwarded to the origin.
pub const LAYER_HEADER: &str = "x-cache-layer";
/// Response-side header carrying the fetch time of a cached copy (RFC 3339).
pub const CACHED_AT_HEADER: &str = "x-cached-at";
/// Response-side header carrying the status of the original network response.
pub const ORIGINAL_STATUS_HEADER: &str = "x-original-status";

/// A single byte-range read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub url: String,
    pub range: ByteRange,
    /// Logical cache partition. Travels as a side channel and is never
    /// forwarded to the origin server.
    pub layer: CacheLayer,
}

impl RangeRequest {
    pub fn new(url: impl Into<String>, range: ByteRange, layer: CacheLayer) -> Self {
        Self {
            url: url.into(),
            range,
            layer,
        }
    }
}

/// Result of a byte-range read.
#[derive(Debug, Clone)]
pub struct RangeResponse {
    /// Status as seen by the caller (200 or 206 from the network).
    pub status: u16,
    pub body: Bytes,
    /// Fetch time of the stored copy when served from a cache.
    pub cached_at: Option<DateTime<Utc>>,
    /// Status of the original network response when served from a cache.
    pub original_status: Option<u16>,
}

impl RangeResponse {
    pub fn network(status: u16, body: Bytes) -> Self {
        Self {
            status,
            body,
            cached_at: None,
            original_status: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == 200 || self.status == 206
    }

    pub fn from_cache(&self) -> bool {
        self.cached_at.is_some()
    }

    /// Side-channel headers describing a cached copy, empty for network responses.
    pub fn side_channel_headers(&self) -> Vec<(&'static str, String)> {
        let mut headers = Vec::new();
        if let Some(cached_at) = self.cached_at {
            headers.push((CACHED_AT_HEADER, cached_at.to_rfc3339()));
        }
        if let Some(status) = self.original_status {
            headers.push((ORIGINAL_STATUS_HEADER, status.to_string()));
        }
        headers
    }
}

/// Anything that can serve byte ranges of remote files.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Perform one range read.
    async fn fetch(&self, request: &RangeRequest) -> SourceResult<RangeResponse>;

    /// Convenience wrapper returning only the body.
    async fn read(&self, url: &str, range: ByteRange, layer: CacheLayer) -> SourceResult<Bytes> {
        let request = RangeRequest::new(url, range, layer);
        let response = self.fetch(&request).await?;
        if !response.is_success() {
            return Err(SourceError::Http {
                status: response.status,
                url: url.to_string(),
            });
        }
        Ok(response.body)
    }
}

#[async_trait]
impl<T: RangeSource + ?Sized> RangeSource for Arc<T> {
    async fn fetch(&self, request: &RangeRequest) -> SourceResult<RangeResponse> {
        (**self).fetch(request).await
    }
}

/// In-memory range source.
///
/// Serves whole files registered by URL, answering like a range-capable
/// server (206 for spans, suffix ranges clamped to the file). Counts
/// requests so callers can verify how much traffic reached the "network".
#[derive(Default)]
pub struct MemorySource {
    files: RwLock<HashMap<String, Bytes>>,
    latency: Option<Duration>,
    requests: AtomicU64,
    bytes_served: AtomicU64,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Delay every response by `latency` to simulate a slow network.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn insert(&self, url: impl Into<String>, data: impl Into<Bytes>) {
        if let Ok(mut files) = self.files.write() {
            files.insert(url.into(), data.into());
        }
    }

    pub fn request_count(&self) -> u64 {
        self.requests.load(Ordering::Relaxed)
    }

    pub fn bytes_served(&self) -> u64 {
        self.bytes_served.load(Ordering::Relaxed)
    }

    fn lookup(&self, url: &str) -> Option<Bytes> {
        self.files.read().ok()?.get(url).cloned()
    }
}

#[async_trait]
impl RangeSource for MemorySource {
    async fn fetch(&self, request: &RangeRequest) -> SourceResult<RangeResponse> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        self.requests.fetch_add(1, Ordering::Relaxed);

        let data = self
            .lookup(&request.url)
            .ok_or_else(|| SourceError::NotFound(request.url.clone()))?;
        let len = data.len() as u64;

        let span = request
            .range
            .resolve(len)
            .ok_or_else(|| SourceError::RangeNotSatisfiable {
                url: request.url.clone(),
                range: request.range.to_string(),
                len,
            })?;

        // resolve() guarantees the span fits inside `data`
        let start = span.offset as usize;
        let end = start + span.size as usize;
        let body = data.slice(start..end);
        self.bytes_served.fetch_add(body.len() as u64, Ordering::Relaxed);

        debug!(url = %request.url, range = %request.range, bytes = body.len(), "Served memory range");
        Ok(RangeResponse::network(206, body))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_source_serves_spans_and_suffixes() {
        let source = MemorySource::new();
        source.insert("mem://a.om", Bytes::from_static(b"0123456789"));

        let body = source
            .read("mem://a.om", ByteRange::span(2, 3), CacheLayer::Meta)
            .await
            .unwrap();
        assert_eq!(&body[..], b"234");

        let tail = source
            .read("mem://a.om", ByteRange::suffix(4), CacheLayer::Meta)
            .await
            .unwrap();
        assert_eq!(&tail[..], b"6789");
        assert_eq!(source.request_count(), 2);
        assert_eq!(source.bytes_served(), 7);
    }

    #[tokio::test]
    async fn test_memory_source_errors() {
        let source = MemorySource::new();
        source.insert("mem://a.om", Bytes::from_static(b"0123"));

        let missing = source
            .read("mem://b.om", ByteRange::span(0, 1), CacheLayer::Meta)
            .await;
        assert!(matches!(missing, Err(SourceError::NotFound(_))));

        let outside = source
            .read("mem://a.om", ByteRange::span(2, 10), CacheLayer::Meta)
            .await;
        assert!(matches!(outside, Err(SourceError::RangeNotSatisfiable { .. })));
    }
}
