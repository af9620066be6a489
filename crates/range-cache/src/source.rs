//! Range source that consults the cache before the network.

use async_trait::async_trait;
use std::sync::Arc;
use stream_common::{RangeRequest, RangeResponse, RangeSource, SourceResult};
use tracing::{debug, warn};

use crate::cache::RangeCache;

/// Wraps an inner source (normally HTTP) with a [`RangeCache`].
///
/// Hits are served with status 200 and carry the stored fetch time and
/// original status. Misses go to the inner source; successful responses
/// (200 and 206 alike) are stored, and the network response is returned
/// unchanged even if storing it fails.
pub struct CachedSource<S> {
    inner: S,
    cache: Arc<RangeCache>,
}

impl<S: RangeSource> CachedSource<S> {
    pub fn new(inner: S, cache: Arc<RangeCache>) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &Arc<RangeCache> {
        &self.cache
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RangeSource> RangeSource for CachedSource<S> {
    async fn fetch(&self, request: &RangeRequest) -> SourceResult<RangeResponse> {
        match self
            .cache
            .get(request.layer, &request.url, &request.range)
            .await
        {
            Ok(Some(entry)) => {
                debug!(url = %request.url, range = %request.range, layer = %request.layer, "Range cache hit");
                return Ok(RangeResponse {
                    status: 200,
                    body: entry.body,
                    cached_at: Some(entry.cached_at),
                    original_status: Some(entry.original_status),
                });
            }
            Ok(None) => {}
            Err(e) => {
                warn!(url = %request.url, error = %e, "Range cache read failed, going to network");
            }
        }

        let response = self.inner.fetch(request).await?;

        if response.is_success() {
            if let Err(e) = self
                .cache
                .put(
                    request.layer,
                    &request.url,
                    &request.range,
                    response.body.clone(),
                    response.status,
                )
                .await
            {
                warn!(url = %request.url, error = %e, "Failed to store range in cache");
            }
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::store::MemoryRangeStore;
    use bytes::Bytes;
    use stream_common::{ByteRange, CacheLayer, MemorySource};

    const URL: &str = "https://bucket.example/data_spatial/m/2099/01/01/0000Z/2099-01-01T0000.om";

    async fn cached_source() -> CachedSource<Arc<MemorySource>> {
        let origin = Arc::new(MemorySource::new());
        origin.insert(URL, Bytes::from_static(b"0123456789"));
        let cache = RangeCache::open(Arc::new(MemoryRangeStore::new()), &CacheConfig::default())
            .await
            .unwrap();
        CachedSource::new(origin, Arc::new(cache))
    }

    #[tokio::test]
    async fn test_second_read_served_from_cache() {
        let source = cached_source().await;
        let request = RangeRequest::new(URL, ByteRange::span(2, 4), CacheLayer::Temp);

        let first = source.fetch(&request).await.unwrap();
        assert_eq!(first.status, 206);
        assert!(!first.from_cache());

        let second = source.fetch(&request).await.unwrap();
        assert_eq!(second.status, 200);
        assert_eq!(second.original_status, Some(206));
        assert!(second.from_cache());
        assert_eq!(second.body, first.body);
        assert_eq!(source.inner().request_count(), 1);

        let headers = second.side_channel_headers();
        assert!(headers.iter().any(|(name, value)| *name == "x-original-status" && value == "206"));
    }

    #[tokio::test]
    async fn test_query_string_variants_share_entry() {
        let source = cached_source().await;
        let range = ByteRange::span(0, 2);
        source
            .fetch(&RangeRequest::new(URL, range, CacheLayer::Temp))
            .await
            .unwrap();

        // Different query, same path and range: no second network read
        let with_query = format!("{}?token=xyz", URL);
        let response = source.cache().get(CacheLayer::Temp, &with_query, &range).await.unwrap();
        assert!(response.is_some());
    }

    #[tokio::test]
    async fn test_errors_are_not_cached() {
        let source = cached_source().await;
        let request = RangeRequest::new(URL, ByteRange::span(5, 100), CacheLayer::Temp);

        assert!(source.fetch(&request).await.is_err());
        assert!(source.fetch(&request).await.is_err());
        assert_eq!(source.inner().request_count(), 2);
        assert_eq!(source.cache().stats(None).await.unwrap().entries, 0);
    }
}
