//! Cache control plane.
//!
//! Requests and responses are plain serde types so they can cross a process
//! or message boundary as tagged JSON. [`CacheManager::handle`] serves them
//! directly; [`CacheManager::spawn`] runs the same handler behind a channel.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use stream_common::CacheLayer;
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::cache::RangeCache;
use crate::error::{CacheError, Result};
use crate::store::{CacheStats, EntrySummary, LayerStats};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlRequest {
    ClearAll,
    ClearLayer { layer: CacheLayer },
    GetStats,
    GetLayerStats { layer: CacheLayer },
    EvictOlderThan { days: u32 },
    /// Take over as the active cache controller.
    ClaimControl,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ControlResponse {
    Cleared {
        success: bool,
        count: u64,
    },
    Stats {
        success: bool,
        #[serde(flatten)]
        stats: CacheStats,
        layers: Vec<LayerStats>,
    },
    LayerStats {
        success: bool,
        layer: CacheLayer,
        #[serde(flatten)]
        stats: CacheStats,
        items: Vec<EntrySummary>,
    },
    Evicted {
        success: bool,
        count: u64,
    },
    Claimed {
        success: bool,
        epoch: u64,
    },
    Error {
        success: bool,
        message: String,
    },
}

impl ControlResponse {
    pub fn success(&self) -> bool {
        match self {
            Self::Cleared { success, .. }
            | Self::Stats { success, .. }
            | Self::LayerStats { success, .. }
            | Self::Evicted { success, .. }
            | Self::Claimed { success, .. }
            | Self::Error { success, .. } => *success,
        }
    }

    fn error(err: CacheError) -> Self {
        Self::Error {
            success: false,
            message: err.to_string(),
        }
    }
}

/// Serves control requests against one cache.
pub struct CacheManager {
    cache: Arc<RangeCache>,
    epoch: AtomicU64,
}

impl CacheManager {
    pub fn new(cache: Arc<RangeCache>) -> Self {
        Self {
            cache,
            epoch: AtomicU64::new(0),
        }
    }

    pub fn cache(&self) -> &Arc<RangeCache> {
        &self.cache
    }

    /// Handle one request. Storage failures become an `Error` response.
    pub async fn handle(&self, request: ControlRequest) -> ControlResponse {
        match self.dispatch(request).await {
            Ok(response) => response,
            Err(e) => {
                warn!(error = %e, "Cache control request failed");
                ControlResponse::error(e)
            }
        }
    }

    async fn dispatch(&self, request: ControlRequest) -> Result<ControlResponse> {
        let response = match request {
            ControlRequest::ClearAll => ControlResponse::Cleared {
                success: true,
                count: self.cache.clear(None).await?,
            },
            ControlRequest::ClearLayer { layer } => ControlResponse::Cleared {
                success: true,
                count: self.cache.clear(Some(layer)).await?,
            },
            ControlRequest::GetStats => {
                let layers = self.cache.layer_stats().await?;
                let stats = layers
                    .iter()
                    .fold(CacheStats::default(), |acc, l| acc.merge(l.stats));
                ControlResponse::Stats {
                    success: true,
                    stats,
                    layers,
                }
            }
            ControlRequest::GetLayerStats { layer } => ControlResponse::LayerStats {
                success: true,
                layer,
                stats: self.cache.stats(Some(layer)).await?,
                items: self.cache.items(layer).await?,
            },
            ControlRequest::EvictOlderThan { days } => ControlResponse::Evicted {
                success: true,
                count: self.cache.evict_older_than(days).await?,
            },
            ControlRequest::ClaimControl => {
                let epoch = self.epoch.fetch_add(1, Ordering::SeqCst) + 1;
                info!(epoch, "Cache control claimed");
                ControlResponse::Claimed {
                    success: true,
                    epoch,
                }
            }
        };
        Ok(response)
    }

    /// Run the manager on its own task and return a handle to it.
    ///
    /// The loop ends when every handle has been dropped.
    pub fn spawn(self) -> ControlHandle {
        let (tx, mut rx) = mpsc::channel::<(ControlRequest, oneshot::Sender<ControlResponse>)>(32);

        tokio::spawn(async move {
            while let Some((request, reply)) = rx.recv().await {
                let response = self.handle(request).await;
                // Caller may have given up waiting
                let _ = reply.send(response);
            }
            info!("Cache control loop stopped");
        });

        ControlHandle { tx }
    }
}

/// Sends requests to a spawned [`CacheManager`].
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<(ControlRequest, oneshot::Sender<ControlResponse>)>,
}

impl ControlHandle {
    pub async fn request(&self, request: ControlRequest) -> Result<ControlResponse> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send((request, reply_tx))
            .await
            .map_err(|_| CacheError::ChannelClosed)?;
        reply_rx.await.map_err(|_| CacheError::ChannelClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheConfig;
    use crate::store::MemoryRangeStore;
    use bytes::Bytes;
    use stream_common::ByteRange;

    const URL: &str = "https://bucket.example/data_spatial/m/2025/06/01/0000Z/2025-06-01T0000.om";

    async fn manager() -> CacheManager {
        let cache = RangeCache::open(Arc::new(MemoryRangeStore::new()), &CacheConfig::default())
            .await
            .unwrap();
        let cache = Arc::new(cache);
        cache
            .put(CacheLayer::Temp, URL, &ByteRange::span(0, 4), Bytes::from_static(b"abcd"), 206)
            .await
            .unwrap();
        cache
            .put(CacheLayer::Wind, URL, &ByteRange::span(4, 2), Bytes::from_static(b"ef"), 206)
            .await
            .unwrap();
        CacheManager::new(cache)
    }

    #[tokio::test]
    async fn test_stats_and_layer_stats() {
        let manager = manager().await;

        match manager.handle(ControlRequest::GetStats).await {
            ControlResponse::Stats { success, stats, layers } => {
                assert!(success);
                assert_eq!(stats, CacheStats { entries: 2, total_bytes: 6 });
                assert_eq!(layers.len(), CacheLayer::ALL.len());
            }
            other => panic!("unexpected response: {:?}", other),
        }

        match manager
            .handle(ControlRequest::GetLayerStats { layer: CacheLayer::Wind })
            .await
        {
            ControlResponse::LayerStats { stats, items, .. } => {
                assert_eq!(stats.entries, 1);
                assert_eq!(items.len(), 1);
                assert_eq!(items[0].range, "bytes=4-5");
            }
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_clear_through_spawned_loop() {
        let handle = manager().await.spawn();

        let response = handle
            .request(ControlRequest::ClearLayer { layer: CacheLayer::Temp })
            .await
            .unwrap();
        assert_eq!(response, ControlResponse::Cleared { success: true, count: 1 });

        let response = handle.request(ControlRequest::ClearAll).await.unwrap();
        assert_eq!(response, ControlResponse::Cleared { success: true, count: 1 });

        let first = handle.request(ControlRequest::ClaimControl).await.unwrap();
        let second = handle.request(ControlRequest::ClaimControl).await.unwrap();
        assert_eq!(first, ControlResponse::Claimed { success: true, epoch: 1 });
        assert_eq!(second, ControlResponse::Claimed { success: true, epoch: 2 });
    }

    #[test]
    fn test_messages_are_tagged_json() {
        let request: ControlRequest =
            serde_json::from_str(r#"{"type":"evict_older_than","days":7}"#).unwrap();
        assert_eq!(request, ControlRequest::EvictOlderThan { days: 7 });

        let json = serde_json::to_value(ControlResponse::Evicted { success: true, count: 3 }).unwrap();
        assert_eq!(json["type"], "evicted");
        assert_eq!(json["success"], true);
        assert_eq!(json["count"], 3);
    }
}
