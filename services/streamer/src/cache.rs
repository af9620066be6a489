//! `cache`: drive the range cache control plane.

use anyhow::{bail, Result};
use clap::Subcommand;
use range_cache::{CacheManager, ControlRequest, RangeCache};
use std::sync::Arc;
use stream_common::CacheLayer;

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum CacheAction {
    /// Entry counts and byte totals, per layer or for one layer with items
    Stats {
        #[arg(long)]
        layer: Option<CacheLayer>,
    },
    /// Remove every entry, or every entry of one layer
    Clear {
        #[arg(long)]
        layer: Option<CacheLayer>,
    },
    /// Remove entries cached more than `days` ago
    Evict {
        #[arg(long, default_value = "28")]
        days: u32,
    },
    /// Become the active cache controller
    Claim,
}

impl CacheAction {
    pub fn request(&self) -> ControlRequest {
        match *self {
            CacheAction::Stats { layer: None } => ControlRequest::GetStats,
            CacheAction::Stats { layer: Some(layer) } => ControlRequest::GetLayerStats { layer },
            CacheAction::Clear { layer: None } => ControlRequest::ClearAll,
            CacheAction::Clear { layer: Some(layer) } => ControlRequest::ClearLayer { layer },
            CacheAction::Evict { days } => ControlRequest::EvictOlderThan { days },
            CacheAction::Claim => ControlRequest::ClaimControl,
        }
    }
}

pub async fn run(cache: Arc<RangeCache>, action: &CacheAction) -> Result<()> {
    let handle = CacheManager::new(cache).spawn();
    let response = handle.request(action.request()).await?;
    println!("{}", serde_json::to_string_pretty(&response)?);

    if !response.success() {
        bail!("cache command {:?} failed", action);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use range_cache::{CacheConfig, MemoryRangeStore};

    #[test]
    fn test_actions_map_to_requests() {
        assert_eq!(CacheAction::Stats { layer: None }.request(), ControlRequest::GetStats);
        assert_eq!(
            CacheAction::Clear {
                layer: Some(CacheLayer::Wind)
            }
            .request(),
            ControlRequest::ClearLayer {
                layer: CacheLayer::Wind
            }
        );
        assert_eq!(
            CacheAction::Evict { days: 3 }.request(),
            ControlRequest::EvictOlderThan { days: 3 }
        );
    }

    #[tokio::test]
    async fn test_run_against_empty_cache() {
        let cache = RangeCache::open(Arc::new(MemoryRangeStore::new()), &CacheConfig::default())
            .await
            .unwrap();
        run(Arc::new(cache), &CacheAction::Clear { layer: None })
            .await
            .unwrap();
    }
}
