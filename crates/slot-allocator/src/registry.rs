//! One pool per parameter.

use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use stream_common::{Param, Timestep};
use tracing::info;

use crate::config::SlotConfig;
use crate::error::{Result, SlotError};
use crate::pool::{Allocation, ParamPool, PoolSnapshot, ShrinkReport, SlotEvent};

/// Owns the slot pools of every parameter.
///
/// Pools are created on first use with the configured capacity and the
/// parameter's slab count.
pub struct SlotRegistry {
    config: SlotConfig,
    pools: BTreeMap<Param, ParamPool>,
}

impl SlotRegistry {
    pub fn new(config: SlotConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            pools: BTreeMap::new(),
        })
    }

    pub fn config(&self) -> &SlotConfig {
        &self.config
    }

    pub fn pool(&self, param: Param) -> Option<&ParamPool> {
        self.pools.get(&param)
    }

    pub fn pool_mut(&mut self, param: Param) -> &mut ParamPool {
        let capacity = self.config.capacity_for(param);
        self.pools.entry(param).or_insert_with(|| {
            info!(param = %param, capacity, slabs = param.slabs_count(), "Creating slot pool");
            ParamPool::new(param, param.slabs_count(), capacity)
        })
    }

    pub fn allocate(&mut self, param: Param, timestep: Timestep, reference: DateTime<Utc>) -> Result<Allocation> {
        self.pool_mut(param).allocate(timestep, reference)
    }

    pub fn mark_loaded(&mut self, param: Param, timestep: Timestep, slot_index: u32, loaded_points: u64) -> Result<bool> {
        self.pool_mut(param).mark_loaded(timestep, slot_index, loaded_points)
    }

    pub fn mark_slab_loaded(&mut self, param: Param, timestep: Timestep, slab: u32) -> bool {
        self.pool_mut(param).mark_slab_loaded(timestep, slab)
    }

    pub fn release(&mut self, param: Param, timestep: Timestep) -> Option<u32> {
        self.pool_mut(param).release(timestep)
    }

    pub fn set_wanted(&mut self, param: Param, timesteps: impl IntoIterator<Item = Timestep>) {
        self.pool_mut(param).set_wanted(timesteps);
    }

    pub fn set_active_pair(&mut self, param: Param, pair: Option<(Timestep, Timestep)>) {
        self.pool_mut(param).set_active_pair(pair);
    }

    pub fn grow(&mut self, param: Param, new_capacity: u32) -> Result<()> {
        if new_capacity > self.config.max_slots {
            return Err(SlotError::invalid_capacity(
                param,
                format!("{} exceeds max_slots {}", new_capacity, self.config.max_slots),
            ));
        }
        self.pool_mut(param).grow(new_capacity)
    }

    pub fn shrink(&mut self, param: Param, new_capacity: u32, kept: &BTreeMap<u32, u32>) -> Result<ShrinkReport> {
        self.pool_mut(param).shrink(new_capacity, kept)
    }

    /// Queued events of every pool, in parameter order.
    pub fn drain_events(&mut self) -> Vec<SlotEvent> {
        self.pools
            .values_mut()
            .flat_map(|pool| pool.drain_events())
            .collect()
    }

    pub fn snapshots(&self) -> Vec<PoolSnapshot> {
        self.pools.values().map(|pool| pool.snapshot()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(hours: i64) -> Timestep {
        Timestep::parse("2025-06-01T0000").unwrap().add_hours(hours)
    }

    #[test]
    fn test_pools_created_with_param_slabs() {
        let mut registry = SlotRegistry::new(SlotConfig::default()).unwrap();
        assert!(registry.pool(Param::Wind).is_none());

        registry.allocate(Param::Wind, ts(0), ts(0).datetime()).unwrap();
        let pool = registry.pool(Param::Wind).unwrap();
        assert_eq!(pool.slabs_count(), 2);
        assert_eq!(pool.capacity(), 8);
    }

    #[test]
    fn test_pools_are_independent() {
        let mut registry = SlotRegistry::new(SlotConfig::default()).unwrap();
        let t = registry.allocate(Param::Temp, ts(0), ts(0).datetime()).unwrap();
        let r = registry.allocate(Param::Rain, ts(0), ts(0).datetime()).unwrap();
        assert_eq!((t.slot_index, r.slot_index), (0, 0));

        let events = registry.drain_events();
        assert_eq!(events.len(), 2);
        assert!(registry.drain_events().is_empty());
        assert_eq!(registry.snapshots().len(), 2);
    }

    #[test]
    fn test_grow_respects_max_slots() {
        let mut registry = SlotRegistry::new(SlotConfig::default()).unwrap();
        assert!(registry.grow(Param::Clouds, 65).is_err());
        registry.grow(Param::Clouds, 16).unwrap();
        assert_eq!(registry.pool(Param::Clouds).unwrap().capacity(), 16);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = SlotConfig {
            slots_per_param: 1,
            ..SlotConfig::default()
        };
        assert!(SlotRegistry::new(config).is_err());
    }
}
