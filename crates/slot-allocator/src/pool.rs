//! Per-parameter slot pool.
//!
//! A pool owns `capacity` buffer indices. Each timestep that has been
//! allocated owns exactly one index until it is evicted or dropped by a
//! shrink; every other index sits on the free stack.
//!
//! ```text
//!            allocate                 mark_loaded / all slabs
//!   free ─────────────► loading ──────────────────────────────► loaded
//!    ▲                     │                                      │
//!    │      release        │                                      │
//!    ├─────────────────────┘          evict (not wanted,          │
//!    │                                not loading, furthest)      │
//!    └────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use metrics::counter;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use stream_common::{Param, Timestep};
use tracing::{debug, info, warn};

use crate::error::{Result, SlotError};

/// A buffer index owned by one timestep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Slot {
    pub timestep: Timestep,
    pub slot_index: u32,
    pub loaded: bool,
    pub loaded_points: u64,
    pub slabs_count: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Eviction {
    pub timestep: Timestep,
    pub slot_index: u32,
}

/// Result of [`ParamPool::allocate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Allocation {
    pub slot_index: u32,
    /// The slot whose index was taken over, if any.
    pub evicted: Option<Eviction>,
    /// The timestep already owned this slot.
    pub existing: bool,
}

/// State changes, queued until drained by the owner.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SlotEvent {
    Allocated {
        param: Param,
        timestep: Timestep,
        slot_index: u32,
    },
    Evicted {
        param: Param,
        timestep: Timestep,
        slot_index: u32,
    },
    Loaded {
        param: Param,
        timestep: Timestep,
        slot_index: u32,
    },
    /// Removed by `shrink` or `release`.
    Dropped {
        param: Param,
        timestep: Timestep,
        slot_index: u32,
    },
    Resized {
        param: Param,
        capacity: u32,
    },
}

/// Immutable copy of a pool's state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSnapshot {
    pub param: Param,
    pub capacity: u32,
    pub slabs_count: u32,
    pub free: Vec<u32>,
    /// Ordered by timestep.
    pub slots: Vec<Slot>,
    pub loading: Vec<Timestep>,
    pub wanted: Vec<Timestep>,
    pub active_pair: Option<(Timestep, Timestep)>,
}

impl PoolSnapshot {
    pub fn slot(&self, timestep: Timestep) -> Option<&Slot> {
        self.slots.iter().find(|s| s.timestep == timestep)
    }

    pub fn ready(&self) -> impl Iterator<Item = &Slot> {
        self.slots.iter().filter(|s| s.loaded)
    }
}

/// Outcome of [`ParamPool::shrink`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ShrinkReport {
    pub dropped: Vec<Eviction>,
    /// `(timestep, old index, new index)`
    pub remapped: Vec<(Timestep, u32, u32)>,
}

pub struct ParamPool {
    param: Param,
    slabs_count: u32,
    capacity: u32,
    /// Stack; the lowest index is on top.
    free: Vec<u32>,
    slots: BTreeMap<Timestep, Slot>,
    loading: BTreeSet<Timestep>,
    wanted: BTreeSet<Timestep>,
    slabs_loaded: HashMap<u32, BTreeSet<u32>>,
    active_pair: Option<(Timestep, Timestep)>,
    events: Vec<SlotEvent>,
}

impl ParamPool {
    pub fn new(param: Param, slabs_count: u32, capacity: u32) -> Self {
        Self {
            param,
            slabs_count: slabs_count.max(1),
            capacity,
            free: (0..capacity).rev().collect(),
            slots: BTreeMap::new(),
            loading: BTreeSet::new(),
            wanted: BTreeSet::new(),
            slabs_loaded: HashMap::new(),
            active_pair: None,
            events: Vec::new(),
        }
    }

    pub fn param(&self) -> Param {
        self.param
    }

    pub fn slabs_count(&self) -> u32 {
        self.slabs_count
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn free_count(&self) -> usize {
        self.free.len()
    }

    pub fn slot(&self, timestep: Timestep) -> Option<&Slot> {
        self.slots.get(&timestep)
    }

    pub fn slot_at(&self, slot_index: u32) -> Option<&Slot> {
        self.slots.values().find(|s| s.slot_index == slot_index)
    }

    pub fn is_loading(&self, timestep: Timestep) -> bool {
        self.loading.contains(&timestep)
    }

    pub fn is_ready(&self, timestep: Timestep) -> bool {
        self.slots.get(&timestep).is_some_and(|s| s.loaded)
    }

    pub fn wanted(&self) -> &BTreeSet<Timestep> {
        &self.wanted
    }

    pub fn active_pair(&self) -> Option<(Timestep, Timestep)> {
        self.active_pair
    }

    /// Replace the window of timesteps that must not be evicted.
    pub fn set_wanted(&mut self, timesteps: impl IntoIterator<Item = Timestep>) {
        self.wanted = timesteps.into_iter().collect();
        debug!(param = %self.param, wanted = self.wanted.len(), "Wanted window updated");
    }

    /// The pair currently being displayed; both members are protected.
    pub fn set_active_pair(&mut self, pair: Option<(Timestep, Timestep)>) {
        self.active_pair = pair;
    }

    /// Give `timestep` a slot.
    ///
    /// Returns the existing slot if it already has one. Otherwise takes a
    /// free index, or evicts the loaded slot furthest from `reference` that
    /// is neither wanted, loading nor part of the active pair. Equidistant
    /// candidates resolve to the lowest index.
    pub fn allocate(&mut self, timestep: Timestep, reference: DateTime<Utc>) -> Result<Allocation> {
        if let Some(slot) = self.slots.get(&timestep) {
            return Ok(Allocation {
                slot_index: slot.slot_index,
                evicted: None,
                existing: true,
            });
        }

        let (slot_index, evicted) = match self.free.pop() {
            Some(index) => (index, None),
            None => {
                let victim = self.eviction_candidate(reference).ok_or(SlotError::PoolExhausted {
                    param: self.param,
                    capacity: self.capacity,
                    timestep,
                })?;
                let eviction = self.evict(victim);
                (eviction.slot_index, Some(eviction))
            }
        };

        self.slots.insert(
            timestep,
            Slot {
                timestep,
                slot_index,
                loaded: false,
                loaded_points: 0,
                slabs_count: self.slabs_count,
            },
        );
        self.loading.insert(timestep);
        self.events.push(SlotEvent::Allocated {
            param: self.param,
            timestep,
            slot_index,
        });
        debug!(param = %self.param, timestep = %timestep, slot_index, "Slot allocated");

        Ok(Allocation {
            slot_index,
            evicted,
            existing: false,
        })
    }

    fn is_protected(&self, timestep: Timestep) -> bool {
        self.wanted.contains(&timestep)
            || self.loading.contains(&timestep)
            || self
                .active_pair
                .is_some_and(|(a, b)| a == timestep || b == timestep)
    }

    fn eviction_candidate(&self, reference: DateTime<Utc>) -> Option<Timestep> {
        self.slots
            .values()
            .filter(|s| s.loaded && !self.is_protected(s.timestep))
            .max_by(|a, b| {
                a.timestep
                    .distance(reference)
                    .cmp(&b.timestep.distance(reference))
                    // Lower index wins ties
                    .then(b.slot_index.cmp(&a.slot_index))
            })
            .map(|s| s.timestep)
    }

    fn evict(&mut self, timestep: Timestep) -> Eviction {
        // Only called with a timestep taken from `slots`
        let slot_index = self
            .slots
            .remove(&timestep)
            .map(|s| s.slot_index)
            .unwrap_or_default();
        self.slabs_loaded.remove(&slot_index);

        counter!("slot_evictions_total", "param" => self.param.as_str()).increment(1);
        self.events.push(SlotEvent::Evicted {
            param: self.param,
            timestep,
            slot_index,
        });
        info!(param = %self.param, timestep = %timestep, slot_index, "Evicted slot");

        Eviction {
            timestep,
            slot_index,
        }
    }

    /// Record that the data for `timestep` has been written to `slot_index`.
    ///
    /// Single-slab parameters become loaded immediately; multi-slab
    /// parameters wait for every slab via [`Self::mark_slab_loaded`].
    /// Returns whether the slot is loaded afterwards. An unknown timestep
    /// is logged and ignored.
    pub fn mark_loaded(&mut self, timestep: Timestep, slot_index: u32, loaded_points: u64) -> Result<bool> {
        let Some(slot) = self.slots.get_mut(&timestep) else {
            warn!(param = %self.param, timestep = %timestep, slot_index, "mark_loaded for unknown timestep");
            return Ok(false);
        };
        if slot.slot_index != slot_index {
            return Err(SlotError::SlotMismatch {
                timestep,
                owned: slot.slot_index,
                given: slot_index,
            });
        }
        slot.loaded_points = loaded_points;

        if self.slabs_count > 1 {
            let loaded = slot.loaded;
            debug!(param = %self.param, timestep = %timestep, loaded, "Waiting for remaining slabs");
            return Ok(loaded);
        }

        self.finish_load(timestep);
        Ok(true)
    }

    /// Record one slab of `timestep`. Returns whether the slot is loaded.
    pub fn mark_slab_loaded(&mut self, timestep: Timestep, slab: u32) -> bool {
        let Some(slot_index) = self.slots.get(&timestep).map(|s| s.slot_index) else {
            warn!(param = %self.param, timestep = %timestep, slab, "Slab loaded for unknown timestep");
            return false;
        };
        if slab >= self.slabs_count {
            warn!(param = %self.param, timestep = %timestep, slab, slabs = self.slabs_count, "Slab out of range");
            return self.is_ready(timestep);
        }

        let slabs = self.slabs_loaded.entry(slot_index).or_default();
        slabs.insert(slab);
        if slabs.len() as u32 == self.slabs_count {
            self.finish_load(timestep);
            true
        } else {
            false
        }
    }

    fn finish_load(&mut self, timestep: Timestep) {
        self.loading.remove(&timestep);
        if let Some(slot) = self.slots.get_mut(&timestep) {
            if !slot.loaded {
                slot.loaded = true;
                self.events.push(SlotEvent::Loaded {
                    param: self.param,
                    timestep,
                    slot_index: slot.slot_index,
                });
                debug!(param = %self.param, timestep = %timestep, slot_index = slot.slot_index, "Slot ready");
            }
        }
    }

    /// Return the slot of an abandoned load to the free stack.
    ///
    /// Loaded slots are kept. Returns the freed index.
    pub fn release(&mut self, timestep: Timestep) -> Option<u32> {
        if self.slots.get(&timestep)?.loaded {
            return None;
        }
        let slot = self.slots.remove(&timestep)?;
        self.loading.remove(&timestep);
        self.slabs_loaded.remove(&slot.slot_index);
        self.push_free(slot.slot_index);
        self.events.push(SlotEvent::Dropped {
            param: self.param,
            timestep,
            slot_index: slot.slot_index,
        });
        debug!(param = %self.param, timestep = %timestep, slot_index = slot.slot_index, "Released slot");
        Some(slot.slot_index)
    }

    fn push_free(&mut self, index: u32) {
        self.free.push(index);
        self.free.sort_unstable_by(|a, b| b.cmp(a));
    }

    /// Add free indices up to `new_capacity`. Existing slots are untouched.
    pub fn grow(&mut self, new_capacity: u32) -> Result<()> {
        if new_capacity < self.capacity {
            return Err(SlotError::invalid_capacity(
                self.param,
                format!("grow to {} below current {}", new_capacity, self.capacity),
            ));
        }
        if new_capacity == self.capacity {
            return Ok(());
        }

        self.free.extend(self.capacity..new_capacity);
        self.free.sort_unstable_by(|a, b| b.cmp(a));
        self.capacity = new_capacity;
        self.events.push(SlotEvent::Resized {
            param: self.param,
            capacity: new_capacity,
        });
        info!(param = %self.param, capacity = new_capacity, "Pool grown");
        Ok(())
    }

    /// Rebuild the pool at `new_capacity`, keeping only loaded slots listed
    /// in `kept` (old index to new index).
    ///
    /// Everything else is dropped. Loading state and partial slab progress
    /// are cleared, and the active pair is cleared if a member was dropped.
    pub fn shrink(&mut self, new_capacity: u32, kept: &BTreeMap<u32, u32>) -> Result<ShrinkReport> {
        if new_capacity == 0 || new_capacity > self.capacity {
            return Err(SlotError::invalid_capacity(
                self.param,
                format!("shrink to {} from {}", new_capacity, self.capacity),
            ));
        }

        let owned: BTreeSet<u32> = self.slots.values().map(|s| s.slot_index).collect();
        let mut targets = BTreeSet::new();
        for (&old, &new) in kept {
            if !owned.contains(&old) {
                return Err(SlotError::invalid_shrink(
                    self.param,
                    format!("index {} is not owned by any timestep", old),
                ));
            }
            if new >= new_capacity {
                return Err(SlotError::invalid_shrink(
                    self.param,
                    format!("target {} outside capacity {}", new, new_capacity),
                ));
            }
            if !targets.insert(new) {
                return Err(SlotError::invalid_shrink(
                    self.param,
                    format!("target {} used twice", new),
                ));
            }
        }

        let old_slots = std::mem::take(&mut self.slots);
        let old_slabs = std::mem::take(&mut self.slabs_loaded);
        let mut report = ShrinkReport::default();

        for (timestep, mut slot) in old_slots {
            let old_index = slot.slot_index;
            match kept.get(&old_index) {
                Some(&new_index) if slot.loaded => {
                    if let Some(slabs) = old_slabs.get(&old_index) {
                        self.slabs_loaded.insert(new_index, slabs.clone());
                    }
                    slot.slot_index = new_index;
                    self.slots.insert(timestep, slot);
                    report.remapped.push((timestep, old_index, new_index));
                }
                _ => {
                    self.events.push(SlotEvent::Dropped {
                        param: self.param,
                        timestep,
                        slot_index: old_index,
                    });
                    report.dropped.push(Eviction {
                        timestep,
                        slot_index: old_index,
                    });
                }
            }
        }

        self.loading.clear();
        self.capacity = new_capacity;
        let used: BTreeSet<u32> = self.slots.values().map(|s| s.slot_index).collect();
        self.free = (0..new_capacity).rev().filter(|i| !used.contains(i)).collect();

        if let Some((a, b)) = self.active_pair {
            if !self.slots.contains_key(&a) || !self.slots.contains_key(&b) {
                self.active_pair = None;
            }
        }

        self.events.push(SlotEvent::Resized {
            param: self.param,
            capacity: new_capacity,
        });
        info!(
            param = %self.param,
            capacity = new_capacity,
            kept = report.remapped.len(),
            dropped = report.dropped.len(),
            "Pool shrunk"
        );
        Ok(report)
    }

    pub fn drain_events(&mut self) -> Vec<SlotEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn snapshot(&self) -> PoolSnapshot {
        let mut free = self.free.clone();
        free.sort_unstable();
        PoolSnapshot {
            param: self.param,
            capacity: self.capacity,
            slabs_count: self.slabs_count,
            free,
            slots: self.slots.values().cloned().collect(),
            loading: self.loading.iter().copied().collect(),
            wanted: self.wanted.iter().copied().collect(),
            active_pair: self.active_pair,
        }
    }

    /// Check the structural invariants, describing the first violation.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let mut seen = BTreeSet::new();
        for &index in &self.free {
            if index >= self.capacity || !seen.insert(index) {
                return Err(format!("free index {} invalid or repeated", index));
            }
        }
        for slot in self.slots.values() {
            if slot.slot_index >= self.capacity || !seen.insert(slot.slot_index) {
                return Err(format!(
                    "{} holds index {} which is out of range or shared",
                    slot.timestep, slot.slot_index
                ));
            }
            if self.slabs_count > 1 {
                let slabs = self
                    .slabs_loaded
                    .get(&slot.slot_index)
                    .map_or(0, |s| s.len() as u32);
                if slot.loaded != (slabs == self.slabs_count) {
                    return Err(format!(
                        "{} loaded={} with {}/{} slabs",
                        slot.timestep, slot.loaded, slabs, self.slabs_count
                    ));
                }
            }
        }
        if seen.len() as u32 != self.capacity {
            return Err(format!("{} of {} indices accounted for", seen.len(), self.capacity));
        }
        if let Some(ts) = self.loading.iter().find(|ts| !self.slots.contains_key(ts)) {
            return Err(format!("{} is loading without a slot", ts));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn ts(hours: i64) -> Timestep {
        Timestep::parse("2025-06-01T0000").unwrap().add_hours(hours)
    }

    fn reference(hours: i64) -> DateTime<Utc> {
        ts(0).datetime() + Duration::hours(hours)
    }

    fn loaded_pool(capacity: u32, hours: &[i64]) -> ParamPool {
        let mut pool = ParamPool::new(Param::Temp, 1, capacity);
        for &h in hours {
            let a = pool.allocate(ts(h), reference(0)).unwrap();
            pool.mark_loaded(ts(h), a.slot_index, 100).unwrap();
        }
        pool
    }

    #[test]
    fn test_allocate_is_idempotent() {
        let mut pool = ParamPool::new(Param::Temp, 1, 4);
        let first = pool.allocate(ts(0), reference(0)).unwrap();
        let again = pool.allocate(ts(0), reference(0)).unwrap();
        assert_eq!(first.slot_index, 0);
        assert!(!first.existing);
        assert_eq!(again.slot_index, 0);
        assert!(again.existing);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.free_count(), 3);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn test_free_indices_hand_out_lowest_first() {
        let mut pool = ParamPool::new(Param::Temp, 1, 3);
        let indices: Vec<u32> = (0..3)
            .map(|h| pool.allocate(ts(h), reference(0)).unwrap().slot_index)
            .collect();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn test_evicts_furthest_loaded_slot() {
        let mut pool = loaded_pool(3, &[0, 1, 2]);
        let a = pool.allocate(ts(3), reference(3)).unwrap();
        assert_eq!(
            a.evicted,
            Some(Eviction {
                timestep: ts(0),
                slot_index: 0
            })
        );
        assert_eq!(a.slot_index, 0);
        assert!(pool.slot(ts(0)).is_none());
        pool.check_invariants().unwrap();
    }

    #[test]
    fn test_tie_breaks_to_lowest_index() {
        // ts(0) and ts(2) are both one hour from the reference
        let mut pool = loaded_pool(2, &[2, 0]);
        assert_eq!(pool.slot(ts(2)).unwrap().slot_index, 0);
        let a = pool.allocate(ts(5), reference(1)).unwrap();
        assert_eq!(a.evicted.unwrap().timestep, ts(2));
        assert_eq!(a.slot_index, 0);
    }

    #[test]
    fn test_wanted_and_active_pair_are_protected() {
        let mut pool = loaded_pool(3, &[0, 1, 2]);
        pool.set_wanted([ts(0)]);
        pool.set_active_pair(Some((ts(1), ts(2))));
        let err = pool.allocate(ts(3), reference(3)).unwrap_err();
        assert!(err.is_exhausted());

        pool.set_active_pair(None);
        let a = pool.allocate(ts(3), reference(3)).unwrap();
        assert_eq!(a.evicted.unwrap().timestep, ts(1));
    }

    #[test]
    fn test_loading_slots_are_not_evicted() {
        let mut pool = ParamPool::new(Param::Temp, 1, 1);
        pool.allocate(ts(0), reference(0)).unwrap();
        assert!(pool.is_loading(ts(0)));
        assert!(pool.allocate(ts(1), reference(1)).is_err());
    }

    #[test]
    fn test_multi_slab_waits_for_every_slab() {
        let mut pool = ParamPool::new(Param::Wind, 2, 2);
        let a = pool.allocate(ts(0), reference(0)).unwrap();

        assert!(!pool.mark_loaded(ts(0), a.slot_index, 500).unwrap());
        assert!(!pool.is_ready(ts(0)));
        assert!(!pool.mark_slab_loaded(ts(0), 1));
        // Repeating a slab does not count twice
        assert!(!pool.mark_slab_loaded(ts(0), 1));
        pool.check_invariants().unwrap();

        assert!(pool.mark_slab_loaded(ts(0), 0));
        assert!(pool.is_ready(ts(0)));
        assert!(!pool.is_loading(ts(0)));
        assert_eq!(pool.slot(ts(0)).unwrap().loaded_points, 500);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn test_unknown_timestep_is_ignored() {
        let mut pool = ParamPool::new(Param::Wind, 2, 2);
        assert!(!pool.mark_slab_loaded(ts(9), 0));
        assert!(!pool.mark_loaded(ts(9), 0, 1).unwrap());
        assert!(pool.is_empty());
        assert!(pool.drain_events().is_empty());
    }

    #[test]
    fn test_mark_loaded_checks_slot_index() {
        let mut pool = ParamPool::new(Param::Temp, 1, 2);
        pool.allocate(ts(0), reference(0)).unwrap();
        let err = pool.mark_loaded(ts(0), 1, 10).unwrap_err();
        assert_eq!(
            err,
            SlotError::SlotMismatch {
                timestep: ts(0),
                owned: 0,
                given: 1
            }
        );
    }

    #[test]
    fn test_grow_keeps_slots() {
        let mut pool = loaded_pool(2, &[0, 1]);
        pool.grow(4).unwrap();
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.slot(ts(1)).unwrap().slot_index, 1);
        let a = pool.allocate(ts(2), reference(0)).unwrap();
        assert_eq!(a.slot_index, 2);
        assert!(a.evicted.is_none());
        assert!(pool.grow(3).is_err());
        pool.check_invariants().unwrap();
    }

    #[test]
    fn test_shrink_remaps_and_drops() {
        let mut pool = loaded_pool(4, &[0, 1, 2]);
        pool.allocate(ts(3), reference(0)).unwrap(); // still loading
        pool.set_active_pair(Some((ts(0), ts(1))));

        let kept = BTreeMap::from([(2, 0), (3, 1)]);
        let report = pool.shrink(2, &kept).unwrap();

        assert_eq!(report.remapped, vec![(ts(2), 2, 0)]);
        let dropped: Vec<Timestep> = report.dropped.iter().map(|e| e.timestep).collect();
        assert_eq!(dropped, vec![ts(0), ts(1), ts(3)]);
        assert_eq!(pool.capacity(), 2);
        assert_eq!(pool.slot(ts(2)).unwrap().slot_index, 0);
        assert!(pool.active_pair().is_none());
        assert!(!pool.is_loading(ts(3)));
        assert_eq!(pool.free_count(), 1);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn test_shrink_rejects_bad_mapping() {
        let mut pool = loaded_pool(4, &[0, 1]);
        assert!(pool.shrink(2, &BTreeMap::from([(3, 0)])).is_err());
        assert!(pool.shrink(2, &BTreeMap::from([(0, 2)])).is_err());
        assert!(pool.shrink(2, &BTreeMap::from([(0, 1), (1, 1)])).is_err());
        assert!(pool.shrink(5, &BTreeMap::new()).is_err());
        // Nothing changed
        assert_eq!(pool.capacity(), 4);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn test_release_frees_unloaded_slot() {
        let mut pool = loaded_pool(3, &[0]);
        pool.allocate(ts(1), reference(0)).unwrap();
        assert_eq!(pool.release(ts(0)), None);
        assert_eq!(pool.release(ts(1)), Some(1));
        assert_eq!(pool.allocate(ts(2), reference(0)).unwrap().slot_index, 1);
        pool.check_invariants().unwrap();
    }

    #[test]
    fn test_events_are_drained_once() {
        let mut pool = loaded_pool(1, &[0]);
        pool.allocate(ts(1), reference(1)).unwrap();
        let events = pool.drain_events();
        assert_eq!(
            events,
            vec![
                SlotEvent::Allocated {
                    param: Param::Temp,
                    timestep: ts(0),
                    slot_index: 0
                },
                SlotEvent::Loaded {
                    param: Param::Temp,
                    timestep: ts(0),
                    slot_index: 0
                },
                SlotEvent::Evicted {
                    param: Param::Temp,
                    timestep: ts(0),
                    slot_index: 0
                },
                SlotEvent::Allocated {
                    param: Param::Temp,
                    timestep: ts(1),
                    slot_index: 0
                },
            ]
        );
        assert!(pool.drain_events().is_empty());
    }

    #[test]
    fn test_snapshot_serializes() {
        let mut pool = loaded_pool(2, &[0]);
        pool.set_wanted([ts(0)]);
        let snapshot = pool.snapshot();
        assert_eq!(snapshot.free, vec![1]);
        assert_eq!(snapshot.ready().count(), 1);

        let json = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(json["param"], "temp");
        assert_eq!(json["slots"][0]["timestep"], "2025-06-01T0000");
        assert_eq!(json["wanted"][0], "2025-06-01T0000");
    }
}
