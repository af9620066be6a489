//! Integration test: slot allocation over a realistic load sequence.
//!
//! 1. Fill a four-slot pool, leaving one timestep mid-load
//! 2. Allocate near the loading timestep and verify the furthest slot goes
//! 3. Protect the rest with a wanted window and verify the pool refuses
//! 4. Drive a long pseudo-random sequence and check invariants after each step

use chrono::{DateTime, Duration, Utc};
use slot_allocator::{Eviction, ParamPool, SlotConfig, SlotError, SlotEvent, SlotRegistry};
use std::collections::BTreeSet;
use stream_common::{Param, Timestep};

fn ts(hours: i64) -> Timestep {
    Timestep::parse("2025-06-01T0000").unwrap().add_hours(hours)
}

fn near(timestep: Timestep) -> DateTime<Utc> {
    timestep.datetime() + Duration::minutes(10)
}

#[test]
fn test_window_protection_scenario() {
    let (a, b, c, d, e, f) = (ts(0), ts(1), ts(2), ts(3), ts(4), ts(5));
    let mut config = SlotConfig::default();
    config.overrides.insert(Param::Temp, 4);
    let mut registry = SlotRegistry::new(config).unwrap();

    for timestep in [a, b, c] {
        let slot = registry.allocate(Param::Temp, timestep, near(a)).unwrap();
        assert!(registry
            .mark_loaded(Param::Temp, timestep, slot.slot_index, 1_000)
            .unwrap());
    }
    // D is allocated but its load has not finished
    let d_slot = registry.allocate(Param::Temp, d, near(d)).unwrap();
    assert_eq!(d_slot.slot_index, 3);

    let e_slot = registry.allocate(Param::Temp, e, near(d)).unwrap();
    assert_eq!(
        e_slot.evicted,
        Some(Eviction {
            timestep: a,
            slot_index: 0
        })
    );
    assert_eq!(e_slot.slot_index, 0);
    registry
        .mark_loaded(Param::Temp, e, e_slot.slot_index, 1_000)
        .unwrap();

    registry.set_wanted(Param::Temp, [a, b, c, e]);
    let err = registry.allocate(Param::Temp, f, near(f)).unwrap_err();
    assert_eq!(
        err,
        SlotError::PoolExhausted {
            param: Param::Temp,
            capacity: 4,
            timestep: f
        }
    );

    let evictions: Vec<SlotEvent> = registry
        .drain_events()
        .into_iter()
        .filter(|ev| matches!(ev, SlotEvent::Evicted { .. }))
        .collect();
    assert_eq!(
        evictions,
        vec![SlotEvent::Evicted {
            param: Param::Temp,
            timestep: a,
            slot_index: 0
        }]
    );

    let snapshot = registry.pool(Param::Temp).unwrap().snapshot();
    assert!(snapshot.free.is_empty());
    assert_eq!(snapshot.loading, vec![d]);
    assert_eq!(snapshot.ready().count(), 3);
}

/// Small deterministic generator so the sequence is reproducible.
struct XorShift(u64);

impl XorShift {
    fn next(&mut self) -> u64 {
        self.0 ^= self.0 << 13;
        self.0 ^= self.0 >> 7;
        self.0 ^= self.0 << 17;
        self.0
    }

    fn below(&mut self, n: u64) -> u64 {
        self.next() % n
    }
}

#[test]
fn test_random_sequence_keeps_invariants() {
    for seed in [1u64, 7, 42, 1234, 99_991] {
        let mut rng = XorShift(seed);
        let mut pool = ParamPool::new(Param::Wind, 2, 5);

        for _ in 0..2_000 {
            match rng.below(10) {
                0..=3 => {
                    let timestep = ts(rng.below(16) as i64);
                    let reference = near(ts(rng.below(16) as i64));
                    let before = pool.slot(timestep).map(|s| s.slot_index);
                    let wanted = pool.wanted().clone();
                    let loaded_before: BTreeSet<Timestep> = pool
                        .snapshot()
                        .ready()
                        .map(|s| s.timestep)
                        .collect();

                    match pool.allocate(timestep, reference) {
                        Ok(allocation) => {
                            if let Some(index) = before {
                                assert!(allocation.existing);
                                assert_eq!(allocation.slot_index, index);
                            }
                            if let Some(evicted) = allocation.evicted {
                                assert!(!wanted.contains(&evicted.timestep));
                                assert!(loaded_before.contains(&evicted.timestep));
                                assert_eq!(evicted.slot_index, allocation.slot_index);
                            }
                        }
                        Err(err) => {
                            assert!(err.is_exhausted());
                            assert!(before.is_none());
                            assert_eq!(pool.free_count(), 0);
                        }
                    }
                }
                4 | 5 => {
                    let timestep = ts(rng.below(16) as i64);
                    let slab = rng.below(2) as u32;
                    pool.mark_slab_loaded(timestep, slab);
                }
                6 => {
                    let timestep = ts(rng.below(16) as i64);
                    if let Some(index) = pool.slot(timestep).map(|s| s.slot_index) {
                        pool.mark_loaded(timestep, index, 10).unwrap();
                    }
                }
                7 => {
                    let count = rng.below(4);
                    let window: Vec<Timestep> =
                        (0..count).map(|_| ts(rng.below(16) as i64)).collect();
                    pool.set_wanted(window);
                }
                8 => {
                    pool.release(ts(rng.below(16) as i64));
                }
                _ => {
                    if pool.capacity() < 8 && rng.below(4) == 0 {
                        pool.grow(pool.capacity() + 1).unwrap();
                    }
                }
            }

            if let Err(violation) = pool.check_invariants() {
                panic!("seed {}: {}", seed, violation);
            }
        }
    }
}
