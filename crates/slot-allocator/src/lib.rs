//! Buffer slot allocation for timestep data.
//!
//! Each parameter has a fixed number of buffer slots. A timestep receives a
//! slot before its data is fetched and the slot becomes ready once every
//! slab has been written. When the pool is full, the loaded slot furthest in
//! time from the current reference is reused unless it is in the wanted
//! window, still loading, or part of the active pair.
//!
//! Allocation is synchronous and single-owner; callers hold the
//! [`SlotRegistry`] alongside their fetcher and observe changes by draining
//! [`SlotEvent`]s or taking a [`PoolSnapshot`].

pub mod config;
pub mod error;
pub mod pool;
pub mod registry;

pub use config::SlotConfig;
pub use error::{Result, SlotError};
pub use pool::{
    Allocation, Eviction, ParamPool, PoolSnapshot, ShrinkReport, Slot, SlotEvent,
};
pub use registry::SlotRegistry;
