//! Error types for slot allocation.

use stream_common::{Param, Timestep};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SlotError {
    /// Every slot is wanted, loading or part of the active pair.
    #[error("{param} pool exhausted: no evictable slot among {capacity} for {timestep}")]
    PoolExhausted {
        param: Param,
        capacity: u32,
        timestep: Timestep,
    },

    /// `markLoaded` named a slot the timestep does not own.
    #[error("{timestep} owns slot {owned}, not {given}")]
    SlotMismatch {
        timestep: Timestep,
        owned: u32,
        given: u32,
    },

    #[error("invalid capacity change for {param}: {reason}")]
    InvalidCapacity { param: Param, reason: String },

    #[error("invalid shrink mapping for {param}: {reason}")]
    InvalidShrink { param: Param, reason: String },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl SlotError {
    pub fn invalid_capacity(param: Param, reason: impl Into<String>) -> Self {
        Self::InvalidCapacity {
            param,
            reason: reason.into(),
        }
    }

    pub fn invalid_shrink(param: Param, reason: impl Into<String>) -> Self {
        Self::InvalidShrink {
            param,
            reason: reason.into(),
        }
    }

    pub fn is_exhausted(&self) -> bool {
        matches!(self, Self::PoolExhausted { .. })
    }
}

/// Result type for slot operations.
pub type Result<T> = std::result::Result<T, SlotError>;
