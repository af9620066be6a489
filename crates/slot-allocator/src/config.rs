//! Configuration for slot pools.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use stream_common::Param;

use crate::error::{Result, SlotError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlotConfig {
    /// Initial capacity of every pool without an override.
    pub slots_per_param: u32,

    /// Upper bound for any pool, including after `grow`.
    pub max_slots: u32,

    /// Per-parameter initial capacities.
    #[serde(default)]
    pub overrides: BTreeMap<Param, u32>,
}

impl Default for SlotConfig {
    fn default() -> Self {
        Self {
            slots_per_param: 8,
            max_slots: 64,
            overrides: BTreeMap::new(),
        }
    }
}

impl SlotConfig {
    /// Load configuration from environment variables.
    ///
    /// `STREAM_SLOTS_<PARAM>` (e.g. `STREAM_SLOTS_WIND`) overrides a single pool.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STREAM_SLOTS_PER_PARAM") {
            if let Ok(slots) = val.parse() {
                config.slots_per_param = slots;
            }
        }

        if let Ok(val) = std::env::var("STREAM_MAX_SLOTS") {
            if let Ok(slots) = val.parse() {
                config.max_slots = slots;
            }
        }

        for param in Param::ALL {
            let key = format!("STREAM_SLOTS_{}", param.as_str().to_uppercase());
            if let Some(slots) = std::env::var(&key).ok().and_then(|v| v.parse().ok()) {
                config.overrides.insert(param, slots);
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_slots == 0 {
            return Err(SlotError::Config("max_slots must be > 0".into()));
        }

        for param in Param::ALL {
            let capacity = self.capacity_for(param);
            // A pair needs two slots
            if capacity < 2 {
                return Err(SlotError::Config(format!(
                    "{} needs at least 2 slots, got {}",
                    param, capacity
                )));
            }
            if capacity > self.max_slots {
                return Err(SlotError::Config(format!(
                    "{} capacity {} exceeds max_slots {}",
                    param, capacity, self.max_slots
                )));
            }
        }

        Ok(())
    }

    pub fn capacity_for(&self, param: Param) -> u32 {
        self.overrides
            .get(&param)
            .copied()
            .unwrap_or(self.slots_per_param)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        let config = SlotConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.capacity_for(Param::Wind), 8);
    }

    #[test]
    fn test_override_applies_to_one_param() {
        let mut config = SlotConfig::default();
        config.overrides.insert(Param::Wind, 4);
        assert_eq!(config.capacity_for(Param::Wind), 4);
        assert_eq!(config.capacity_for(Param::Temp), 8);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_bad_capacities() {
        let mut config = SlotConfig::default();
        config.overrides.insert(Param::Rain, 1);
        assert!(config.validate().is_err());

        let config = SlotConfig {
            slots_per_param: 80,
            ..SlotConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
