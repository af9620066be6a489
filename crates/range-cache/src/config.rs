//! Configuration for the range cache.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{CacheError, Result};
use crate::policy::CachePolicy;

/// Configuration for the range cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// SQLite database file. `None` keeps the cache in memory.
    pub db_path: Option<PathBuf>,

    /// Prefix shared by every namespace of this cache.
    pub namespace_prefix: String,

    /// Schema version; bumping it invalidates all namespaces of older versions.
    pub schema_version: u32,

    /// Lifetime of past (already valid) data in days.
    pub past_max_age_days: u32,

    /// Lifetime of forecast data in hours.
    pub future_max_age_hours: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            db_path: None,
            namespace_prefix: "weather-range-cache".to_string(),
            schema_version: 1,
            past_max_age_days: 28,
            future_max_age_hours: 24,
        }
    }
}

impl CacheConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STREAM_CACHE_DB") {
            if !val.is_empty() {
                config.db_path = Some(PathBuf::from(val));
            }
        }

        if let Ok(val) = std::env::var("STREAM_CACHE_PREFIX") {
            config.namespace_prefix = val;
        }

        if let Ok(val) = std::env::var("STREAM_CACHE_VERSION") {
            if let Ok(version) = val.parse() {
                config.schema_version = version;
            }
        }

        if let Ok(val) = std::env::var("STREAM_CACHE_PAST_DAYS") {
            if let Ok(days) = val.parse() {
                config.past_max_age_days = days;
            }
        }

        if let Ok(val) = std::env::var("STREAM_CACHE_FUTURE_HOURS") {
            if let Ok(hours) = val.parse() {
                config.future_max_age_hours = hours;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.namespace_prefix.is_empty() {
            return Err(CacheError::Config("namespace_prefix must not be empty".into()));
        }

        if self.future_max_age_hours == 0 {
            return Err(CacheError::Config("future_max_age_hours must be > 0".into()));
        }

        // Past data must outlive forecast data by at least an order of magnitude
        let past_hours = self.past_max_age_days as u64 * 24;
        if past_hours < self.future_max_age_hours as u64 * 10 {
            return Err(CacheError::Config(format!(
                "past_max_age_days ({}) must be at least 10x future_max_age_hours ({})",
                self.past_max_age_days, self.future_max_age_hours
            )));
        }

        Ok(())
    }

    pub fn policy(&self) -> CachePolicy {
        CachePolicy::new(
            Duration::days(self.past_max_age_days as i64),
            Duration::hours(self.future_max_age_hours as i64),
        )
    }
}
