//! Configuration for the progressive fetcher and its HTTP source.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{FetchError, Result};

pub const DEFAULT_BASE_URL: &str = "https://openmeteo.s3.amazonaws.com";

/// Configuration for progressive loading.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Bucket base URL.
    pub base_url: String,

    /// Model whose runs are loaded.
    pub model: String,

    /// Timeout for a single range request in seconds.
    pub request_timeout_secs: u64,

    /// Connect timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Wall-clock time each slice should take.
    pub target_slice_ms: u64,

    /// Slice size before any throughput has been measured.
    pub initial_slice_points: u64,

    pub min_slice_points: u64,

    pub max_slice_points: u64,

    /// Weight of the newest throughput sample (0..=1).
    pub smoothing: f64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: "ecmwf_ifs".to_string(),
            request_timeout_secs: 60,
            connect_timeout_secs: 10,
            target_slice_ms: 250,
            initial_slice_points: 256 * 1024,
            min_slice_points: 16 * 1024,
            max_slice_points: 2 * 1024 * 1024,
            smoothing: 0.3,
        }
    }
}

impl FetchConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("STREAM_BASE_URL") {
            config.base_url = val;
        }

        if let Ok(val) = std::env::var("STREAM_MODEL") {
            config.model = val;
        }

        if let Ok(val) = std::env::var("STREAM_REQUEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                config.request_timeout_secs = secs;
            }
        }

        if let Ok(val) = std::env::var("STREAM_TARGET_SLICE_MS") {
            if let Ok(ms) = val.parse() {
                config.target_slice_ms = ms;
            }
        }

        if let Ok(val) = std::env::var("STREAM_INITIAL_SLICE_POINTS") {
            if let Ok(points) = val.parse() {
                config.initial_slice_points = points;
            }
        }

        if let Ok(val) = std::env::var("STREAM_MIN_SLICE_POINTS") {
            if let Ok(points) = val.parse() {
                config.min_slice_points = points;
            }
        }

        if let Ok(val) = std::env::var("STREAM_MAX_SLICE_POINTS") {
            if let Ok(points) = val.parse() {
                config.max_slice_points = points;
            }
        }

        config
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(FetchError::Config("base_url must not be empty".into()));
        }

        if self.target_slice_ms == 0 {
            return Err(FetchError::Config("target_slice_ms must be > 0".into()));
        }

        if self.min_slice_points == 0 || self.min_slice_points > self.max_slice_points {
            return Err(FetchError::Config(format!(
                "slice bounds [{}, {}] are invalid",
                self.min_slice_points, self.max_slice_points
            )));
        }

        if !(self.min_slice_points..=self.max_slice_points).contains(&self.initial_slice_points) {
            return Err(FetchError::Config(
                "initial_slice_points must lie within the slice bounds".into(),
            ));
        }

        if !(self.smoothing > 0.0 && self.smoothing <= 1.0) {
            return Err(FetchError::Config("smoothing must be in (0, 1]".into()));
        }

        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    pub fn target_slice(&self) -> Duration {
        Duration::from_millis(self.target_slice_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(FetchConfig::default().validate().is_ok());
    }

    #[test]
    fn test_invalid_bounds() {
        let config = FetchConfig {
            min_slice_points: 10,
            max_slice_points: 5,
            ..FetchConfig::default()
        };
        assert!(config.validate().is_err());

        let config = FetchConfig {
            smoothing: 0.0,
            ..FetchConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
