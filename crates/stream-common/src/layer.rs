//! Weather parameters and the cache layers they are stored in.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Logical cache partition. One per data kind plus a catch-all for metadata
/// (listings, run manifests, anything that is not a parameter field).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheLayer {
    Temp,
    Wind,
    Pressure,
    Rain,
    Clouds,
    Humidity,
    Meta,
}

impl CacheLayer {
    pub const ALL: [CacheLayer; 7] = [
        CacheLayer::Temp,
        CacheLayer::Wind,
        CacheLayer::Pressure,
        CacheLayer::Rain,
        CacheLayer::Clouds,
        CacheLayer::Humidity,
        CacheLayer::Meta,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheLayer::Temp => "temp",
            CacheLayer::Wind => "wind",
            CacheLayer::Pressure => "pressure",
            CacheLayer::Rain => "rain",
            CacheLayer::Clouds => "clouds",
            CacheLayer::Humidity => "humidity",
            CacheLayer::Meta => "meta",
        }
    }

    /// Resolve the layer named by a side-channel header value.
    ///
    /// Unknown or missing values fall into `Meta`.
    pub fn from_header_value(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(CacheLayer::Meta)
    }
}

impl FromStr for CacheLayer {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CacheLayer::ALL
            .iter()
            .copied()
            .find(|layer| layer.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown cache layer: {}", s))
    }
}

impl fmt::Display for CacheLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A renderable weather parameter.
///
/// Vector parameters are split into several slabs, each stored as its own
/// container variable. A slot for such a parameter is only usable when every
/// slab has been written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Param {
    Temp,
    Wind,
    Pressure,
    Rain,
    Clouds,
    Humidity,
}

impl Param {
    pub const ALL: [Param; 6] = [
        Param::Temp,
        Param::Wind,
        Param::Pressure,
        Param::Rain,
        Param::Clouds,
        Param::Humidity,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Param::Temp => "temp",
            Param::Wind => "wind",
            Param::Pressure => "pressure",
            Param::Rain => "rain",
            Param::Clouds => "clouds",
            Param::Humidity => "humidity",
        }
    }

    /// Container variable names, one per slab, in slab order.
    pub fn variables(&self) -> &'static [&'static str] {
        match self {
            Param::Temp => &["temperature_2m"],
            Param::Wind => &["wind_u_component_10m", "wind_v_component_10m"],
            Param::Pressure => &["pressure_msl"],
            Param::Rain => &["precipitation"],
            Param::Clouds => &["cloud_cover"],
            Param::Humidity => &["relative_humidity_2m"],
        }
    }

    pub fn slabs_count(&self) -> u32 {
        self.variables().len() as u32
    }

    pub fn cache_layer(&self) -> CacheLayer {
        match self {
            Param::Temp => CacheLayer::Temp,
            Param::Wind => CacheLayer::Wind,
            Param::Pressure => CacheLayer::Pressure,
            Param::Rain => CacheLayer::Rain,
            Param::Clouds => CacheLayer::Clouds,
            Param::Humidity => CacheLayer::Humidity,
        }
    }
}

impl FromStr for Param {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Param::ALL
            .iter()
            .copied()
            .find(|param| param.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown parameter: {}", s))
    }
}

impl fmt::Display for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
