//! Timesteps, model runs and their remote addresses.

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::TimeParseError;

const TIMESTEP_FORMAT: &str = "%Y-%m-%dT%H%M";
const CONTAINER_EXTENSION: &str = ".om";

/// One forecast instant, minute precision, UTC.
///
/// The canonical text form is `YYYY-MM-DDTHHMM` (e.g. `2025-12-13T0600`),
/// which is also the container file stem on the remote bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Timestep(DateTime<Utc>);

impl Timestep {
    /// Build from a wall-clock instant, dropping seconds.
    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        let truncated = dt
            - Duration::seconds(dt.second() as i64)
            - Duration::nanoseconds(dt.nanosecond() as i64);
        Self(truncated)
    }

    pub fn parse(s: &str) -> Result<Self, TimeParseError> {
        NaiveDateTime::parse_from_str(s.trim(), TIMESTEP_FORMAT)
            .map(|ndt| Self(Utc.from_utc_datetime(&ndt)))
            .map_err(|_| TimeParseError::InvalidFormat(s.to_string()))
    }

    /// Extract the valid time embedded in a container path or URL.
    ///
    /// Looks at the final path segment (query and fragment ignored) and
    /// expects `YYYY-MM-DDTHHMM.om`.
    pub fn from_path(path: &str) -> Option<Self> {
        let path = path.split(['?', '#']).next().unwrap_or(path);
        let name = path.rsplit('/').next()?;
        let stem = name.strip_suffix(CONTAINER_EXTENSION)?;
        Self::parse(stem).ok()
    }

    pub fn datetime(&self) -> DateTime<Utc> {
        self.0
    }

    /// Absolute wall-clock distance to `reference`.
    pub fn distance(&self, reference: DateTime<Utc>) -> Duration {
        let delta = self.0 - reference;
        if delta < Duration::zero() {
            -delta
        } else {
            delta
        }
    }

    /// Container file name for this timestep.
    pub fn file_name(&self) -> String {
        format!("{}{}", self, CONTAINER_EXTENSION)
    }

    pub fn add_hours(&self, hours: i64) -> Self {
        Self(self.0 + Duration::hours(hours))
    }
}

impl fmt::Display for Timestep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format(TIMESTEP_FORMAT))
    }
}

impl FromStr for Timestep {
    type Err = TimeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Timestep {
    type Error = TimeParseError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Self::parse(&s)
    }
}

impl From<Timestep> for String {
    fn from(ts: Timestep) -> Self {
        ts.to_string()
    }
}

/// A model run (initialization time) for one model.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ModelRun {
    pub model: String,
    pub run: DateTime<Utc>,
}

impl ModelRun {
    pub fn new(model: impl Into<String>, run: DateTime<Utc>) -> Self {
        Self {
            model: model.into(),
            run,
        }
    }

    /// Bucket prefix of the run folder, e.g.
    /// `data_spatial/ecmwf_ifs/2025/12/13/0600Z/`.
    pub fn prefix(&self) -> String {
        format!(
            "data_spatial/{}/{}/",
            self.model,
            self.run.format("%Y/%m/%d/%H%MZ")
        )
    }

    /// Parse a run folder prefix back into a run.
    pub fn from_prefix(prefix: &str) -> Result<Self, TimeParseError> {
        let invalid = || TimeParseError::InvalidFormat(prefix.to_string());
        let parts: Vec<&str> = prefix.trim_end_matches('/').split('/').collect();
        if parts.len() < 5 {
            return Err(invalid());
        }
        let [model, year, month, day, run] = &parts[parts.len() - 5..] else {
            return Err(invalid());
        };
        let run = run.strip_suffix('Z').ok_or_else(invalid)?;
        let ndt = NaiveDateTime::parse_from_str(
            &format!("{}-{}-{}T{}", year, month, day, run),
            TIMESTEP_FORMAT,
        )
        .map_err(|_| invalid())?;
        Ok(Self::new(model.to_string(), Utc.from_utc_datetime(&ndt)))
    }

    /// Canonical URL of a timestep's container within this run.
    pub fn url(&self, base_url: &str, timestep: Timestep) -> String {
        format!(
            "{}/{}{}",
            base_url.trim_end_matches('/'),
            self.prefix(),
            timestep.file_name()
        )
    }

    pub fn run_label(&self) -> String {
        self.run.format("%H%MZ").to_string()
    }
}

/// A discovered timestep with the run it is served from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimestepEntry {
    pub timestep: Timestep,
    pub run: ModelRun,
    pub url: String,
}

impl TimestepEntry {
    pub fn new(base_url: &str, run: ModelRun, timestep: Timestep) -> Self {
        let url = run.url(base_url, timestep);
        Self { timestep, run, url }
    }
}
