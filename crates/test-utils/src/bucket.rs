//! In-memory stand-in for the object-storage bucket.

use bytes::Bytes;
use chrono::{TimeZone, Utc};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stream_common::{MemorySource, ModelRun, Param, Timestep, TimestepEntry};

use crate::containers::{param_container, timestep_fields};

pub const MOCK_BASE_URL: &str = "https://bucket.example";

/// Serves containers for one model run from a [`MemorySource`].
pub struct MockBucket {
    source: Arc<MemorySource>,
    base_url: String,
    run: ModelRun,
    entries: Mutex<Vec<TimestepEntry>>,
}

impl MockBucket {
    pub fn new(run: ModelRun) -> Self {
        Self::from_source(MemorySource::new(), run)
    }

    /// Every response is delayed by `latency`.
    pub fn with_latency(run: ModelRun, latency: Duration) -> Self {
        Self::from_source(MemorySource::new().with_latency(latency), run)
    }

    fn from_source(source: MemorySource, run: ModelRun) -> Self {
        Self {
            source: Arc::new(source),
            base_url: MOCK_BASE_URL.to_string(),
            run,
            entries: Mutex::new(Vec::new()),
        }
    }

    /// The 2025-06-01 00Z `ecmwf_ifs` run.
    pub fn default_run() -> ModelRun {
        ModelRun::new("ecmwf_ifs", Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap())
    }

    pub fn source(&self) -> Arc<MemorySource> {
        self.source.clone()
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn run(&self) -> &ModelRun {
        &self.run
    }

    /// Store raw container bytes for `timestep` and return its entry.
    pub fn add_container(&self, timestep: Timestep, data: Bytes) -> TimestepEntry {
        let entry = TimestepEntry::new(&self.base_url, self.run.clone(), timestep);
        self.source.insert(entry.url.clone(), data);
        if let Ok(mut entries) = self.entries.lock() {
            entries.push(entry.clone());
        }
        entry
    }

    /// Store a generated container for `param` at `run + hours`.
    ///
    /// Values come from [`timestep_fields`] with `hours` as the index.
    pub fn add_timestep(&self, param: Param, hours: u32, points: u64, chunk_points: u64) -> TimestepEntry {
        let fields = timestep_fields(param, points, hours);
        self.add_fields(param, hours, chunk_points, &fields)
    }

    /// Store caller-supplied slab fields for `param` at `run + hours`.
    pub fn add_fields(&self, param: Param, hours: u32, chunk_points: u64, fields: &[Vec<f32>]) -> TimestepEntry {
        let points = fields.first().map_or(0, |f| f.len() as u64);
        let timestep = Timestep::from_datetime(self.run.run).add_hours(hours as i64);
        self.add_container(timestep, param_container(param, points, chunk_points, fields))
    }

    /// Entries added so far, in insertion order.
    pub fn entries(&self) -> Vec<TimestepEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use stream_common::{ByteRange, CacheLayer, RangeSource};

    #[tokio::test]
    async fn test_added_timesteps_are_served() {
        let bucket = MockBucket::new(MockBucket::default_run());
        let entry = bucket.add_timestep(Param::Temp, 3, 64, 16);

        assert_eq!(entry.timestep, Timestep::parse("2025-06-01T0300").unwrap());
        assert_eq!(
            entry.url,
            "https://bucket.example/data_spatial/ecmwf_ifs/2025/06/01/0000Z/2025-06-01T0300.om"
        );

        let tail = bucket
            .source()
            .read(&entry.url, ByteRange::suffix(4), CacheLayer::Meta)
            .await
            .unwrap();
        assert_eq!(tail.len(), 4);
        assert_eq!(bucket.entries(), vec![entry]);
    }
}
