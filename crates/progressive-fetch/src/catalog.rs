//! Timestep catalogs.
//!
//! Discovery of remote runs is an external concern; the fetcher only needs
//! the pair of timesteps around a wall-clock time.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use stream_common::{ModelRun, Timestep, TimestepEntry};

/// Hours after each earlier run that fill the gap up to the next run.
pub const ECMWF_IFS_FILL_HOURS: [i64; 6] = [0, 1, 2, 3, 4, 5];
pub const ECMWF_IFS025_FILL_HOURS: [i64; 2] = [0, 3];

/// Gap-fill offsets used for a model.
pub fn fill_hours_for_model(model: &str) -> &'static [i64] {
    match model {
        "ecmwf_ifs025" => &ECMWF_IFS025_FILL_HOURS,
        _ => &ECMWF_IFS_FILL_HOURS,
    }
}

#[async_trait]
pub trait TimestepCatalog: Send + Sync {
    /// Consecutive timesteps `(a, b)` with `a <= time <= b`.
    async fn bracket(&self, time: DateTime<Utc>) -> Option<(TimestepEntry, TimestepEntry)>;
}

/// Catalog over a fixed, sorted list of timesteps.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    entries: Vec<TimestepEntry>,
}

impl StaticCatalog {
    /// Build from entries in any order. Duplicate timesteps keep the first entry.
    pub fn new(mut entries: Vec<TimestepEntry>) -> Self {
        entries.sort_by_key(|e| e.timestep);
        entries.dedup_by_key(|e| e.timestep);
        Self { entries }
    }

    /// Merge overlapping runs into one timeline.
    ///
    /// The latest run contributes every timestep listed for it; each earlier
    /// run, newest first, contributes only `run + h` for `h` in `fill_hours`
    /// where no newer run already covers that time.
    pub fn from_runs(
        base_url: &str,
        runs: &[ModelRun],
        latest_timesteps: &[Timestep],
        fill_hours: &[i64],
    ) -> Self {
        let mut sorted: Vec<&ModelRun> = runs.iter().collect();
        sorted.sort_by_key(|r| std::cmp::Reverse(r.run));

        let mut merged: BTreeMap<Timestep, TimestepEntry> = BTreeMap::new();
        let mut runs_iter = sorted.into_iter();

        if let Some(latest) = runs_iter.next() {
            for &ts in latest_timesteps {
                merged
                    .entry(ts)
                    .or_insert_with(|| TimestepEntry::new(base_url, latest.clone(), ts));
            }
        }

        for run in runs_iter {
            let start = Timestep::from_datetime(run.run);
            for &h in fill_hours {
                let ts = start.add_hours(h);
                merged
                    .entry(ts)
                    .or_insert_with(|| TimestepEntry::new(base_url, run.clone(), ts));
            }
        }

        Self {
            entries: merged.into_values().collect(),
        }
    }

    pub fn entries(&self) -> &[TimestepEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, timestep: Timestep) -> Option<&TimestepEntry> {
        self.entries
            .binary_search_by_key(&timestep, |e| e.timestep)
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Synchronous form of [`TimestepCatalog::bracket`].
    ///
    /// A time equal to a timestep pairs it with the following one, or with
    /// the preceding one at the end of the list.
    pub fn find_bracket(&self, time: DateTime<Utc>) -> Option<(TimestepEntry, TimestepEntry)> {
        if self.entries.len() < 2 {
            return None;
        }
        // Index of the first entry strictly after `time`
        let after = self
            .entries
            .partition_point(|e| e.timestep.datetime() <= time);

        let (a, b) = match after {
            0 => return None,
            n if n == self.entries.len() => {
                let last = &self.entries[n - 1];
                if last.timestep.datetime() != time {
                    return None;
                }
                (n - 2, n - 1)
            }
            n => (n - 1, n),
        };
        Some((self.entries[a].clone(), self.entries[b].clone()))
    }
}

#[async_trait]
impl TimestepCatalog for StaticCatalog {
    async fn bracket(&self, time: DateTime<Utc>) -> Option<(TimestepEntry, TimestepEntry)> {
        self.find_bracket(time)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const BASE: &str = "https://bucket.example";

    fn run(hour: u32) -> ModelRun {
        ModelRun::new("ecmwf_ifs", Utc.with_ymd_and_hms(2025, 12, 13, hour, 0, 0).unwrap())
    }

    fn ts(s: &str) -> Timestep {
        Timestep::parse(s).unwrap()
    }

    #[test]
    fn test_latest_run_wins_and_earlier_runs_fill_gap() {
        let latest: Vec<Timestep> = (0..4).map(|h| ts("2025-12-13T1200").add_hours(h)).collect();
        let catalog = StaticCatalog::from_runs(
            BASE,
            &[run(0), run(12), run(6)],
            &latest,
            &ECMWF_IFS_FILL_HOURS,
        );

        // 00Z fills 00-05, 06Z fills 06-11, 12Z contributes 12-15
        assert_eq!(catalog.len(), 16);
        let first = catalog.get(ts("2025-12-13T0300")).unwrap();
        assert_eq!(first.run, run(0));
        let mid = catalog.get(ts("2025-12-13T0700")).unwrap();
        assert_eq!(mid.run, run(6));
        assert_eq!(
            mid.url,
            "https://bucket.example/data_spatial/ecmwf_ifs/2025/12/13/0600Z/2025-12-13T0700.om"
        );
        assert_eq!(catalog.get(ts("2025-12-13T1200")).unwrap().run, run(12));
    }

    #[test]
    fn test_newer_run_not_overwritten_by_older_fill() {
        // 12Z lists 12Z itself; the 06Z run would also claim 0600+6h if asked to
        let latest = vec![ts("2025-12-13T1200")];
        let catalog = StaticCatalog::from_runs(BASE, &[run(6), run(12)], &latest, &[0, 6]);
        assert_eq!(catalog.get(ts("2025-12-13T1200")).unwrap().run, run(12));
        assert_eq!(catalog.len(), 2);
    }

    #[test]
    fn test_bracket() {
        let entries = ["2025-12-13T0000", "2025-12-13T0300", "2025-12-13T0600"]
            .iter()
            .map(|s| TimestepEntry::new(BASE, run(0), ts(s)))
            .collect();
        let catalog = StaticCatalog::new(entries);

        let at = |h: u32, m: u32| Utc.with_ymd_and_hms(2025, 12, 13, h, m, 0).unwrap();

        let (a, b) = catalog.find_bracket(at(1, 30)).unwrap();
        assert_eq!((a.timestep, b.timestep), (ts("2025-12-13T0000"), ts("2025-12-13T0300")));

        let (a, b) = catalog.find_bracket(at(3, 0)).unwrap();
        assert_eq!((a.timestep, b.timestep), (ts("2025-12-13T0300"), ts("2025-12-13T0600")));

        let (a, b) = catalog.find_bracket(at(6, 0)).unwrap();
        assert_eq!((a.timestep, b.timestep), (ts("2025-12-13T0300"), ts("2025-12-13T0600")));

        assert!(catalog.find_bracket(at(6, 1)).is_none());
        assert!(catalog
            .find_bracket(Utc.with_ymd_and_hms(2025, 12, 12, 23, 0, 0).unwrap())
            .is_none());
    }
}
