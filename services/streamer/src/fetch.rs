//! `fetch`: stream the pair of timesteps around a time into slots.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone, Timelike, Utc};
use progressive_fetch::{
    fill_hours_for_model, FetchConfig, FetchEvent, LoadOutcome, ProgressiveFetcher, StaticCatalog,
};
use serde_json::json;
use slot_allocator::{SlotConfig, SlotRegistry};
use std::collections::HashMap;
use std::sync::Arc;
use stream_common::{ModelRun, Param, RangeSource, Timestep};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::summary::FieldSummary;

/// Hours between model runs when no run is given.
const RUN_INTERVAL_HOURS: u32 = 6;

#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub param: Param,
    pub time: DateTime<Utc>,
    /// Run initialization time; defaults to the last run at or before `time`.
    pub run: Option<Timestep>,
    /// Forecast hours listed for the run.
    pub hours: u32,
}

/// Most recent run boundary at or before `time`.
pub fn default_run(time: DateTime<Utc>) -> DateTime<Utc> {
    let hour = time.hour() - time.hour() % RUN_INTERVAL_HOURS;
    time.date_naive()
        .and_hms_opt(hour, 0, 0)
        .map(|ndt| Utc.from_utc_datetime(&ndt))
        .unwrap_or(time)
}

/// Catalog of hourly timesteps `run + 0..=hours`.
pub fn run_catalog(config: &FetchConfig, run: Timestep, hours: u32) -> StaticCatalog {
    let model_run = ModelRun::new(config.model.clone(), run.datetime());
    let timesteps: Vec<Timestep> = (0..=hours as i64).map(|h| run.add_hours(h)).collect();
    StaticCatalog::from_runs(
        &config.base_url,
        &[model_run],
        &timesteps,
        fill_hours_for_model(&config.model),
    )
}

pub async fn run<S: RangeSource + 'static>(
    source: Arc<S>,
    fetch_config: &FetchConfig,
    slot_config: SlotConfig,
    request: FetchRequest,
) -> Result<()> {
    let param = request.param;
    let run = request
        .run
        .unwrap_or_else(|| Timestep::from_datetime(default_run(request.time)));
    let catalog = run_catalog(fetch_config, run, request.hours);
    let (first, second) = catalog.find_bracket(request.time).with_context(|| {
        format!(
            "no timesteps around {} in run {} (+{}h)",
            request.time, run, request.hours
        )
    })?;

    let mut registry = SlotRegistry::new(slot_config)?;
    let mut slots = HashMap::new();
    for entry in [&first, &second] {
        let allocation = registry.allocate(param, entry.timestep, request.time)?;
        slots.insert(entry.timestep, allocation.slot_index);
    }
    registry.set_wanted(param, [first.timestep, second.timestep]);
    registry.set_active_pair(param, Some((first.timestep, second.timestep)));

    info!(
        param = %param,
        first = %first.timestep,
        second = %second.timestep,
        url = %first.url,
        "Loading pair"
    );

    let fetcher = ProgressiveFetcher::new(source, Arc::new(catalog), fetch_config);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let load = fetcher.load_entries(param, first.clone(), second.clone(), &tx);
    tokio::pin!(load);

    let result = loop {
        tokio::select! {
            result = &mut load => break result,
            Some(event) = rx.recv() => apply_event(&mut registry, param, &slots, event)?,
        }
    };
    while let Ok(event) = rx.try_recv() {
        apply_event(&mut registry, param, &slots, event)?;
    }

    for event in registry.drain_events() {
        debug!(event = ?event, "Slot event");
    }

    let pair = match result {
        Ok(LoadOutcome::Complete(pair)) => pair,
        Ok(LoadOutcome::Superseded { generation }) => {
            warn!(generation, "Load superseded");
            release_unloaded(&mut registry, param, &slots);
            return Ok(());
        }
        Err(e) => {
            release_unloaded(&mut registry, param, &slots);
            return Err(e).context("pair load failed");
        }
    };

    let mut summaries = Vec::new();
    for load in [&pair.first, &pair.second] {
        for (slab, array) in load.slabs.iter().enumerate() {
            summaries.push(json!({
                "timestep": load.entry.timestep,
                "slab": slab,
                "slot": slots.get(&load.entry.timestep),
                "summary": FieldSummary::of(&array.data),
            }));
        }
    }

    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "param": param,
            "generation": pair.generation,
            "slabs": summaries,
            "pools": registry.snapshots(),
        }))?
    );
    Ok(())
}

fn apply_event(
    registry: &mut SlotRegistry,
    param: Param,
    slots: &HashMap<Timestep, u32>,
    event: FetchEvent,
) -> Result<()> {
    match event {
        FetchEvent::Progress(progress) => {
            info!(
                timestep = %progress.timestep,
                slab = progress.slab,
                slice = progress.slice_index + 1,
                slices = progress.total_slices,
                loaded = progress.loaded_points,
                total = progress.total_points,
                "Slice received"
            );
        }
        FetchEvent::SlabComplete {
            timestep,
            slab,
            total_points,
            ..
        } => {
            let Some(&slot_index) = slots.get(&timestep) else {
                warn!(timestep = %timestep, "Slab complete for unassigned timestep");
                return Ok(());
            };
            registry.mark_loaded(param, timestep, slot_index, total_points)?;
            if registry.mark_slab_loaded(param, timestep, slab) {
                info!(timestep = %timestep, slot_index, "Slot ready");
            }
        }
    }
    Ok(())
}

fn release_unloaded(registry: &mut SlotRegistry, param: Param, slots: &HashMap<Timestep, u32>) {
    for &timestep in slots.keys() {
        if let Some(index) = registry.release(param, timestep) {
            debug!(timestep = %timestep, slot_index = index, "Released slot");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_run_floors_to_six_hours() {
        let time = Utc.with_ymd_and_hms(2025, 12, 13, 10, 45, 0).unwrap();
        assert_eq!(
            default_run(time),
            Utc.with_ymd_and_hms(2025, 12, 13, 6, 0, 0).unwrap()
        );
    }

    #[test]
    fn test_run_catalog_lists_hourly_urls() {
        let config = FetchConfig {
            base_url: "https://bucket.example".to_string(),
            ..FetchConfig::default()
        };
        let run = Timestep::parse("2025-12-13T0600").unwrap();
        let catalog = run_catalog(&config, run, 3);
        assert_eq!(catalog.len(), 4);
        assert_eq!(
            catalog.entries()[1].url,
            "https://bucket.example/data_spatial/ecmwf_ifs/2025/12/13/0600Z/2025-12-13T0700.om"
        );
    }

    #[tokio::test]
    async fn test_fetch_against_mock_bucket() {
        let bucket = test_utils::MockBucket::new(test_utils::MockBucket::default_run());
        bucket.add_timestep(Param::Wind, 0, 2_000, 256);
        bucket.add_timestep(Param::Wind, 1, 2_000, 256);

        let config = FetchConfig {
            base_url: test_utils::MOCK_BASE_URL.to_string(),
            ..FetchConfig::default()
        };
        let request = FetchRequest {
            param: Param::Wind,
            time: Utc.with_ymd_and_hms(2025, 6, 1, 0, 30, 0).unwrap(),
            run: None,
            hours: 1,
        };
        run(bucket.source(), &config, SlotConfig::default(), request)
            .await
            .unwrap();
        assert!(bucket.source().request_count() > 0);
    }

    #[tokio::test]
    async fn test_fetch_outside_run_fails() {
        let bucket = test_utils::MockBucket::new(test_utils::MockBucket::default_run());
        let request = FetchRequest {
            param: Param::Temp,
            time: Utc.with_ymd_and_hms(2025, 6, 1, 5, 0, 0).unwrap(),
            run: Some(Timestep::parse("2025-06-01T0000").unwrap()),
            hours: 2,
        };
        let result = run(bucket.source(), &FetchConfig::default(), SlotConfig::default(), request).await;
        assert!(result.is_err());
    }
}
