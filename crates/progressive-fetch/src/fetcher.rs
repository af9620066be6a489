//! Progressive pair loading.
//!
//! A load covers the two timesteps bracketing a target time. Each timestep
//! is decoded slice by slice along the outermost non-unit dimension, and a
//! progress event is emitted as soon as a slice lands. Both timesteps run as
//! joined futures on the caller's task.
//!
//! Starting a new load for a parameter cancels the one in flight. The old
//! load stops at its next read or event, writes nothing further, and
//! resolves to [`LoadOutcome::Superseded`].

use chrono::{DateTime, Utc};
use futures::future::try_join;
use grid_container::{ContainerDecoder, ContainerVariable, DecodedArray, ReadWindow};
use metrics::counter;
use serde::Serialize;
use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;
use stream_common::{Param, RangeSource, Timestep, TimestepEntry};
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::catalog::TimestepCatalog;
use crate::config::FetchConfig;
use crate::error::{FetchError, Result};
use crate::throughput::ThroughputEstimator;

/// One decoded slice of one slab of one timestep.
#[derive(Debug, Clone, Serialize)]
pub struct SliceProgress {
    pub generation: u64,
    pub param: Param,
    pub slab: u32,
    pub timestep: Timestep,
    pub slice_index: u32,
    /// Estimate; grows or shrinks as slice sizes adapt.
    pub total_slices: u32,
    /// First point of this slice within the slab.
    pub offset: u64,
    pub loaded_points: u64,
    pub total_points: u64,
    pub values: Vec<f32>,
}

#[derive(Debug, Clone, Serialize)]
pub enum FetchEvent {
    Progress(SliceProgress),
    /// Every point of one slab of one timestep has been delivered.
    SlabComplete {
        generation: u64,
        param: Param,
        slab: u32,
        timestep: Timestep,
        total_points: u64,
    },
}

impl FetchEvent {
    pub fn generation(&self) -> u64 {
        match self {
            FetchEvent::Progress(p) => p.generation,
            FetchEvent::SlabComplete { generation, .. } => *generation,
        }
    }
}

/// All slabs of one timestep.
#[derive(Debug, Clone)]
pub struct TimestepLoad {
    pub entry: TimestepEntry,
    pub slabs: Vec<DecodedArray>,
}

/// A finished pair.
#[derive(Debug, Clone)]
pub struct PairLoad {
    pub param: Param,
    pub generation: u64,
    pub first: TimestepLoad,
    pub second: TimestepLoad,
}

#[derive(Debug)]
pub enum LoadOutcome {
    Complete(PairLoad),
    /// A newer load for the same parameter took over.
    Superseded { generation: u64 },
}

impl LoadOutcome {
    pub fn is_superseded(&self) -> bool {
        matches!(self, LoadOutcome::Superseded { .. })
    }
}

struct ActiveLoad {
    generation: u64,
    token: CancellationToken,
}

/// Per-load context shared by both timestep sessions.
struct LoadContext<'a> {
    param: Param,
    generation: u64,
    token: &'a CancellationToken,
    events: &'a mpsc::UnboundedSender<FetchEvent>,
}

impl LoadContext<'_> {
    /// Emit an event unless the load has been superseded.
    fn emit(&self, event: FetchEvent) -> bool {
        if self.token.is_cancelled() {
            return false;
        }
        if self.events.send(event).is_err() {
            debug!(param = %self.param, "Progress receiver dropped");
        }
        true
    }
}

pub struct ProgressiveFetcher<S> {
    source: Arc<S>,
    catalog: Arc<dyn TimestepCatalog>,
    estimator: std::sync::Mutex<ThroughputEstimator>,
    active: Mutex<HashMap<Param, ActiveLoad>>,
    generation: AtomicU64,
}

impl<S: RangeSource + 'static> ProgressiveFetcher<S> {
    pub fn new(source: Arc<S>, catalog: Arc<dyn TimestepCatalog>, config: &FetchConfig) -> Self {
        Self {
            source,
            catalog,
            estimator: std::sync::Mutex::new(ThroughputEstimator::new(config)),
            active: Mutex::new(HashMap::new()),
            generation: AtomicU64::new(0),
        }
    }

    pub fn source(&self) -> &Arc<S> {
        &self.source
    }

    /// Load the pair of timesteps around `time`.
    pub async fn load_pair(
        &self,
        param: Param,
        time: DateTime<Utc>,
        events: &mpsc::UnboundedSender<FetchEvent>,
    ) -> Result<LoadOutcome> {
        let (first, second) = self
            .catalog
            .bracket(time)
            .await
            .ok_or(FetchError::NoBracket { param, time })?;
        self.load_entries(param, first, second, events).await
    }

    /// Load an explicit pair of timesteps.
    #[instrument(skip(self, param, first, second, events), fields(param = %param, first = %first.timestep, second = %second.timestep))]
    pub async fn load_entries(
        &self,
        param: Param,
        first: TimestepEntry,
        second: TimestepEntry,
        events: &mpsc::UnboundedSender<FetchEvent>,
    ) -> Result<LoadOutcome> {
        let (generation, token) = self.begin(param).await;
        info!(generation, "Starting pair load");
        let started = Instant::now();

        let ctx = LoadContext {
            param,
            generation,
            token: &token,
            events,
        };

        let result = try_join(
            self.load_timestep(&ctx, &first),
            self.load_timestep(&ctx, &second),
        )
        .await;
        self.finish(param, generation).await;

        if token.is_cancelled() {
            info!(generation, "Pair load superseded");
            return Ok(LoadOutcome::Superseded { generation });
        }

        match result {
            Ok((Some(first), Some(second))) => {
                info!(
                    generation,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Pair load complete"
                );
                Ok(LoadOutcome::Complete(PairLoad {
                    param,
                    generation,
                    first,
                    second,
                }))
            }
            Ok(_) => Ok(LoadOutcome::Superseded { generation }),
            Err(e) => {
                warn!(generation, error = %e, "Pair load failed");
                Err(e)
            }
        }
    }

    /// Cancel the in-flight load for `param`, if any.
    pub async fn cancel(&self, param: Param) -> bool {
        match self.active.lock().await.remove(&param) {
            Some(active) => {
                active.token.cancel();
                info!(param = %param, generation = active.generation, "Cancelled load");
                true
            }
            None => false,
        }
    }

    /// Current slice estimate, mostly for diagnostics.
    pub fn next_slice_points(&self) -> u64 {
        self.estimator
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next_slice_points()
    }

    async fn begin(&self, param: Param) -> (u64, CancellationToken) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let token = CancellationToken::new();

        let mut active = self.active.lock().await;
        if let Some(previous) = active.insert(
            param,
            ActiveLoad {
                generation,
                token: token.clone(),
            },
        ) {
            debug!(param = %param, previous = previous.generation, generation, "Superseding load");
            previous.token.cancel();
        }
        (generation, token)
    }

    async fn finish(&self, param: Param, generation: u64) {
        let mut active = self.active.lock().await;
        if active.get(&param).map(|a| a.generation) == Some(generation) {
            active.remove(&param);
        }
    }

    /// Load every slab of one timestep. `None` once superseded.
    async fn load_timestep(
        &self,
        ctx: &LoadContext<'_>,
        entry: &TimestepEntry,
    ) -> Result<Option<TimestepLoad>> {
        let open = ContainerDecoder::open(self.source.clone(), &entry.url, ctx.param.cache_layer());
        let decoder = match until_cancelled(ctx.token, open).await {
            Some(decoder) => decoder.map_err(|e| FetchError::container(entry.timestep, e))?,
            None => return Ok(None),
        };

        let mut slabs = Vec::with_capacity(ctx.param.variables().len());
        for (slab, name) in ctx.param.variables().iter().enumerate() {
            let variable = decoder
                .variable(name)
                .map_err(|e| FetchError::container(entry.timestep, e))?
                .clone();
            match self
                .load_slab(ctx, entry, &decoder, &variable, slab as u32)
                .await?
            {
                Some(array) => slabs.push(array),
                None => return Ok(None),
            }
        }

        Ok(Some(TimestepLoad {
            entry: entry.clone(),
            slabs,
        }))
    }

    async fn load_slab(
        &self,
        ctx: &LoadContext<'_>,
        entry: &TimestepEntry,
        decoder: &ContainerDecoder<Arc<S>>,
        variable: &ContainerVariable,
        slab: u32,
    ) -> Result<Option<DecodedArray>> {
        let timestep = entry.timestep;
        let total_points = variable.cell_count().unwrap_or(0);
        let dim = variable.slice_dim().unwrap_or(0);
        let extent = variable.dims.get(dim).copied().unwrap_or(0);
        // Points per position along the slicing dimension
        let stride = if extent == 0 { 0 } else { total_points / extent };

        let mut buffer = vec![0.0f32; total_points as usize];
        let mut position = 0u64;
        let mut loaded_points = 0u64;
        let mut slice_index = 0u32;

        while position < extent {
            if ctx.token.is_cancelled() {
                return Ok(None);
            }

            let target = self.next_slice_points();
            let rows = (target / stride.max(1)).max(1).min(extent - position);
            let remaining_after = extent - position - rows;
            let total_slices = slice_index + 1 + remaining_after.div_ceil(rows) as u32;

            let window = ReadWindow::slice(&variable.dims, dim, position, rows);
            let points = rows * stride;
            let mut values = vec![0.0f32; points as usize];

            let started = Instant::now();
            let read = decoder.read_window(variable, window, &mut values);
            match until_cancelled(ctx.token, read).await {
                Some(result) => result.map_err(|e| FetchError::container(timestep, e))?,
                None => return Ok(None),
            }
            self.estimator
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .record(points, started.elapsed());

            // Superseded while decoding: leave the buffer untouched
            if ctx.token.is_cancelled() {
                return Ok(None);
            }

            // Everything before `dim` has extent 1, so the slice is contiguous
            let offset = position * stride;
            buffer[offset as usize..(offset + points) as usize].copy_from_slice(&values);
            loaded_points += points;

            counter!("fetch_slices_total", "param" => ctx.param.as_str()).increment(1);
            counter!("fetch_bytes_total", "param" => ctx.param.as_str()).increment(points * 4);
            debug!(
                timestep = %timestep,
                slab,
                slice_index,
                total_slices,
                loaded_points,
                total_points,
                "Slice loaded"
            );

            let emitted = ctx.emit(FetchEvent::Progress(SliceProgress {
                generation: ctx.generation,
                param: ctx.param,
                slab,
                timestep,
                slice_index,
                total_slices,
                offset,
                loaded_points,
                total_points,
                values,
            }));
            if !emitted {
                return Ok(None);
            }

            position += rows;
            slice_index += 1;
        }

        if !ctx.emit(FetchEvent::SlabComplete {
            generation: ctx.generation,
            param: ctx.param,
            slab,
            timestep,
            total_points,
        }) {
            return Ok(None);
        }

        Ok(Some(DecodedArray {
            dims: variable.dims.clone(),
            data: buffer,
        }))
    }
}

/// Run `fut` unless `token` fires first.
async fn until_cancelled<F: Future>(token: &CancellationToken, fut: F) -> Option<F::Output> {
    tokio::select! {
        biased;
        _ = token.cancelled() => None,
        output = fut => Some(output),
    }
}
