//! Decode sessions.
//!
//! A [`DecodeSession`] never performs I/O. It tells the caller which byte
//! ranges to read (first chunk-index reads, then data reads derived from
//! each index read) and writes decoded cells into a caller-owned buffer:
//!
//! ```text
//! DecodeSession::new(variable, window)
//!      │
//!      ├─► next_index_read()  ──► caller reads range ──► accept_index()
//!      │                                                     │
//!      │        ┌────────────────────────────────────────────┘
//!      │        ▼
//!      │   next_data_read()   ──► caller reads range ──► accept_data(out)
//!      │        │                                            (decompress +
//!      │        └─ repeat until no data reads are queued      scatter)
//!      │
//!      └─► repeat until no index reads are left; is_complete()
//! ```
//!
//! The destination is row-major over the read window.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use stream_common::ChunkRange;

use crate::codec::Compression;
use crate::error::{ContainerError, Result};
use crate::format::ByteReader;
use crate::variable::ContainerVariable;

/// Hyper-rectangle of an array: per-dimension start and length.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadWindow {
    pub offset: Vec<u64>,
    pub count: Vec<u64>,
}

impl ReadWindow {
    pub fn new(offset: Vec<u64>, count: Vec<u64>) -> Self {
        Self { offset, count }
    }

    /// The whole array.
    pub fn full(dims: &[u64]) -> Self {
        Self {
            offset: vec![0; dims.len()],
            count: dims.to_vec(),
        }
    }

    /// `len` positions from `start` along `dim`, full extent elsewhere.
    pub fn slice(dims: &[u64], dim: usize, start: u64, len: u64) -> Self {
        let mut window = Self::full(dims);
        if let (Some(offset), Some(count)) = (window.offset.get_mut(dim), window.count.get_mut(dim)) {
            *offset = start;
            *count = len;
        }
        window
    }

    pub fn cell_count(&self) -> Option<u64> {
        self.count.iter().try_fold(1u64, |acc, &c| acc.checked_mul(c))
    }
}

/// Bounds on individual reads issued by a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IoLimits {
    /// Largest single read of the chunk offset table.
    pub max_index_read_bytes: u64,
    /// Largest coalesced data read.
    pub max_data_read_bytes: u64,
    /// Largest hole between two chunks that still merges them into one read.
    pub max_merge_gap: u64,
}

impl Default for IoLimits {
    fn default() -> Self {
        Self {
            max_index_read_bytes: 64 * 1024,
            max_data_read_bytes: 16 * 1024 * 1024,
            max_merge_gap: 4096,
        }
    }
}

/// A read of part of the chunk offset table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRead {
    pub range: ChunkRange,
    first_entry: u64,
    chunks: Vec<u64>,
}

/// A read of one or more adjacent chunks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataRead {
    pub range: ChunkRange,
    chunks: Vec<(u64, ChunkRange)>,
}

impl DataRead {
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }
}

/// Origin and edge-truncated shape of one chunk.
struct ChunkGeometry {
    origin: Vec<u64>,
    shape: Vec<u64>,
}

impl ChunkGeometry {
    fn cells(&self) -> Option<u64> {
        self.shape.iter().try_fold(1u64, |acc, &s| acc.checked_mul(s))
    }
}

pub struct DecodeSession {
    variable: String,
    dims: Vec<u64>,
    chunk_dims: Vec<u64>,
    chunk_grid: Vec<u64>,
    compression: Compression,
    window: ReadWindow,
    window_cells: usize,
    limits: IoLimits,
    pending_index: VecDeque<IndexRead>,
    pending_data: VecDeque<DataRead>,
    needed_chunks: usize,
    decoded_chunks: usize,
}

impl DecodeSession {
    pub fn new(variable: &ContainerVariable, window: ReadWindow, limits: IoLimits) -> Result<Self> {
        let fail = |reason: String| ContainerError::session_init(&variable.name, reason);
        let n = variable.dims.len();

        if variable.chunk_dims.len() != n {
            return Err(fail("chunk rank differs from array rank".into()));
        }
        if window.offset.len() != n || window.count.len() != n {
            return Err(fail(format!(
                "window rank {}/{} does not match array rank {}",
                window.offset.len(),
                window.count.len(),
                n
            )));
        }
        for d in 0..n {
            let end = window.offset[d]
                .checked_add(window.count[d])
                .ok_or_else(|| fail(format!("window overflows in dimension {}", d)))?;
            if end > variable.dims[d] {
                return Err(fail(format!(
                    "window [{}, {}) exceeds dimension {} of size {}",
                    window.offset[d], end, d, variable.dims[d]
                )));
            }
        }

        let chunk_count = variable
            .chunk_count()
            .ok_or_else(|| fail("chunk count overflows".into()))?;
        let expected_index = chunk_count
            .checked_add(1)
            .and_then(|e| e.checked_mul(8))
            .ok_or_else(|| fail("chunk index size overflows".into()))?;
        if variable.index.size != expected_index {
            return Err(fail(format!(
                "chunk index is {} bytes, {} chunks need {}",
                variable.index.size, chunk_count, expected_index
            )));
        }

        let window_cells = window
            .cell_count()
            .and_then(|c| usize::try_from(c).ok())
            .ok_or_else(|| fail("window too large".into()))?;

        let mut session = Self {
            variable: variable.name.clone(),
            dims: variable.dims.clone(),
            chunk_dims: variable.chunk_dims.clone(),
            chunk_grid: variable.chunk_grid(),
            compression: variable.compression,
            window,
            window_cells,
            limits,
            pending_index: VecDeque::new(),
            pending_data: VecDeque::new(),
            needed_chunks: 0,
            decoded_chunks: 0,
        };

        let chunks = session.intersecting_chunks();
        session.needed_chunks = chunks.len();
        session.plan_index_reads(variable.index.offset, &chunks)
            .ok_or_else(|| fail("chunk index offset overflows".into()))?;
        Ok(session)
    }

    pub fn variable(&self) -> &str {
        &self.variable
    }

    pub fn window(&self) -> &ReadWindow {
        &self.window
    }

    /// Number of cells the destination buffer must hold.
    pub fn cell_count(&self) -> usize {
        self.window_cells
    }

    pub fn needed_chunks(&self) -> usize {
        self.needed_chunks
    }

    pub fn decoded_chunks(&self) -> usize {
        self.decoded_chunks
    }

    pub fn is_complete(&self) -> bool {
        self.pending_index.is_empty()
            && self.pending_data.is_empty()
            && self.decoded_chunks == self.needed_chunks
    }

    pub fn next_index_read(&mut self) -> Option<IndexRead> {
        self.pending_index.pop_front()
    }

    pub fn next_data_read(&mut self) -> Option<DataRead> {
        self.pending_data.pop_front()
    }

    /// Linear indices of chunks overlapping the window, ascending.
    fn intersecting_chunks(&self) -> Vec<u64> {
        let n = self.dims.len();
        if self.window.count.iter().any(|&c| c == 0) {
            return Vec::new();
        }

        let lo: Vec<u64> = (0..n)
            .map(|d| self.window.offset[d] / self.chunk_dims[d])
            .collect();
        let hi: Vec<u64> = (0..n)
            .map(|d| (self.window.offset[d] + self.window.count[d] - 1) / self.chunk_dims[d])
            .collect();

        let mut chunks = Vec::new();
        let mut coord = lo.clone();
        loop {
            let linear = coord
                .iter()
                .zip(&self.chunk_grid)
                .fold(0u64, |acc, (&c, &g)| acc * g + c);
            chunks.push(linear);

            let mut d = n;
            loop {
                if d == 0 {
                    return chunks;
                }
                d -= 1;
                coord[d] += 1;
                if coord[d] <= hi[d] {
                    break;
                }
                coord[d] = lo[d];
            }
        }
    }

    /// Group chunks into index reads. Each read covers the entries from its
    /// first chunk up to one past its last chunk.
    fn plan_index_reads(&mut self, index_base: u64, chunks: &[u64]) -> Option<()> {
        let max_entries = (self.limits.max_index_read_bytes / 8).max(2);

        let mut batch: Vec<u64> = Vec::new();
        for &chunk in chunks {
            if let Some(&first) = batch.first() {
                if chunk + 2 - first > max_entries {
                    let read = index_read(index_base, std::mem::take(&mut batch))?;
                    self.pending_index.push_back(read);
                }
            }
            batch.push(chunk);
        }
        if !batch.is_empty() {
            let read = index_read(index_base, batch)?;
            self.pending_index.push_back(read);
        }
        Some(())
    }

    /// Resolve chunk locations from index bytes and queue coalesced data reads.
    pub fn accept_index(&mut self, read: &IndexRead, bytes: &[u8]) -> Result<()> {
        let first_chunk = read.chunks.first().copied().unwrap_or(read.first_entry);
        if bytes.len() as u64 != read.range.size {
            return Err(self.chunk_error(
                first_chunk,
                read.range,
                format!("index read returned {} bytes", bytes.len()),
            ));
        }

        let mut reader = ByteReader::new(bytes);
        let mut entries = Vec::with_capacity(bytes.len() / 8);
        while let Some(entry) = reader.u64() {
            entries.push(entry);
        }

        let mut current: Option<DataRead> = None;
        for &chunk in &read.chunks {
            let local = (chunk - read.first_entry) as usize;
            let (start, end) = match (entries.get(local), entries.get(local + 1)) {
                (Some(&start), Some(&end)) if end >= start => (start, end),
                _ => {
                    return Err(self.chunk_error(
                        chunk,
                        read.range,
                        "chunk index entries are not ascending".into(),
                    ))
                }
            };
            let location = ChunkRange::new(start, end - start);

            current = match current.take() {
                Some(mut data) => match self.merged(&data.range, &location) {
                    Some(range) => {
                        data.range = range;
                        data.chunks.push((chunk, location));
                        Some(data)
                    }
                    None => {
                        self.pending_data.push_back(data);
                        Some(DataRead {
                            range: location,
                            chunks: vec![(chunk, location)],
                        })
                    }
                },
                None => Some(DataRead {
                    range: location,
                    chunks: vec![(chunk, location)],
                }),
            };
        }
        if let Some(data) = current {
            self.pending_data.push_back(data);
        }
        Ok(())
    }

    /// Range covering `current` and `next` if they may share one read.
    fn merged(&self, current: &ChunkRange, next: &ChunkRange) -> Option<ChunkRange> {
        let current_end = current.end()?;
        let gap = next.offset.checked_sub(current_end)?;
        if gap > self.limits.max_merge_gap {
            return None;
        }
        let merged = current.union(next)?;
        (merged.size <= self.limits.max_data_read_bytes).then_some(merged)
    }

    /// Decode every chunk of a data read into `out`.
    pub fn accept_data(&mut self, read: &DataRead, bytes: &[u8], out: &mut [f32]) -> Result<()> {
        if out.len() != self.window_cells {
            return Err(ContainerError::session_init(
                &self.variable,
                format!(
                    "destination holds {} cells, window needs {}",
                    out.len(),
                    self.window_cells
                ),
            ));
        }

        for &(chunk, location) in &read.chunks {
            if bytes.len() as u64 != read.range.size {
                return Err(self.chunk_error(
                    chunk,
                    read.range,
                    format!("data read returned {} bytes", bytes.len()),
                ));
            }

            let stored = location
                .offset
                .checked_sub(read.range.offset)
                .and_then(|local| {
                    let start = usize::try_from(local).ok()?;
                    let end = start.checked_add(usize::try_from(location.size).ok()?)?;
                    bytes.get(start..end)
                })
                .ok_or_else(|| {
                    self.chunk_error(chunk, location, "chunk outside data read".into())
                })?;

            let geometry = self.geometry(chunk);
            let cells = geometry
                .cells()
                .and_then(|c| usize::try_from(c).ok())
                .ok_or_else(|| self.chunk_error(chunk, location, "chunk too large".into()))?;

            let values = self
                .compression
                .decode(stored, cells)
                .map_err(|reason| self.chunk_error(chunk, location, reason))?;

            self.scatter(&geometry, &values, out)
                .ok_or_else(|| self.chunk_error(chunk, location, "chunk does not fit window".into()))?;
            self.decoded_chunks += 1;
        }
        Ok(())
    }

    fn geometry(&self, chunk: u64) -> ChunkGeometry {
        let n = self.dims.len();
        let mut coord = vec![0u64; n];
        let mut rem = chunk;
        for d in (0..n).rev() {
            coord[d] = rem % self.chunk_grid[d];
            rem /= self.chunk_grid[d];
        }

        let origin: Vec<u64> = (0..n).map(|d| coord[d] * self.chunk_dims[d]).collect();
        let shape = (0..n)
            .map(|d| self.chunk_dims[d].min(self.dims[d] - origin[d]))
            .collect();
        ChunkGeometry { origin, shape }
    }

    /// Copy the part of a decoded chunk that lies inside the window.
    fn scatter(&self, geometry: &ChunkGeometry, values: &[f32], out: &mut [f32]) -> Option<()> {
        let n = self.dims.len();
        let last = n - 1;

        let lo: Vec<u64> = (0..n)
            .map(|d| geometry.origin[d].max(self.window.offset[d]))
            .collect();
        let hi: Vec<u64> = (0..n)
            .map(|d| {
                (geometry.origin[d] + geometry.shape[d])
                    .min(self.window.offset[d] + self.window.count[d])
            })
            .collect();
        if (0..n).any(|d| lo[d] >= hi[d]) {
            return Some(());
        }

        let chunk_strides = strides(&geometry.shape);
        let window_strides = strides(&self.window.count);
        let run = usize::try_from(hi[last] - lo[last]).ok()?;

        let mut pos = lo.clone();
        loop {
            let mut src = 0u64;
            let mut dst = 0u64;
            for d in 0..n {
                src += (pos[d] - geometry.origin[d]) * chunk_strides[d];
                dst += (pos[d] - self.window.offset[d]) * window_strides[d];
            }
            let src = usize::try_from(src).ok()?;
            let dst = usize::try_from(dst).ok()?;
            out.get_mut(dst..dst.checked_add(run)?)?
                .copy_from_slice(values.get(src..src.checked_add(run)?)?);

            let mut d = last;
            loop {
                if d == 0 {
                    return Some(());
                }
                d -= 1;
                pos[d] += 1;
                if pos[d] < hi[d] {
                    break;
                }
                pos[d] = lo[d];
            }
        }
    }

    fn chunk_error(&self, chunk: u64, range: ChunkRange, reason: String) -> ContainerError {
        ContainerError::ChunkDecode {
            variable: self.variable.clone(),
            chunk,
            offset: range.offset,
            size: range.size,
            reason,
        }
    }
}

fn index_read(index_base: u64, chunks: Vec<u64>) -> Option<IndexRead> {
    let first = *chunks.first()?;
    let last = *chunks.last()?;
    let entries = last - first + 2;
    let offset = index_base.checked_add(first.checked_mul(8)?)?;
    Some(IndexRead {
        range: ChunkRange::new(offset, entries.checked_mul(8)?),
        first_entry: first,
        chunks,
    })
}

/// Row-major strides for a shape.
fn strides(shape: &[u64]) -> Vec<u64> {
    let mut out = vec![1u64; shape.len()];
    for d in (0..shape.len().saturating_sub(1)).rev() {
        out[d] = out[d + 1] * shape[d + 1];
    }
    out
}
