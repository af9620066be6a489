//! Container writer.
//!
//! Produces files in the layout described in [`crate::format`]. Used to
//! build fixtures and by tests; the reader never depends on it.

use bytes::Bytes;
use stream_common::ChunkRange;
use tracing::debug;

use crate::codec::Compression;
use crate::error::{ContainerError, Result};
use crate::format::{ArrayLayout, Descriptor, Trailer, MAX_DIMS};

/// An array queued for writing.
#[derive(Debug, Clone)]
struct PendingArray {
    name: String,
    dims: Vec<u64>,
    chunk_dims: Vec<u64>,
    compression: Compression,
    data: Vec<f32>,
}

/// Builds a container in memory.
///
/// ```ignore
/// let bytes = ContainerWriter::new()
///     .array("temperature_2m", vec![1, 1000], vec![1, 256], Compression::Deflate, data)?
///     .finish()?;
/// ```
#[derive(Debug, Default)]
pub struct ContainerWriter {
    arrays: Vec<PendingArray>,
}

impl ContainerWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an f32 array. `data` is row-major over `dims`.
    pub fn array(
        mut self,
        name: impl Into<String>,
        dims: Vec<u64>,
        chunk_dims: Vec<u64>,
        compression: Compression,
        data: Vec<f32>,
    ) -> Result<Self> {
        let name = name.into();

        if dims.is_empty() || dims.len() > MAX_DIMS as usize || dims.contains(&0) {
            return Err(ContainerError::write(format!(
                "'{}' has unsupported shape {:?}",
                name, dims
            )));
        }
        if chunk_dims.len() != dims.len() || chunk_dims.iter().any(|&c| c == 0) {
            return Err(ContainerError::write(format!(
                "'{}' has invalid chunk shape {:?} for dims {:?}",
                name, chunk_dims, dims
            )));
        }
        if name.len() > u16::MAX as usize {
            return Err(ContainerError::write("variable name too long"));
        }
        let cells = dims
            .iter()
            .try_fold(1u64, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| ContainerError::write(format!("'{}' is too large", name)))?;
        if cells != data.len() as u64 {
            return Err(ContainerError::write(format!(
                "'{}' has {} values for {} cells",
                name,
                data.len(),
                cells
            )));
        }
        if self.arrays.iter().any(|a| a.name == name) {
            return Err(ContainerError::write(format!("duplicate variable '{}'", name)));
        }

        self.arrays.push(PendingArray {
            name,
            dims,
            chunk_dims,
            compression,
            data,
        });
        Ok(self)
    }

    /// Serialize every queued array followed by descriptors and trailer.
    pub fn finish(self) -> Result<Bytes> {
        let mut out: Vec<u8> = Vec::new();
        let mut descriptors = Vec::with_capacity(self.arrays.len());

        for array in &self.arrays {
            let mut index = vec![out.len() as u64];
            for chunk in chunk_cells(array) {
                let stored = array.compression.encode(&chunk)?;
                out.extend_from_slice(&stored);
                index.push(out.len() as u64);
            }

            let index_offset = out.len() as u64;
            for entry in &index {
                out.extend_from_slice(&entry.to_le_bytes());
            }

            descriptors.push(Descriptor::array(
                array.name.clone(),
                ArrayLayout {
                    dims: array.dims.clone(),
                    chunk_dims: array.chunk_dims.clone(),
                    compression: array.compression,
                    index: ChunkRange::new(index_offset, index.len() as u64 * 8),
                },
            ));
        }

        // Child descriptors sit back to back so readers can fetch them in one range
        let mut children = Vec::with_capacity(descriptors.len());
        for descriptor in &descriptors {
            let encoded = descriptor.encode();
            children.push(ChunkRange::new(out.len() as u64, encoded.len() as u64));
            out.extend_from_slice(&encoded);
        }

        let root = Descriptor::group("", children).encode();
        let root_range = ChunkRange::new(out.len() as u64, root.len() as u64);
        out.extend_from_slice(&root);
        out.extend_from_slice(&Trailer { root: root_range }.encode());

        debug!(arrays = self.arrays.len(), bytes = out.len(), "Wrote container");
        Ok(Bytes::from(out))
    }
}

/// Cells of every chunk in row-major chunk order, each chunk row-major
/// over its edge-truncated shape.
fn chunk_cells(array: &PendingArray) -> Vec<Vec<f32>> {
    let n = array.dims.len();
    let grid: Vec<u64> = (0..n)
        .map(|d| array.dims[d].div_ceil(array.chunk_dims[d]))
        .collect();
    let mut array_strides = vec![1u64; n];
    for d in (0..n - 1).rev() {
        array_strides[d] = array_strides[d + 1] * array.dims[d + 1];
    }

    let mut chunks = Vec::new();
    let mut chunk = vec![0u64; n];
    loop {
        let origin: Vec<u64> = (0..n).map(|d| chunk[d] * array.chunk_dims[d]).collect();
        let shape: Vec<u64> = (0..n)
            .map(|d| array.chunk_dims[d].min(array.dims[d] - origin[d]))
            .collect();

        let mut cells = Vec::new();
        let mut pos = vec![0u64; n];
        'cells: loop {
            let global: u64 = (0..n)
                .map(|d| (origin[d] + pos[d]) * array_strides[d])
                .sum();
            cells.push(array.data[global as usize]);

            let mut d = n;
            loop {
                if d == 0 {
                    break 'cells;
                }
                d -= 1;
                pos[d] += 1;
                if pos[d] < shape[d] {
                    break;
                }
                pos[d] = 0;
            }
        }
        chunks.push(cells);

        if !advance(&mut chunk, &grid) {
            return chunks;
        }
    }
}

/// Step a row-major odometer; `false` once it wraps around.
fn advance(coord: &mut [u64], limits: &[u64]) -> bool {
    for d in (0..coord.len()).rev() {
        coord[d] += 1;
        if coord[d] < limits[d] {
            return true;
        }
        coord[d] = 0;
    }
    false
}
