//! Variables listed in a container.

use serde::Serialize;
use stream_common::ChunkRange;

use crate::codec::Compression;
use crate::format::{ArrayLayout, Descriptor, NodeKind};

/// An f32 array variable found among the root's children.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContainerVariable {
    pub name: String,
    pub dims: Vec<u64>,
    pub chunk_dims: Vec<u64>,
    pub compression: Compression,
    /// Location of the chunk offset table.
    #[serde(skip)]
    pub index: ChunkRange,
    /// Location of the variable's own descriptor.
    #[serde(skip)]
    pub descriptor: ChunkRange,
}

impl ContainerVariable {
    /// Build from a parsed child descriptor. Groups yield `None`.
    pub fn from_descriptor(descriptor: Descriptor, location: ChunkRange) -> Option<Self> {
        if descriptor.kind != NodeKind::Array {
            return None;
        }
        let ArrayLayout {
            dims,
            chunk_dims,
            compression,
            index,
        } = descriptor.array?;

        Some(Self {
            name: descriptor.name,
            dims,
            chunk_dims,
            compression,
            index,
            descriptor: location,
        })
    }

    /// Total number of cells, or `None` on overflow.
    pub fn cell_count(&self) -> Option<u64> {
        self.dims.iter().try_fold(1u64, |acc, &d| acc.checked_mul(d))
    }

    /// Number of chunks along each dimension.
    pub fn chunk_grid(&self) -> Vec<u64> {
        self.dims
            .iter()
            .zip(&self.chunk_dims)
            .map(|(&d, &c)| d.div_ceil(c))
            .collect()
    }

    pub fn chunk_count(&self) -> Option<u64> {
        self.chunk_grid()
            .iter()
            .try_fold(1u64, |acc, &n| acc.checked_mul(n))
    }

    /// Index of the outermost dimension longer than one, used for slicing.
    pub fn slice_dim(&self) -> Option<usize> {
        self.dims.iter().position(|&d| d > 1)
    }
}
