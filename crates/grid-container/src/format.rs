//! Binary layout of a container file.
//!
//! All integers are little-endian.
//!
//! ```text
//! ┌──────────────┬─────────────────────┬──────────────┬─────────────────┐
//! │ chunk data   │ chunk indices       │ descriptors  │ trailer (24 B)  │
//! │ (per array)  │ (n_chunks + 1) u64  │ children,root│ GSC1 ver off sz │
//! └──────────────┴─────────────────────┴──────────────┴─────────────────┘
//! ```
//!
//! Descriptor:
//!
//! ```text
//! u8 kind | u8 compression | u16 name_len | u32 n_children | u32 n_dims
//! n_children × (u64 offset, u64 size)
//! arrays only: n_dims × u64 dims, n_dims × u64 chunk dims,
//!              u64 index_offset, u64 index_size
//! name (UTF-8)
//! ```

use stream_common::ChunkRange;

use crate::codec::Compression;
use crate::error::{ContainerError, Result};

pub const MAGIC: [u8; 4] = *b"GSC1";
pub const FORMAT_VERSION: u32 = 1;
pub const TRAILER_SIZE: u64 = 24;

/// Fixed part of a descriptor before the child list.
pub const DESCRIPTOR_HEADER_SIZE: usize = 12;

/// Maximum number of dimensions accepted for an array.
pub const MAX_DIMS: u32 = 8;

/// Location of the root descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Trailer {
    pub root: ChunkRange,
}

impl Trailer {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        let size = bytes.len() as u64;
        if size != TRAILER_SIZE {
            return Err(ContainerError::invalid_trailer(
                size,
                format!("expected {} bytes", TRAILER_SIZE),
            ));
        }

        let mut reader = ByteReader::new(bytes);
        let bad = |reason: &str| ContainerError::invalid_trailer(size, reason);

        let magic = reader.take(4).ok_or_else(|| bad("truncated magic"))?;
        if magic != MAGIC {
            return Err(bad("bad magic"));
        }
        let version = reader.u32().ok_or_else(|| bad("truncated version"))?;
        if version != FORMAT_VERSION {
            return Err(ContainerError::invalid_trailer(
                size,
                format!("unsupported format version {}", version),
            ));
        }
        let offset = reader.u64().ok_or_else(|| bad("truncated root offset"))?;
        let root_size = reader.u64().ok_or_else(|| bad("truncated root size"))?;
        if root_size < DESCRIPTOR_HEADER_SIZE as u64 {
            return Err(bad("root descriptor too small"));
        }

        let root = ChunkRange::new(offset, root_size);
        if root.end().is_none() {
            return Err(bad("root range overflows"));
        }
        Ok(Self { root })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(TRAILER_SIZE as usize);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&FORMAT_VERSION.to_le_bytes());
        out.extend_from_slice(&self.root.offset.to_le_bytes());
        out.extend_from_slice(&self.root.size.to_le_bytes());
        out
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Group,
    Array,
}

/// Shape and chunk layout of an f32 array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArrayLayout {
    pub dims: Vec<u64>,
    pub chunk_dims: Vec<u64>,
    pub compression: Compression,
    /// Location of the chunk offset table.
    pub index: ChunkRange,
}

/// A parsed node descriptor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Descriptor {
    pub name: String,
    pub kind: NodeKind,
    pub children: Vec<ChunkRange>,
    pub array: Option<ArrayLayout>,
}

impl Descriptor {
    pub fn group(name: impl Into<String>, children: Vec<ChunkRange>) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Group,
            children,
            array: None,
        }
    }

    pub fn array(name: impl Into<String>, layout: ArrayLayout) -> Self {
        Self {
            name: name.into(),
            kind: NodeKind::Array,
            children: Vec::new(),
            array: Some(layout),
        }
    }

    /// Parse a descriptor read from `at` in the file.
    ///
    /// `at` only feeds error context; no offsets are resolved here.
    pub fn parse(bytes: &[u8], at: u64) -> Result<Self> {
        let size = bytes.len() as u64;
        let bad = |reason: String| ContainerError::invalid_descriptor(at, size, reason);
        let mut reader = ByteReader::new(bytes);

        let kind = reader.u8().ok_or_else(|| bad("truncated header".into()))?;
        let compression = reader.u8().ok_or_else(|| bad("truncated header".into()))?;
        let name_len = reader.u16().ok_or_else(|| bad("truncated header".into()))?;
        let n_children = reader.u32().ok_or_else(|| bad("truncated header".into()))?;
        let n_dims = reader.u32().ok_or_else(|| bad("truncated header".into()))?;

        let kind = match kind {
            0 => NodeKind::Group,
            1 => NodeKind::Array,
            other => return Err(bad(format!("unknown node kind {}", other))),
        };
        let compression = Compression::from_code(compression)
            .ok_or_else(|| bad(format!("unknown compression {}", compression)))?;

        // Each child needs 16 bytes; reject counts the buffer cannot hold
        if (n_children as u64).saturating_mul(16) > reader.remaining() as u64 {
            return Err(bad(format!("{} children do not fit", n_children)));
        }
        let mut children = Vec::with_capacity(n_children as usize);
        for i in 0..n_children {
            let offset = reader.u64().ok_or_else(|| bad(format!("truncated child {}", i)))?;
            let child_size = reader.u64().ok_or_else(|| bad(format!("truncated child {}", i)))?;
            let child = ChunkRange::new(offset, child_size);
            if child.end().is_none() {
                return Err(bad(format!("child {} range overflows", i)));
            }
            children.push(child);
        }

        let array = match kind {
            NodeKind::Group => {
                if n_dims != 0 {
                    return Err(bad("group with dimensions".into()));
                }
                None
            }
            NodeKind::Array => {
                if n_dims == 0 || n_dims > MAX_DIMS {
                    return Err(bad(format!("unsupported dimension count {}", n_dims)));
                }
                let dims = read_u64s(&mut reader, n_dims)
                    .ok_or_else(|| bad("truncated dims".into()))?;
                let chunk_dims = read_u64s(&mut reader, n_dims)
                    .ok_or_else(|| bad("truncated chunk dims".into()))?;
                if chunk_dims.iter().any(|&c| c == 0) {
                    return Err(bad("zero chunk dimension".into()));
                }
                let index_offset = reader.u64().ok_or_else(|| bad("truncated index".into()))?;
                let index_size = reader.u64().ok_or_else(|| bad("truncated index".into()))?;
                let index = ChunkRange::new(index_offset, index_size);
                if index.end().is_none() {
                    return Err(bad("index range overflows".into()));
                }
                Some(ArrayLayout {
                    dims,
                    chunk_dims,
                    compression,
                    index,
                })
            }
        };

        let name = reader
            .take(name_len as usize)
            .ok_or_else(|| bad("truncated name".into()))?;
        let name = std::str::from_utf8(name)
            .map_err(|e| bad(format!("name is not UTF-8: {}", e)))?
            .to_string();

        Ok(Self {
            name,
            kind,
            children,
            array,
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let (n_dims, compression) = match &self.array {
            Some(layout) => (layout.dims.len() as u32, layout.compression),
            None => (0, Compression::None),
        };

        let mut out = Vec::new();
        out.push(match self.kind {
            NodeKind::Group => 0,
            NodeKind::Array => 1,
        });
        out.push(compression.code());
        out.extend_from_slice(&(self.name.len() as u16).to_le_bytes());
        out.extend_from_slice(&(self.children.len() as u32).to_le_bytes());
        out.extend_from_slice(&n_dims.to_le_bytes());

        for child in &self.children {
            out.extend_from_slice(&child.offset.to_le_bytes());
            out.extend_from_slice(&child.size.to_le_bytes());
        }

        if let Some(layout) = &self.array {
            for d in layout.dims.iter().chain(layout.chunk_dims.iter()) {
                out.extend_from_slice(&d.to_le_bytes());
            }
            out.extend_from_slice(&layout.index.offset.to_le_bytes());
            out.extend_from_slice(&layout.index.size.to_le_bytes());
        }

        out.extend_from_slice(self.name.as_bytes());
        out
    }
}

fn read_u64s(reader: &mut ByteReader<'_>, n: u32) -> Option<Vec<u64>> {
    (0..n).map(|_| reader.u64()).collect()
}

/// Bounds-checked little-endian cursor. Every read returns `None` instead
/// of panicking when the buffer is exhausted.
pub struct ByteReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    pub fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        let end = self.pos.checked_add(n)?;
        let slice = self.buf.get(self.pos..end)?;
        self.pos = end;
        Some(slice)
    }

    fn array<const N: usize>(&mut self) -> Option<[u8; N]> {
        self.take(N)?.try_into().ok()
    }

    pub fn u8(&mut self) -> Option<u8> {
        self.array::<1>().map(|b| b[0])
    }

    pub fn u16(&mut self) -> Option<u16> {
        self.array().map(u16::from_le_bytes)
    }

    pub fn u32(&mut self) -> Option<u32> {
        self.array().map(u32::from_le_bytes)
    }

    pub fn u64(&mut self) -> Option<u64> {
        self.array().map(u64::from_le_bytes)
    }
}
