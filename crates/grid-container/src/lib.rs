//! Range-addressed access to chunked f32 weather containers.
//!
//! A container holds a group of named arrays. Each array is split into
//! chunks (optionally deflate-compressed) with an offset table, so any
//! sub-window can be decoded with a handful of HTTP range reads:
//!
//! ```text
//! ContainerDecoder::open(url)
//!      │
//!      ├─► suffix read: trailer ──► root descriptor offset
//!      ├─► root descriptor ──► child (offset, size) list
//!      └─► one read over all children ──► variables
//!
//! ContainerDecoder::read_window(variable, window)
//!      │
//!      └─► DecodeSession
//!               ├─► index reads (chunk offset table)
//!               └─► data reads ──► decompress ──► scatter into window
//! ```
//!
//! Every read goes through a [`stream_common::RangeSource`], typically the
//! HTTP source wrapped by the range cache.

pub mod codec;
pub mod decoder;
pub mod error;
pub mod format;
pub mod session;
pub mod variable;
pub mod writer;

pub use codec::Compression;
pub use decoder::{ContainerDecoder, DecodedArray};
pub use error::{ContainerError, Result};
pub use format::{Trailer, TRAILER_SIZE};
pub use session::{DataRead, DecodeSession, IndexRead, IoLimits, ReadWindow};
pub use variable::ContainerVariable;
pub use writer::ContainerWriter;
