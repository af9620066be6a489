//! Common types shared across the weather streaming crates.

pub mod error;
pub mod grid;
pub mod layer;
pub mod range;
pub mod raw;
pub mod source;
pub mod time;

pub use error::{SourceError, SourceResult, TimeParseError};
pub use grid::{gaussian_grid_order, gaussian_grid_points, O1280_POINTS};
pub use layer::{CacheLayer, Param};
pub use range::{ByteRange, ChunkRange};
pub use raw::{decode_f32_le, encode_f32_le, read_f32_file, write_f32_file};
pub use source::{
    MemorySource, RangeRequest, RangeResponse, RangeSource, CACHED_AT_HEADER, LAYER_HEADER,
    ORIGINAL_STATUS_HEADER,
};
pub use time::{ModelRun, Timestep, TimestepEntry};
