//! Persistent byte-range cache for remote weather containers.
//!
//! Entries are keyed by request path plus normalized range, partitioned by
//! logical layer (one per parameter kind plus `meta`), and expire lazily:
//!
//! ```text
//! RangeRequest
//!      │
//!      ▼
//! CachedSource::fetch
//!      │
//!      ├─► RangeCache::get(layer, path, range)
//!      │         │
//!      │         ├─► fresh entry: serve stored bytes
//!      │         │
//!      │         └─► absent / expired: fall through
//!      │
//!      └─► inner source (HTTP) ─► RangeCache::put ─► original response
//! ```
//!
//! Past data (valid time already elapsed) is immutable once published and
//! lives for weeks. Forecast data can be superseded by a newer model run, so
//! it expires after hours.

pub mod cache;
pub mod config;
pub mod control;
pub mod error;
pub mod key;
pub mod policy;
pub mod source;
pub mod store;

pub use cache::RangeCache;
pub use config::CacheConfig;
pub use control::{CacheManager, ControlHandle, ControlRequest, ControlResponse};
pub use error::{CacheError, Result};
pub use key::{cache_key, request_path};
pub use policy::CachePolicy;
pub use source::CachedSource;
pub use store::{
    CacheEntry, CacheStats, EntrySummary, LayerStats, MemoryRangeStore, RangeStore,
    SqliteRangeStore,
};
