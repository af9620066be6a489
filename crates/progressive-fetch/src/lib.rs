//! Progressive, cancellable loading of weather timestep pairs.
//!
//! ```text
//! ProgressiveFetcher::load_pair(param, time)
//!      │
//!      ├─► TimestepCatalog::bracket(time) ──► (a, b)
//!      │
//!      ├─► session a ─┐  joined on one task
//!      ├─► session b ─┘
//!      │      │
//!      │      ├─► ContainerDecoder::open(url)
//!      │      └─► per slab: slice reads sized by ThroughputEstimator
//!      │               └─► FetchEvent::Progress per slice
//!      │
//!      └─► LoadOutcome::Complete | LoadOutcome::Superseded
//! ```

pub mod catalog;
pub mod config;
pub mod error;
pub mod fetcher;
pub mod http;
pub mod throughput;

pub use catalog::{
    fill_hours_for_model, StaticCatalog, TimestepCatalog, ECMWF_IFS025_FILL_HOURS,
    ECMWF_IFS_FILL_HOURS,
};
pub use config::{FetchConfig, DEFAULT_BASE_URL};
pub use error::{FetchError, Result};
pub use fetcher::{
    FetchEvent, LoadOutcome, PairLoad, ProgressiveFetcher, SliceProgress, TimestepLoad,
};
pub use http::HttpRangeSource;
pub use throughput::ThroughputEstimator;
