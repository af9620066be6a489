//! Error types for the range-source seam and time parsing.

use thiserror::Error;

/// Result type alias using SourceError.
pub type SourceResult<T> = Result<T, SourceError>;

/// Transport-level failures of a byte-range read.
///
/// None of these are retried by the streaming core; the caller decides.
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("HTTP {status} for {url}")]
    Http { status: u16, url: String },

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Range {range} is outside of {url} ({len} bytes)")]
    RangeNotSatisfiable { url: String, range: String, len: u64 },

    #[error("Invalid byte range: {0}")]
    InvalidRange(String),

    #[error("Request aborted")]
    Aborted,
}

impl SourceError {
    /// Whether the error was caused by the request being aborted locally.
    pub fn is_abort(&self) -> bool {
        matches!(self, SourceError::Aborted)
    }
}

#[derive(Debug, Error)]
pub enum TimeParseError {
    #[error("Invalid timestep format: {0}")]
    InvalidFormat(String),
}
