//! Error types for the range cache.

use thiserror::Error;

/// Errors raised by cache storage and the control plane.
#[derive(Error, Debug)]
pub enum CacheError {
    /// The backing store failed.
    #[error("cache storage error: {0}")]
    Storage(String),

    /// A stored row could not be decoded.
    #[error("corrupt cache entry {key}: {reason}")]
    CorruptEntry { key: String, reason: String },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The control loop is no longer running.
    #[error("cache control channel closed")]
    ChannelClosed,
}

impl CacheError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn corrupt(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::CorruptEntry {
            key: key.into(),
            reason: reason.into(),
        }
    }
}

impl From<sqlx::Error> for CacheError {
    fn from(err: sqlx::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type for cache operations.
pub type Result<T> = std::result::Result<T, CacheError>;
