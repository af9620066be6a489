//! Error types for container decoding.

use stream_common::SourceError;
use thiserror::Error;

/// Errors that can occur while reading a container.
///
/// None of these are retried here; format errors are fatal to the load.
#[derive(Error, Debug)]
pub enum ContainerError {
    /// The range source failed.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// The trailer is missing, undersized or has the wrong magic.
    #[error("invalid trailer ({size} bytes): {reason}")]
    InvalidTrailer { size: u64, reason: String },

    /// A root or child descriptor could not be parsed.
    #[error("invalid descriptor at offset {offset} ({size} bytes): {reason}")]
    InvalidDescriptor {
        offset: u64,
        size: u64,
        reason: String,
    },

    /// No variable with the requested name.
    #[error("variable '{name}' not found (available: {})", available.join(", "))]
    VariableNotFound { name: String, available: Vec<String> },

    /// The decode session rejected the variable or read window.
    #[error("cannot start decode of '{variable}': {reason}")]
    SessionInit { variable: String, reason: String },

    /// A chunk failed to decode mid-stream.
    #[error("failed to decode chunk {chunk} of '{variable}' at offset {offset} ({size} bytes): {reason}")]
    ChunkDecode {
        variable: String,
        chunk: u64,
        offset: u64,
        size: u64,
        reason: String,
    },

    /// The writer was given inconsistent input.
    #[error("cannot write container: {0}")]
    Write(String),
}

impl ContainerError {
    pub fn invalid_trailer(size: u64, reason: impl Into<String>) -> Self {
        Self::InvalidTrailer {
            size,
            reason: reason.into(),
        }
    }

    pub fn invalid_descriptor(offset: u64, size: u64, reason: impl Into<String>) -> Self {
        Self::InvalidDescriptor {
            offset,
            size,
            reason: reason.into(),
        }
    }

    pub fn session_init(variable: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::SessionInit {
            variable: variable.into(),
            reason: reason.into(),
        }
    }

    pub fn write(msg: impl Into<String>) -> Self {
        Self::Write(msg.into())
    }

    /// Whether the underlying read was aborted rather than failed.
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Source(e) if e.is_abort())
    }
}

impl From<std::io::Error> for ContainerError {
    fn from(err: std::io::Error) -> Self {
        Self::Write(err.to_string())
    }
}

/// Result type for container operations.
pub type Result<T> = std::result::Result<T, ContainerError>;
