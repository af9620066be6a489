//! Error types for progressive loading.

use chrono::{DateTime, Utc};
use grid_container::ContainerError;
use stream_common::{Param, SourceError};
use thiserror::Error;

/// Errors that end a load.
///
/// A superseded load is not an error; it resolves to
/// [`crate::LoadOutcome::Superseded`].
#[derive(Error, Debug)]
pub enum FetchError {
    /// Opening or decoding a container failed.
    #[error("{timestep}: {source}")]
    Container {
        timestep: String,
        #[source]
        source: ContainerError,
    },

    /// The catalog has no pair of timesteps around the requested time.
    #[error("no timesteps bracket {time} for {param}")]
    NoBracket { param: Param, time: DateTime<Utc> },

    /// Invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl FetchError {
    pub fn container(timestep: impl ToString, source: ContainerError) -> Self {
        Self::Container {
            timestep: timestep.to_string(),
            source,
        }
    }
}

impl From<SourceError> for FetchError {
    fn from(err: SourceError) -> Self {
        Self::Container {
            timestep: String::new(),
            source: ContainerError::Source(err),
        }
    }
}

/// Result type for fetch operations.
pub type Result<T> = std::result::Result<T, FetchError>;
