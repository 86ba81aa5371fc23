use std::error::Error as StdError;

use thiserror::Error;

/// Topicflow's crate-wide result type.
pub type Result<T> = std::result::Result<T, Error>;

/// Topicflow's crate-wide error type.
///
/// This is intentionally decoupled from `anyhow` so downstream libraries aren't forced to
/// adopt `anyhow` in their own public APIs.
///
/// Every variant is terminal for the current request. Nothing in the core retries.
#[derive(Debug, Error)]
pub enum Error {
    /// The caption markup held no parsable cues, or a time line was malformed.
    #[error("{0}")]
    Parse(String),

    /// Chunking or clustering parameters were rejected.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A stage was handed nothing to work on.
    #[error("{0}")]
    EmptyInput(&'static str),

    /// Embedding vectors in one batch did not share a dimensionality.
    #[error("embedding {index} has dimension {actual}, expected {expected}")]
    DimensionMismatch {
        index: usize,
        expected: usize,
        actual: usize,
    },

    /// A transcript or embedding collaborator failed.
    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    Message(String),

    #[error(transparent)]
    Other(#[from] Box<dyn StdError + Send + Sync>),
}

/// Failures reported by external collaborators (subtitle download, embedding API).
#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Failed(String),

    #[error("embedding length mismatch: expected {expected}, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

impl Error {
    pub(crate) fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }

    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub(crate) fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Whether the error was caused by the caller's input rather than a collaborator or I/O.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Parse(_) | Self::Config(_) | Self::EmptyInput(_) | Self::DimensionMismatch { .. }
        )
    }

    /// Whether a collaborator reported that the requested source does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Upstream(UpstreamError::NotFound(_)))
    }
}

impl From<anyhow::Error> for Error {
    fn from(err: anyhow::Error) -> Self {
        Self::Message(format!("{err:#}"))
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Other(Box::new(err))
    }
}

impl From<std::str::Utf8Error> for Error {
    fn from(err: std::str::Utf8Error) -> Self {
        Self::Other(Box::new(err))
    }
}
