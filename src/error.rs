//! Error types shared across the library

use std::path::PathBuf;

/// Result alias used by every library operation
pub type Result<T> = std::result::Result<T, Error>;

/// Errors produced while ingesting, searching and documenting code
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A required setting (usually a credential) is missing
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Index artifacts have not been built yet
    #[error("index artifact not found at {path:?}; run `docmaint ingest` first")]
    MissingIndex { path: PathBuf },

    /// A source file could not be decoded or parsed
    #[error("failed to extract chunks from {path}: {reason}")]
    Extraction { path: String, reason: String },

    /// The on-disk index does not match its expected layout
    #[error("corrupt index: {0}")]
    CorruptIndex(String),

    /// A vector does not have the width of the index generation
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Refused to build an index with nothing in it
    #[error("no code chunks to index")]
    EmptyIndex,

    /// Network failure talking to an external collaborator
    #[error("{context}: {source}")]
    Transport {
        context: String,
        #[source]
        source: reqwest::Error,
    },

    /// The external collaborator answered with a non-success status
    #[error("{service} request failed: {status} - {body}")]
    Provider {
        service: &'static str,
        status: u16,
        body: String,
    },

    /// Invalid configuration file
    #[error("invalid config file {path:?}: {message}")]
    Config { path: PathBuf, message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Wrap a reqwest error with a short description of the failed call
    pub fn transport(context: impl Into<String>, source: reqwest::Error) -> Self {
        Self::Transport {
            context: context.into(),
            source,
        }
    }

    /// Whether this error means ingestion has to run before searching
    pub fn is_missing_index(&self) -> bool {
        matches!(self, Error::MissingIndex { .. })
    }
}
