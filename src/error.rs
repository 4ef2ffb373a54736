//! Error kinds surfaced by the answering pipeline.
//!
//! Only hard failures live here. Routine absences (no models installed, no
//! document ingested yet, nothing retrieved) are ordinary return values:
//! empty lists, `false`, or the guidance string from
//! [`pipeline::NO_DOCUMENT_MESSAGE`](crate::pipeline::NO_DOCUMENT_MESSAGE).

use std::path::PathBuf;

/// Result alias used across the library.
pub type Result<T, E = RagError> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Invalid configuration, or mixed embedding spaces (dimension or
    /// fingerprint mismatch between an index and the active provider).
    #[error("configuration error: {0}")]
    Configuration(String),

    /// A document could not be read or parsed.
    #[error("failed to ingest {}: {reason}", path.display())]
    Ingest { path: PathBuf, reason: String },

    /// The embedding provider failed to produce vectors.
    #[error("embedding failed: {0}")]
    Embedding(String),

    /// The inference backend failed to produce an answer.
    #[error("inference failed: {0}")]
    Inference(String),

    /// No persisted index exists at the given storage path.
    #[error("no vector index found at {}", .0.display())]
    NotFound(PathBuf),

    /// A metadata value the index schema cannot hold (anything but a
    /// string, number, or bool).
    #[error("invalid metadata: {0}")]
    InvalidMetadata(String),

    /// `ask` was called before any model handle was bound.
    #[error("no language model selected")]
    NoModelSelected,

    #[error("storage error: {0}")]
    Storage(#[from] sqlx::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub(crate) fn ingest(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        RagError::Ingest {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// True for errors that indicate mixed embedding spaces or bad settings.
    pub fn is_configuration(&self) -> bool {
        matches!(self, RagError::Configuration(_))
    }
}
