//! Error taxonomy for the retrieval pipeline.
//!
//! Every library operation returns [`RagError`]. Nothing in the pipeline
//! retries: an error surfaces to the immediate caller and the operation that
//! produced it is abandoned without partial results. The CLI and HTTP layers
//! translate these variants into exit codes and status codes.

use std::path::PathBuf;

use thiserror::Error;

/// Result alias used throughout the pipeline modules.
pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Debug, Error)]
pub enum RagError {
    /// A source document could not be opened or parsed.
    #[error("failed to extract text from {path}: {message}")]
    Extraction { path: PathBuf, message: String },

    /// A tuning parameter is out of range (e.g. chunk window <= overlap).
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// The remote embedding call failed or returned an unusable payload.
    #[error("embedding service error: {0}")]
    EmbeddingService(String),

    /// One or both persisted index artifacts are missing.
    #[error("index not found: {0} is missing")]
    IndexNotFound(PathBuf),

    /// The persisted artifacts are unreadable or disagree with each other.
    #[error("index is corrupt: {0}")]
    IndexCorrupt(String),

    /// A query vector does not match the dimension of the indexed vectors.
    #[error("dimension mismatch: index holds {expected}-d vectors, query has {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// The remote language-model call failed.
    #[error("generation error: {0}")]
    Generation(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RagError {
    pub(crate) fn extraction(path: impl Into<PathBuf>, message: impl ToString) -> Self {
        RagError::Extraction {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True for failures of a remote collaborator (embedding or generation).
    pub fn is_upstream(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingService(_) | RagError::Generation(_)
        )
    }
}
