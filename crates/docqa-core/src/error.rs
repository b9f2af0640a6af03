use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Nothing has been ingested yet, so there is nothing to search.
    #[error("No documents have been indexed yet")]
    EmptyIndex,

    #[error("Dimensionality mismatch: index holds {expected}-d vectors, got {actual}-d")]
    DimensionalityMismatch { expected: usize, actual: usize },

    #[error("Not found: {0}")]
    NotFound(String),

    /// The persisted index and metadata artifacts disagree with each other.
    #[error("Persisted state is corrupt: {0}")]
    PersistenceCorruption(String),

    #[error("Completion service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation failed: {0}")]
    Operation(String),
}

impl Error {
    /// Wrap a collaborator (tokenizer, embedder, extractor) failure.
    pub fn operation(context: &str, err: impl std::fmt::Display) -> Self {
        Self::Operation(format!("{context}: {err}"))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
