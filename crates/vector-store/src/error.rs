use thiserror::Error;

pub type Result<T> = std::result::Result<T, VectorStoreError>;

#[derive(Error, Debug)]
pub enum VectorStoreError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid vector '{id}': expected dimension {expected}, got {actual}")]
    InvalidVector {
        id: String,
        expected: usize,
        actual: usize,
    },

    #[error("Document '{id}' declares {chunk_count} chunks but carries {embeddings} embeddings")]
    ChunkCountMismatch {
        id: String,
        chunk_count: usize,
        embeddings: usize,
    },

    #[error("Chunk '{chunk_id}' of document '{document_id}' is already owned by document '{owner}'")]
    ChunkConflict {
        chunk_id: String,
        document_id: String,
        owner: String,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Storage IO error: {0}")]
    StorageIo(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Embedding generation error: {0}")]
    Generation(String),
}

impl VectorStoreError {
    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation(msg.into())
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// True when the error means "never stored" rather than an infrastructure fault
    #[must_use]
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

impl From<heed3::Error> for VectorStoreError {
    fn from(err: heed3::Error) -> Self {
        Self::StorageIo(err.to_string())
    }
}

impl From<std::io::Error> for VectorStoreError {
    fn from(err: std::io::Error) -> Self {
        Self::StorageIo(err.to_string())
    }
}
