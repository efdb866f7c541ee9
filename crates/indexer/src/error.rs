use thiserror::Error;

pub type Result<T> = std::result::Result<T, IndexerError>;

#[derive(Error, Debug)]
pub enum IndexerError {
    #[error("Vector store error: {0}")]
    Store(#[from] codedocs_vector_store::VectorStoreError),

    #[error("Worker task failed: {0}")]
    Task(String),
}

impl From<tokio::task::JoinError> for IndexerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task(err.to_string())
    }
}
