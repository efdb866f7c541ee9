use thiserror::Error;

/// Result type for corpus operations
pub type Result<T> = std::result::Result<T, CorpusError>;

/// Errors that can occur while loading or saving a corpus
#[derive(Error, Debug)]
pub enum CorpusError {
    /// IO error occurred
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Corpus file is not valid JSON for the expected layout
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Corpus was written by an incompatible chunker
    #[error("Unsupported corpus schema_version {found} (expected {expected})")]
    UnsupportedSchema { found: u32, expected: u32 },
}
