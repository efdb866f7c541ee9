use crate::error::{Result, VectorStoreError};
use crate::similarity::SimilarityMetric;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Configuration of the persistent vector store
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct StoreConfig {
    /// Directory holding the LMDB environment
    pub path: PathBuf,

    /// Expected dimensionality of every stored vector
    pub dimension: usize,

    pub metric: SimilarityMetric,

    /// Upper bound of the memory map in MiB
    pub map_size_mb: usize,

    pub max_readers: u32,

    /// How long opening the environment may block before failing
    pub open_timeout_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".codedocs/vectors"),
            dimension: 1536,
            metric: SimilarityMetric::Cosine,
            map_size_mb: 1024,
            max_readers: 126,
            open_timeout_ms: 5_000,
        }
    }
}

impl StoreConfig {
    #[must_use]
    pub fn at(path: impl Into<PathBuf>, dimension: usize) -> Self {
        Self {
            path: path.into(),
            dimension,
            ..Default::default()
        }
    }

    #[must_use]
    pub const fn open_timeout(&self) -> Duration {
        Duration::from_millis(self.open_timeout_ms)
    }

    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(VectorStoreError::invalid_config(
                "store.dimension must be greater than zero",
            ));
        }
        if self.map_size_mb == 0 {
            return Err(VectorStoreError::invalid_config(
                "store.map_size_mb must be greater than zero",
            ));
        }
        if self.max_readers == 0 {
            return Err(VectorStoreError::invalid_config(
                "store.max_readers must be greater than zero",
            ));
        }
        Ok(())
    }
}
