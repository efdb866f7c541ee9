//! # codedocs vector store
//!
//! Persistent storage and similarity search for chunk embeddings.
//!
//! ## Features
//!
//! - **Four similarity metrics**: cosine, Euclidean, dot product, Manhattan
//! - **Transactional storage** on LMDB (`heed3`): one write transaction per call
//! - **Exact stats**: document/embedding counters updated with every write
//! - **Embedding orchestration**: batched generation through a pluggable generator
//!
//! ## Architecture
//!
//! ```text
//! Document (corpus)
//!     │
//!     ├──> EmbeddingService
//!     │      └─> EmbeddingGenerator (batched)
//!     │
//!     └──> HeedVectorStore
//!            ├─> documents   document_id -> DocumentEmbedding
//!            ├─> embeddings  chunk_id    -> chunk record
//!            ├─> metadata    schema version
//!            └─> stats       DatabaseStats
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use codedocs_vector_store::{HeedVectorStore, SearchOptions, StoreConfig, VectorStore};
//!
//! fn main() -> codedocs_vector_store::Result<()> {
//!     let store = HeedVectorStore::open(&StoreConfig::at(".codedocs/vectors", 384))?;
//!
//!     let query = vec![0.0f32; 384];
//!     for hit in store.search(&query, &SearchOptions::new(5).filter("language", "Go"))? {
//!         println!("{}: {:.3}", hit.file_path, hit.score);
//!     }
//!
//!     store.close()
//! }
//! ```

mod config;
mod embeddings;
mod error;
mod service;
mod similarity;
mod store;
mod types;

pub use config::StoreConfig;
pub use embeddings::{known_model_dimensions, EmbeddingConfig, EmbeddingGenerator, StubEmbedder};
pub use error::{Result, VectorStoreError};
pub use service::{chunk_metadata, EmbeddingService};
pub use similarity::{SimilarityCalculator, SimilarityMetric};
pub use store::{HeedVectorStore, VectorStore, STORE_SCHEMA_VERSION};
pub use types::{DatabaseStats, DocumentEmbedding, EmbeddingVector, SearchOptions, SearchResult};
