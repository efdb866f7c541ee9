//! # codedocs indexer
//!
//! Concurrent ingestion of a chunked corpus into the vector store.
//!
//! ## Pipeline
//!
//! ```text
//! Corpus (chunked documents)
//!     │
//!     ├──> WorkerPool (bounded queue, N tokio workers)
//!     │      └─> EmbeddingService::process_document
//!     │
//!     └──> VectorStore::store_batch (one transaction)
//! ```
//!
//! ## Example
//!
//! ```no_run
//! use codedocs_corpus::Corpus;
//! use codedocs_indexer::{CorpusIndexer, WorkerPool};
//! use codedocs_vector_store::{
//!     EmbeddingConfig, EmbeddingService, HeedVectorStore, StoreConfig, StubEmbedder,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = EmbeddingConfig::default();
//!     let store = HeedVectorStore::open(&StoreConfig::at(".codedocs/vectors", config.dimensions))?;
//!     let generator = Arc::new(StubEmbedder::from_config(&config));
//!     let service = EmbeddingService::new(generator, Arc::new(store), config)?;
//!
//!     let corpus = Corpus::load(std::path::Path::new("corpus.json")).await?;
//!     let stats = CorpusIndexer::new(Arc::new(service), WorkerPool::new(4))
//!         .index(&corpus)
//!         .await?;
//!
//!     println!("Indexed {} documents, {} chunks", stats.documents, stats.chunks);
//!     Ok(())
//! }
//! ```

mod error;
mod indexer;
mod pool;
mod stats;

pub use error::{IndexerError, Result};
pub use indexer::CorpusIndexer;
pub use pool::WorkerPool;
pub use stats::IndexStats;
