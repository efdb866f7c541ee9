//! Retrieval engine: semantic, keyword, hybrid and structural strategies over a
//! chunk corpus and its stored embeddings, with filtering, reranking, per-file
//! diversity and a TTL result cache.

mod cache;
mod config;
mod context;
mod error;
mod filter;
mod fusion;
mod keyword;
mod rerank;
mod retriever;
mod stats;
mod structural;

pub use cache::{cache_key, CacheStats, ResultCache, RetrievalCache};
pub use config::RetrieverConfig;
pub use context::{
    QueryType, RelevanceInfo, ResultContext, RetrievalContext, RetrievalResult, TimeRange,
};
pub use error::{Result, SearchError};
pub use filter::{diversify, filter_results};
pub use fusion::HybridFusion;
pub use keyword::{extract_key_terms, keyword_match, query_terms, KeywordMatch};
pub use rerank::RerankWeights;
pub use retriever::{DocumentRetriever, HybridRetriever};
pub use stats::RetrievalStats;
pub use structural::{structural_match, StructuralMatch};
