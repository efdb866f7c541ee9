use crate::context::QueryType;
use crate::error::{Result, SearchError};
use crate::rerank::RerankWeights;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Tuning of [`crate::HybridRetriever`]; every field has a default
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrieverConfig {
    /// Strategy used by `retrieve_by_query`
    pub default_query_type: QueryType,

    /// Hybrid merge weights
    pub semantic_weight: f32,
    pub keyword_weight: f32,

    pub rerank_weights: RerankWeights,
    pub enable_reranking: bool,

    /// Attach neighbouring chunk text to each result
    pub enable_context: bool,

    /// Per-file cap applied once a result list grows past it
    pub max_similar_results: usize,

    pub cache_ttl_secs: u64,
    pub cache_capacity: usize,

    /// Score floor for `retrieve_related_chunks`
    pub related_min_score: f32,

    /// Multiplier for definition-like chunks in `retrieve_code_examples`
    pub code_example_boost: f32,

    /// Vector candidates fetched per requested result
    pub candidate_multiplier: usize,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            default_query_type: QueryType::Hybrid,
            semantic_weight: 0.7,
            keyword_weight: 0.3,
            rerank_weights: RerankWeights::default(),
            enable_reranking: true,
            enable_context: false,
            max_similar_results: 5,
            cache_ttl_secs: 300,
            cache_capacity: 1_000,
            related_min_score: 0.7,
            code_example_boost: 1.2,
            candidate_multiplier: 3,
        }
    }
}

impl RetrieverConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: Self = toml::from_str(raw)
            .map_err(|e| SearchError::InvalidConfig(format!("invalid retriever TOML: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub async fn load(path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path).await.map_err(|e| {
            SearchError::InvalidConfig(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }

    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn validate(&self) -> Result<()> {
        let weights = [
            ("semantic_weight", self.semantic_weight),
            ("keyword_weight", self.keyword_weight),
            ("rerank_weights.semantic", self.rerank_weights.semantic),
            ("rerank_weights.keyword", self.rerank_weights.keyword),
            ("rerank_weights.structural", self.rerank_weights.structural),
            ("related_min_score", self.related_min_score),
            ("code_example_boost", self.code_example_boost),
        ];
        for (name, value) in weights {
            if !value.is_finite() || value < 0.0 {
                return Err(SearchError::InvalidConfig(format!(
                    "{name} must be a non-negative number, got {value}"
                )));
            }
        }
        if self.cache_capacity == 0 {
            return Err(SearchError::InvalidConfig(
                "cache_capacity must be greater than zero".to_string(),
            ));
        }
        if self.candidate_multiplier == 0 {
            return Err(SearchError::InvalidConfig(
                "candidate_multiplier must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}
