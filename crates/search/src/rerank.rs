use crate::context::RetrievalResult;
use crate::filter::sort_by_score;
use crate::keyword::keyword_match;
use crate::structural::structural_match;
use serde::{Deserialize, Serialize};

/// Blend weights of the final reranking pass
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankWeights {
    /// Weight of the score the result arrived with
    pub semantic: f32,
    pub keyword: f32,
    pub structural: f32,
}

impl Default for RerankWeights {
    fn default() -> Self {
        Self {
            semantic: 0.6,
            keyword: 0.3,
            structural: 0.1,
        }
    }
}

#[derive(Clone, Debug)]
struct CandidateSignal {
    semantic: f32,
    keyword: f32,
    structural: f32,
}

impl CandidateSignal {
    fn blended(&self, weights: &RerankWeights) -> f32 {
        self.semantic.mul_add(
            weights.semantic,
            self.keyword
                .mul_add(weights.keyword, self.structural * weights.structural),
        )
    }
}

/// Rescore every result from its incoming score, a fresh keyword score against
/// `terms` and its structural score, then re-sort.
pub fn rerank_results(results: &mut [RetrievalResult], terms: &[String], weights: &RerankWeights) {
    for result in results.iter_mut() {
        let keyword = keyword_match(terms, &result.content);
        let structural = structural_match(&result.language, &result.content);
        let signal = CandidateSignal {
            semantic: if result.score.is_finite() { result.score } else { 0.0 },
            keyword: keyword.score,
            structural: structural.score,
        };
        let score = signal.blended(weights);

        let relevance = &mut result.relevance;
        relevance.relevance_score = score;
        relevance.semantic_score = signal.semantic;
        relevance.keyword_score = signal.keyword;
        relevance.structural_score = signal.structural;
        if keyword.is_match() {
            relevance.matched_terms = keyword.matched_terms;
        }
        relevance.matched_concepts = structural.concepts;
        result.score = score;
    }
    sort_by_score(results);
}
