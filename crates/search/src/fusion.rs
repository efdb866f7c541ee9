use crate::context::RetrievalResult;
use crate::filter::sort_by_score;
use std::collections::HashMap;

/// Weighted merge of semantic and keyword results by chunk id
pub struct HybridFusion {
    semantic_weight: f32,
    keyword_weight: f32,
}

impl HybridFusion {
    #[must_use]
    pub const fn new(semantic_weight: f32, keyword_weight: f32) -> Self {
        Self {
            semantic_weight,
            keyword_weight,
        }
    }

    /// Chunks found by both strategies score `s·ws + k·wk`; a chunk found by
    /// only one keeps its own weighted score.
    ///
    /// Returns results sorted by score descending
    #[must_use]
    pub fn fuse(
        &self,
        semantic: Vec<RetrievalResult>,
        keyword: Vec<RetrievalResult>,
    ) -> Vec<RetrievalResult> {
        let mut merged: Vec<RetrievalResult> = Vec::with_capacity(semantic.len() + keyword.len());
        let mut by_chunk: HashMap<String, usize> = HashMap::new();

        for mut result in semantic {
            let semantic_score = result.score;
            result.relevance.semantic_score = semantic_score;
            result.score = semantic_score * self.semantic_weight;
            by_chunk.insert(result.chunk_id.clone(), merged.len());
            merged.push(result);
        }

        for result in keyword {
            let keyword_score = result.score;
            match by_chunk.get(&result.chunk_id) {
                Some(&idx) => {
                    let existing = &mut merged[idx];
                    existing.score = existing
                        .relevance
                        .semantic_score
                        .mul_add(self.semantic_weight, keyword_score * self.keyword_weight);
                    existing.relevance.keyword_score = keyword_score;
                    existing.relevance.matched_terms = result.relevance.matched_terms;
                }
                None => {
                    let mut result = result;
                    result.relevance.keyword_score = keyword_score;
                    result.score = keyword_score * self.keyword_weight;
                    by_chunk.insert(result.chunk_id.clone(), merged.len());
                    merged.push(result);
                }
            }
        }

        for result in &mut merged {
            result.relevance.relevance_score = result.score;
        }
        sort_by_score(&mut merged);

        log::debug!(
            "Hybrid fusion: {} merged results (weights semantic={:.2}, keyword={:.2})",
            merged.len(),
            self.semantic_weight,
            self.keyword_weight
        );
        merged
    }
}

impl Default for HybridFusion {
    fn default() -> Self {
        Self::new(0.7, 0.3)
    }
}
