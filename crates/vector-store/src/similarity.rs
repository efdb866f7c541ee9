use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Similarity metric used to compare embedding vectors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SimilarityMetric {
    #[default]
    Cosine,
    Euclidean,
    DotProduct,
    Manhattan,
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::DotProduct => "dot_product",
            Self::Manhattan => "manhattan",
        })
    }
}

/// Scalar similarity between two vectors under a fixed metric.
///
/// Higher is always better: distance metrics are mapped through `1 / (1 + d)`.
/// Vectors of different lengths never match and score `0.0`; callers that need
/// a hard failure validate dimensions before storing instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SimilarityCalculator {
    metric: SimilarityMetric,
}

impl SimilarityCalculator {
    #[must_use]
    pub const fn new(metric: SimilarityMetric) -> Self {
        Self { metric }
    }

    #[must_use]
    pub const fn metric(&self) -> SimilarityMetric {
        self.metric
    }

    #[must_use]
    pub fn calculate(&self, v1: &[f32], v2: &[f32]) -> f32 {
        if v1.len() != v2.len() {
            return 0.0;
        }

        match self.metric {
            SimilarityMetric::Cosine => cosine_similarity(v1, v2),
            SimilarityMetric::Euclidean => 1.0 / (1.0 + euclidean_distance(v1, v2)),
            SimilarityMetric::DotProduct => dot(v1, v2),
            SimilarityMetric::Manhattan => 1.0 / (1.0 + manhattan_distance(v1, v2)),
        }
    }
}

fn dot(v1: &[f32], v2: &[f32]) -> f32 {
    ArrayView1::from(v1).dot(&ArrayView1::from(v2))
}

fn norm(v: &[f32]) -> f32 {
    dot(v, v).sqrt()
}

fn cosine_similarity(v1: &[f32], v2: &[f32]) -> f32 {
    let norm_a = norm(v1);
    let norm_b = norm(v2);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot(v1, v2) / (norm_a * norm_b)
}

fn euclidean_distance(v1: &[f32], v2: &[f32]) -> f32 {
    v1.iter()
        .zip(v2)
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f32>()
        .sqrt()
}

fn manhattan_distance(v1: &[f32], v2: &[f32]) -> f32 {
    v1.iter().zip(v2).map(|(a, b)| (a - b).abs()).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const ALL_METRICS: [SimilarityMetric; 4] = [
        SimilarityMetric::Cosine,
        SimilarityMetric::Euclidean,
        SimilarityMetric::DotProduct,
        SimilarityMetric::Manhattan,
    ];

    #[test]
    fn cosine_matches_textbook_values() {
        let calc = SimilarityCalculator::new(SimilarityMetric::Cosine);
        assert!((calc.calculate(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(calc.calculate(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((calc.calculate(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        // magnitude must not matter
        assert!((calc.calculate(&[3.0, 4.0], &[6.0, 8.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_of_zero_vector_is_zero() {
        let calc = SimilarityCalculator::new(SimilarityMetric::Cosine);
        assert_eq!(calc.calculate(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn euclidean_uses_real_distance() {
        let calc = SimilarityCalculator::new(SimilarityMetric::Euclidean);
        // distance 5 -> 1 / 6
        let score = calc.calculate(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((score - 1.0 / 6.0).abs() < 1e-6);
        assert!((calc.calculate(&[2.0, 2.0], &[2.0, 2.0]) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn manhattan_uses_sum_of_abs_differences() {
        let calc = SimilarityCalculator::new(SimilarityMetric::Manhattan);
        // distance 7 -> 1 / 8
        let score = calc.calculate(&[0.0, 0.0], &[3.0, -4.0]);
        assert!((score - 0.125).abs() < 1e-6);
    }

    #[test]
    fn dot_product_is_raw() {
        let calc = SimilarityCalculator::new(SimilarityMetric::DotProduct);
        assert!((calc.calculate(&[1.0, 2.0, 3.0], &[4.0, 5.0, 6.0]) - 32.0).abs() < 1e-6);
    }

    #[test]
    fn empty_vectors_do_not_panic() {
        for metric in ALL_METRICS {
            let score = SimilarityCalculator::new(metric).calculate(&[], &[]);
            assert!(score.is_finite());
        }
    }

    fn non_zero_vector() -> impl Strategy<Value = Vec<f32>> {
        prop::collection::vec(-10.0f32..10.0, 1..64)
            .prop_filter("non-zero norm", |v| v.iter().any(|x| x.abs() > 1e-3))
    }

    proptest! {
        #[test]
        fn cosine_self_similarity_is_maximal(v in non_zero_vector(), other in non_zero_vector()) {
            let calc = SimilarityCalculator::new(SimilarityMetric::Cosine);
            let own = calc.calculate(&v, &v);
            prop_assert!((own - 1.0).abs() < 1e-4);
            if other.len() == v.len() {
                prop_assert!(calc.calculate(&v, &other) <= own + 1e-4);
            }
        }

        #[test]
        fn mismatched_lengths_score_zero(
            a in prop::collection::vec(-10.0f32..10.0, 0..32),
            b in prop::collection::vec(-10.0f32..10.0, 0..32),
        ) {
            prop_assume!(a.len() != b.len());
            for metric in ALL_METRICS {
                prop_assert_eq!(SimilarityCalculator::new(metric).calculate(&a, &b), 0.0);
            }
        }

        #[test]
        fn distance_metrics_stay_in_unit_interval(
            pair in (1usize..32).prop_flat_map(|n| (
                prop::collection::vec(-10.0f32..10.0, n),
                prop::collection::vec(-10.0f32..10.0, n),
            ))
        ) {
            let (a, b) = pair;
            for metric in [SimilarityMetric::Euclidean, SimilarityMetric::Manhattan] {
                let score = SimilarityCalculator::new(metric).calculate(&a, &b);
                prop_assert!(score > 0.0 && score <= 1.0);
            }
        }
    }
}
