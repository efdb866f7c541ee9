use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Embedding of a single chunk
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EmbeddingVector {
    /// Chunk identifier
    pub id: String,
    pub vector: Vec<f32>,
    /// Original chunk text
    pub content: String,
    pub dimension: usize,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
}

impl EmbeddingVector {
    #[must_use]
    pub fn new(id: impl Into<String>, vector: Vec<f32>, content: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            dimension: vector.len(),
            vector,
            content: content.into(),
            metadata: BTreeMap::new(),
            created_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// All embeddings of one source document
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentEmbedding {
    pub document_id: String,
    pub file_path: String,
    pub language: String,
    pub category: String,
    pub chunk_count: usize,
    /// Chunk embeddings in document order
    pub embeddings: Vec<EmbeddingVector>,
    /// Optional document-level summary vector
    #[serde(default)]
    pub summary: Option<Vec<f32>>,
    pub processed_at: DateTime<Utc>,
}

impl DocumentEmbedding {
    #[must_use]
    pub fn new(
        document_id: impl Into<String>,
        file_path: impl Into<String>,
        language: impl Into<String>,
        category: impl Into<String>,
        embeddings: Vec<EmbeddingVector>,
    ) -> Self {
        Self {
            document_id: document_id.into(),
            file_path: file_path.into(),
            language: language.into(),
            category: category.into(),
            chunk_count: embeddings.len(),
            embeddings,
            summary: None,
            processed_at: Utc::now(),
        }
    }
}

/// Aggregate store metrics, persisted in the `stats` bucket
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DatabaseStats {
    pub total_documents: u64,
    pub total_embeddings: u64,
    /// Approximate size of all serialized records in bytes
    pub total_size_bytes: u64,
    pub last_optimized: Option<DateTime<Utc>>,
    pub average_dimension: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DatabaseStats {
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            total_documents: 0,
            total_embeddings: 0,
            total_size_bytes: 0,
            last_optimized: None,
            average_dimension: 0.0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Account for one stored document
    pub(crate) fn add_document(&mut self, contribution: &Contribution) {
        let old_total = self.total_embeddings as f64;
        self.total_documents += 1;
        self.total_embeddings += contribution.embeddings;
        self.total_size_bytes += contribution.bytes;
        if self.total_embeddings > 0 {
            self.average_dimension = self.average_dimension.mul_add(old_total, contribution.dimension_sum)
                / self.total_embeddings as f64;
        }
        self.updated_at = Utc::now();
    }

    /// Exact inverse of [`DatabaseStats::add_document`]
    pub(crate) fn remove_document(&mut self, contribution: &Contribution) {
        let old_total = self.total_embeddings as f64;
        self.total_documents = self.total_documents.saturating_sub(1);
        self.total_embeddings = self.total_embeddings.saturating_sub(contribution.embeddings);
        self.total_size_bytes = self.total_size_bytes.saturating_sub(contribution.bytes);
        self.average_dimension = if self.total_embeddings == 0 {
            0.0
        } else {
            (self.average_dimension.mul_add(old_total, -contribution.dimension_sum)
                / self.total_embeddings as f64)
                .max(0.0)
        };
        self.updated_at = Utc::now();
    }
}

impl Default for DatabaseStats {
    fn default() -> Self {
        Self::new()
    }
}

/// What a single document adds to [`DatabaseStats`]
#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct Contribution {
    pub embeddings: u64,
    pub bytes: u64,
    pub dimension_sum: f64,
}

impl Contribution {
    pub(crate) fn of(document: &DocumentEmbedding, bytes: u64) -> Self {
        Self {
            embeddings: document.embeddings.len() as u64,
            bytes,
            dimension_sum: document
                .embeddings
                .iter()
                .map(|e| e.dimension as f64)
                .sum(),
        }
    }
}

/// Per-chunk record persisted in the `embeddings` bucket
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StoredChunk {
    pub document_id: String,
    pub chunk_id: String,
    pub file_path: String,
    pub content: String,
    pub vector: Vec<f32>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

/// Parameters of [`crate::VectorStore::search`]
#[derive(Debug, Clone, PartialEq)]
pub struct SearchOptions {
    pub top_k: usize,
    pub min_score: f32,
    /// Metadata equality filters; every entry must match
    pub filter_by: BTreeMap<String, String>,
    pub include_content: bool,
}

impl SearchOptions {
    #[must_use]
    pub fn new(top_k: usize) -> Self {
        Self {
            top_k,
            ..Self::default()
        }
    }

    #[must_use]
    pub const fn min_score(mut self, min_score: f32) -> Self {
        self.min_score = min_score;
        self
    }

    #[must_use]
    pub fn filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filter_by.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub const fn include_content(mut self, include: bool) -> Self {
        self.include_content = include;
        self
    }
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            top_k: 10,
            min_score: 0.0,
            filter_by: BTreeMap::new(),
            include_content: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub document_id: String,
    pub chunk_id: String,
    pub file_path: String,
    /// Empty unless requested via [`SearchOptions::include_content`]
    pub content: String,
    pub score: f32,
    pub metadata: BTreeMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn doc(dims: &[usize]) -> DocumentEmbedding {
        let embeddings = dims
            .iter()
            .enumerate()
            .map(|(i, &d)| EmbeddingVector::new(format!("c{i}"), vec![0.5; d], "x"))
            .collect();
        DocumentEmbedding::new("d", "a.go", "Go", "code", embeddings)
    }

    #[test]
    fn stats_add_and_remove_are_symmetric() {
        let mut stats = DatabaseStats::new();
        let first = doc(&[4, 4]);
        let second = doc(&[8]);
        let c1 = Contribution::of(&first, 100);
        let c2 = Contribution::of(&second, 40);

        stats.add_document(&c1);
        stats.add_document(&c2);
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.total_embeddings, 3);
        assert_eq!(stats.total_size_bytes, 140);
        assert!((stats.average_dimension - 16.0 / 3.0).abs() < 1e-9);

        stats.remove_document(&c2);
        assert_eq!(stats.total_documents, 1);
        assert_eq!(stats.total_embeddings, 2);
        assert_eq!(stats.total_size_bytes, 100);
        assert!((stats.average_dimension - 4.0).abs() < 1e-9);

        stats.remove_document(&c1);
        assert_eq!(stats.total_embeddings, 0);
        assert_eq!(stats.average_dimension, 0.0);
    }

    #[test]
    fn embedding_vector_tracks_dimension() {
        let v = EmbeddingVector::new("c", vec![1.0, 2.0, 3.0], "text").with_metadata("k", "v");
        assert_eq!(v.dimension, 3);
        assert_eq!(v.metadata.get("k").map(String::as_str), Some("v"));
    }
}
