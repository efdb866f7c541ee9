use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Statistics about an indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexStats {
    /// Documents embedded and stored
    pub documents: usize,

    /// Chunks embedded across those documents
    pub chunks: usize,

    /// Time taken in milliseconds
    pub time_ms: u64,

    /// Stored documents per language
    pub languages: BTreeMap<String, usize>,

    /// `document_id: error` for every document that could not be embedded
    pub failed: Vec<String>,
}

impl IndexStats {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_document(&mut self, language: &str, chunks: usize) {
        self.documents += 1;
        self.chunks += chunks;
        *self.languages.entry(language.to_string()).or_insert(0) += 1;
    }

    pub fn add_failure(&mut self, document_id: &str, error: impl std::fmt::Display) {
        self.failed.push(format!("{document_id}: {error}"));
    }
}
