use crate::error::{CorpusError, Result};
use crate::types::{Chunk, Document};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

pub const CORPUS_SCHEMA_VERSION: u32 = 1;

/// Ordered, read-only collection of documents with id lookups
#[derive(Debug, Clone, Default)]
pub struct Corpus {
    documents: Vec<Document>,
    by_document: HashMap<String, usize>,
    by_chunk: HashMap<String, (usize, usize)>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedCorpus {
    schema_version: u32,
    documents: Vec<Document>,
}

impl Corpus {
    #[must_use]
    pub fn new(documents: Vec<Document>) -> Self {
        let mut by_document = HashMap::with_capacity(documents.len());
        let mut by_chunk = HashMap::new();
        for (doc_idx, doc) in documents.iter().enumerate() {
            if by_document.insert(doc.id.clone(), doc_idx).is_some() {
                log::warn!("Duplicate document id '{}' in corpus; keeping the last one", doc.id);
            }
            for (chunk_idx, chunk) in doc.chunks.iter().enumerate() {
                by_chunk.insert(chunk.id.clone(), (doc_idx, chunk_idx));
            }
        }
        Self {
            documents,
            by_document,
            by_chunk,
        }
    }

    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = tokio::fs::read(path).await?;
        let persisted: PersistedCorpus = serde_json::from_slice(&bytes)?;
        if persisted.schema_version != CORPUS_SCHEMA_VERSION {
            return Err(CorpusError::UnsupportedSchema {
                found: persisted.schema_version,
                expected: CORPUS_SCHEMA_VERSION,
            });
        }
        log::info!(
            "Loaded corpus from {}: {} documents",
            path.display(),
            persisted.documents.len()
        );
        Ok(Self::new(persisted.documents))
    }

    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let persisted = PersistedCorpus {
            schema_version: CORPUS_SCHEMA_VERSION,
            documents: self.documents.clone(),
        };
        let bytes = serde_json::to_vec_pretty(&persisted)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    #[must_use]
    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    #[must_use]
    pub fn document(&self, document_id: &str) -> Option<&Document> {
        self.by_document
            .get(document_id)
            .and_then(|&idx| self.documents.get(idx))
    }

    /// Locate a chunk and its owning document
    #[must_use]
    pub fn find_chunk(&self, chunk_id: &str) -> Option<(&Document, &Chunk)> {
        let &(doc_idx, chunk_idx) = self.by_chunk.get(chunk_id)?;
        let doc = self.documents.get(doc_idx)?;
        doc.chunks.get(chunk_idx).map(|chunk| (doc, chunk))
    }

    /// Chunks immediately before and after `chunk_id` in its document
    #[must_use]
    pub fn neighbors(&self, chunk_id: &str) -> (Option<&Chunk>, Option<&Chunk>) {
        let Some(&(doc_idx, chunk_idx)) = self.by_chunk.get(chunk_id) else {
            return (None, None);
        };
        let Some(doc) = self.documents.get(doc_idx) else {
            return (None, None);
        };
        let prev = chunk_idx.checked_sub(1).and_then(|i| doc.chunks.get(i));
        let next = doc.chunks.get(chunk_idx + 1);
        (prev, next)
    }

    /// Every chunk paired with its document, in corpus order
    pub fn chunks(&self) -> impl Iterator<Item = (&Document, &Chunk)> {
        self.documents
            .iter()
            .flat_map(|doc| doc.chunks.iter().map(move |chunk| (doc, chunk)))
    }

    #[must_use]
    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.by_chunk.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

impl From<Vec<Document>> for Corpus {
    fn from(documents: Vec<Document>) -> Self {
        Self::new(documents)
    }
}
