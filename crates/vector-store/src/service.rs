use crate::embeddings::{EmbeddingConfig, EmbeddingGenerator};
use crate::error::{Result, VectorStoreError};
use crate::store::VectorStore;
use crate::types::{DocumentEmbedding, EmbeddingVector};
use codedocs_corpus::{Chunk, Document};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Leading characters of a document used for its summary header
const SUMMARY_PREVIEW_CHARS: usize = 1_000;

/// Turns corpus documents into stored [`DocumentEmbedding`]s
pub struct EmbeddingService {
    generator: Arc<dyn EmbeddingGenerator>,
    store: Arc<dyn VectorStore>,
    config: EmbeddingConfig,
}

impl EmbeddingService {
    pub fn new(
        generator: Arc<dyn EmbeddingGenerator>,
        store: Arc<dyn VectorStore>,
        config: EmbeddingConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            generator,
            store,
            config,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &EmbeddingConfig {
        &self.config
    }

    #[must_use]
    pub fn store(&self) -> &Arc<dyn VectorStore> {
        &self.store
    }

    /// Embed every chunk of `document`, in chunk order, with one batch call
    pub async fn process_document(&self, document: &Document) -> Result<DocumentEmbedding> {
        let texts: Vec<String> = document.chunks.iter().map(|c| c.text.clone()).collect();

        let vectors = self.generator.generate_batch_embeddings(&texts).await?;
        if vectors.len() != texts.len() {
            return Err(VectorStoreError::generation(format!(
                "generator returned {} vectors for {} texts of {}",
                vectors.len(),
                texts.len(),
                document.id
            )));
        }

        let category = document.category.as_str();
        let embeddings = document
            .chunks
            .iter()
            .zip(vectors)
            .enumerate()
            .map(|(index, (chunk, vector))| {
                let mut embedding = EmbeddingVector::new(chunk.id.clone(), vector, chunk.text.clone());
                embedding.metadata = chunk_metadata(document, chunk, index);
                embedding
            })
            .collect();

        let mut result = DocumentEmbedding::new(
            document.id.clone(),
            document.file_path.clone(),
            document.language.clone(),
            category,
            embeddings,
        );

        if self.config.generate_summary {
            let header = summary_header(document);
            result.summary = Some(self.generator.generate_embedding(&header).await?);
        }

        log::debug!(
            "Embedded {} ({} chunks)",
            document.file_path,
            result.chunk_count
        );
        Ok(result)
    }

    /// Embed all documents, then store them in one batch; the first failure aborts
    pub async fn process_documents(&self, documents: &[Document]) -> Result<Vec<DocumentEmbedding>> {
        let mut embeddings = Vec::with_capacity(documents.len());
        for document in documents {
            embeddings.push(self.process_document(document).await?);
        }
        self.store_all(&embeddings).await?;
        log::info!("Processed {} documents", embeddings.len());
        Ok(embeddings)
    }

    pub async fn process_and_store(&self, document: &Document) -> Result<DocumentEmbedding> {
        let embedding = self.process_document(document).await?;
        self.store_all(std::slice::from_ref(&embedding)).await?;
        Ok(embedding)
    }

    /// Persist already generated embeddings with a single batch write
    pub async fn store_all(&self, embeddings: &[DocumentEmbedding]) -> Result<()> {
        if embeddings.is_empty() {
            return Ok(());
        }
        let store = Arc::clone(&self.store);
        let owned = embeddings.to_vec();
        tokio::task::spawn_blocking(move || store.store_batch(&owned))
            .await
            .map_err(|e| VectorStoreError::StorageIo(format!("store task failed: {e}")))?
    }
}

/// Metadata attached to every chunk embedding: the chunk's own metadata plus
/// its identity and the owning document's attributes
#[must_use]
pub fn chunk_metadata(document: &Document, chunk: &Chunk, index: usize) -> BTreeMap<String, String> {
    let mut metadata = chunk.metadata.clone();
    for (key, value) in [
        ("chunk_id", chunk.id.clone()),
        ("chunk_index", index.to_string()),
        ("word_count", chunk.word_count.to_string()),
        ("start_pos", chunk.start_pos.to_string()),
        ("end_pos", chunk.end_pos.to_string()),
        ("document_id", document.id.clone()),
        ("file_path", document.file_path.clone()),
        ("language", document.language.clone()),
        ("category", document.category.as_str().to_string()),
    ] {
        metadata.insert(key.to_string(), value);
    }
    metadata
}

fn summary_header(document: &Document) -> String {
    let preview: String = document.content.chars().take(SUMMARY_PREVIEW_CHARS).collect();
    format!(
        "File: {}\nLanguage: {}\n\n{}",
        document.file_path, document.language, preview
    )
}
