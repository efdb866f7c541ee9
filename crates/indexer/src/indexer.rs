use crate::error::Result;
use crate::pool::WorkerPool;
use crate::stats::IndexStats;
use codedocs_corpus::{Corpus, Document};
use codedocs_vector_store::EmbeddingService;
use std::sync::Arc;
use std::time::Instant;

/// Embeds a whole corpus concurrently and stores the results in one batch
pub struct CorpusIndexer {
    service: Arc<EmbeddingService>,
    pool: WorkerPool,
}

impl CorpusIndexer {
    #[must_use]
    pub fn new(service: Arc<EmbeddingService>, pool: WorkerPool) -> Self {
        Self { service, pool }
    }

    /// Index every document of `corpus`.
    ///
    /// Documents whose embedding fails are reported in [`IndexStats::failed`]
    /// and skipped; a storage failure fails the whole run and nothing is written.
    pub async fn index(&self, corpus: &Corpus) -> Result<IndexStats> {
        self.index_documents(corpus.documents().to_vec()).await
    }

    pub async fn index_documents(&self, documents: Vec<Document>) -> Result<IndexStats> {
        let start = Instant::now();
        let total = documents.len();
        log::info!(
            "Indexing {total} documents with {} workers",
            self.pool.workers()
        );

        let service = Arc::clone(&self.service);
        let outcomes = self
            .pool
            .run(documents, move |document| {
                let service = Arc::clone(&service);
                async move {
                    let outcome = service.process_document(&document).await;
                    (document, outcome)
                }
            })
            .await?;

        let mut stats = IndexStats::new();
        let mut embeddings = Vec::with_capacity(outcomes.len());
        for (document, outcome) in outcomes {
            match outcome {
                Ok(embedding) => {
                    stats.add_document(&document.language, embedding.chunk_count);
                    embeddings.push(embedding);
                }
                Err(err) => {
                    log::warn!("Failed to embed {}: {err}", document.file_path);
                    stats.add_failure(&document.id, err);
                }
            }
        }

        self.service.store_all(&embeddings).await?;

        stats.time_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "Indexed {}/{total} documents ({} chunks) in {} ms",
            stats.documents,
            stats.chunks,
            stats.time_ms
        );
        Ok(stats)
    }
}
