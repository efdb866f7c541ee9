use crate::cache::{cache_key, ResultCache, RetrievalCache};
use crate::config::RetrieverConfig;
use crate::context::{QueryType, RelevanceInfo, ResultContext, RetrievalContext, RetrievalResult};
use crate::error::{Result, SearchError};
use crate::filter::{apply_boosts, diversify, filter_results, filter_time_window, sort_by_score};
use crate::fusion::HybridFusion;
use crate::keyword::{extract_key_terms, keyword_match, query_terms};
use crate::rerank::rerank_results;
use crate::stats::{RetrievalStats, StatsRecorder};
use crate::structural::{structural_match, structural_query_score};
use async_trait::async_trait;
use codedocs_corpus::{Chunk, Corpus, Document, DocumentCategory};
use codedocs_vector_store::{chunk_metadata, EmbeddingGenerator, SearchOptions, VectorStore};
use std::sync::Arc;
use std::time::Instant;

/// Number of terms pulled from caller-supplied context results
const CONTEXT_TERM_LIMIT: usize = 10;
/// Score bonus per context term found in a result
const CONTEXT_TERM_BOOST: f32 = 0.1;
const MAX_CONTEXT_BOOST: f32 = 1.5;

/// Ranked retrieval over a corpus and its stored embeddings
#[async_trait]
pub trait DocumentRetriever: Send + Sync {
    /// Full pipeline: strategy, filters, boosts, rerank, diversity, cache.
    ///
    /// `min_score` bounds the final score of every returned result.
    async fn retrieve_relevant_documents(
        &self,
        context: &RetrievalContext,
    ) -> Result<Vec<RetrievalResult>>;

    /// Pipeline with the configured default strategy
    async fn retrieve_by_query(&self, query: &str, max_results: usize)
        -> Result<Vec<RetrievalResult>>;

    /// Chunks whose text or metadata mention the tags, scored by the share of tags matched
    async fn retrieve_by_tags(&self, tags: &[String], max_results: usize)
        -> Result<Vec<RetrievalResult>>;

    async fn retrieve_code_examples(
        &self,
        query: &str,
        language: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>>;

    async fn retrieve_documentation(&self, query: &str, max_results: usize)
        -> Result<Vec<RetrievalResult>>;

    async fn retrieve_config_files(&self, query: &str, max_results: usize)
        -> Result<Vec<RetrievalResult>>;

    /// Boost results that share vocabulary with `context_results`
    async fn retrieve_with_context(
        &self,
        query: &str,
        context_results: &[RetrievalResult],
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>>;

    /// Chunks semantically close to `chunk_id`, excluding the chunk itself
    async fn retrieve_related_chunks(&self, chunk_id: &str, max_results: usize)
        -> Result<Vec<RetrievalResult>>;

    fn get_retrieval_stats(&self) -> RetrievalStats;

    fn clear_cache(&self);
}

/// [`DocumentRetriever`] combining vector search with in-memory keyword and
/// structural scoring over the corpus
pub struct HybridRetriever {
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn EmbeddingGenerator>,
    corpus: Arc<Corpus>,
    cache: Arc<dyn ResultCache>,
    fusion: HybridFusion,
    config: RetrieverConfig,
    stats: StatsRecorder,
}

impl HybridRetriever {
    pub fn new(
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn EmbeddingGenerator>,
        corpus: Corpus,
        cache: Arc<dyn ResultCache>,
        config: RetrieverConfig,
    ) -> Result<Self> {
        config.validate()?;
        log::info!(
            "Retriever ready: {} documents, {} chunks",
            corpus.document_count(),
            corpus.chunk_count()
        );
        Ok(Self {
            store,
            generator,
            corpus: Arc::new(corpus),
            cache,
            fusion: HybridFusion::new(config.semantic_weight, config.keyword_weight),
            config,
            stats: StatsRecorder::default(),
        })
    }

    /// Build with a [`RetrievalCache`] sized from `config`
    pub fn with_default_cache(
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn EmbeddingGenerator>,
        corpus: Corpus,
        config: RetrieverConfig,
    ) -> Result<Self> {
        let cache = Arc::new(RetrievalCache::new(config.cache_capacity));
        Self::new(store, generator, corpus, cache, config)
    }

    #[must_use]
    pub fn corpus(&self) -> &Corpus {
        &self.corpus
    }

    #[must_use]
    pub const fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    async fn run_pipeline(&self, context: &RetrievalContext) -> Result<Vec<RetrievalResult>> {
        if context.query.trim().is_empty() {
            return Ok(Vec::new());
        }

        let key = cache_key(context);
        if let Some(cached) = self.cache.get(&key) {
            self.stats.record_cache(true);
            log::debug!("Cache hit for '{}' ({})", context.query, context.query_type);
            return Ok(cached);
        }
        self.stats.record_cache(false);

        let mut results = match context.query_type {
            QueryType::Semantic => self.semantic_search(context).await?,
            QueryType::Keyword => self.keyword_search(context),
            QueryType::Hybrid => {
                let semantic = self.semantic_search(context).await?;
                let keyword = self.keyword_search(context);
                self.fusion.fuse(semantic, keyword)
            }
            QueryType::Structural => self.structural_search(context),
        };
        let candidates = results.len();

        results = filter_results(results, &context.filters);
        if let Some(range) = &context.time_range {
            results = filter_time_window(results, range, &self.corpus);
        }
        apply_boosts(&mut results, &context.boost_factors);

        if self.config.enable_reranking {
            rerank_results(
                &mut results,
                &query_terms(&context.query),
                &self.config.rerank_weights,
            );
        }
        // boosts and reranking rescale scores; the floor holds for the final score
        results.retain(|r| r.score >= context.min_score);

        results = diversify(results, self.config.max_similar_results);
        results.truncate(context.max_results);

        if self.config.enable_context {
            self.attach_context(&mut results);
        }

        log::debug!(
            "{} retrieval for '{}': {candidates} candidates -> {} results",
            context.query_type,
            context.query,
            results.len()
        );
        self.cache.set(&key, results.clone(), self.config.cache_ttl());
        Ok(results)
    }

    async fn semantic_search(&self, context: &RetrievalContext) -> Result<Vec<RetrievalResult>> {
        let embedding = self.generator.generate_embedding(&context.query).await?;

        let top_k = context
            .max_results
            .max(1)
            .saturating_mul(self.config.candidate_multiplier);
        let mut options = SearchOptions::new(top_k).min_score(context.min_score);
        // file_path filters are substring matches, applied after the scan
        for (key, value) in &context.filters {
            if key != "file_path" {
                options = options.filter(key.clone(), value.clone());
            }
        }

        let store = Arc::clone(&self.store);
        let hits = tokio::task::spawn_blocking(move || store.search(&embedding, &options)).await??;

        Ok(hits
            .into_iter()
            .map(|hit| {
                let (language, category) = match self.corpus.document(&hit.document_id) {
                    Some(doc) => (doc.language.clone(), doc.category.as_str().to_string()),
                    None => (
                        hit.metadata.get("language").cloned().unwrap_or_default(),
                        hit.metadata.get("category").cloned().unwrap_or_default(),
                    ),
                };
                RetrievalResult {
                    document_id: hit.document_id,
                    chunk_id: hit.chunk_id,
                    file_path: hit.file_path,
                    content: hit.content,
                    score: hit.score,
                    language,
                    category,
                    context: None,
                    metadata: hit.metadata,
                    relevance: RelevanceInfo {
                        relevance_score: hit.score,
                        semantic_score: hit.score,
                        ..RelevanceInfo::default()
                    },
                }
            })
            .collect())
    }

    fn keyword_search(&self, context: &RetrievalContext) -> Vec<RetrievalResult> {
        let terms = query_terms(&context.query);
        let mut results: Vec<RetrievalResult> = self
            .corpus
            .documents()
            .iter()
            .flat_map(|doc| doc.chunks.iter().enumerate().map(move |(i, c)| (doc, i, c)))
            .filter_map(|(doc, index, chunk)| {
                let matched = keyword_match(&terms, &chunk.text);
                if !matched.is_match() || matched.score < context.min_score {
                    return None;
                }
                let mut result = result_from_chunk(doc, chunk, index, matched.score);
                result.relevance.keyword_score = matched.score;
                result.relevance.matched_terms = matched.matched_terms;
                Some(result)
            })
            .collect();
        sort_by_score(&mut results);
        results
    }

    fn structural_search(&self, context: &RetrievalContext) -> Vec<RetrievalResult> {
        let mut results: Vec<RetrievalResult> = self
            .corpus
            .documents()
            .iter()
            .filter(|doc| doc.is_code())
            .flat_map(|doc| doc.chunks.iter().enumerate().map(move |(i, c)| (doc, i, c)))
            .filter_map(|(doc, index, chunk)| {
                let matched = structural_query_score(&doc.language, &chunk.text, &context.query);
                if matched.score <= 0.0 || matched.score < context.min_score {
                    return None;
                }
                let mut result = result_from_chunk(doc, chunk, index, matched.score);
                result.relevance.structural_score = matched.score;
                result.relevance.matched_concepts = matched.concepts;
                Some(result)
            })
            .collect();
        sort_by_score(&mut results);
        results
    }

    fn attach_context(&self, results: &mut [RetrievalResult]) {
        for result in results.iter_mut() {
            let (previous, next) = self.corpus.neighbors(&result.chunk_id);
            result.context = Some(ResultContext {
                previous: previous.map(|c| c.text.clone()),
                next: next.map(|c| c.text.clone()),
            });
        }
    }

    fn tag_search(&self, tags: &[String], max_results: usize) -> Vec<RetrievalResult> {
        let tags: Vec<String> = tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        if tags.is_empty() {
            return Vec::new();
        }

        let mut results: Vec<RetrievalResult> = self
            .corpus
            .documents()
            .iter()
            .flat_map(|doc| doc.chunks.iter().enumerate().map(move |(i, c)| (doc, i, c)))
            .filter_map(|(doc, index, chunk)| {
                let text = chunk.text.to_lowercase();
                let matched: Vec<String> = tags
                    .iter()
                    .filter(|tag| {
                        text.contains(tag.as_str())
                            || chunk
                                .metadata
                                .values()
                                .chain(doc.metadata.values())
                                .any(|v| v.to_lowercase().contains(tag.as_str()))
                    })
                    .cloned()
                    .collect();
                if matched.is_empty() {
                    return None;
                }
                let score = matched.len() as f32 / tags.len() as f32;
                let mut result = result_from_chunk(doc, chunk, index, score);
                result.relevance.keyword_score = score;
                result.relevance.matched_terms = matched;
                Some(result)
            })
            .collect();
        sort_by_score(&mut results);
        results.truncate(max_results);
        results
    }

    async fn timed<F>(&self, operation: &str, fut: F) -> Result<Vec<RetrievalResult>>
    where
        F: std::future::Future<Output = Result<Vec<RetrievalResult>>> + Send,
    {
        let started = Instant::now();
        let outcome = fut.await;
        self.stats.record_query(operation, started.elapsed());
        if let Err(err) = &outcome {
            log::warn!("{operation} failed: {err}");
        }
        outcome
    }
}

fn result_from_chunk(doc: &Document, chunk: &Chunk, index: usize, score: f32) -> RetrievalResult {
    RetrievalResult {
        document_id: doc.id.clone(),
        chunk_id: chunk.id.clone(),
        file_path: doc.file_path.clone(),
        content: chunk.text.clone(),
        score,
        language: doc.language.clone(),
        category: doc.category.as_str().to_string(),
        context: None,
        metadata: chunk_metadata(doc, chunk, index),
        relevance: RelevanceInfo {
            relevance_score: score,
            ..RelevanceInfo::default()
        },
    }
}

#[async_trait]
impl DocumentRetriever for HybridRetriever {
    async fn retrieve_relevant_documents(
        &self,
        context: &RetrievalContext,
    ) -> Result<Vec<RetrievalResult>> {
        self.timed("retrieve_relevant_documents", self.run_pipeline(context))
            .await
    }

    async fn retrieve_by_query(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let context =
            RetrievalContext::new(query, self.config.default_query_type).max_results(max_results);
        self.timed("retrieve_by_query", self.run_pipeline(&context))
            .await
    }

    async fn retrieve_by_tags(
        &self,
        tags: &[String],
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        self.timed("retrieve_by_tags", async {
            Ok(self.tag_search(tags, max_results))
        })
        .await
    }

    async fn retrieve_code_examples(
        &self,
        query: &str,
        language: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let context = RetrievalContext::new(query, QueryType::Hybrid)
            .max_results(max_results)
            .filter("language", language)
            .filter("category", DocumentCategory::Code.as_str());
        let boost = self.config.code_example_boost;
        self.timed("retrieve_code_examples", async {
            let mut results = self.run_pipeline(&context).await?;
            for result in &mut results {
                if structural_match(&result.language, &result.content).is_definition() {
                    result.score *= boost;
                    result
                        .relevance
                        .boosts_applied
                        .insert("definition".to_string(), boost);
                }
            }
            sort_by_score(&mut results);
            Ok(results)
        })
        .await
    }

    async fn retrieve_documentation(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let context = RetrievalContext::new(query, QueryType::Hybrid)
            .max_results(max_results)
            .filter("category", DocumentCategory::Docs.as_str());
        self.timed("retrieve_documentation", self.run_pipeline(&context))
            .await
    }

    async fn retrieve_config_files(
        &self,
        query: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let context = RetrievalContext::new(query, QueryType::Keyword)
            .max_results(max_results)
            .filter("category", DocumentCategory::Config.as_str());
        self.timed("retrieve_config_files", self.run_pipeline(&context))
            .await
    }

    async fn retrieve_with_context(
        &self,
        query: &str,
        context_results: &[RetrievalResult],
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        let terms = extract_key_terms(
            context_results.iter().map(|r| r.content.as_str()),
            CONTEXT_TERM_LIMIT,
        );
        let context =
            RetrievalContext::new(query, self.config.default_query_type).max_results(max_results);
        self.timed("retrieve_with_context", async {
            let mut results = self.run_pipeline(&context).await?;
            if terms.is_empty() {
                return Ok(results);
            }
            for result in &mut results {
                let matched = keyword_match(&terms, &result.content);
                if matched.is_match() {
                    let factor = (1.0 + CONTEXT_TERM_BOOST * matched.matched_terms.len() as f32)
                        .min(MAX_CONTEXT_BOOST);
                    result.score *= factor;
                    result
                        .relevance
                        .boosts_applied
                        .insert("context_terms".to_string(), factor);
                    result
                        .relevance
                        .matched_concepts
                        .extend(matched.matched_terms);
                }
            }
            sort_by_score(&mut results);
            Ok(results)
        })
        .await
    }

    async fn retrieve_related_chunks(
        &self,
        chunk_id: &str,
        max_results: usize,
    ) -> Result<Vec<RetrievalResult>> {
        self.timed("retrieve_related_chunks", async {
            let (_, chunk) = self
                .corpus
                .find_chunk(chunk_id)
                .ok_or_else(|| SearchError::ChunkNotFound(chunk_id.to_string()))?;
            let context = RetrievalContext::new(chunk.text.clone(), QueryType::Semantic)
                .max_results(max_results.saturating_add(1))
                .min_score(self.config.related_min_score);
            let mut results = self.run_pipeline(&context).await?;
            results.retain(|r| r.chunk_id != chunk_id);
            results.truncate(max_results);
            Ok(results)
        })
        .await
    }

    fn get_retrieval_stats(&self) -> RetrievalStats {
        self.stats.snapshot()
    }

    fn clear_cache(&self) {
        self.cache.clear();
        log::debug!("Retrieval cache cleared");
    }
}
