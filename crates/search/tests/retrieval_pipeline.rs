use chrono::{Duration, Utc};
use codedocs_corpus::{Chunk, Corpus, Document, DocumentCategory};
use codedocs_search::{
    DocumentRetriever, HybridRetriever, QueryType, RetrievalContext, RetrieverConfig, SearchError,
};
use codedocs_vector_store::{
    EmbeddingConfig, EmbeddingService, HeedVectorStore, StoreConfig, StubEmbedder, VectorStore,
    VectorStoreError,
};
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tempfile::TempDir;

const DIM: usize = 32;

const FUNC_MAIN: &str = "func main() { fmt.Println(\"Hello\") }";

fn go_main() -> Document {
    Document::new("main", "cmd/app/main.go", "Go", DocumentCategory::Code)
        .with_chunk(Chunk::new("main-0", "package main", 0))
        .with_chunk(Chunk::new("main-1", FUNC_MAIN, 14))
}

fn python_tool() -> Document {
    Document::new("tool", "scripts/tool.py", "Python", DocumentCategory::Code)
        .with_chunk(Chunk::new("tool-0", "def main():\n    print('main entry')", 0))
}

fn readme() -> Document {
    Document::new("readme", "README.md", "Markdown", DocumentCategory::Docs)
        .with_chunk(Chunk::new("readme-0", "Run main to start the service", 0))
        .with_chunk(Chunk::new("readme-1", "Configuration lives in app.toml", 30))
}

fn app_config() -> Document {
    Document::new("config", "app.toml", "TOML", DocumentCategory::Config)
        .with_chunk(Chunk::new("config-0", "[server]\nport = 8080 # main listener", 0))
}

struct Fixture {
    _dir: TempDir,
    stub: Arc<StubEmbedder>,
    store: Arc<dyn VectorStore>,
    retriever: HybridRetriever,
}

async fn fixture(documents: Vec<Document>, config: RetrieverConfig) -> Fixture {
    let dir = TempDir::new().expect("tempdir");
    let store: Arc<dyn VectorStore> = Arc::new(
        HeedVectorStore::open(&StoreConfig::at(dir.path().join("vectors"), DIM)).expect("open"),
    );
    let stub = Arc::new(StubEmbedder::new(DIM));
    let service = EmbeddingService::new(
        stub.clone(),
        Arc::clone(&store),
        EmbeddingConfig {
            model: "stub".to_string(),
            dimensions: DIM,
            ..EmbeddingConfig::default()
        },
    )
    .expect("service");
    service
        .process_documents(&documents)
        .await
        .expect("ingest corpus");

    let retriever = HybridRetriever::with_default_cache(
        Arc::clone(&store),
        stub.clone(),
        Corpus::new(documents),
        config,
    )
    .expect("retriever");
    Fixture {
        _dir: dir,
        stub,
        store,
        retriever,
    }
}

fn chunk_ids(results: &[codedocs_search::RetrievalResult]) -> Vec<&str> {
    results.iter().map(|r| r.chunk_id.as_str()).collect()
}

#[tokio::test]
async fn keyword_main_ranks_function_at_least_as_high_as_package() {
    let fx = fixture(vec![go_main()], RetrieverConfig::default()).await;

    let results = fx
        .retriever
        .retrieve_relevant_documents(&RetrievalContext::new("main", QueryType::Keyword))
        .await
        .expect("retrieve");

    assert_eq!(results.len(), 2);
    let score = |id: &str| results.iter().find(|r| r.chunk_id == id).map(|r| r.score);
    assert!(score("main-1") >= score("main-0"));
    assert_eq!(results[0].chunk_id, "main-1");
    assert_eq!(results[0].relevance.matched_terms, vec!["main"]);
}

#[tokio::test]
async fn keyword_without_reranking_keeps_raw_fraction() {
    let config = RetrieverConfig {
        enable_reranking: false,
        ..RetrieverConfig::default()
    };
    let fx = fixture(vec![go_main()], config).await;

    let results = fx
        .retriever
        .retrieve_relevant_documents(
            &RetrievalContext::new("main println", QueryType::Keyword).min_score(0.6),
        )
        .await
        .expect("retrieve");

    assert_eq!(chunk_ids(&results), vec!["main-1"]);
    assert!((results[0].score - 1.0).abs() < 1e-6);
}

#[tokio::test]
async fn min_score_holds_after_reranking() {
    let fx = fixture(vec![go_main()], RetrieverConfig::default()).await;

    // "package main" matches half the terms (0.5) but reranks to 0.46
    let results = fx
        .retriever
        .retrieve_relevant_documents(
            &RetrievalContext::new("main println", QueryType::Keyword).min_score(0.5),
        )
        .await
        .expect("retrieve");

    assert_eq!(chunk_ids(&results), vec!["main-1"]);
    assert!(results.iter().all(|r| r.score >= 0.5));
}

#[tokio::test]
async fn semantic_search_finds_identical_text() {
    let fx = fixture(vec![go_main(), python_tool()], RetrieverConfig::default()).await;

    let results = fx
        .retriever
        .retrieve_relevant_documents(
            &RetrievalContext::new(FUNC_MAIN, QueryType::Semantic).min_score(0.5),
        )
        .await
        .expect("retrieve");

    assert_eq!(results[0].chunk_id, "main-1");
    assert_eq!(results[0].content, FUNC_MAIN);
    assert_eq!(results[0].language, "Go");
    assert_eq!(results[0].category, "code");
    assert!(results[0].relevance.semantic_score > 0.99);
}

#[tokio::test]
async fn hybrid_language_filter_returns_only_that_language() {
    let fx = fixture(vec![go_main(), python_tool()], RetrieverConfig::default()).await;

    let results = fx
        .retriever
        .retrieve_relevant_documents(
            &RetrievalContext::new("main", QueryType::Hybrid).filter("language", "Python"),
        )
        .await
        .expect("retrieve");

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.language == "Python"));
}

#[tokio::test]
async fn differently_filtered_queries_do_not_share_cache_entries() {
    let fx = fixture(vec![go_main(), python_tool()], RetrieverConfig::default()).await;
    let base = RetrievalContext::new("main", QueryType::Keyword);

    let go = fx
        .retriever
        .retrieve_relevant_documents(&base.clone().filter("language", "Go"))
        .await
        .expect("go");
    let python = fx
        .retriever
        .retrieve_relevant_documents(&base.filter("language", "Python"))
        .await
        .expect("python");

    assert!(go.iter().all(|r| r.language == "Go"));
    assert_eq!(chunk_ids(&python), vec!["tool-0"]);
    assert_eq!(fx.retriever.get_retrieval_stats().cache_hits, 0);
}

#[tokio::test]
async fn repeated_query_is_served_from_cache_until_cleared() {
    let fx = fixture(vec![go_main()], RetrieverConfig::default()).await;
    let context = RetrievalContext::new("main", QueryType::Semantic);

    let first = fx.retriever.retrieve_relevant_documents(&context).await.expect("first");
    let calls = fx.stub.single_calls();
    let second = fx.retriever.retrieve_relevant_documents(&context).await.expect("second");

    assert_eq!(first, second);
    assert_eq!(fx.stub.single_calls(), calls, "cache hit must not embed again");

    fx.retriever.clear_cache();
    fx.retriever.retrieve_relevant_documents(&context).await.expect("third");
    assert_eq!(fx.stub.single_calls(), calls + 1);

    let stats = fx.retriever.get_retrieval_stats();
    assert_eq!(stats.total_queries, 3);
    assert_eq!((stats.cache_hits, stats.cache_misses), (1, 2));
    assert!(stats
        .operation_latency_ms
        .contains_key("retrieve_relevant_documents"));
}

#[tokio::test]
async fn generator_failure_surfaces_as_store_error() {
    let fx = fixture(vec![go_main()], RetrieverConfig::default()).await;
    fx.stub.fail_on("explode");

    let err = fx
        .retriever
        .retrieve_relevant_documents(&RetrievalContext::new("explode", QueryType::Semantic))
        .await
        .expect_err("generation must fail");

    assert!(matches!(
        err,
        SearchError::Store(VectorStoreError::Generation(_))
    ));
}

#[tokio::test]
async fn structural_strategy_only_sees_code() {
    let fx = fixture(vec![go_main(), readme()], RetrieverConfig::default()).await;

    let results = fx
        .retriever
        .retrieve_relevant_documents(&RetrievalContext::new("main", QueryType::Structural))
        .await
        .expect("retrieve");

    assert!(!results.is_empty());
    assert!(results.iter().all(|r| r.category == "code"));
    assert_eq!(results[0].chunk_id, "main-1");
}

#[tokio::test]
async fn diversity_caps_results_per_file() {
    let mut doc = Document::new("big", "big.go", "Go", DocumentCategory::Code);
    for i in 0..6 {
        doc = doc.with_chunk(Chunk::new(format!("big-{i}"), format!("handler {i}"), i * 10));
    }
    let small = Document::new("small", "small.go", "Go", DocumentCategory::Code)
        .with_chunk(Chunk::new("small-0", "handler small", 0));
    let config = RetrieverConfig {
        max_similar_results: 2,
        ..RetrieverConfig::default()
    };
    let fx = fixture(vec![doc, small], config).await;

    let results = fx
        .retriever
        .retrieve_relevant_documents(
            &RetrievalContext::new("handler", QueryType::Keyword).max_results(10),
        )
        .await
        .expect("retrieve");

    assert_eq!(results.iter().filter(|r| r.file_path == "big.go").count(), 2);
    assert_eq!(results.iter().filter(|r| r.file_path == "small.go").count(), 1);
}

#[tokio::test]
async fn context_enrichment_attaches_neighbours() {
    let config = RetrieverConfig {
        enable_context: true,
        ..RetrieverConfig::default()
    };
    let fx = fixture(vec![go_main()], config).await;

    let results = fx
        .retriever
        .retrieve_relevant_documents(&RetrievalContext::new("println", QueryType::Keyword))
        .await
        .expect("retrieve");

    let context = results[0].context.clone().expect("context attached");
    assert_eq!(context.previous.as_deref(), Some("package main"));
    assert_eq!(context.next, None);
}

#[tokio::test]
async fn time_window_drops_stale_documents() {
    let now = Utc::now();
    let stale = go_main().with_modified_at(now - Duration::days(90));
    let fresh = python_tool().with_modified_at(now - Duration::hours(2));
    let fx = fixture(vec![stale, fresh], RetrieverConfig::default()).await;

    let results = fx
        .retriever
        .retrieve_relevant_documents(
            &RetrievalContext::new("main", QueryType::Keyword)
                .time_range(now - Duration::days(7), now),
        )
        .await
        .expect("retrieve");

    assert_eq!(chunk_ids(&results), vec!["tool-0"]);
}

#[tokio::test]
async fn boost_factors_lift_matching_language() {
    let config = RetrieverConfig {
        enable_reranking: false,
        ..RetrieverConfig::default()
    };
    let fx = fixture(vec![go_main(), python_tool()], config).await;

    let results = fx
        .retriever
        .retrieve_relevant_documents(
            &RetrievalContext::new("main", QueryType::Keyword).boost("python", 3.0),
        )
        .await
        .expect("retrieve");

    assert_eq!(results[0].chunk_id, "tool-0");
    assert_eq!(results[0].relevance.boosts_applied.get("python"), Some(&3.0));
}

#[tokio::test]
async fn category_helpers_filter_by_category() {
    let fx = fixture(
        vec![go_main(), readme(), app_config()],
        RetrieverConfig::default(),
    )
    .await;

    let docs = fx.retriever.retrieve_documentation("main", 5).await.expect("docs");
    assert!(!docs.is_empty());
    assert!(docs.iter().all(|r| r.category == "docs"));

    let configs = fx.retriever.retrieve_config_files("main", 5).await.expect("configs");
    assert_eq!(chunk_ids(&configs), vec!["config-0"]);

    let examples = fx
        .retriever
        .retrieve_code_examples("main", "Go", 5)
        .await
        .expect("examples");
    assert!(examples.iter().all(|r| r.language == "Go" && r.category == "code"));
    let func = examples.iter().find(|r| r.chunk_id == "main-1").expect("func main");
    assert_eq!(func.relevance.boosts_applied.get("definition"), Some(&1.2));
}

#[tokio::test]
async fn tags_match_text_and_metadata_without_caching() {
    let tagged = Document::new("svc", "svc.go", "Go", DocumentCategory::Code).with_chunk(
        Chunk::new("svc-0", "func Serve() {}", 0).with_metadata("owner", "platform-team"),
    );
    let fx = fixture(vec![go_main(), tagged], RetrieverConfig::default()).await;

    let results = fx
        .retriever
        .retrieve_by_tags(&["serve".to_string(), "platform".to_string()], 5)
        .await
        .expect("tags");

    assert_eq!(chunk_ids(&results), vec!["svc-0"]);
    assert!((results[0].score - 1.0).abs() < 1e-6);
    let stats = fx.retriever.get_retrieval_stats();
    assert_eq!(stats.cache_hits + stats.cache_misses, 0);
}

#[tokio::test]
async fn related_chunks_exclude_the_source() {
    let copy = Document::new("copy", "cmd/other/main.go", "Go", DocumentCategory::Code)
        .with_chunk(Chunk::new("copy-0", FUNC_MAIN, 0));
    let fx = fixture(vec![go_main(), copy], RetrieverConfig::default()).await;

    let related = fx
        .retriever
        .retrieve_related_chunks("main-1", 5)
        .await
        .expect("related");

    assert!(related.iter().all(|r| r.chunk_id != "main-1"));
    assert!(related.iter().any(|r| r.chunk_id == "copy-0"));
    let floor = RetrieverConfig::default().related_min_score;
    assert!(related.iter().all(|r| r.score >= floor));

    let missing = fx.retriever.retrieve_related_chunks("nope", 5).await;
    assert!(matches!(missing, Err(SearchError::ChunkNotFound(_))));
}

#[tokio::test]
async fn context_terms_boost_related_results() {
    let config = RetrieverConfig {
        enable_reranking: false,
        default_query_type: QueryType::Keyword,
        ..RetrieverConfig::default()
    };
    let fx = fixture(vec![go_main(), readme()], config).await;

    let seed = fx
        .retriever
        .retrieve_by_query("service", 5)
        .await
        .expect("seed");
    let results = fx
        .retriever
        .retrieve_with_context("main", &seed, 5)
        .await
        .expect("with context");

    assert_eq!(results[0].chunk_id, "readme-0");
    assert!(results[0]
        .relevance
        .boosts_applied
        .contains_key("context_terms"));
    assert_eq!(fx.store.list().expect("list").len(), 2);
}

#[tokio::test]
async fn empty_query_is_an_empty_success() {
    let fx = fixture(vec![go_main()], RetrieverConfig::default()).await;
    let results = fx
        .retriever
        .retrieve_relevant_documents(&RetrievalContext::new("   ", QueryType::Hybrid))
        .await
        .expect("retrieve");
    assert!(results.is_empty());
}
