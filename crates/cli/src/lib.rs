mod config;

pub use config::{AppConfig, IndexerSection};

use anyhow::{Context as AnyhowContext, Result};
use clap::{Parser, Subcommand};
use codedocs_corpus::Corpus;
use codedocs_indexer::{CorpusIndexer, WorkerPool};
use codedocs_search::{DocumentRetriever, HybridRetriever, QueryType, RetrievalContext};
use codedocs_vector_store::{EmbeddingService, HeedVectorStore, StubEmbedder, VectorStore};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

fn print_stdout(text: &str) -> Result<()> {
    use std::io::Write;

    let mut stdout = io::stdout().lock();
    if let Err(err) = stdout
        .write_all(text.as_bytes())
        .and_then(|_| stdout.write_all(b"\n"))
        .and_then(|_| stdout.flush())
    {
        if err.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(err.into());
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    print_stdout(&serde_json::to_string_pretty(value)?)
}

#[derive(Parser)]
#[command(name = "codedocs")]
#[command(about = "Embedding store and retrieval over chunked documentation", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to codedocs.toml
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Vector store directory (overrides [store].path)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Quiet mode: log only warnings/errors (stdout is reserved for JSON)
    #[arg(long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Embed every chunk of a corpus file and store it
    Ingest {
        /// Corpus JSON file
        corpus: PathBuf,

        /// Concurrent embedding workers (overrides [indexer].workers)
        #[arg(long)]
        workers: Option<usize>,
    },

    /// Run a retrieval query
    Search {
        query: String,

        /// Corpus JSON the store was built from
        #[arg(long)]
        corpus: PathBuf,

        /// semantic, keyword, hybrid or structural
        #[arg(short, long)]
        strategy: Option<String>,

        #[arg(short, long, default_value_t = 10)]
        limit: usize,

        #[arg(long, default_value_t = 0.0)]
        min_score: f32,

        /// Filter as key=value (repeatable)
        #[arg(long = "filter", value_name = "KEY=VALUE")]
        filters: Vec<String>,

        /// Score multiplier as key=factor (repeatable)
        #[arg(long = "boost", value_name = "KEY=FACTOR")]
        boosts: Vec<String>,
    },

    /// Chunks similar to an indexed chunk
    Related {
        chunk_id: String,

        #[arg(long)]
        corpus: PathBuf,

        #[arg(short, long, default_value_t = 5)]
        limit: usize,
    },

    /// List stored document ids
    List,

    /// Store statistics
    Stats,

    /// Remove a document and its chunks
    Delete { document_id: String },

    /// Repair statistics and compact bookkeeping
    Optimize,
}

pub async fn main_entry() -> Result<()> {
    let cli = Cli::parse();

    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if cli.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if cli.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();

    let mut config = AppConfig::load(cli.config.as_deref())?;
    if let Some(db) = cli.db {
        config.store.path = db;
    }

    let store = Arc::new(
        HeedVectorStore::open(&config.store)
            .with_context(|| format!("Failed to open store at {}", config.store.path.display()))?,
    );

    let outcome = run_command(cli.command, &config, Arc::clone(&store)).await;
    if let Err(err) = store.close() {
        log::warn!("Failed to close store: {err}");
    }
    outcome
}

async fn run_command(command: Commands, config: &AppConfig, store: Arc<HeedVectorStore>) -> Result<()> {
    match command {
        Commands::Ingest { corpus, workers } => {
            run_ingest(config, store, &corpus, workers.unwrap_or(config.indexer.workers)).await
        }
        Commands::Search {
            query,
            corpus,
            strategy,
            limit,
            min_score,
            filters,
            boosts,
        } => {
            let query_type = match strategy {
                Some(raw) => raw.parse::<QueryType>().map_err(anyhow::Error::msg)?,
                None => config.retriever.default_query_type,
            };
            let mut context = RetrievalContext::new(query, query_type)
                .max_results(limit)
                .min_score(min_score);
            for raw in &filters {
                let (key, value) = parse_pair(raw)?;
                context = context.filter(key, value);
            }
            for raw in &boosts {
                let (key, factor) = parse_pair(raw)?;
                let factor: f32 = factor
                    .parse()
                    .with_context(|| format!("Invalid boost factor in '{raw}'"))?;
                context = context.boost(key, factor);
            }

            let retriever = open_retriever(config, store, &corpus).await?;
            let results = retriever.retrieve_relevant_documents(&context).await?;
            log::info!("{} results for '{}' ({})", results.len(), context.query, query_type);
            print_json(&results)
        }
        Commands::Related {
            chunk_id,
            corpus,
            limit,
        } => {
            let retriever = open_retriever(config, store, &corpus).await?;
            let results = retriever.retrieve_related_chunks(&chunk_id, limit).await?;
            print_json(&results)
        }
        Commands::List => print_json(&store.list()?),
        Commands::Stats => print_json(&store.get_stats()?),
        Commands::Delete { document_id } => {
            store.delete(&document_id)?;
            log::info!("Deleted {document_id}");
            print_json(&serde_json::json!({ "deleted": document_id }))
        }
        Commands::Optimize => {
            store.optimize()?;
            print_json(&store.get_stats()?)
        }
    }
}

async fn run_ingest(
    config: &AppConfig,
    store: Arc<HeedVectorStore>,
    corpus_path: &Path,
    workers: usize,
) -> Result<()> {
    let corpus = Corpus::load(corpus_path)
        .await
        .with_context(|| format!("Failed to load corpus {}", corpus_path.display()))?;
    let generator = Arc::new(StubEmbedder::from_config(&config.embedding));
    let service = EmbeddingService::new(generator, store, config.embedding.clone())?;

    let stats = CorpusIndexer::new(Arc::new(service), WorkerPool::new(workers))
        .index(&corpus)
        .await?;
    print_json(&stats)
}

async fn open_retriever(
    config: &AppConfig,
    store: Arc<HeedVectorStore>,
    corpus_path: &Path,
) -> Result<HybridRetriever> {
    let corpus = Corpus::load(corpus_path)
        .await
        .with_context(|| format!("Failed to load corpus {}", corpus_path.display()))?;
    let generator = Arc::new(StubEmbedder::from_config(&config.embedding));
    let store: Arc<dyn VectorStore> = store;
    Ok(HybridRetriever::with_default_cache(
        store,
        generator,
        corpus,
        config.retriever.clone(),
    )?)
}

fn parse_pair(raw: &str) -> Result<(&str, &str)> {
    let (key, value) = raw
        .split_once('=')
        .with_context(|| format!("Expected KEY=VALUE, got '{raw}'"))?;
    anyhow::ensure!(!key.trim().is_empty(), "Empty key in '{raw}'");
    Ok((key.trim(), value.trim()))
}
