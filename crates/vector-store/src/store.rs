use crate::config::StoreConfig;
use crate::error::{Result, VectorStoreError};
use crate::similarity::SimilarityCalculator;
use crate::types::{
    Contribution, DatabaseStats, DocumentEmbedding, SearchOptions, SearchResult, StoredChunk,
};
use chrono::Utc;
use heed3::types::Str;
use heed3::{Database, Env, EnvOpenOptions, RwTxn};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::RwLock;

// bucket names
const DB_DOCUMENTS: &str = "documents"; // document_id -> DocumentEmbedding
const DB_EMBEDDINGS: &str = "embeddings"; // chunk_id -> StoredChunk
const DB_METADATA: &str = "metadata"; // reserved, holds the schema version
const DB_STATS: &str = "stats"; // STATS_KEY -> DatabaseStats

const STATS_KEY: &str = "stats";
const SCHEMA_VERSION_KEY: &str = "schema_version";

pub const STORE_SCHEMA_VERSION: u32 = 1;

/// Persistent storage of document embeddings with similarity search.
///
/// Writes of one call (`store`, `store_batch`, `delete`) are atomic together with
/// the stats update; readers see consistent snapshots.
pub trait VectorStore: Send + Sync {
    /// Upsert one document and all its chunk vectors
    fn store(&self, embedding: &DocumentEmbedding) -> Result<()>;

    /// Upsert many documents; nothing is written if any of them fails
    fn store_batch(&self, embeddings: &[DocumentEmbedding]) -> Result<()>;

    fn get(&self, document_id: &str) -> Result<DocumentEmbedding>;

    /// Remove a document and every chunk vector it owns
    fn delete(&self, document_id: &str) -> Result<()>;

    /// All stored document ids, unordered
    fn list(&self) -> Result<Vec<String>>;

    /// Linear scan over every stored chunk vector
    fn search(&self, query: &[f32], options: &SearchOptions) -> Result<Vec<SearchResult>>;

    fn optimize(&self) -> Result<()>;

    fn get_stats(&self) -> Result<DatabaseStats>;

    /// Release the storage handles; later calls fail with `StorageIo`
    fn close(&self) -> Result<()>;
}

#[derive(Clone, Copy)]
struct Buckets {
    documents: Database<Str, Str>,
    embeddings: Database<Str, Str>,
    metadata: Database<Str, Str>,
    stats: Database<Str, Str>,
}

/// [`VectorStore`] backed by an LMDB environment with four named databases
pub struct HeedVectorStore {
    env: RwLock<Option<Env>>,
    buckets: Buckets,
    calculator: SimilarityCalculator,
    dimension: usize,
    path: PathBuf,
}

impl HeedVectorStore {
    /// Open (or create) the store described by `config`.
    ///
    /// Opening happens on a helper thread so a stuck environment lock surfaces as
    /// a `StorageIo` error after `open_timeout_ms` instead of hanging the caller.
    pub fn open(config: &StoreConfig) -> Result<Self> {
        config.validate()?;
        std::fs::create_dir_all(&config.path)?;
        log::info!("Opening vector store at {}", config.path.display());

        let (tx, rx) = mpsc::channel();
        let path = config.path.clone();
        let map_size = config.map_size_mb * 1024 * 1024;
        let max_readers = config.max_readers;
        std::thread::Builder::new()
            .name("codedocs-store-open".to_string())
            .spawn(move || {
                let opened = open_env(&path, map_size, max_readers);
                if let Err(mpsc::SendError(Ok((env, _)))) = tx.send(opened) {
                    // the caller already timed out
                    log::warn!(
                        "Store at {} opened after the caller gave up; closing it",
                        path.display()
                    );
                    env.prepare_for_closing().wait();
                }
            })?;

        let (env, buckets) = match rx.recv_timeout(config.open_timeout()) {
            Ok(opened) => opened?,
            Err(RecvTimeoutError::Timeout) => {
                // a late handle now fails to send and the helper closes it
                drop(rx);
                return Err(VectorStoreError::StorageIo(format!(
                    "timed out after {}ms opening {}",
                    config.open_timeout_ms,
                    config.path.display()
                )))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(VectorStoreError::StorageIo(format!(
                    "open of {} aborted unexpectedly",
                    config.path.display()
                )))
            }
        };

        Ok(Self {
            env: RwLock::new(Some(env)),
            buckets,
            calculator: SimilarityCalculator::new(config.metric),
            dimension: config.dimension,
            path: config.path.clone(),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn dimension(&self) -> usize {
        self.dimension
    }

    #[must_use]
    pub const fn calculator(&self) -> SimilarityCalculator {
        self.calculator
    }

    fn with_env<T>(&self, f: impl FnOnce(&Env) -> Result<T>) -> Result<T> {
        let guard = self
            .env
            .read()
            .map_err(|_| VectorStoreError::StorageIo("store lock poisoned".to_string()))?;
        let env = guard.as_ref().ok_or_else(|| {
            VectorStoreError::StorageIo(format!("store at {} is closed", self.path.display()))
        })?;
        f(env)
    }

    fn validate(&self, embedding: &DocumentEmbedding) -> Result<()> {
        if embedding.chunk_count != embedding.embeddings.len() {
            return Err(VectorStoreError::ChunkCountMismatch {
                id: embedding.document_id.clone(),
                chunk_count: embedding.chunk_count,
                embeddings: embedding.embeddings.len(),
            });
        }
        let mut seen = HashSet::with_capacity(embedding.embeddings.len());
        for vector in &embedding.embeddings {
            if !seen.insert(vector.id.as_str()) {
                return Err(VectorStoreError::ChunkConflict {
                    chunk_id: vector.id.clone(),
                    document_id: embedding.document_id.clone(),
                    owner: embedding.document_id.clone(),
                });
            }
            if vector.dimension != vector.vector.len() || vector.vector.len() != self.dimension {
                return Err(VectorStoreError::InvalidVector {
                    id: vector.id.clone(),
                    expected: self.dimension,
                    actual: vector.vector.len(),
                });
            }
        }
        Ok(())
    }

    fn write_documents(&self, env: &Env, embeddings: &[DocumentEmbedding]) -> Result<()> {
        for embedding in embeddings {
            self.validate(embedding)?;
        }

        let mut wtxn = env.write_txn()?;
        let mut stats = match self.buckets.stats.get(&wtxn, STATS_KEY)? {
            Some(json) => serde_json::from_str::<DatabaseStats>(json)?,
            None => DatabaseStats::new(),
        };
        for embedding in embeddings {
            self.put_document(&mut wtxn, &mut stats, embedding)?;
        }
        let stats_json = serde_json::to_string(&stats)?;
        self.buckets.stats.put(&mut wtxn, STATS_KEY, &stats_json)?;
        wtxn.commit()?;
        Ok(())
    }

    fn put_document(
        &self,
        wtxn: &mut RwTxn<'_>,
        stats: &mut DatabaseStats,
        embedding: &DocumentEmbedding,
    ) -> Result<()> {
        for vector in &embedding.embeddings {
            if let Some(owner) = self.chunk_owner(wtxn, &vector.id)? {
                if owner != embedding.document_id {
                    return Err(VectorStoreError::ChunkConflict {
                        chunk_id: vector.id.clone(),
                        document_id: embedding.document_id.clone(),
                        owner,
                    });
                }
            }
        }

        if let Some((prior, prior_bytes)) = self.load_with_size(wtxn, &embedding.document_id)? {
            // chunk ids dropped by the new version would otherwise stay searchable
            let keep: HashSet<&str> = embedding.embeddings.iter().map(|e| e.id.as_str()).collect();
            for old in &prior.embeddings {
                if !keep.contains(old.id.as_str()) {
                    self.delete_owned_chunk(wtxn, &old.id, &embedding.document_id)?;
                }
            }
            stats.remove_document(&Contribution::of(&prior, prior_bytes));
            log::debug!("Overwriting document {}", embedding.document_id);
        }

        let doc_json = serde_json::to_string(embedding)?;
        let mut bytes = doc_json.len() as u64;
        for vector in &embedding.embeddings {
            let record = StoredChunk {
                document_id: embedding.document_id.clone(),
                chunk_id: vector.id.clone(),
                file_path: embedding.file_path.clone(),
                content: vector.content.clone(),
                vector: vector.vector.clone(),
                metadata: vector.metadata.clone(),
            };
            let record_json = serde_json::to_string(&record)?;
            bytes += record_json.len() as u64;
            self.buckets
                .embeddings
                .put(wtxn, &vector.id, &record_json)?;
        }
        self.buckets
            .documents
            .put(wtxn, &embedding.document_id, &doc_json)?;
        stats.add_document(&Contribution::of(embedding, bytes));
        Ok(())
    }

    /// Stored document plus the bytes its records occupy
    fn load_with_size(
        &self,
        wtxn: &RwTxn<'_>,
        document_id: &str,
    ) -> Result<Option<(DocumentEmbedding, u64)>> {
        let (document, doc_bytes) = match self.buckets.documents.get(wtxn, document_id)? {
            Some(json) => (
                serde_json::from_str::<DocumentEmbedding>(json)?,
                json.len() as u64,
            ),
            None => return Ok(None),
        };
        let mut bytes = doc_bytes;
        for vector in &document.embeddings {
            if let Some(record_bytes) = self.owned_chunk_bytes(wtxn, &vector.id, document_id)? {
                bytes += record_bytes;
            }
        }
        Ok(Some((document, bytes)))
    }

    /// Owning document of a stored chunk record; unreadable records have no owner
    fn chunk_owner(&self, wtxn: &RwTxn<'_>, chunk_id: &str) -> Result<Option<String>> {
        let Some(json) = self.buckets.embeddings.get(wtxn, chunk_id)? else {
            return Ok(None);
        };
        match serde_json::from_str::<StoredChunk>(json) {
            Ok(record) => Ok(Some(record.document_id)),
            Err(err) => {
                log::warn!("Unreadable embedding record {chunk_id}: {err}");
                Ok(None)
            }
        }
    }

    /// Serialized size of `chunk_id` when its record belongs to `document_id`
    fn owned_chunk_bytes(
        &self,
        wtxn: &RwTxn<'_>,
        chunk_id: &str,
        document_id: &str,
    ) -> Result<Option<u64>> {
        let Some(json) = self.buckets.embeddings.get(wtxn, chunk_id)? else {
            return Ok(None);
        };
        let owned = serde_json::from_str::<StoredChunk>(json)
            .is_ok_and(|record| record.document_id == document_id);
        Ok(owned.then_some(json.len() as u64))
    }

    fn delete_owned_chunk(
        &self,
        wtxn: &mut RwTxn<'_>,
        chunk_id: &str,
        document_id: &str,
    ) -> Result<()> {
        if self.owned_chunk_bytes(wtxn, chunk_id, document_id)?.is_some() {
            self.buckets.embeddings.delete(wtxn, chunk_id)?;
        } else {
            log::warn!("Chunk {chunk_id} is not owned by {document_id}; left in place");
        }
        Ok(())
    }

    fn matches_filters(record: &StoredChunk, options: &SearchOptions) -> bool {
        options.filter_by.iter().all(|(key, expected)| {
            let actual = record.metadata.get(key).map(String::as_str).or(match key.as_str() {
                "document_id" => Some(record.document_id.as_str()),
                "file_path" => Some(record.file_path.as_str()),
                "chunk_id" => Some(record.chunk_id.as_str()),
                _ => None,
            });
            actual == Some(expected.as_str())
        })
    }
}

fn open_env(path: &Path, map_size: usize, max_readers: u32) -> Result<(Env, Buckets)> {
    // SAFETY: the environment directory is owned by this store and is never opened
    // through a second handle of this process while the store is alive.
    let env = unsafe {
        EnvOpenOptions::new()
            .map_size(map_size)
            .max_dbs(4)
            .max_readers(max_readers)
            .open(path)?
    };

    let mut wtxn = env.write_txn()?;
    let documents = env
        .database_options()
        .types::<Str, Str>()
        .name(DB_DOCUMENTS)
        .create(&mut wtxn)?;
    let embeddings = env
        .database_options()
        .types::<Str, Str>()
        .name(DB_EMBEDDINGS)
        .create(&mut wtxn)?;
    let metadata = env
        .database_options()
        .types::<Str, Str>()
        .name(DB_METADATA)
        .create(&mut wtxn)?;
    let stats = env
        .database_options()
        .types::<Str, Str>()
        .name(DB_STATS)
        .create(&mut wtxn)?;

    let stored_version = metadata
        .get(&wtxn, SCHEMA_VERSION_KEY)?
        .map(|raw| raw.parse::<u32>());
    match stored_version {
        None => {
            metadata.put(
                &mut wtxn,
                SCHEMA_VERSION_KEY,
                &STORE_SCHEMA_VERSION.to_string(),
            )?;
        }
        Some(Ok(STORE_SCHEMA_VERSION)) => {}
        Some(_) => {
            return Err(VectorStoreError::StorageIo(format!(
                "unsupported store schema at {} (expected version {STORE_SCHEMA_VERSION})",
                path.display()
            )));
        }
    }

    if stats.get(&wtxn, STATS_KEY)?.is_none() {
        let initial = serde_json::to_string(&DatabaseStats::new())?;
        stats.put(&mut wtxn, STATS_KEY, &initial)?;
    }
    wtxn.commit()?;

    Ok((
        env,
        Buckets {
            documents,
            embeddings,
            metadata,
            stats,
        },
    ))
}

impl VectorStore for HeedVectorStore {
    fn store(&self, embedding: &DocumentEmbedding) -> Result<()> {
        self.store_batch(std::slice::from_ref(embedding))
    }

    fn store_batch(&self, embeddings: &[DocumentEmbedding]) -> Result<()> {
        if embeddings.is_empty() {
            return Ok(());
        }
        self.with_env(|env| self.write_documents(env, embeddings))?;
        log::debug!("Stored {} document embeddings", embeddings.len());
        Ok(())
    }

    fn get(&self, document_id: &str) -> Result<DocumentEmbedding> {
        self.with_env(|env| {
            let rtxn = env.read_txn()?;
            let json = self
                .buckets
                .documents
                .get(&rtxn, document_id)?
                .ok_or_else(|| VectorStoreError::NotFound(format!("document {document_id}")))?;
            Ok(serde_json::from_str(json)?)
        })
    }

    fn delete(&self, document_id: &str) -> Result<()> {
        self.with_env(|env| {
            let mut wtxn = env.write_txn()?;
            let (document, bytes) = self
                .load_with_size(&wtxn, document_id)?
                .ok_or_else(|| VectorStoreError::NotFound(format!("document {document_id}")))?;

            for vector in &document.embeddings {
                self.delete_owned_chunk(&mut wtxn, &vector.id, document_id)?;
            }
            self.buckets.documents.delete(&mut wtxn, document_id)?;

            let mut stats = match self.buckets.stats.get(&wtxn, STATS_KEY)? {
                Some(json) => serde_json::from_str::<DatabaseStats>(json)?,
                None => DatabaseStats::new(),
            };
            stats.remove_document(&Contribution::of(&document, bytes));
            let stats_json = serde_json::to_string(&stats)?;
            self.buckets.stats.put(&mut wtxn, STATS_KEY, &stats_json)?;
            wtxn.commit()?;

            log::debug!(
                "Deleted document {document_id} ({} embeddings)",
                document.embeddings.len()
            );
            Ok(())
        })
    }

    fn list(&self) -> Result<Vec<String>> {
        self.with_env(|env| {
            let rtxn = env.read_txn()?;
            let mut ids = Vec::new();
            for entry in self.buckets.documents.iter(&rtxn)? {
                let (id, _) = entry?;
                ids.push(id.to_string());
            }
            Ok(ids)
        })
    }

    fn search(&self, query: &[f32], options: &SearchOptions) -> Result<Vec<SearchResult>> {
        self.with_env(|env| {
            let rtxn = env.read_txn()?;
            let mut scanned = 0usize;
            let mut skipped = 0usize;
            let mut results = Vec::new();

            for entry in self.buckets.embeddings.iter(&rtxn)? {
                scanned += 1;
                let record = match entry
                    .map_err(VectorStoreError::from)
                    .and_then(|(_, json)| Ok(serde_json::from_str::<StoredChunk>(json)?))
                {
                    Ok(record) => record,
                    Err(err) => {
                        skipped += 1;
                        log::warn!("Skipping unreadable embedding record: {err}");
                        continue;
                    }
                };

                if !Self::matches_filters(&record, options) {
                    continue;
                }

                let score = self.calculator.calculate(query, &record.vector);
                if !score.is_finite() || score < options.min_score {
                    continue;
                }

                results.push(SearchResult {
                    document_id: record.document_id,
                    chunk_id: record.chunk_id,
                    file_path: record.file_path,
                    content: String::new(),
                    score,
                    metadata: record.metadata,
                });
            }

            results.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
            results.truncate(options.top_k);

            if options.include_content {
                for result in &mut results {
                    result.content = match self.buckets.embeddings.get(&rtxn, &result.chunk_id) {
                        Ok(Some(json)) => match serde_json::from_str::<StoredChunk>(json) {
                            Ok(chunk) if chunk.document_id == result.document_id => chunk.content,
                            Ok(chunk) => {
                                log::warn!(
                                    "Chunk {} belongs to {} not {}; dropping content",
                                    result.chunk_id,
                                    chunk.document_id,
                                    result.document_id
                                );
                                String::new()
                            }
                            Err(err) => {
                                log::warn!("Unreadable chunk {}: {err}", result.chunk_id);
                                String::new()
                            }
                        },
                        Ok(None) => String::new(),
                        Err(err) => {
                            log::warn!("Content lookup failed for {}: {err}", result.chunk_id);
                            String::new()
                        }
                    };
                }
            }

            log::debug!(
                "Vector search scanned {scanned} records ({skipped} skipped), returning {}",
                results.len()
            );
            Ok(results)
        })
    }

    fn optimize(&self) -> Result<()> {
        self.with_env(|env| {
            let mut wtxn = env.write_txn()?;
            let documents = self.buckets.documents.len(&wtxn)?;
            let embeddings = self.buckets.embeddings.len(&wtxn)?;
            let mut stats = match self.buckets.stats.get(&wtxn, STATS_KEY)? {
                Some(json) => serde_json::from_str::<DatabaseStats>(json)?,
                None => DatabaseStats::new(),
            };

            if stats.total_documents != documents || stats.total_embeddings != embeddings {
                log::warn!(
                    "Stats drift repaired: documents {} -> {documents}, embeddings {} -> {embeddings}",
                    stats.total_documents,
                    stats.total_embeddings
                );
                stats.total_documents = documents;
                stats.total_embeddings = embeddings;
            }

            let now = Utc::now();
            stats.last_optimized = Some(now);
            stats.updated_at = now;
            let stats_json = serde_json::to_string(&stats)?;
            self.buckets.stats.put(&mut wtxn, STATS_KEY, &stats_json)?;
            wtxn.commit()?;
            log::info!("Optimized vector store at {}", self.path.display());
            Ok(())
        })
    }

    fn get_stats(&self) -> Result<DatabaseStats> {
        self.with_env(|env| {
            let rtxn = env.read_txn()?;
            match self.buckets.stats.get(&rtxn, STATS_KEY)? {
                Some(json) => Ok(serde_json::from_str(json)?),
                None => Ok(DatabaseStats::new()),
            }
        })
    }

    fn close(&self) -> Result<()> {
        let mut guard = self
            .env
            .write()
            .map_err(|_| VectorStoreError::StorageIo("store lock poisoned".to_string()))?;
        if let Some(env) = guard.take() {
            env.prepare_for_closing().wait();
            log::info!("Closed vector store at {}", self.path.display());
        }
        Ok(())
    }
}
