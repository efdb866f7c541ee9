use crate::context::{RetrievalContext, RetrievalResult};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::sync::{PoisonError, RwLock};
use std::time::{Duration, Instant};

/// Cache of retrieval results keyed by query signature
pub trait ResultCache: Send + Sync {
    /// Expired entries count as misses and are dropped
    fn get(&self, key: &str) -> Option<Vec<RetrievalResult>>;

    fn set(&self, key: &str, results: Vec<RetrievalResult>, ttl: Duration);

    fn delete(&self, key: &str);

    fn clear(&self);

    fn size(&self) -> usize;

    fn stats(&self) -> CacheStats;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub size: usize,
}

struct CacheEntry {
    results: Vec<RetrievalResult>,
    expires_at: Instant,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
    evictions: u64,
}

/// Bounded TTL cache; when full, the entry expiring soonest is evicted
pub struct RetrievalCache {
    state: RwLock<CacheState>,
    capacity: usize,
}

impl RetrievalCache {
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            state: RwLock::new(CacheState::default()),
            capacity: capacity.max(1),
        }
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    fn get_at(&self, key: &str, now: Instant) -> Option<Vec<RetrievalResult>> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let lookup = state
            .entries
            .get(key)
            .map(|entry| (entry.expires_at > now).then(|| entry.results.clone()));
        match lookup {
            Some(Some(results)) => {
                state.hits += 1;
                Some(results)
            }
            Some(None) => {
                state.entries.remove(key);
                state.misses += 1;
                None
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    fn set_at(&self, key: &str, results: Vec<RetrievalResult>, ttl: Duration, now: Instant) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.entries.len() >= self.capacity && !state.entries.contains_key(key) {
            let victim = state
                .entries
                .iter()
                .min_by_key(|(_, entry)| entry.expires_at)
                .map(|(k, _)| k.clone());
            if let Some(victim) = victim {
                state.entries.remove(&victim);
                state.evictions += 1;
                log::debug!("Evicted cache entry {victim}");
            }
        }
        state.entries.insert(
            key.to_string(),
            CacheEntry {
                results,
                expires_at: now + ttl,
            },
        );
    }
}

impl ResultCache for RetrievalCache {
    fn get(&self, key: &str) -> Option<Vec<RetrievalResult>> {
        self.get_at(key, Instant::now())
    }

    fn set(&self, key: &str, results: Vec<RetrievalResult>, ttl: Duration) {
        self.set_at(key, results, ttl, Instant::now());
    }

    fn delete(&self, key: &str) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.entries.remove(key);
    }

    fn clear(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.entries.clear();
    }

    fn size(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    fn stats(&self) -> CacheStats {
        let state = self.state.read().unwrap_or_else(PoisonError::into_inner);
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            evictions: state.evictions,
            size: state.entries.len(),
        }
    }
}

#[derive(Serialize)]
struct Signature<'a> {
    query: &'a str,
    query_type: &'a str,
    max_results: usize,
    min_score: f32,
    filters: &'a BTreeMap<String, String>,
    boosts: &'a BTreeMap<String, f32>,
    time_range: Option<(i64, i64)>,
}

/// Stable SHA-256 signature of everything that shapes a retrieval's output
#[must_use]
pub fn cache_key(context: &RetrievalContext) -> String {
    let signature = Signature {
        query: &context.query,
        query_type: context.query_type.as_str(),
        max_results: context.max_results,
        min_score: context.min_score,
        filters: &context.filters,
        boosts: &context.boost_factors,
        time_range: context
            .time_range
            .map(|r| (r.start.timestamp_millis(), r.end.timestamp_millis())),
    };
    // BTreeMaps keep key order stable; serialization of plain data cannot fail
    let encoded = serde_json::to_vec(&signature).unwrap_or_default();
    let mut hasher = Sha256::new();
    hasher.update(&encoded);
    format!("{:x}", hasher.finalize())
}
