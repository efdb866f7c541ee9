use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};
use std::time::Duration;

/// Snapshot of retriever activity
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RetrievalStats {
    pub total_queries: u64,
    pub cache_hits: u64,
    pub cache_misses: u64,
    /// Two-point moving average: each sample is averaged with the previous value
    pub average_latency_ms: f64,
    /// Latency of the most recent call per operation
    pub operation_latency_ms: BTreeMap<String, f64>,
}

#[derive(Default)]
pub(crate) struct StatsRecorder {
    inner: RwLock<RetrievalStats>,
}

impl StatsRecorder {
    pub(crate) fn record_cache(&self, hit: bool) {
        let mut stats = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        if hit {
            stats.cache_hits += 1;
        } else {
            stats.cache_misses += 1;
        }
    }

    pub(crate) fn record_query(&self, operation: &str, elapsed: Duration) {
        let latency_ms = elapsed.as_secs_f64() * 1_000.0;
        let mut stats = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        stats.average_latency_ms = if stats.total_queries == 0 {
            latency_ms
        } else {
            (stats.average_latency_ms + latency_ms) / 2.0
        };
        stats.total_queries += 1;
        stats
            .operation_latency_ms
            .insert(operation.to_string(), latency_ms);
    }

    pub(crate) fn snapshot(&self) -> RetrievalStats {
        self.inner
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
