use crate::error::{Result, VectorStoreError};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Maximum output dimensions of embedding models we know about
const KNOWN_MODEL_DIMENSIONS: &[(&str, usize)] = &[
    ("text-embedding-3-small", 1536),
    ("text-embedding-3-large", 3072),
    ("text-embedding-ada-002", 1536),
    ("nomic-embed-text", 768),
    ("all-minilm", 384),
    ("mxbai-embed-large", 1024),
];

/// Upper bound of dimensions supported by `model`, when known
#[must_use]
pub fn known_model_dimensions(model: &str) -> Option<usize> {
    KNOWN_MODEL_DIMENSIONS
        .iter()
        .find(|(name, _)| *name == model)
        .map(|(_, dims)| *dims)
}

/// Source of embedding vectors.
///
/// Transport concerns (HTTP, retries, rate limits) live in implementations; the
/// store and retriever only see vectors.
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>>;

    /// One vector per input text, same order; any failure fails the whole batch
    async fn generate_batch_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn model(&self) -> &str;

    fn dimensions(&self) -> usize;

    fn max_tokens(&self) -> usize;

    /// Rough token count, four characters per token
    fn estimate_tokens(&self, text: &str) -> usize {
        text.chars().count().div_ceil(4)
    }

    /// Split `text` into word-aligned pieces that each fit `max_tokens`
    fn split_text_for_embedding(&self, text: &str, max_tokens: usize) -> Vec<String> {
        split_by_tokens(text, max_tokens, |piece| self.estimate_tokens(piece))
    }
}

fn split_by_tokens(text: &str, max_tokens: usize, estimate: impl Fn(&str) -> usize) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    if max_tokens == 0 || estimate(text) <= max_tokens {
        return vec![text.to_string()];
    }

    let mut pieces = Vec::new();
    let mut current = String::new();
    for word in text.split_whitespace() {
        let candidate_len = if current.is_empty() {
            estimate(word)
        } else {
            estimate(&current) + estimate(word) + 1
        };
        if !current.is_empty() && candidate_len > max_tokens {
            pieces.push(std::mem::take(&mut current));
        }
        if !current.is_empty() {
            current.push(' ');
        }
        current.push_str(word);
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub model: String,
    pub dimensions: usize,
    /// Texts per transport request; generators split a batch call by it
    pub batch_size: usize,
    pub max_tokens_per_chunk: usize,
    /// Also embed a short per-document header
    pub generate_summary: bool,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            batch_size: 32,
            max_tokens_per_chunk: 512,
            generate_summary: false,
        }
    }
}

impl EmbeddingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.model.trim().is_empty() {
            return Err(VectorStoreError::invalid_config("embedding.model is required"));
        }
        if self.dimensions == 0 {
            return Err(VectorStoreError::invalid_config(
                "embedding.dimensions must be positive",
            ));
        }
        if self.batch_size == 0 {
            return Err(VectorStoreError::invalid_config(
                "embedding.batch_size must be positive",
            ));
        }
        if self.max_tokens_per_chunk == 0 {
            return Err(VectorStoreError::invalid_config(
                "embedding.max_tokens_per_chunk must be positive",
            ));
        }
        if let Some(max) = known_model_dimensions(&self.model) {
            if self.dimensions > max {
                return Err(VectorStoreError::invalid_config(format!(
                    "model {} supports at most {max} dimensions, got {}",
                    self.model, self.dimensions
                )));
            }
        }
        Ok(())
    }
}

/// Deterministic, network-free generator: identical text always yields the same
/// unit-length vector.
#[derive(Debug)]
pub struct StubEmbedder {
    model: String,
    dimension: usize,
    max_tokens: usize,
    /// Texts per simulated transport request inside one batch call
    batch_size: usize,
    single_calls: AtomicUsize,
    batch_calls: AtomicUsize,
    requests: AtomicUsize,
    fail_on: Mutex<Option<String>>,
}

impl StubEmbedder {
    #[must_use]
    pub fn new(dimension: usize) -> Self {
        Self {
            model: "stub".to_string(),
            dimension,
            max_tokens: 8192,
            batch_size: EmbeddingConfig::default().batch_size,
            single_calls: AtomicUsize::new(0),
            batch_calls: AtomicUsize::new(0),
            requests: AtomicUsize::new(0),
            fail_on: Mutex::new(None),
        }
    }

    #[must_use]
    pub fn from_config(config: &EmbeddingConfig) -> Self {
        Self {
            model: config.model.clone(),
            max_tokens: config.max_tokens_per_chunk,
            batch_size: config.batch_size.max(1),
            ..Self::new(config.dimensions)
        }
    }

    /// Fail every call whose input contains `needle`
    pub fn fail_on(&self, needle: impl Into<String>) {
        if let Ok(mut guard) = self.fail_on.lock() {
            *guard = Some(needle.into());
        }
    }

    #[must_use]
    pub fn single_calls(&self) -> usize {
        self.single_calls.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn batch_calls(&self) -> usize {
        self.batch_calls.load(Ordering::Relaxed)
    }

    /// Transport requests issued: one per single call, one per `batch_size`
    /// slice of a batch call
    #[must_use]
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn embed(&self, text: &str) -> Vec<f32> {
        stub_embed(text, self.dimension)
    }

    fn check_failure(&self, text: &str) -> Result<()> {
        let guard = self
            .fail_on
            .lock()
            .map_err(|_| VectorStoreError::generation("stub embedder lock poisoned"))?;
        match guard.as_deref() {
            Some(needle) if text.contains(needle) => Err(VectorStoreError::generation(format!(
                "stub embedder refused input containing {needle:?}"
            ))),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl EmbeddingGenerator for StubEmbedder {
    async fn generate_embedding(&self, text: &str) -> Result<Vec<f32>> {
        self.single_calls.fetch_add(1, Ordering::Relaxed);
        self.requests.fetch_add(1, Ordering::Relaxed);
        self.check_failure(text)?;
        Ok(self.embed(text))
    }

    async fn generate_batch_embeddings(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.batch_calls.fetch_add(1, Ordering::Relaxed);
        let mut vectors = Vec::with_capacity(texts.len());
        for request in texts.chunks(self.batch_size) {
            self.requests.fetch_add(1, Ordering::Relaxed);
            for text in request {
                self.check_failure(text)?;
            }
            vectors.extend(request.iter().map(|t| self.embed(t)));
        }
        Ok(vectors)
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn dimensions(&self) -> usize {
        self.dimension
    }

    fn max_tokens(&self) -> usize {
        self.max_tokens
    }
}

fn stub_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut state =
        fnv1a_64(text.as_bytes()) ^ (dimension as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15);
    let mut vec = Vec::with_capacity(dimension);
    for _ in 0..dimension {
        let bits = splitmix64(&mut state);
        let high = (bits >> 32) as u32;
        let mantissa = high >> 9;
        let unit = f32::from_bits(0x3f80_0000 | mantissa) - 1.0;
        vec.push(unit.mul_add(2.0, -1.0));
    }
    normalize(&mut vec);
    vec
}

fn normalize(vec: &mut [f32]) {
    let norm = vec.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        for x in vec.iter_mut() {
            *x /= norm;
        }
    }
}

fn fnv1a_64(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    hash
}

const fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9E37_79B9_7F4A_7C15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn stub_is_deterministic_and_normalized() {
        let stub = StubEmbedder::new(16);
        let a = stub.generate_embedding("fn main() {}").await.unwrap();
        let b = stub.generate_embedding("fn main() {}").await.unwrap();
        let c = stub.generate_embedding("package main").await.unwrap();

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.len(), 16);
        let norm: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
        assert_eq!(stub.single_calls(), 3);
    }

    #[tokio::test]
    async fn batch_preserves_order_and_fails_whole() {
        let stub = StubEmbedder::new(8);
        let texts = vec!["one".to_string(), "two".to_string()];
        let vectors = stub.generate_batch_embeddings(&texts).await.unwrap();
        assert_eq!(vectors[0], stub.embed("one"));
        assert_eq!(vectors[1], stub.embed("two"));

        stub.fail_on("two");
        let err = stub.generate_batch_embeddings(&texts).await.unwrap_err();
        assert!(matches!(err, VectorStoreError::Generation(_)));
        assert_eq!(stub.batch_calls(), 2);
    }

    #[tokio::test]
    async fn batch_call_is_split_into_requests() {
        let config = EmbeddingConfig {
            model: "stub".to_string(),
            dimensions: 8,
            batch_size: 2,
            ..EmbeddingConfig::default()
        };
        let stub = StubEmbedder::from_config(&config);
        let texts: Vec<String> = (0..5).map(|i| format!("text {i}")).collect();

        let vectors = stub.generate_batch_embeddings(&texts).await.unwrap();

        assert_eq!(stub.batch_calls(), 1);
        assert_eq!(stub.requests(), 3);
        for (text, vector) in texts.iter().zip(&vectors) {
            assert_eq!(vector, &stub.embed(text));
        }
    }

    #[test]
    fn config_validation() {
        assert!(EmbeddingConfig::default().validate().is_ok());

        let too_wide = EmbeddingConfig {
            model: "all-minilm".to_string(),
            dimensions: 768,
            ..EmbeddingConfig::default()
        };
        assert!(too_wide.validate().is_err());

        let unknown_model = EmbeddingConfig {
            model: "in-house".to_string(),
            dimensions: 4096,
            ..EmbeddingConfig::default()
        };
        assert!(unknown_model.validate().is_ok());

        let empty = EmbeddingConfig {
            model: "  ".to_string(),
            ..EmbeddingConfig::default()
        };
        assert!(matches!(
            empty.validate(),
            Err(VectorStoreError::InvalidConfig(_))
        ));
    }

    #[test]
    fn split_respects_token_budget() {
        let stub = StubEmbedder::new(4);
        let text = "alpha beta gamma delta epsilon zeta eta theta";
        let pieces = stub.split_text_for_embedding(text, 4);

        assert!(pieces.len() > 1);
        assert_eq!(pieces.join(" "), text);
        for piece in &pieces {
            assert!(stub.estimate_tokens(piece) <= 4 || !piece.contains(' '));
        }
        assert_eq!(stub.split_text_for_embedding("short", 100), vec!["short"]);
        assert!(stub.split_text_for_embedding("   ", 10).is_empty());
    }
}
