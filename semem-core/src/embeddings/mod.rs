//! Embedding service: dimension-enforced vector generation
//!
//! Wraps a pluggable [`EmbeddingProvider`] with the configured model's
//! dimension check, unit normalization, an LRU query cache, and a circuit
//! breaker. Wrong-length vectors always fail the enclosing operation; the
//! only path that changes a vector's length is the explicit
//! [`EmbeddingService::adjust`] migration helper.

pub mod circuit_breaker;
pub mod mock;
pub mod provider;
#[cfg(feature = "http-providers")]
pub mod remote;
pub mod similarity;

pub use circuit_breaker::CircuitBreaker;
pub use mock::MockEmbeddingProvider;
pub use provider::{utils, EmbeddingProvider};
#[cfg(feature = "http-providers")]
pub use remote::RemoteEmbeddingProvider;
pub use similarity::cosine_similarity;

use crate::config::EmbeddingConfig;
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::metrics::CacheMetrics;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::Arc;

/// Dimension-enforcing embedding front end
pub struct EmbeddingService {
    provider: Arc<dyn EmbeddingProvider>,
    config: EmbeddingConfig,
    cache: Mutex<LruCache<u64, Vec<f32>>>,
    metrics: Mutex<CacheMetrics>,
    breaker: CircuitBreaker,
}

impl EmbeddingService {
    /// Create a service around `provider`, enforcing `config.model.dimension`
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: EmbeddingConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        let breaker = CircuitBreaker::new(
            config.breaker_failure_threshold,
            config.breaker_cooldown,
        );
        let metrics = CacheMetrics {
            capacity: capacity.get(),
            ..CacheMetrics::default()
        };
        Self {
            provider,
            config,
            cache: Mutex::new(LruCache::new(capacity)),
            metrics: Mutex::new(metrics),
            breaker,
        }
    }

    /// The enforced embedding dimension
    #[must_use]
    pub fn dimension(&self) -> usize {
        self.config.model.dimension
    }

    /// The configured model name
    #[must_use]
    pub fn model_name(&self) -> &str {
        &self.config.model.model_name
    }

    /// Generate a unit-normalized embedding for `text`.
    ///
    /// # Errors
    ///
    /// `Dimension` when the provider returns a wrong-length vector,
    /// `ProviderUnavailable` when the circuit breaker is open or the call
    /// fails, `ProviderTimeout`/`DeadlineExceeded` on expiry.
    pub async fn generate(&self, text: &str, deadline: Deadline) -> Result<Vec<f32>> {
        let key = cache_key(text);
        if let Some(vector) = self.cache_get(key) {
            return Ok(vector);
        }

        if !self.breaker.allow_request() {
            return Err(Error::ProviderUnavailable(format!(
                "embedding provider {} (circuit open)",
                self.provider.model_name()
            )));
        }

        let effective = deadline.capped(self.config.timeout);
        let result = effective
            .run_provider("embedding", self.provider.embed_text(text))
            .await;

        let vector = match result {
            Ok(Ok(vector)) => vector,
            Ok(Err(err)) => {
                self.breaker.record_failure();
                return Err(Error::ProviderUnavailable(format!("embedding: {err}")));
            }
            Err(timeout) => {
                self.breaker.record_failure();
                return Err(timeout);
            }
        };

        let vector = self.validate(vector)?;
        self.breaker.record_success();
        self.cache_put(key, vector.clone());
        Ok(vector)
    }

    /// Generate embeddings for a batch, each validated independently.
    ///
    /// Any wrong-length vector fails the whole call so callers never persist
    /// a partially embedded batch.
    pub async fn generate_batch(
        &self,
        texts: &[String],
        deadline: Deadline,
    ) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        if !self.breaker.allow_request() {
            return Err(Error::ProviderUnavailable(
                "embedding provider (circuit open)".to_string(),
            ));
        }

        let effective = deadline.capped(self.config.timeout);
        let result = effective
            .run_provider("embedding", self.provider.embed_batch(texts))
            .await;

        let vectors = match result {
            Ok(Ok(vectors)) => vectors,
            Ok(Err(err)) => {
                self.breaker.record_failure();
                return Err(Error::ProviderUnavailable(format!("embedding: {err}")));
            }
            Err(timeout) => {
                self.breaker.record_failure();
                return Err(timeout);
            }
        };

        if vectors.len() != texts.len() {
            self.breaker.record_failure();
            return Err(Error::ProviderUnavailable(format!(
                "embedding batch returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        let mut validated = Vec::with_capacity(vectors.len());
        for vector in vectors {
            validated.push(self.validate(vector)?);
        }
        self.breaker.record_success();
        for (text, vector) in texts.iter().zip(validated.iter()) {
            self.cache_put(cache_key(text), vector.clone());
        }
        Ok(validated)
    }

    /// Cosine similarity between two vectors of identical length
    pub fn similarity(a: &[f32], b: &[f32]) -> Result<f32> {
        cosine_similarity(a, b)
    }

    /// Explicit migration helper: pad with zeros or truncate to `target`.
    ///
    /// Never called by the normal pipeline.
    #[must_use]
    pub fn adjust(vector: Vec<f32>, target: usize) -> Vec<f32> {
        utils::adjust_dimension(vector, target)
    }

    /// Check provider reachability
    pub async fn is_available(&self) -> bool {
        self.provider.is_available().await
    }

    /// Warm up the provider connection/model
    pub async fn warmup(&self) -> Result<()> {
        self.provider
            .warmup()
            .await
            .map_err(|err| Error::ProviderUnavailable(format!("embedding warmup: {err}")))
    }

    /// Query-cache counters
    pub fn cache_metrics(&self) -> CacheMetrics {
        let mut metrics = self.metrics.lock().clone();
        metrics.size = self.cache.lock().len();
        metrics
    }

    fn validate(&self, vector: Vec<f32>) -> Result<Vec<f32>> {
        let expected = self.config.model.dimension;
        if vector.len() != expected {
            return Err(Error::Dimension {
                got: vector.len(),
                expected,
            });
        }
        Ok(utils::normalize_vector(vector))
    }

    fn cache_get(&self, key: u64) -> Option<Vec<f32>> {
        let mut cache = self.cache.lock();
        let mut metrics = self.metrics.lock();
        match cache.get(&key) {
            Some(vector) => {
                metrics.hits += 1;
                Some(vector.clone())
            }
            None => {
                metrics.misses += 1;
                None
            }
        }
    }

    fn cache_put(&self, key: u64, vector: Vec<f32>) {
        let mut cache = self.cache.lock();
        let mut metrics = self.metrics.lock();
        if cache.len() == cache.cap().get() && !cache.contains(&key) {
            metrics.evictions += 1;
        }
        cache.put(key, vector);
        metrics.size = cache.len();
    }
}

fn cache_key(text: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    text.hash(&mut hasher);
    hasher.finish()
}
