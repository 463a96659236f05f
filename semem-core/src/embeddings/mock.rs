//! Deterministic mock embedding provider for tests and offline use
//!
//! Embeddings are bags of per-token hash vectors, so texts sharing words
//! land near each other in cosine space. Deterministic but non-semantic;
//! not for production.

use super::provider::{utils, EmbeddingProvider};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Mock embedding provider with optional failure injection
pub struct MockEmbeddingProvider {
    name: String,
    dimension: usize,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockEmbeddingProvider {
    /// Create a mock provider producing `dimension`-length vectors
    #[must_use]
    pub fn new(name: &str, dimension: usize) -> Self {
        Self {
            name: name.to_string(),
            dimension,
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    /// Force subsequent calls to fail (or stop failing)
    pub fn set_failing(&self, failing: bool) {
        self.fail.store(failing, Ordering::SeqCst);
    }

    /// Number of embed calls served (batch counts per text)
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Deterministic token-bag embedding
    #[must_use]
    pub fn embed_deterministic(&self, text: &str) -> Vec<f32> {
        let mut acc = vec![0.0f32; self.dimension];
        for token in text
            .to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            token.hash(&mut hasher);
            let mut seed = hasher.finish();
            for slot in acc.iter_mut() {
                seed = seed.wrapping_mul(1_103_515_245).wrapping_add(12_345);
                *slot += ((seed >> 16) as f32) / 32768.0 - 1.0;
            }
        }
        utils::normalize_vector(acc)
    }
}

#[async_trait]
impl EmbeddingProvider for MockEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("mock embedding provider forced failure");
        }
        Ok(self.embed_deterministic(text))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.name
    }

    async fn is_available(&self) -> bool {
        !self.fail.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::similarity::cosine_similarity;

    #[test]
    fn test_deterministic() {
        let provider = MockEmbeddingProvider::new("mock", 64);
        assert_eq!(
            provider.embed_deterministic("hello world"),
            provider.embed_deterministic("hello world")
        );
    }

    #[test]
    fn test_shared_tokens_raise_similarity() {
        let provider = MockEmbeddingProvider::new("mock", 128);
        let a = provider.embed_deterministic("mitochondria produce atp energy");
        let b = provider.embed_deterministic("how do cells produce energy");
        let c = provider.embed_deterministic("rust borrow checker lifetimes");
        let related = cosine_similarity(&a, &b).unwrap();
        let unrelated = cosine_similarity(&a, &c).unwrap();
        assert!(related > unrelated, "{related} <= {unrelated}");
    }

    #[tokio::test]
    async fn test_failure_injection() {
        let provider = MockEmbeddingProvider::new("mock", 8);
        provider.set_failing(true);
        assert!(provider.embed_text("x").await.is_err());
        provider.set_failing(false);
        assert!(provider.embed_text("x").await.is_ok());
        assert_eq!(provider.call_count(), 2);
    }
}
