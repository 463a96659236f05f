//! Embedding provider trait and vector utilities

use anyhow::Result;
use async_trait::async_trait;

/// Trait for providers that convert text to fixed-dimension vectors.
///
/// Dimension enforcement happens in the [`EmbeddingService`](super::EmbeddingService),
/// not here; providers report their nominal dimension and the service rejects
/// anything that disagrees with the configured model.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Generate an embedding for a single text
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>>;

    /// Generate embeddings for multiple texts in batch.
    ///
    /// Default implementation loops over [`embed_text`](Self::embed_text).
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for text in texts {
            embeddings.push(self.embed_text(text).await?);
        }
        Ok(embeddings)
    }

    /// The dimension this provider produces
    fn dimension(&self) -> usize;

    /// The model name/identifier
    fn model_name(&self) -> &str;

    /// Check if the provider is reachable and configured
    async fn is_available(&self) -> bool {
        self.embed_text("test").await.is_ok()
    }

    /// Warm up the provider (load models, open connections)
    async fn warmup(&self) -> Result<()> {
        self.embed_text("warmup").await?;
        Ok(())
    }
}

/// Vector utilities shared by providers and the service
pub mod utils {
    /// Normalize a vector to unit length
    #[must_use]
    pub fn normalize_vector(mut vector: Vec<f32>) -> Vec<f32> {
        let magnitude = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude > 0.0 {
            for x in &mut vector {
                *x /= magnitude;
            }
        }
        vector
    }

    /// Pad with zeros or truncate the tail to reach `target` elements.
    ///
    /// Migration-only escape hatch; normal operation rejects wrong-length
    /// vectors instead of calling this.
    #[must_use]
    pub fn adjust_dimension(mut vector: Vec<f32>, target: usize) -> Vec<f32> {
        vector.resize(target, 0.0);
        vector
    }
}
