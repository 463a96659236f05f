//! Configuration for the verb engine
//!
//! All tunables live in serde-derived structs with `Default` impls so an
//! engine can be built from a config file, environment overlay, or plain
//! `EngineConfig::default()` in tests.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Top-level engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Chunker parameters
    pub chunker: ChunkerConfig,
    /// Embedding model and service parameters
    pub embedding: EmbeddingConfig,
    /// LLM chat / concept-extraction parameters
    pub llm: LlmConfig,
    /// Enhancement providers and cache
    pub enhancement: EnhancementConfig,
    /// Hybrid retrieval weights and limits
    pub retrieval: RetrievalConfig,
    /// Concept graph decay and community detection
    pub graph: GraphConfig,
    /// Persistent store behaviour
    pub store: StoreConfig,
    /// Session registry behaviour
    pub session: SessionConfig,
}

/// Deterministic chunker parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Maximum chunk size in characters
    pub max_chunk_size: usize,
    /// Minimum chunk size in characters
    pub min_chunk_size: usize,
    /// Overlap carried from one chunk into the next, in characters
    pub overlap: usize,
    /// Window below `max_chunk_size` searched for a semantic boundary
    pub boundary_window: usize,
    /// Chunking strategy
    pub strategy: ChunkStrategy,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 2000,
            min_chunk_size: 100,
            overlap: 100,
            boundary_window: 200,
            strategy: ChunkStrategy::Semantic,
        }
    }
}

/// Chunk boundary selection strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkStrategy {
    /// Prefer paragraph/sentence/whitespace boundaries near the size limit
    Semantic,
    /// Split at exactly `max_chunk_size`
    Character,
}

/// Configuration for the embedding service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Model configuration (name + expected dimension)
    pub model: ModelConfig,
    /// Query-embedding LRU cache capacity
    pub cache_capacity: usize,
    /// Timeout for a single provider call
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Circuit breaker: consecutive failures before opening
    pub breaker_failure_threshold: u32,
    /// Circuit breaker: cool-down before a half-open probe
    #[serde(with = "duration_millis")]
    pub breaker_cooldown: Duration,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            cache_capacity: 1000,
            timeout: Duration::from_secs(30),
            breaker_failure_threshold: 5,
            breaker_cooldown: Duration::from_secs(30),
        }
    }
}

/// Model configuration for embedding providers.
///
/// The `{model name → dimension}` table lives in the named constructors;
/// the service enforces `dimension` on every generated vector.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model name/identifier
    pub model_name: String,
    /// Expected embedding dimension
    pub dimension: usize,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::nomic_embed_text()
    }
}

impl ModelConfig {
    /// nomic-embed-text (768 dimensions)
    #[must_use]
    pub fn nomic_embed_text() -> Self {
        Self {
            model_name: "nomic-embed-text".to_string(),
            dimension: 768,
        }
    }

    /// `OpenAI` text-embedding-3-small (1536 dimensions)
    #[must_use]
    pub fn openai_3_small() -> Self {
        Self {
            model_name: "text-embedding-3-small".to_string(),
            dimension: 1536,
        }
    }

    /// `OpenAI` text-embedding-3-large (3072 dimensions)
    #[must_use]
    pub fn openai_3_large() -> Self {
        Self {
            model_name: "text-embedding-3-large".to_string(),
            dimension: 3072,
        }
    }

    /// Custom model with explicit dimension
    #[must_use]
    pub fn custom(model_name: &str, dimension: usize) -> Self {
        Self {
            model_name: model_name.to_string(),
            dimension,
        }
    }
}

/// Configuration for the LLM service
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Chat model identifier passed to providers
    pub chat_model: String,
    /// Timeout for a single chat call
    #[serde(with = "duration_millis")]
    pub timeout: Duration,
    /// Maximum concepts returned by extraction
    pub max_concepts: usize,
    /// Maximum length of a single concept label
    pub max_concept_len: usize,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            chat_model: "qwen2.5:3b".to_string(),
            timeout: Duration::from_secs(30),
            max_concepts: 16,
            max_concept_len: 64,
        }
    }
}

/// Configuration for enhancement providers and their cache
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnhancementConfig {
    /// Per-provider call timeout
    #[serde(with = "duration_millis")]
    pub provider_timeout: Duration,
    /// Maximum retries after the first attempt
    pub max_retries: u32,
    /// Exponential backoff base
    #[serde(with = "duration_millis")]
    pub backoff_base: Duration,
    /// Exponential backoff cap
    #[serde(with = "duration_millis")]
    pub backoff_cap: Duration,
    /// Jitter applied to each backoff step (fraction, ±)
    pub backoff_jitter: f64,
    /// TTL for cached enhancement records
    #[serde(with = "duration_millis")]
    pub cache_ttl: Duration,
    /// Enhancement cache capacity
    pub cache_capacity: usize,
}

impl Default for EnhancementConfig {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(8),
            max_retries: 2,
            backoff_base: Duration::from_millis(250),
            backoff_cap: Duration::from_secs(2),
            backoff_jitter: 0.2,
            cache_ttl: Duration::from_secs(7 * 24 * 3600),
            cache_capacity: 2048,
        }
    }
}

/// Weighting constants for one query class (personal/authority/recency/zpt)
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct WeightSet {
    pub personal: f32,
    pub authority: f32,
    pub recency: f32,
    pub zpt: f32,
}

/// Per-query-class weighting policy.
///
/// Defaults follow observed behaviour; they are configuration, not contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WeightPolicy {
    /// "who/when/where" questions without first-person markers
    pub factual: WeightSet,
    /// Queries containing first-person pronouns
    pub personal: WeightSet,
    /// Proper noun + temporal term
    pub entity_temporal: WeightSet,
    /// Everything else
    pub default: WeightSet,
}

impl Default for WeightPolicy {
    fn default() -> Self {
        Self {
            factual: WeightSet {
                personal: 0.2,
                authority: 0.5,
                recency: 0.1,
                zpt: 0.2,
            },
            personal: WeightSet {
                personal: 0.6,
                authority: 0.1,
                recency: 0.15,
                zpt: 0.15,
            },
            entity_temporal: WeightSet {
                personal: 0.3,
                authority: 0.35,
                recency: 0.2,
                zpt: 0.15,
            },
            default: WeightSet {
                personal: 0.4,
                authority: 0.25,
                recency: 0.15,
                zpt: 0.2,
            },
        }
    }
}

/// Hybrid retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Local-branch candidate counts per mode (basic, standard, comprehensive)
    pub k_local: [usize; 3],
    /// Final merged context cap
    pub k_final: usize,
    /// Concept-overlap threshold for spreading-activation candidates
    pub concept_overlap_threshold: f32,
    /// Cosine similarity above which two items are near-duplicates
    pub near_duplicate_cosine: f32,
    /// Score difference treated as a tie
    pub tie_epsilon: f32,
    /// Total verb deadline
    #[serde(with = "duration_millis")]
    pub total_deadline: Duration,
    /// Weighting policy per query class
    pub weights: WeightPolicy,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k_local: [4, 12, 32],
            k_final: 8,
            concept_overlap_threshold: 0.2,
            near_duplicate_cosine: 0.97,
            tie_epsilon: 1e-6,
            total_deadline: Duration::from_secs(30),
            weights: WeightPolicy::default(),
        }
    }
}

/// Concept graph configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphConfig {
    /// Spreading activation hop limit
    pub activation_hops: usize,
    /// Multiplicative decay per hop
    pub activation_decay: f32,
    /// Background edge decay factor applied per interval
    pub decay_factor: f32,
    /// Interval between background decay passes
    #[serde(with = "duration_millis")]
    pub decay_interval: Duration,
    /// Edges below this weight are pruned during decay
    pub prune_floor: f32,
    /// Fractional edge-count change that invalidates cached communities
    pub community_invalidation: f32,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            activation_hops: 2,
            activation_decay: 0.5,
            decay_factor: 0.995,
            decay_interval: Duration::from_secs(24 * 3600),
            prune_floor: 0.05,
            community_invalidation: 0.1,
        }
    }
}

/// Persistent store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Named graph receiving all content mutations
    pub content_graph: String,
    /// Named graph holding per-session navigation state
    pub session_graph: String,
    /// Debounce window for buffered writes
    #[serde(with = "duration_millis")]
    pub flush_debounce: Duration,
    /// Lazy-load LRU cache capacity
    pub cache_capacity: usize,
    /// Timeout for a single store query/update
    #[serde(with = "duration_millis")]
    pub query_timeout: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            content_graph: "http://semem.org/graph/content".to_string(),
            session_graph: "http://semem.org/graph/sessions".to_string(),
            flush_debounce: Duration::from_millis(500),
            cache_capacity: 10_000,
            query_timeout: Duration::from_secs(10),
        }
    }
}

/// Session registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle time after which a session may be evicted from memory
    #[serde(with = "duration_millis")]
    pub session_ttl: Duration,
    /// Session cache (working set) capacity per session
    pub cache_capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            session_ttl: Duration::from_secs(24 * 3600),
            cache_capacity: 256,
        }
    }
}

/// Serialize `Duration` as integer milliseconds
mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        let ms = u64::deserialize(d)?;
        Ok(Duration::from_millis(ms))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_tunables() {
        let config = EngineConfig::default();
        assert_eq!(config.chunker.max_chunk_size, 2000);
        assert_eq!(config.chunker.overlap, 100);
        assert_eq!(config.retrieval.k_local, [4, 12, 32]);
        assert_eq!(config.enhancement.provider_timeout, Duration::from_secs(8));
        assert_eq!(config.store.flush_debounce, Duration::from_millis(500));
        assert_eq!(config.store.cache_capacity, 10_000);
        assert_eq!(config.session.session_ttl, Duration::from_secs(86_400));
    }

    #[test]
    fn test_model_dimension_table() {
        assert_eq!(ModelConfig::nomic_embed_text().dimension, 768);
        assert_eq!(ModelConfig::openai_3_small().dimension, 1536);
        assert_eq!(ModelConfig::openai_3_large().dimension, 3072);
        assert_eq!(ModelConfig::custom("mini", 384).dimension, 384);
    }

    #[test]
    fn test_weight_policy_rows_sum_to_one() {
        let policy = WeightPolicy::default();
        for set in [
            policy.factual,
            policy.personal,
            policy.entity_temporal,
            policy.default,
        ] {
            let sum = set.personal + set.authority + set.recency + set.zpt;
            assert!((sum - 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let config = EngineConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: EngineConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.chunker.max_chunk_size, config.chunker.max_chunk_size);
        assert_eq!(back.retrieval.total_deadline, config.retrieval.total_deadline);
    }
}
