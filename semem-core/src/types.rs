//! Core data types for the semantic memory engine
//!
//! Everything durable is an [`Interaction`]: user tells, extracted concepts,
//! documents, their chunks, and cached enhancement records. Interactions are
//! immutable after creation except for access bookkeeping in
//! [`InteractionMetadata`].

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};

/// Kind discriminator for stored interactions.
///
/// Enhancement records share the Interaction shape but are namespaced by kind
/// so they can never shadow user content on an ID collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemoryKind {
    /// A prompt/response pair stored by `tell`
    Interaction,
    /// A short standalone concept statement
    Concept,
    /// A full document (chunked when large)
    Document,
    /// A chunk of a parent document
    DocumentChunk,
    /// Cached external-knowledge content
    Enhancement,
}

impl std::fmt::Display for MemoryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MemoryKind::Interaction => "interaction",
            MemoryKind::Concept => "concept",
            MemoryKind::Document => "document",
            MemoryKind::DocumentChunk => "document-chunk",
            MemoryKind::Enhancement => "enhancement",
        };
        write!(f, "{s}")
    }
}

/// Importance levels attached by the `remember` verb
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Importance {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

/// Mutable bookkeeping attached to an otherwise immutable Interaction
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct InteractionMetadata {
    /// Domain label used by pan filtering (e.g. "biology")
    pub domain: Option<String>,
    /// Free-form tags
    pub tags: Vec<String>,
    /// Creation timestamp
    pub created: Option<DateTime<Utc>>,
    /// Where the content came from ("tell", a provider name, ...)
    pub source: Option<String>,
    /// Document or chunk title
    pub title: Option<String>,
    /// Last retrieval access
    pub last_accessed: Option<DateTime<Utc>>,
    /// Caller-assigned importance
    pub importance: Option<Importance>,
    /// Set when embedding/concept extraction is still owed
    pub pending_processing: bool,
    /// Extra caller-supplied fields, preserved verbatim
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, serde_json::Value>,
}

/// Chunk linkage carried by Interactions of kind `document-chunk`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkInfo {
    /// ID of the parent document Interaction
    pub parent_id: String,
    /// Zero-based position among siblings
    pub index: usize,
    /// Total number of sibling chunks
    pub total_chunks: usize,
    /// Byte offset of this chunk's non-overlap region in the parent
    pub offset: usize,
    /// Length of the non-overlap region
    pub length: usize,
}

/// Enhancement provenance carried by Interactions of kind `enhancement`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnhancementInfo {
    /// The normalized query that produced this record
    pub source_query: String,
    /// Which provider produced it
    pub provider: EnhancementProviderKind,
    /// Cache TTL in seconds; after expiry the record is demoted
    pub cache_ttl_secs: u64,
    /// Personal Interactions linked during the same retrieval round
    pub linked_personal_ids: Vec<String>,
}

/// The three enhancement provider families
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EnhancementProviderKind {
    /// Structured knowledge-base lookup
    Factual,
    /// Encyclopedia article snippets
    Encyclopedic,
    /// LLM-generated "as-if" answer, retrieval-only
    Hypothetical,
}

impl std::fmt::Display for EnhancementProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnhancementProviderKind::Factual => "factual",
            EnhancementProviderKind::Encyclopedic => "encyclopedic",
            EnhancementProviderKind::Hypothetical => "hypothetical",
        };
        write!(f, "{s}")
    }
}

/// A persisted memory record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Interaction {
    /// Stable hash-derived identifier
    pub id: String,
    /// Original prompt or content
    pub prompt: String,
    /// Stored response (empty for raw content tells)
    pub response: String,
    /// Fixed-dimension embedding, absent while lazy
    pub embedding: Option<Vec<f32>>,
    /// Concepts extracted by the LLM service
    pub concepts: Vec<String>,
    /// Kind discriminator
    pub kind: MemoryKind,
    /// Mutable bookkeeping
    pub metadata: InteractionMetadata,
    /// Present only for kind `document-chunk`
    pub chunk: Option<ChunkInfo>,
    /// Present only for kind `enhancement`
    pub enhancement: Option<EnhancementInfo>,
}

impl Interaction {
    /// Create a new interaction with a content-derived ID
    pub fn new(kind: MemoryKind, prompt: String, response: String) -> Self {
        let id = derive_id(kind, &prompt, &response);
        Self {
            id,
            prompt,
            response,
            embedding: None,
            concepts: Vec::new(),
            kind,
            metadata: InteractionMetadata {
                created: Some(Utc::now()),
                ..InteractionMetadata::default()
            },
            chunk: None,
            enhancement: None,
        }
    }

    /// The text used for embedding and concept extraction
    #[must_use]
    pub fn content(&self) -> String {
        if self.response.is_empty() {
            self.prompt.clone()
        } else {
            format!("{} {}", self.prompt, self.response)
        }
    }

    /// Creation time, falling back to the epoch for legacy records
    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.metadata.created.unwrap_or_default()
    }

    /// Whether this record still owes embedding/concept processing
    #[must_use]
    pub fn is_lazy(&self) -> bool {
        self.metadata.pending_processing
    }

    /// Whether an expired enhancement record has been demoted out of
    /// retrieval weighting
    #[must_use]
    pub fn is_demoted(&self, now: DateTime<Utc>) -> bool {
        match (&self.enhancement, self.metadata.created) {
            (Some(info), Some(created)) => {
                let age = now.signed_duration_since(created);
                age.num_seconds() >= 0 && age.num_seconds() as u64 >= info.cache_ttl_secs
            }
            _ => false,
        }
    }
}

/// Derive a stable ID from kind and content.
///
/// Enhancement IDs are provider-namespaced at the call site (see
/// [`derive_enhancement_id`]) so a colliding content hash can never overwrite
/// user content.
#[must_use]
pub fn derive_id(kind: MemoryKind, prompt: &str, response: &str) -> String {
    let mut hasher = DefaultHasher::new();
    kind.to_string().hash(&mut hasher);
    prompt.hash(&mut hasher);
    response.hash(&mut hasher);
    format!("semem:{}:{:016x}", kind, hasher.finish())
}

/// Derive a provider-namespaced ID for an enhancement record
#[must_use]
pub fn derive_enhancement_id(provider: EnhancementProviderKind, normalized_query: &str) -> String {
    let mut hasher = DefaultHasher::new();
    normalized_query.hash(&mut hasher);
    format!("semem:enhancement:{}:{:016x}", provider, hasher.finish())
}

/// An interaction paired with a retrieval score
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredInteraction {
    /// The matched record
    pub interaction: Interaction,
    /// Composite retrieval score (higher is better)
    pub score: f32,
}

/// Which branch produced a context item, for source attribution
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContextSource {
    /// The caller's own stored memory
    Personal,
    /// Structured knowledge-base lookup
    Factual,
    /// Encyclopedia snippets
    Encyclopedic,
}

impl std::fmt::Display for ContextSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ContextSource::Personal => "personal",
            ContextSource::Factual => "factual",
            ContextSource::Encyclopedic => "encyclopedic",
        };
        write!(f, "{s}")
    }
}
