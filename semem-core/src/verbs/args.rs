//! Per-verb argument structs
//!
//! Each verb has a static argument struct parsed from the request's JSON
//! `args`. Unknown fields are ignored; a missing required field surfaces as
//! a `validation` error naming the field.

use crate::error::{Error, Result};
use crate::retriever::RetrievalMode;
use crate::types::{Importance, MemoryKind};
use crate::zpt::{PanFilter, TemporalRange, TiltStyle, ZoomLevel};
use serde::Deserialize;
use serde_json::Value;

/// Parse `args` into a verb's argument struct, mapping serde errors
/// (including missing required fields, by name) to `validation`
pub fn parse_args<'de, T: Deserialize<'de>>(args: &'de Value) -> Result<T> {
    T::deserialize(args).map_err(|err| Error::Validation(err.to_string()))
}

/// `tell` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TellArgs {
    /// Content to store
    pub content: String,
    /// Kind: interaction (default), concept, or document
    #[serde(default, rename = "type")]
    pub kind: Option<String>,
    /// Caller metadata (domain, tags, title, ...)
    #[serde(default)]
    pub metadata: Option<Value>,
    /// Store raw now, process later
    #[serde(default)]
    pub lazy: bool,
}

impl TellArgs {
    /// Resolve the declared kind, rejecting kinds callers may not store
    pub fn memory_kind(&self) -> Result<MemoryKind> {
        match self.kind.as_deref() {
            None | Some("interaction") => Ok(MemoryKind::Interaction),
            Some("concept") => Ok(MemoryKind::Concept),
            Some("document") => Ok(MemoryKind::Document),
            Some(other) => Err(Error::Validation(format!(
                "type must be interaction, concept, or document (got \"{other}\")"
            ))),
        }
    }
}

/// `ask` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskArgs {
    /// The question
    pub question: String,
    /// Retrieval depth
    #[serde(default)]
    pub mode: RetrievalMode,
    /// Include personal context (default true)
    #[serde(default = "default_true")]
    pub use_context: bool,
    /// Enable hypothetical-document expansion
    #[serde(default, rename = "useHyDE")]
    pub use_hyde: bool,
    /// Enable encyclopedic lookup
    #[serde(default)]
    pub use_wikipedia: bool,
    /// Enable factual lookup
    #[serde(default)]
    pub use_wikidata: bool,
}

fn default_true() -> bool {
    true
}

/// `augment` operations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AugmentOperation {
    /// Concepts + embedding in one pass
    #[default]
    Auto,
    /// Concept extraction only
    Concepts,
    /// Text attribute analysis
    Attributes,
    /// Concept-pair relationships from the graph
    Relationships,
    /// Complete stored lazy records
    ProcessLazy,
    /// Preview deterministic chunking
    ChunkDocuments,
    /// Concept extraction only (alias surface)
    ExtractConcepts,
    /// Embedding generation only
    GenerateEmbedding,
    /// Concepts + attributes
    AnalyzeText,
    /// Embed each extracted concept
    ConceptEmbeddings,
}

/// `augment` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AugmentArgs {
    /// Text to operate on, or "all" for store-wide operations
    pub target: String,
    /// Operation to run
    #[serde(default)]
    pub operation: AugmentOperation,
    /// Bound for batch operations
    #[serde(default)]
    pub limit: Option<usize>,
}

/// `inspect` report types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InspectType {
    /// Engine-wide counters
    System,
    /// Current session
    Session,
    /// One concept-graph node
    Concept,
    /// One stored interaction
    Memory,
}

/// `inspect` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InspectArgs {
    /// What to inspect
    #[serde(rename = "type")]
    pub inspect_type: InspectType,
    /// Concept label or interaction ID for targeted inspection
    #[serde(default)]
    pub target: Option<String>,
    /// Include actionable recommendations
    #[serde(default)]
    pub include_recommendations: bool,
}

/// `zoom` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ZoomArgs {
    /// New zoom level
    pub level: ZoomLevel,
}

/// `pan` arguments: any predicate subset, plus `reset`
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct PanArgs {
    /// Domain labels
    #[serde(default)]
    pub domains: Vec<String>,
    /// Keywords
    #[serde(default)]
    pub keywords: Vec<String>,
    /// Entity labels
    #[serde(default)]
    pub entities: Vec<String>,
    /// Temporal window
    #[serde(default)]
    pub temporal: TemporalRange,
    /// Geographic label
    #[serde(default)]
    pub geographic: Option<String>,
    /// Replace instead of merge
    #[serde(default)]
    pub reset: bool,
}

impl PanArgs {
    /// The filter carried by these arguments
    #[must_use]
    pub fn filter(&self) -> PanFilter {
        PanFilter {
            domains: self.domains.clone(),
            keywords: self.keywords.clone(),
            entities: self.entities.clone(),
            temporal: self.temporal.clone(),
            geographic: self.geographic.clone(),
        }
    }
}

/// `tilt` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiltArgs {
    /// New ranking style
    pub style: TiltStyle,
}

/// `remember` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RememberArgs {
    /// Content to remember
    pub content: String,
    /// Importance level
    #[serde(default)]
    pub importance: Option<Importance>,
    /// Domain label
    #[serde(default)]
    pub domain: Option<String>,
    /// Tags
    #[serde(default)]
    pub tags: Vec<String>,
    /// Free-form context note
    #[serde(default)]
    pub context: Option<String>,
}

/// `recall` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallArgs {
    /// Query text
    pub query: String,
    /// Domain filter
    #[serde(default)]
    pub domain: Option<String>,
    /// Time window filter
    #[serde(default)]
    pub time_range: Option<TemporalRange>,
    /// Tag filter (any match)
    #[serde(default)]
    pub tags: Vec<String>,
    /// Result cap
    #[serde(default = "default_recall_limit")]
    pub limit: usize,
    /// Minimum similarity
    #[serde(default)]
    pub threshold: f32,
}

fn default_recall_limit() -> usize {
    10
}

/// `chat` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatArgs {
    /// User message
    pub message: String,
}

/// `chat-enhanced` arguments
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEnhancedArgs {
    /// User message
    pub message: String,
    /// Provider families to enable; all configured when absent
    #[serde(default)]
    pub enabled_providers: Option<Vec<String>>,
}
