//! Predicate vocabulary
//!
//! Predicate and datatype IRIs are configuration, not constants baked into
//! queries; deployments aligning with an existing ontology override the
//! defaults here.

use serde::{Deserialize, Serialize};

/// Predicate and datatype IRIs used by the interaction mapping
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Vocab {
    /// `rdf:type`
    pub rdf_type: String,
    /// `rdfs:label`
    pub rdfs_label: String,
    /// `dcterms:created`
    pub created: String,
    /// Record kind discriminator
    pub kind: String,
    /// Prompt text
    pub prompt: String,
    /// Response text
    pub response: String,
    /// Embedding literal
    pub embedding: String,
    /// One concept label per triple
    pub concept: String,
    /// Pan domain label
    pub domain: String,
    /// One tag per triple
    pub tag: String,
    /// Content source
    pub source: String,
    /// Importance level
    pub importance: String,
    /// Lazy-processing flag
    pub pending_processing: String,
    /// Chunk parent document
    pub parent: String,
    /// Chunk index
    pub chunk_index: String,
    /// Chunk total
    pub chunk_total: String,
    /// Chunk byte offset in parent
    pub chunk_offset: String,
    /// Chunk byte length
    pub chunk_length: String,
    /// Enhancement source query
    pub enhancement_source: String,
    /// Enhancement provider
    pub enhancement_provider: String,
    /// Enhancement cache TTL (seconds)
    pub cache_ttl: String,
    /// Linked personal interaction
    pub linked_personal: String,
    /// Serialized navigation state (session graph)
    pub navigation_state: String,
    /// Caller-supplied extra metadata, as one JSON literal
    pub extra: String,
    /// Datatype IRI for embedding vectors
    pub vector_datatype: String,
    /// Datatype IRI for timestamps
    pub datetime_datatype: String,
}

impl Default for Vocab {
    fn default() -> Self {
        Self {
            rdf_type: "http://www.w3.org/1999/02/22-rdf-syntax-ns#type".to_string(),
            rdfs_label: "http://www.w3.org/2000/01/rdf-schema#label".to_string(),
            created: "http://purl.org/dc/terms/created".to_string(),
            kind: "http://semem.org/vocab#kind".to_string(),
            prompt: "http://semem.org/vocab#prompt".to_string(),
            response: "http://semem.org/vocab#response".to_string(),
            embedding: "http://semem.org/vocab#embedding".to_string(),
            concept: "http://semem.org/vocab#concept".to_string(),
            domain: "http://semem.org/vocab#domain".to_string(),
            tag: "http://semem.org/vocab#tag".to_string(),
            source: "http://semem.org/vocab#source".to_string(),
            importance: "http://semem.org/vocab#importance".to_string(),
            pending_processing: "http://semem.org/vocab#pendingProcessing".to_string(),
            parent: "http://semem.org/vocab#parent".to_string(),
            chunk_index: "http://semem.org/vocab#chunkIndex".to_string(),
            chunk_total: "http://semem.org/vocab#chunkTotal".to_string(),
            chunk_offset: "http://semem.org/vocab#chunkOffset".to_string(),
            chunk_length: "http://semem.org/vocab#chunkLength".to_string(),
            enhancement_source: "http://semem.org/vocab#enhancementSource".to_string(),
            enhancement_provider: "http://semem.org/vocab#enhancementProvider".to_string(),
            cache_ttl: "http://semem.org/vocab#cacheTtl".to_string(),
            linked_personal: "http://semem.org/vocab#linkedPersonal".to_string(),
            navigation_state: "http://semem.org/vocab#navigationState".to_string(),
            extra: "http://semem.org/vocab#extra".to_string(),
            vector_datatype: "http://semem.org/vocab#vector".to_string(),
            datetime_datatype: "http://www.w3.org/2001/XMLSchema#dateTime".to_string(),
        }
    }
}
