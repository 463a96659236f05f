#![allow(clippy::cast_precision_loss)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_docs_in_private_items)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::float_cmp)]

//! # Semem Core
//!
//! Semantic-memory verb engine for AI agents: ingest text (`tell`), answer
//! questions against stored material (`ask`), and steer retrieval through a
//! per-session zoom/pan/tilt navigation state.
//!
//! ## Architecture
//!
//! One explicit [`SememEngine`] value owns every shared component — no
//! global state. Twelve verbs enter through [`SememEngine::execute`] and
//! come back as uniform envelopes with typed error kinds.
//!
//! - [`memory`]: tell-side orchestration (chunking, embeddings, concepts,
//!   index/graph updates, lazy degradation)
//! - [`retriever`]: ask-side hybrid retrieval (local vector/graph branch in
//!   parallel with the enhancement branch, weighted merge, synthesis)
//! - [`enhancement`]: external-knowledge providers behind a normalized cache
//! - [`store`]: triple-pattern persistence protocol, write debouncing, lazy
//!   loading, degraded mode
//! - [`embeddings`] / [`llm`]: provider interfaces with dimension
//!   enforcement and failover
//! - [`index`] / [`graph`]: in-memory vector index and concept graph
//! - [`zpt`] / [`session`]: navigation state and session registry
//!
//! ## Quick Start
//!
//! ```no_run
//! use semem_core::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> semem_core::Result<()> {
//!     let engine = SememEngineBuilder::new(EngineConfig::default())
//!         .embedding_provider(Arc::new(MockEmbeddingProvider::new("mock", 768)))
//!         .chat_providers(vec![Arc::new(MockChatProvider::new("primary"))])
//!         .build()
//!         .await?;
//!
//!     let told = engine
//!         .execute(VerbRequest::new(
//!             "tell",
//!             json!({"content": "Mitochondria produce ATP.", "type": "concept"}),
//!         ))
//!         .await;
//!     assert!(told.success);
//!
//!     let asked = engine
//!         .execute(VerbRequest::new(
//!             "ask",
//!             json!({"question": "How do cells produce energy?"}),
//!         ))
//!         .await;
//!     println!("{}", asked.result.unwrap()["answer"]);
//!     Ok(())
//! }
//! ```

pub mod chunker;
pub mod config;
pub mod deadline;
pub mod embeddings;
pub mod engine;
pub mod enhancement;
pub mod error;
pub mod graph;
pub mod index;
pub mod llm;
pub mod memory;
pub mod metrics;
pub mod retriever;
pub mod session;
pub mod store;
pub mod types;
pub mod verbs;
pub mod zpt;

// Core types
pub use types::{
    derive_enhancement_id, derive_id, ChunkInfo, ContextSource, EnhancementInfo,
    EnhancementProviderKind, Importance, Interaction, InteractionMetadata, MemoryKind,
    ScoredInteraction,
};

// Engine surface
pub use engine::{SememEngine, SememEngineBuilder};
pub use verbs::{Diagnostics, VerbRequest, VerbResponse, VERBS};

// Errors and deadlines
pub use deadline::Deadline;
pub use error::{Error, ErrorKind, Result};

// Configuration
pub use config::{
    ChunkStrategy, ChunkerConfig, EmbeddingConfig, EngineConfig, EnhancementConfig, GraphConfig,
    LlmConfig, ModelConfig, RetrievalConfig, SessionConfig, StoreConfig, WeightPolicy, WeightSet,
};

// Components
pub use chunker::{Chunker, TextChunk};
pub use embeddings::{
    cosine_similarity, EmbeddingProvider, EmbeddingService, MockEmbeddingProvider,
};
pub use enhancement::{
    normalize_question, EnhancementCoordinator, EnhancementOutcome, EnhancementProvider,
    HypotheticalProvider, MockEnhancementProvider,
};
pub use graph::ConceptGraph;
pub use index::VectorIndex;
pub use llm::{ChatOutcome, ChatProvider, LlmService, MockChatProvider};
pub use memory::{MemoryManager, StoreOutcome};
pub use metrics::CacheMetrics;
pub use retriever::{AskOptions, AskOutcome, HybridRetriever, RetrievalMode};
pub use session::{Session, SessionRegistry};
pub use store::{
    BindingRow, InMemoryTripleStore, InteractionStore, Mutation, Term, Triple, TriplePattern,
    TripleStore, Vocab,
};
pub use zpt::{NavigationState, PanFilter, TemporalRange, TiltStyle, ZoomLevel};

#[cfg(feature = "http-providers")]
pub use embeddings::RemoteEmbeddingProvider;
#[cfg(feature = "http-providers")]
pub use enhancement::{EncyclopedicLookupProvider, FactualLookupProvider};
#[cfg(feature = "http-providers")]
pub use llm::RemoteChatProvider;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Convenient imports for common usage
pub mod prelude {
    pub use crate::{
        AskOptions, Deadline, EngineConfig, Error, ErrorKind, Interaction, InteractionMetadata,
        MemoryKind, MockChatProvider, MockEmbeddingProvider, NavigationState, Result,
        RetrievalMode, ScoredInteraction, SememEngine, SememEngineBuilder, TiltStyle, VerbRequest,
        VerbResponse, ZoomLevel,
    };
}
