//! The engine value
//!
//! One explicit [`SememEngine`] owns every shared component: the store
//! facade, vector index, concept graph, provider services, enhancement
//! coordinator, and session registry. The top-level caller builds it once
//! and threads it through; there is no module-level global state.

use crate::config::EngineConfig;
use crate::deadline::Deadline;
use crate::embeddings::{EmbeddingProvider, EmbeddingService};
use crate::enhancement::{EnhancementCoordinator, EnhancementProvider, HypotheticalProvider};
use crate::error::{Error, Result};
use crate::graph::ConceptGraph;
use crate::index::VectorIndex;
use crate::llm::{ChatProvider, LlmService};
use crate::memory::MemoryManager;
use crate::retriever::HybridRetriever;
use crate::session::SessionRegistry;
use crate::store::{InMemoryTripleStore, InteractionStore, TripleStore, Vocab};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// The verb engine: every shared store, index, and provider pool
pub struct SememEngine {
    pub(crate) config: EngineConfig,
    pub(crate) store: Arc<InteractionStore>,
    pub(crate) embeddings: Arc<EmbeddingService>,
    pub(crate) llm: Arc<LlmService>,
    pub(crate) index: Arc<VectorIndex>,
    pub(crate) graph: Arc<ConceptGraph>,
    pub(crate) coordinator: Arc<EnhancementCoordinator>,
    pub(crate) manager: MemoryManager,
    pub(crate) retriever: HybridRetriever,
    pub(crate) sessions: SessionRegistry,
}

/// Builder wiring providers and the backing store into an engine
pub struct SememEngineBuilder {
    config: EngineConfig,
    triple_store: Option<Arc<dyn TripleStore>>,
    vocab: Vocab,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chat_providers: Vec<Arc<dyn ChatProvider>>,
    enhancement_providers: Vec<Arc<dyn EnhancementProvider>>,
}

impl SememEngineBuilder {
    /// Start a builder from configuration
    #[must_use]
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            triple_store: None,
            vocab: Vocab::default(),
            embedding_provider: None,
            chat_providers: Vec::new(),
            enhancement_providers: Vec::new(),
        }
    }

    /// Use a concrete triple store backend (defaults to in-memory)
    #[must_use]
    pub fn triple_store(mut self, store: Arc<dyn TripleStore>) -> Self {
        self.triple_store = Some(store);
        self
    }

    /// Override the predicate vocabulary
    #[must_use]
    pub fn vocab(mut self, vocab: Vocab) -> Self {
        self.vocab = vocab;
        self
    }

    /// Set the embedding provider
    #[must_use]
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the chat failover chain (priority order)
    #[must_use]
    pub fn chat_providers(mut self, providers: Vec<Arc<dyn ChatProvider>>) -> Self {
        self.chat_providers = providers;
        self
    }

    /// Set the enhancement providers
    #[must_use]
    pub fn enhancement_providers(
        mut self,
        providers: Vec<Arc<dyn EnhancementProvider>>,
    ) -> Self {
        self.enhancement_providers = providers;
        self
    }

    /// Assemble the engine, probing the store for liveness.
    ///
    /// An unreachable store is not fatal: the engine starts degraded
    /// (session-cache-only) and flushes once the store is reachable.
    pub async fn build(self) -> Result<Arc<SememEngine>> {
        let embedding_provider = self.embedding_provider.ok_or_else(|| {
            Error::Validation("an embedding provider is required".to_string())
        })?;
        if self.chat_providers.is_empty() {
            return Err(Error::Validation(
                "at least one chat provider is required".to_string(),
            ));
        }

        let backend: Arc<dyn TripleStore> = self
            .triple_store
            .unwrap_or_else(|| Arc::new(InMemoryTripleStore::new()));
        let store = InteractionStore::new(backend, self.vocab, self.config.store.clone());

        let probe = Deadline::after(self.config.store.query_timeout);
        if store.probe_startup(probe).await {
            info!("persistent store reachable");
        }

        let embeddings = Arc::new(EmbeddingService::new(
            embedding_provider,
            self.config.embedding.clone(),
        ));
        let llm = Arc::new(LlmService::new(
            self.chat_providers,
            self.config.llm.clone(),
        )?);
        let index = Arc::new(VectorIndex::new(self.config.store.flush_debounce));
        let graph = Arc::new(ConceptGraph::new(self.config.graph.clone()));

        // Hypothetical expansion rides the engine's own LLM chain; wire it
        // unless the caller supplied their own implementation.
        let mut enhancement_providers = self.enhancement_providers;
        if !enhancement_providers
            .iter()
            .any(|p| p.kind() == crate::types::EnhancementProviderKind::Hypothetical)
        {
            enhancement_providers.push(Arc::new(HypotheticalProvider::new(
                Arc::clone(&llm),
                self.config.enhancement.provider_timeout,
            )));
        }
        let coordinator = Arc::new(EnhancementCoordinator::new(
            enhancement_providers,
            self.config.enhancement.clone(),
        ));

        let manager = MemoryManager::new(
            Arc::clone(&store),
            Arc::clone(&embeddings),
            Arc::clone(&llm),
            Arc::clone(&index),
            Arc::clone(&graph),
            self.config.chunker.clone(),
            self.config.retrieval.clone(),
        );
        let retriever = HybridRetriever::new(
            Arc::clone(&embeddings),
            Arc::clone(&llm),
            Arc::clone(&index),
            Arc::clone(&graph),
            Arc::clone(&store),
            Arc::clone(&coordinator),
            self.config.retrieval.clone(),
        );
        let sessions = SessionRegistry::new(Arc::clone(&store), self.config.session.clone());

        Ok(Arc::new(SememEngine {
            config: self.config,
            store,
            embeddings,
            llm,
            index,
            graph,
            coordinator,
            manager,
            retriever,
            sessions,
        }))
    }
}

impl SememEngine {
    /// The engine configuration
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Whether the store is currently degraded (buffer-only)
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.store.is_degraded()
    }

    /// Warm-up pass: populate the vector index from the store and ping
    /// providers. The index is pure cache, so a cold start without warm-up
    /// just fills lazily on first use.
    pub async fn warmup(&self) -> Result<usize> {
        let deadline = Deadline::after(self.config.retrieval.total_deadline);
        let embedded = self.store.all_embedded(deadline).await?;
        let count = embedded.len();
        for (id, vector) in embedded {
            self.index.add(&id, vector);
        }
        self.index.flush();

        if let Err(err) = self.embeddings.warmup().await {
            warn!(error = %err, "embedding provider warmup failed");
        }
        info!(indexed = count, "warmup complete");
        Ok(count)
    }

    /// Drain all buffered writes immediately (tests and shutdown)
    pub async fn flush(&self) -> Result<usize> {
        self.index.flush();
        let deadline = Deadline::after(self.config.store.query_timeout);
        self.store.flush_now(deadline).await
    }

    /// Spawn background maintenance: periodic concept-graph decay and idle
    /// session eviction. Handles abort on drop by the caller.
    pub fn spawn_maintenance(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::new();

        let engine = Arc::clone(self);
        let decay_interval = engine.config.graph.decay_interval;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(decay_interval);
            ticker.tick().await; // first tick is immediate; skip it
            loop {
                ticker.tick().await;
                engine.graph.decay_edges();
            }
        }));

        let engine = Arc::clone(self);
        let sweep_interval = engine.config.session.session_ttl / 4;
        handles.push(tokio::spawn(async move {
            let mut ticker = tokio::time::interval(sweep_interval.max(
                std::time::Duration::from_secs(60),
            ));
            ticker.tick().await;
            loop {
                ticker.tick().await;
                engine.sessions.evict_idle().await;
            }
        }));

        handles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embeddings::MockEmbeddingProvider;
    use crate::llm::MockChatProvider;

    fn config() -> EngineConfig {
        let mut config = EngineConfig::default();
        config.embedding.model = crate::config::ModelConfig::custom("mock", 64);
        config
    }

    #[tokio::test]
    async fn test_build_requires_providers() {
        let result = SememEngineBuilder::new(config()).build().await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[tokio::test]
    async fn test_build_with_defaults() {
        let engine = SememEngineBuilder::new(config())
            .embedding_provider(Arc::new(MockEmbeddingProvider::new("mock", 64)))
            .chat_providers(vec![Arc::new(MockChatProvider::new("primary"))])
            .build()
            .await
            .unwrap();
        assert!(!engine.is_degraded());
    }

    #[tokio::test]
    async fn test_degraded_start_when_store_down() {
        let backend = Arc::new(InMemoryTripleStore::new());
        backend.set_unavailable(true);
        let engine = SememEngineBuilder::new(config())
            .triple_store(backend)
            .embedding_provider(Arc::new(MockEmbeddingProvider::new("mock", 64)))
            .chat_providers(vec![Arc::new(MockChatProvider::new("primary"))])
            .build()
            .await
            .unwrap();
        assert!(engine.is_degraded());
    }
}
