//! Memory manager
//!
//! Orchestrates the tell-side pipeline (chunking, embeddings, concept
//! extraction, index and graph updates, persistence) and the pure-read
//! retrieve path. Provider failures during `store` degrade to lazy records
//! instead of losing content; `process_lazy` completes them later.

use crate::chunker::Chunker;
use crate::config::{ChunkerConfig, RetrievalConfig};
use crate::deadline::Deadline;
use crate::embeddings::EmbeddingService;
use crate::error::{Error, Result};
use crate::graph::ConceptGraph;
use crate::index::VectorIndex;
use crate::llm::LlmService;
use crate::store::InteractionStore;
use crate::types::{ChunkInfo, Interaction, InteractionMetadata, MemoryKind, ScoredInteraction};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Result of a `store` call
#[derive(Debug, Clone)]
pub struct StoreOutcome {
    /// The root interaction (document, concept, or plain interaction)
    pub interaction: Interaction,
    /// Number of chunks produced (1 when the content was not chunked)
    pub chunk_count: usize,
    /// Number of concepts extracted across all pieces
    pub concepts_extracted: usize,
    /// Whether the record was stored lazily (processing still owed)
    pub lazy: bool,
}

/// Orchestrator for storage and pure-read retrieval
pub struct MemoryManager {
    store: Arc<InteractionStore>,
    embeddings: Arc<EmbeddingService>,
    llm: Arc<LlmService>,
    index: Arc<VectorIndex>,
    graph: Arc<ConceptGraph>,
    chunker: Chunker,
    retrieval: RetrievalConfig,
}

impl MemoryManager {
    /// Wire the manager over the engine's shared components
    pub fn new(
        store: Arc<InteractionStore>,
        embeddings: Arc<EmbeddingService>,
        llm: Arc<LlmService>,
        index: Arc<VectorIndex>,
        graph: Arc<ConceptGraph>,
        chunker_config: ChunkerConfig,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            store,
            embeddings,
            llm,
            index,
            graph,
            chunker: Chunker::new(chunker_config),
            retrieval,
        }
    }

    /// Store content.
    ///
    /// `lazy=true` persists the raw record only. Otherwise the full pipeline
    /// runs; an embedding failure downgrades to a lazy record with
    /// `pendingProcessing=true` rather than failing the verb, so content is
    /// durable even with providers offline.
    #[instrument(skip(self, content, metadata), fields(kind = %kind, len = content.len()))]
    pub async fn store(
        &self,
        kind: MemoryKind,
        content: &str,
        metadata: InteractionMetadata,
        lazy: bool,
        deadline: Deadline,
    ) -> Result<StoreOutcome> {
        if content.trim().is_empty() {
            return Err(Error::Validation("content must not be empty".to_string()));
        }

        let mut root = Interaction::new(kind, content.to_string(), String::new());
        merge_metadata(&mut root.metadata, metadata);

        if lazy {
            root.metadata.pending_processing = true;
            self.store.put(root.clone()).await;
            debug!(id = %root.id, "stored lazily by request");
            return Ok(StoreOutcome {
                interaction: root,
                chunk_count: 0,
                concepts_extracted: 0,
                lazy: true,
            });
        }

        match self.process_content(&mut root, content, deadline).await {
            Ok((chunks, concept_count)) => {
                let chunk_count = if chunks.is_empty() { 1 } else { chunks.len() };
                let mut records = vec![root.clone()];
                records.extend(chunks);
                self.store.put_all(records).await;
                Ok(StoreOutcome {
                    interaction: root,
                    chunk_count,
                    concepts_extracted: concept_count,
                    lazy: false,
                })
            }
            Err(err) if err.is_recoverable() => {
                // Durability over processing: keep the raw content, owe the rest
                warn!(id = %root.id, error = %err, "processing failed; storing lazily");
                root.metadata.pending_processing = true;
                root.embedding = None;
                root.concepts.clear();
                self.store.put(root.clone()).await;
                Ok(StoreOutcome {
                    interaction: root,
                    chunk_count: 0,
                    concepts_extracted: 0,
                    lazy: true,
                })
            }
            Err(err) => Err(err),
        }
    }

    /// Run embeddings + concept extraction + index/graph updates for `root`.
    ///
    /// Returns `(chunk records, total concepts)`. Nothing is persisted or
    /// indexed until every embedding has validated, so a dimension error
    /// leaves no partial state.
    async fn process_content(
        &self,
        root: &mut Interaction,
        content: &str,
        deadline: Deadline,
    ) -> Result<(Vec<Interaction>, usize)> {
        let title = root
            .metadata
            .title
            .clone()
            .unwrap_or_else(|| "Untitled".to_string());

        // Oversized content is chunked regardless of kind; the chunks are
        // the indexed retrieval unit and reconstruct the parent exactly.
        if !self.chunker.needs_chunking(content) {
            let embedding = self.embeddings.generate(content, deadline).await?;
            let concepts = self.llm.extract_concepts(content, deadline).await;
            root.embedding = Some(embedding.clone());
            root.concepts = concepts.clone();

            self.index.add(&root.id, embedding);
            self.index.schedule_flush();
            self.graph.observe(&root.id, &concepts);
            return Ok((Vec::new(), concepts.len()));
        }

        let pieces = self.chunker.chunk(content, &title);
        let texts: Vec<String> = pieces.iter().map(|p| p.text.clone()).collect();
        let embeddings = self.embeddings.generate_batch(&texts, deadline).await?;

        let mut chunk_records = Vec::with_capacity(pieces.len());
        let mut total_concepts = 0usize;
        let mut root_concepts: Vec<String> = Vec::new();

        for (piece, embedding) in pieces.iter().zip(embeddings) {
            let mut chunk = Interaction::new(
                MemoryKind::DocumentChunk,
                piece.text.clone(),
                String::new(),
            );
            chunk.metadata.domain = root.metadata.domain.clone();
            chunk.metadata.tags = root.metadata.tags.clone();
            chunk.metadata.source = root.metadata.source.clone();
            chunk.metadata.title = Some(piece.title.clone());
            chunk.chunk = Some(ChunkInfo {
                parent_id: root.id.clone(),
                index: piece.index,
                total_chunks: piece.total,
                offset: piece.offset,
                length: piece.length,
            });

            let concepts = self.llm.extract_concepts(&piece.text, deadline).await;
            total_concepts += concepts.len();
            for concept in &concepts {
                if !root_concepts.contains(concept) {
                    root_concepts.push(concept.clone());
                }
            }
            chunk.embedding = Some(embedding.clone());
            chunk.concepts = concepts.clone();

            self.index.add(&chunk.id, embedding);
            self.graph.observe(&chunk.id, &concepts);
            chunk_records.push(chunk);
        }
        self.index.schedule_flush();

        root.concepts = root_concepts;
        info!(id = %root.id, chunks = chunk_records.len(), "content chunked and indexed");
        Ok((chunk_records, total_concepts))
    }

    /// Pure-read retrieval over the local index.
    ///
    /// Ties within epsilon order by recency, then ID.
    #[instrument(skip(self, query))]
    pub async fn retrieve(
        &self,
        query: &str,
        limit: usize,
        threshold: f32,
        deadline: Deadline,
    ) -> Result<Vec<ScoredInteraction>> {
        let embedding = self.embeddings.generate(query, deadline).await?;
        let hits = self.index.search(&embedding, limit.saturating_mul(2).max(limit));

        let mut scored = Vec::new();
        for (id, score) in hits {
            if score < threshold {
                continue;
            }
            if let Some(interaction) = self.store.get(&id, deadline).await? {
                scored.push(ScoredInteraction { interaction, score });
            }
        }
        sort_with_tie_breaks(&mut scored, self.retrieval.tie_epsilon);
        scored.truncate(limit);
        Ok(scored)
    }

    /// Convert lazy records into fully processed ones, at most `limit` per
    /// call. Idempotent: completed records drop out of the lazy set.
    #[instrument(skip(self))]
    pub async fn process_lazy(&self, limit: usize, deadline: Deadline) -> Result<usize> {
        let ids = self.store.lazy_ids(deadline).await?;
        let mut processed = 0usize;

        for id in ids.into_iter().take(limit.max(1)) {
            if deadline.expired() {
                break;
            }
            let Some(mut interaction) = self.store.get(&id, deadline).await? else {
                continue;
            };
            if !interaction.metadata.pending_processing {
                continue;
            }

            let content = interaction.content();
            let embedding = match self.embeddings.generate(&content, deadline).await {
                Ok(embedding) => embedding,
                Err(err) if err.is_recoverable() => {
                    debug!(id = %id, error = %err, "lazy record still unprocessable");
                    continue;
                }
                Err(err) => return Err(err),
            };
            let concepts = self.llm.extract_concepts(&content, deadline).await;

            interaction.embedding = Some(embedding.clone());
            interaction.concepts = concepts.clone();
            interaction.metadata.pending_processing = false;

            self.index.add(&interaction.id, embedding);
            self.graph.observe(&interaction.id, &concepts);
            self.store.put(interaction).await;
            processed += 1;
        }
        if processed > 0 {
            self.index.schedule_flush();
            info!(processed, "lazy records completed");
        }
        Ok(processed)
    }

    /// The underlying interaction store
    #[must_use]
    pub fn store_handle(&self) -> Arc<InteractionStore> {
        Arc::clone(&self.store)
    }

    /// Deterministic chunk preview without storing anything
    #[must_use]
    pub fn chunk_preview(&self, content: &str, title: &str) -> Vec<crate::chunker::TextChunk> {
        self.chunker.chunk(content, title)
    }
}

fn merge_metadata(base: &mut InteractionMetadata, overlay: InteractionMetadata) {
    if overlay.domain.is_some() {
        base.domain = overlay.domain;
    }
    if !overlay.tags.is_empty() {
        base.tags = overlay.tags;
    }
    if overlay.source.is_some() {
        base.source = overlay.source;
    }
    if overlay.title.is_some() {
        base.title = overlay.title;
    }
    if overlay.importance.is_some() {
        base.importance = overlay.importance;
    }
    if overlay.created.is_some() {
        base.created = overlay.created;
    }
    base.extra.extend(overlay.extra);
}

/// Sort by score descending; ties within `epsilon` order by recency then ID.
///
/// Scores are quantized to epsilon-sized buckets so the comparator is a
/// total order.
pub fn sort_with_tie_breaks(items: &mut [ScoredInteraction], epsilon: f32) {
    let bucket = |score: f32| -> i64 {
        if epsilon > 0.0 && score.is_finite() {
            (score / epsilon).round() as i64
        } else {
            0
        }
    };
    items.sort_by(|a, b| {
        bucket(b.score)
            .cmp(&bucket(a.score))
            .then_with(|| {
                b.interaction
                    .created_at()
                    .cmp(&a.interaction.created_at())
            })
            .then_with(|| a.interaction.id.cmp(&b.interaction.id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EmbeddingConfig, GraphConfig, LlmConfig, ModelConfig, StoreConfig};
    use crate::embeddings::MockEmbeddingProvider;
    use crate::llm::MockChatProvider;
    use crate::store::{InMemoryTripleStore, Vocab};
    use std::time::Duration;

    struct Fixture {
        manager: MemoryManager,
        embedding_provider: Arc<MockEmbeddingProvider>,
        #[allow(dead_code)]
        chat_provider: Arc<MockChatProvider>,
        index: Arc<VectorIndex>,
        graph: Arc<ConceptGraph>,
        store: Arc<InteractionStore>,
    }

    fn fixture() -> Fixture {
        let backend = Arc::new(InMemoryTripleStore::new());
        let store = InteractionStore::new(backend, Vocab::default(), StoreConfig::default());
        let embedding_provider = Arc::new(MockEmbeddingProvider::new("mock", 64));
        let embeddings = Arc::new(EmbeddingService::new(
            embedding_provider.clone(),
            EmbeddingConfig {
                model: ModelConfig::custom("mock", 64),
                ..EmbeddingConfig::default()
            },
        ));
        let chat_provider = Arc::new(MockChatProvider::new("primary"));
        let llm = Arc::new(
            LlmService::new(vec![chat_provider.clone()], LlmConfig::default()).unwrap(),
        );
        let index = Arc::new(VectorIndex::new(Duration::from_millis(500)));
        let graph = Arc::new(ConceptGraph::new(GraphConfig::default()));
        let manager = MemoryManager::new(
            store.clone(),
            embeddings,
            llm,
            index.clone(),
            graph.clone(),
            ChunkerConfig::default(),
            RetrievalConfig::default(),
        );
        Fixture {
            manager,
            embedding_provider,
            chat_provider,
            index,
            graph,
            store,
        }
    }

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    #[tokio::test]
    async fn test_store_small_concept() {
        let fx = fixture();
        let outcome = fx
            .manager
            .store(
                MemoryKind::Concept,
                "Mitochondria produce ATP via cellular respiration.",
                InteractionMetadata::default(),
                false,
                deadline(),
            )
            .await
            .unwrap();

        assert!(!outcome.lazy);
        assert_eq!(outcome.chunk_count, 1);
        assert!(outcome.concepts_extracted >= 2);
        assert!(outcome.interaction.embedding.is_some());
        assert!(fx.index.contains(&outcome.interaction.id));
        assert!(fx.graph.contains("mitochondria"));
        assert!(fx
            .store
            .get(&outcome.interaction.id, deadline())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_store_large_document_chunks() {
        let fx = fixture();
        let content = "Cellular respiration converts glucose into ATP. ".repeat(250); // ~12k chars
        let outcome = fx
            .manager
            .store(
                MemoryKind::Document,
                &content,
                InteractionMetadata {
                    title: Some("X".into()),
                    ..InteractionMetadata::default()
                },
                false,
                deadline(),
            )
            .await
            .unwrap();

        let expected = content.len().div_ceil(2000);
        assert!(
            outcome.chunk_count == expected || outcome.chunk_count == expected + 1,
            "got {} chunks",
            outcome.chunk_count
        );
        // Root document carries no vector of its own; its chunks do
        assert!(outcome.interaction.embedding.is_none());
        assert!(!outcome.interaction.concepts.is_empty());
        assert!(fx.index.len() >= outcome.chunk_count);
    }

    #[tokio::test]
    async fn test_store_large_interaction_chunks_too() {
        let fx = fixture();
        let content = "long running note about the migration plan ".repeat(120); // ~5k chars
        let outcome = fx
            .manager
            .store(
                MemoryKind::Interaction,
                &content,
                InteractionMetadata::default(),
                false,
                deadline(),
            )
            .await
            .unwrap();

        // Chunking is size-driven, not kind-driven
        assert!(outcome.chunk_count >= 2, "got {}", outcome.chunk_count);
        assert!(outcome.interaction.embedding.is_none());
        assert!(!outcome.interaction.concepts.is_empty());
        assert!(fx.index.len() >= outcome.chunk_count);
    }

    #[tokio::test]
    async fn test_lazy_store_skips_processing() {
        let fx = fixture();
        let outcome = fx
            .manager
            .store(
                MemoryKind::Interaction,
                "note A",
                InteractionMetadata::default(),
                true,
                deadline(),
            )
            .await
            .unwrap();

        assert!(outcome.lazy);
        assert!(outcome.interaction.embedding.is_none());
        assert!(outcome.interaction.metadata.pending_processing);
        assert_eq!(fx.embedding_provider.call_count(), 0);
        assert!(!fx.index.contains(&outcome.interaction.id));
    }

    #[tokio::test]
    async fn test_embedding_failure_degrades_to_lazy() {
        let fx = fixture();
        fx.embedding_provider.set_failing(true);
        let outcome = fx
            .manager
            .store(
                MemoryKind::Interaction,
                "durable even when providers are down",
                InteractionMetadata::default(),
                false,
                deadline(),
            )
            .await
            .unwrap();

        assert!(outcome.lazy);
        assert!(outcome.interaction.metadata.pending_processing);
        // Nothing partial: not indexed, no embedding
        assert!(!fx.index.contains(&outcome.interaction.id));
        assert!(fx
            .store
            .get(&outcome.interaction.id, deadline())
            .await
            .unwrap()
            .is_some());
    }

    #[tokio::test]
    async fn test_process_lazy_completes_records() {
        let fx = fixture();
        let outcome = fx
            .manager
            .store(
                MemoryKind::Interaction,
                "note A about chemistry",
                InteractionMetadata::default(),
                true,
                deadline(),
            )
            .await
            .unwrap();

        let processed = fx.manager.process_lazy(10, deadline()).await.unwrap();
        assert_eq!(processed, 1);

        let completed = fx
            .store
            .get(&outcome.interaction.id, deadline())
            .await
            .unwrap()
            .unwrap();
        assert!(!completed.metadata.pending_processing);
        assert!(completed.embedding.is_some());
        assert!(fx.index.contains(&outcome.interaction.id));

        // Idempotent
        let again = fx.manager.process_lazy(10, deadline()).await.unwrap();
        assert_eq!(again, 0);
    }

    #[tokio::test]
    async fn test_retrieve_round_trip() {
        let fx = fixture();
        fx.manager
            .store(
                MemoryKind::Concept,
                "Mitochondria produce ATP via cellular respiration.",
                InteractionMetadata::default(),
                false,
                deadline(),
            )
            .await
            .unwrap();
        fx.manager
            .store(
                MemoryKind::Concept,
                "The borrow checker enforces ownership rules.",
                InteractionMetadata::default(),
                false,
                deadline(),
            )
            .await
            .unwrap();

        let results = fx
            .manager
            .retrieve("How do cells produce ATP energy?", 1, 0.0, deadline())
            .await
            .unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].interaction.prompt.contains("Mitochondria"));
    }

    #[tokio::test]
    async fn test_empty_content_rejected() {
        let fx = fixture();
        let result = fx
            .manager
            .store(
                MemoryKind::Interaction,
                "   ",
                InteractionMetadata::default(),
                false,
                deadline(),
            )
            .await;
        assert!(matches!(result, Err(Error::Validation(_))));
    }

    #[test]
    fn test_tie_break_ordering() {
        let older = {
            let mut i = Interaction::new(MemoryKind::Concept, "a".into(), String::new());
            i.metadata.created = Some(chrono::Utc::now() - chrono::Duration::hours(1));
            i
        };
        let newer = Interaction::new(MemoryKind::Concept, "b".into(), String::new());
        let mut items = vec![
            ScoredInteraction {
                interaction: older,
                score: 0.5,
            },
            ScoredInteraction {
                interaction: newer.clone(),
                score: 0.5 + 1e-8,
            },
        ];
        sort_with_tie_breaks(&mut items, 1e-6);
        // Within epsilon: recency wins
        assert_eq!(items[0].interaction.id, newer.id);
    }
}
