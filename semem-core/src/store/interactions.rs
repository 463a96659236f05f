//! Typed interaction persistence over a [`TripleStore`]
//!
//! Maps [`Interaction`]s to and from triples, buffers writes behind a
//! debounced flush, lazily loads records into an LRU cache, and degrades to
//! buffer-only operation when the backend is unreachable. Reads always see
//! buffered writes, which keeps read-your-writes inside the flush window.

use super::{Mutation, Term, Triple, TriplePattern, TripleStore, Vocab};
use crate::config::StoreConfig;
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::metrics::CacheMetrics;
use crate::types::{
    ChunkInfo, EnhancementInfo, EnhancementProviderKind, Importance, Interaction,
    InteractionMetadata, MemoryKind,
};
use crate::zpt::NavigationState;
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Interaction persistence facade with write buffering and lazy loading
pub struct InteractionStore {
    store: Arc<dyn TripleStore>,
    vocab: Vocab,
    config: StoreConfig,
    cache: Mutex<LruCache<String, Interaction>>,
    metrics: Mutex<CacheMetrics>,
    pending: tokio::sync::Mutex<HashMap<String, Interaction>>,
    degraded: AtomicBool,
    flush_scheduled: AtomicBool,
}

impl InteractionStore {
    /// Create a facade over `store`
    pub fn new(store: Arc<dyn TripleStore>, vocab: Vocab, config: StoreConfig) -> Arc<Self> {
        let capacity =
            NonZeroUsize::new(config.cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        let metrics = CacheMetrics {
            capacity: capacity.get(),
            ..CacheMetrics::default()
        };
        Arc::new(Self {
            store,
            vocab,
            config,
            cache: Mutex::new(LruCache::new(capacity)),
            metrics: Mutex::new(metrics),
            pending: tokio::sync::Mutex::new(HashMap::new()),
            degraded: AtomicBool::new(false),
            flush_scheduled: AtomicBool::new(false),
        })
    }

    /// Probe the backend at startup; unreachable stores put the engine in
    /// degraded buffer-only mode with a clear diagnostic.
    pub async fn probe_startup(&self, deadline: Deadline) -> bool {
        match self.store.probe(deadline).await {
            Ok(()) => {
                self.degraded.store(false, Ordering::SeqCst);
                true
            }
            Err(err) => {
                warn!(error = %err, "persistent store unreachable; starting in degraded session-cache-only mode");
                self.degraded.store(true, Ordering::SeqCst);
                false
            }
        }
    }

    /// Whether the store is in degraded (buffer-only) mode
    pub fn is_degraded(&self) -> bool {
        self.degraded.load(Ordering::SeqCst)
    }

    /// Buffer `interaction` and schedule a debounced flush
    pub async fn put(self: &Arc<Self>, interaction: Interaction) {
        {
            let mut pending = self.pending.lock().await;
            pending.insert(interaction.id.clone(), interaction);
        }
        self.schedule_flush();
    }

    /// Buffer several interactions atomically and schedule one flush
    pub async fn put_all(self: &Arc<Self>, interactions: Vec<Interaction>) {
        {
            let mut pending = self.pending.lock().await;
            for interaction in interactions {
                pending.insert(interaction.id.clone(), interaction);
            }
        }
        self.schedule_flush();
    }

    /// Fetch by ID: buffered writes first, then the LRU cache, then the
    /// backend (populating the cache on the way back)
    pub async fn get(&self, id: &str, deadline: Deadline) -> Result<Option<Interaction>> {
        {
            let pending = self.pending.lock().await;
            if let Some(interaction) = pending.get(id) {
                return Ok(Some(interaction.clone()));
            }
        }
        {
            let mut cache = self.cache.lock();
            let mut metrics = self.metrics.lock();
            if let Some(interaction) = cache.get(id) {
                metrics.hits += 1;
                return Ok(Some(interaction.clone()));
            }
            metrics.misses += 1;
        }
        if self.is_degraded() {
            return Ok(None);
        }

        let pattern = TriplePattern::subject(&self.config.content_graph, id);
        let triples = self.store.construct(&pattern, deadline).await?;
        if triples.is_empty() {
            return Ok(None);
        }
        let interaction = self.decode(id, &triples)?;
        self.cache_put(interaction.clone());
        Ok(Some(interaction))
    }

    /// Whether `id` exists (buffered or durable)
    pub async fn exists(&self, id: &str, deadline: Deadline) -> Result<bool> {
        {
            let pending = self.pending.lock().await;
            if pending.contains_key(id) {
                return Ok(true);
            }
        }
        if self.cache.lock().contains(id) {
            return Ok(true);
        }
        if self.is_degraded() {
            return Ok(false);
        }
        self.store
            .ask(
                &TriplePattern::subject(&self.config.content_graph, id),
                deadline,
            )
            .await
    }

    /// Drain the write buffer into one transactional batch.
    ///
    /// On backend failure the drained records return to the buffer and the
    /// store flips to degraded mode; a later flush retries.
    pub async fn flush_now(&self, deadline: Deadline) -> Result<usize> {
        let drained: Vec<Interaction> = {
            let mut pending = self.pending.lock().await;
            pending.drain().map(|(_, v)| v).collect()
        };
        if drained.is_empty() {
            return Ok(0);
        }

        let mut mutations = Vec::new();
        for interaction in &drained {
            // Idempotent overwrite: clear the subject, then re-insert
            mutations.push(Mutation::Delete(TriplePattern::subject(
                &self.config.content_graph,
                &interaction.id,
            )));
            mutations.extend(self.encode(interaction));
        }

        match self.store.batch(mutations, deadline).await {
            Ok(()) => {
                let count = drained.len();
                for interaction in drained {
                    self.cache_put(interaction);
                }
                if self.degraded.swap(false, Ordering::SeqCst) {
                    info!("persistent store reachable again; buffered writes flushed");
                }
                debug!(count, "interaction flush complete");
                Ok(count)
            }
            Err(err) => {
                warn!(error = %err, "interaction flush failed; keeping writes buffered");
                let mut pending = self.pending.lock().await;
                for interaction in drained {
                    pending.entry(interaction.id.clone()).or_insert(interaction);
                }
                self.degraded.store(true, Ordering::SeqCst);
                Err(err)
            }
        }
    }

    /// Number of writes waiting for a flush
    pub async fn pending_len(&self) -> usize {
        self.pending.lock().await.len()
    }

    /// Lazy-load cache counters
    pub fn cache_metrics(&self) -> CacheMetrics {
        let mut metrics = self.metrics.lock().clone();
        metrics.size = self.cache.lock().len();
        metrics
    }

    /// IDs of records still flagged `pendingProcessing`, buffer included
    pub async fn lazy_ids(&self, deadline: Deadline) -> Result<Vec<String>> {
        let mut ids: Vec<String> = {
            let pending = self.pending.lock().await;
            pending
                .values()
                .filter(|i| i.metadata.pending_processing)
                .map(|i| i.id.clone())
                .collect()
        };
        if !self.is_degraded() {
            let pattern = TriplePattern::predicate_object(
                &self.config.content_graph,
                &self.vocab.pending_processing,
                Term::Literal("true".to_string()),
            );
            for row in self.store.select(&pattern, deadline).await? {
                if let Some(term) = row.get("s") {
                    let id = term.lexical().to_string();
                    if !ids.contains(&id) {
                        ids.push(id);
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// All `(id, embedding)` pairs, for index warm-up and rebuild
    pub async fn all_embedded(&self, deadline: Deadline) -> Result<Vec<(String, Vec<f32>)>> {
        let mut out: Vec<(String, Vec<f32>)> = {
            let pending = self.pending.lock().await;
            pending
                .values()
                .filter_map(|i| i.embedding.clone().map(|e| (i.id.clone(), e)))
                .collect()
        };
        if !self.is_degraded() {
            let pattern = TriplePattern {
                graph: self.config.content_graph.clone(),
                predicate: Some(self.vocab.embedding.clone()),
                ..TriplePattern::default()
            };
            for row in self.store.select(&pattern, deadline).await? {
                let (Some(subject), Some(object)) = (row.get("s"), row.get("o")) else {
                    continue;
                };
                let id = subject.lexical().to_string();
                if out.iter().any(|(existing, _)| *existing == id) {
                    continue;
                }
                if let Ok(vector) = serde_json::from_str::<Vec<f32>>(object.lexical()) {
                    out.push((id, vector));
                }
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }

    /// Persist a session's navigation state in the session graph
    pub async fn save_navigation(
        &self,
        session_id: &str,
        state: &NavigationState,
        deadline: Deadline,
    ) -> Result<()> {
        if self.is_degraded() {
            // State lives in the session registry until the store returns
            return Ok(());
        }
        let subject = format!("semem:session:{session_id}");
        let mutations = vec![
            Mutation::Delete(TriplePattern::subject(&self.config.session_graph, &subject)),
            Mutation::Insert {
                graph: self.config.session_graph.clone(),
                triple: Triple::new(
                    &subject,
                    &self.vocab.navigation_state,
                    Term::Literal(serde_json::to_string(state)?),
                ),
            },
        ];
        self.store.batch(mutations, deadline).await
    }

    /// Load a session's persisted navigation state, if any
    pub async fn load_navigation(
        &self,
        session_id: &str,
        deadline: Deadline,
    ) -> Result<Option<NavigationState>> {
        if self.is_degraded() {
            return Ok(None);
        }
        let subject = format!("semem:session:{session_id}");
        let triples = self
            .store
            .construct(
                &TriplePattern::subject(&self.config.session_graph, &subject),
                deadline,
            )
            .await?;
        for triple in triples {
            if triple.predicate == self.vocab.navigation_state {
                let state = serde_json::from_str(triple.object.lexical())?;
                return Ok(Some(state));
            }
        }
        Ok(None)
    }

    fn cache_put(&self, interaction: Interaction) {
        let mut cache = self.cache.lock();
        let mut metrics = self.metrics.lock();
        if cache.len() == cache.cap().get() && !cache.contains(&interaction.id) {
            metrics.evictions += 1;
        }
        cache.put(interaction.id.clone(), interaction);
        metrics.size = cache.len();
    }

    fn schedule_flush(self: &Arc<Self>) {
        if self
            .flush_scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let store = Arc::clone(self);
        let debounce = self.config.flush_debounce;
        let timeout = self.config.query_timeout;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            store.flush_scheduled.store(false, Ordering::SeqCst);
            let _ = store.flush_now(Deadline::after(timeout)).await;
        });
    }

    // ========== triple mapping ==========

    fn literal(value: impl Into<String>) -> Term {
        Term::Literal(value.into())
    }

    fn encode(&self, interaction: &Interaction) -> Vec<Mutation> {
        let graph = &self.config.content_graph;
        let id = &interaction.id;
        let v = &self.vocab;
        let mut triples = vec![
            Triple::new(id, &v.rdf_type, Term::Iri(format!("http://semem.org/vocab#{}", interaction.kind))),
            Triple::new(id, &v.kind, Self::literal(interaction.kind.to_string())),
            Triple::new(id, &v.prompt, Self::literal(&interaction.prompt)),
            Triple::new(id, &v.response, Self::literal(&interaction.response)),
        ];

        if let Some(created) = interaction.metadata.created {
            triples.push(Triple::new(
                id,
                &v.created,
                Term::Typed {
                    value: created.to_rfc3339(),
                    datatype: v.datetime_datatype.clone(),
                },
            ));
        }
        if let Some(embedding) = &interaction.embedding {
            triples.push(Triple::new(
                id,
                &v.embedding,
                Term::Typed {
                    value: serde_json::to_string(embedding).unwrap_or_default(),
                    datatype: v.vector_datatype.clone(),
                },
            ));
        }
        for concept in &interaction.concepts {
            triples.push(Triple::new(id, &v.concept, Self::literal(concept)));
        }
        if let Some(domain) = &interaction.metadata.domain {
            triples.push(Triple::new(id, &v.domain, Self::literal(domain)));
        }
        for tag in &interaction.metadata.tags {
            triples.push(Triple::new(id, &v.tag, Self::literal(tag)));
        }
        if let Some(source) = &interaction.metadata.source {
            triples.push(Triple::new(id, &v.source, Self::literal(source)));
        }
        if let Some(title) = &interaction.metadata.title {
            triples.push(Triple::new(id, &v.rdfs_label, Self::literal(title)));
        }
        if let Some(importance) = interaction.metadata.importance {
            let label = serde_json::to_value(importance)
                .ok()
                .and_then(|val| val.as_str().map(str::to_string))
                .unwrap_or_default();
            triples.push(Triple::new(id, &v.importance, Self::literal(label)));
        }
        if interaction.metadata.pending_processing {
            triples.push(Triple::new(id, &v.pending_processing, Self::literal("true")));
        }
        if !interaction.metadata.extra.is_empty() {
            triples.push(Triple::new(
                id,
                &v.extra,
                Self::literal(
                    serde_json::to_string(&interaction.metadata.extra).unwrap_or_default(),
                ),
            ));
        }
        if let Some(chunk) = &interaction.chunk {
            triples.push(Triple::new(id, &v.parent, Term::Iri(chunk.parent_id.clone())));
            triples.push(Triple::new(id, &v.chunk_index, Self::literal(chunk.index.to_string())));
            triples.push(Triple::new(id, &v.chunk_total, Self::literal(chunk.total_chunks.to_string())));
            triples.push(Triple::new(id, &v.chunk_offset, Self::literal(chunk.offset.to_string())));
            triples.push(Triple::new(id, &v.chunk_length, Self::literal(chunk.length.to_string())));
        }
        if let Some(enhancement) = &interaction.enhancement {
            triples.push(Triple::new(id, &v.enhancement_source, Self::literal(&enhancement.source_query)));
            triples.push(Triple::new(id, &v.enhancement_provider, Self::literal(enhancement.provider.to_string())));
            triples.push(Triple::new(id, &v.cache_ttl, Self::literal(enhancement.cache_ttl_secs.to_string())));
            for linked in &enhancement.linked_personal_ids {
                triples.push(Triple::new(id, &v.linked_personal, Term::Iri(linked.clone())));
            }
        }

        triples
            .into_iter()
            .map(|triple| Mutation::Insert {
                graph: graph.clone(),
                triple,
            })
            .collect()
    }

    fn decode(&self, id: &str, triples: &[Triple]) -> Result<Interaction> {
        let v = &self.vocab;
        let mut kind = None;
        let mut prompt = String::new();
        let mut response = String::new();
        let mut embedding = None;
        let mut concepts = Vec::new();
        let mut metadata = InteractionMetadata::default();
        let mut chunk_fields: HashMap<&str, String> = HashMap::new();
        let mut parent_id = None;
        let mut enh_query = None;
        let mut enh_provider = None;
        let mut enh_ttl = None;
        let mut enh_linked = Vec::new();

        for triple in triples {
            let value = triple.object.lexical();
            let p = triple.predicate.as_str();
            if p == v.kind {
                kind = Some(parse_kind(value)?);
            } else if p == v.prompt {
                prompt = value.to_string();
            } else if p == v.response {
                response = value.to_string();
            } else if p == v.embedding {
                embedding = Some(serde_json::from_str::<Vec<f32>>(value)?);
            } else if p == v.concept {
                concepts.push(value.to_string());
            } else if p == v.domain {
                metadata.domain = Some(value.to_string());
            } else if p == v.tag {
                metadata.tags.push(value.to_string());
            } else if p == v.source {
                metadata.source = Some(value.to_string());
            } else if p == v.rdfs_label {
                metadata.title = Some(value.to_string());
            } else if p == v.created {
                metadata.created = chrono::DateTime::parse_from_rfc3339(value)
                    .ok()
                    .map(|dt| dt.with_timezone(&chrono::Utc));
            } else if p == v.importance {
                metadata.importance =
                    serde_json::from_value(serde_json::Value::String(value.to_string())).ok();
            } else if p == v.pending_processing {
                metadata.pending_processing = value == "true";
            } else if p == v.extra {
                metadata.extra = serde_json::from_str(value).unwrap_or_default();
            } else if p == v.parent {
                parent_id = Some(value.to_string());
            } else if p == v.chunk_index {
                chunk_fields.insert("index", value.to_string());
            } else if p == v.chunk_total {
                chunk_fields.insert("total", value.to_string());
            } else if p == v.chunk_offset {
                chunk_fields.insert("offset", value.to_string());
            } else if p == v.chunk_length {
                chunk_fields.insert("length", value.to_string());
            } else if p == v.enhancement_source {
                enh_query = Some(value.to_string());
            } else if p == v.enhancement_provider {
                enh_provider = parse_provider(value);
            } else if p == v.cache_ttl {
                enh_ttl = value.parse::<u64>().ok();
            } else if p == v.linked_personal {
                enh_linked.push(value.to_string());
            }
        }

        let kind = kind
            .ok_or_else(|| Error::Internal(format!("stored record {id} has no kind triple")))?;

        let chunk = parent_id.map(|parent_id| ChunkInfo {
            parent_id,
            index: parse_usize(&chunk_fields, "index"),
            total_chunks: parse_usize(&chunk_fields, "total"),
            offset: parse_usize(&chunk_fields, "offset"),
            length: parse_usize(&chunk_fields, "length"),
        });

        let enhancement = match (enh_query, enh_provider) {
            (Some(source_query), Some(provider)) => Some(EnhancementInfo {
                source_query,
                provider,
                cache_ttl_secs: enh_ttl.unwrap_or(0),
                linked_personal_ids: enh_linked,
            }),
            _ => None,
        };

        concepts.sort();
        Ok(Interaction {
            id: id.to_string(),
            prompt,
            response,
            embedding,
            concepts,
            kind,
            metadata,
            chunk,
            enhancement,
        })
    }
}

fn parse_usize(fields: &HashMap<&str, String>, key: &str) -> usize {
    fields
        .get(key)
        .and_then(|value| value.parse().ok())
        .unwrap_or(0)
}

fn parse_kind(value: &str) -> Result<MemoryKind> {
    serde_json::from_value(serde_json::Value::String(value.to_string()))
        .map_err(|_| Error::Internal(format!("unknown stored kind: {value}")))
}

fn parse_provider(value: &str) -> Option<EnhancementProviderKind> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
}

/// Importance parsing helper used by verbs
pub fn parse_importance(value: &str) -> Option<Importance> {
    serde_json::from_value(serde_json::Value::String(value.to_lowercase())).ok()
}
