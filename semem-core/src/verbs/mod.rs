//! Verb dispatcher
//!
//! The engine's uniform surface: twelve verbs, each validated against a
//! static argument struct, executed under the session's navigation state,
//! and answered with an envelope. Errors become `errorKind` envelopes; the
//! transport never sees a raw engine error.

pub mod args;
pub mod envelope;

pub use args::*;
pub use envelope::{Diagnostics, VerbRequest, VerbResponse};

use crate::deadline::Deadline;
use crate::error::{Error, Result};
use crate::engine::SememEngine;
use crate::retriever::AskOptions;
use crate::session::Session;
use crate::types::{
    EnhancementProviderKind, Importance, Interaction, InteractionMetadata, MemoryKind,
    ScoredInteraction,
};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use tracing::{instrument, warn};

/// The fixed verb surface
pub const VERBS: [&str; 12] = [
    "tell",
    "ask",
    "augment",
    "inspect",
    "state",
    "zoom",
    "pan",
    "tilt",
    "remember",
    "recall",
    "chat",
    "chat-enhanced",
];

impl SememEngine {
    /// Execute one verb invocation and return its envelope.
    ///
    /// Never panics and never returns a raw error: every failure is an
    /// envelope with `success=false` and a typed `errorKind`.
    #[instrument(skip(self, request), fields(verb = %request.verb))]
    pub async fn execute(&self, request: VerbRequest) -> VerbResponse {
        let deadline = Deadline::after(self.config.retrieval.total_deadline);
        let session_id = request
            .session_id
            .clone()
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let session = self.sessions.resolve(&session_id, deadline).await;

        let outcome = self
            .dispatch(&request.verb, &request.args, &session, deadline)
            .await;
        let zpt_state = session.navigation().await;

        match outcome {
            Ok((result, diagnostics)) => {
                VerbResponse::ok(&request.verb, &session_id, result, zpt_state, diagnostics)
            }
            Err(error) => {
                warn!(verb = %request.verb, kind = %error.kind(), "verb failed");
                VerbResponse::fail(&request.verb, &session_id, zpt_state, &error)
            }
        }
    }

    async fn dispatch(
        &self,
        verb: &str,
        args: &Value,
        session: &Arc<Session>,
        deadline: Deadline,
    ) -> Result<(Value, Diagnostics)> {
        match verb {
            "tell" => self.verb_tell(args, session, deadline).await,
            "ask" => self.verb_ask(args, session, deadline).await,
            "augment" => self.verb_augment(args, deadline).await,
            "inspect" => self.verb_inspect(args, session, deadline).await,
            "state" => self.verb_state(session).await,
            "zoom" => self.verb_zoom(args, session, deadline).await,
            "pan" => self.verb_pan(args, session, deadline).await,
            "tilt" => self.verb_tilt(args, session, deadline).await,
            "remember" => self.verb_remember(args, session, deadline).await,
            "recall" => self.verb_recall(args, deadline).await,
            "chat" => self.verb_chat(args, deadline).await,
            "chat-enhanced" => self.verb_chat_enhanced(args, session, deadline).await,
            other => Err(Error::Validation(format!("unknown verb \"{other}\""))),
        }
    }

    async fn verb_tell(
        &self,
        args: &Value,
        session: &Arc<Session>,
        deadline: Deadline,
    ) -> Result<(Value, Diagnostics)> {
        let started = Instant::now();
        let args: TellArgs = parse_args(args)?;
        let kind = args.memory_kind()?;
        let metadata = metadata_from_value(args.metadata.as_ref());

        let outcome = self
            .manager
            .store(kind, &args.content, metadata, args.lazy, deadline)
            .await?;
        session.remember_recent(outcome.interaction.clone());

        let result = json!({
            "id": outcome.interaction.id,
            "stored": true,
            "chunks": outcome.chunk_count,
            "conceptsExtracted": outcome.concepts_extracted,
            "lazy": outcome.lazy,
        });
        Ok((result, timed(started)))
    }

    async fn verb_ask(
        &self,
        args: &Value,
        session: &Arc<Session>,
        deadline: Deadline,
    ) -> Result<(Value, Diagnostics)> {
        let args: AskArgs = parse_args(args)?;
        let opts = AskOptions {
            mode: args.mode,
            use_context: args.use_context,
            use_hyde: args.use_hyde,
            use_wikipedia: args.use_wikipedia,
            use_wikidata: args.use_wikidata,
        };
        let nav = session.navigation().await;
        let outcome = self
            .retriever
            .ask(&args.question, &nav, &opts, deadline)
            .await?;

        let diagnostics = Diagnostics {
            timings_ms: outcome.timings_ms,
            sources_used: outcome.sources_used.clone(),
            cache_hits: outcome.cache_hits,
            llm_provider: Some(outcome.llm_provider),
        };
        let result = json!({
            "answer": outcome.answer,
            "contextItems": outcome.context_items.iter().map(context_item_json).collect::<Vec<_>>(),
            "sourcesUsed": outcome.sources_used,
        });
        Ok((result, diagnostics))
    }

    async fn verb_augment(&self, args: &Value, deadline: Deadline) -> Result<(Value, Diagnostics)> {
        let started = Instant::now();
        let args: AugmentArgs = parse_args(args)?;
        if args.target.trim().is_empty() {
            return Err(Error::Validation("target must not be empty".to_string()));
        }

        let result = match args.operation {
            AugmentOperation::ProcessLazy => {
                let processed = self
                    .manager
                    .process_lazy(args.limit.unwrap_or(32), deadline)
                    .await?;
                json!({"operation": "process_lazy", "processed": processed})
            }
            AugmentOperation::Concepts | AugmentOperation::ExtractConcepts => {
                let concepts = self.llm.extract_concepts(&args.target, deadline).await;
                json!({"operation": "extract_concepts", "concepts": concepts})
            }
            AugmentOperation::GenerateEmbedding => {
                let embedding = self.embeddings.generate(&args.target, deadline).await?;
                json!({
                    "operation": "generate_embedding",
                    "dimension": embedding.len(),
                    "embedding": embedding,
                })
            }
            AugmentOperation::ChunkDocuments => {
                let chunks = self.manager.chunk_preview(&args.target, "Document");
                json!({
                    "operation": "chunk_documents",
                    "total": chunks.len(),
                    "chunks": chunks.iter().map(|c| json!({
                        "index": c.index,
                        "title": c.title,
                        "offset": c.offset,
                        "length": c.length,
                    })).collect::<Vec<_>>(),
                })
            }
            AugmentOperation::Attributes => text_attributes(&args.target),
            AugmentOperation::AnalyzeText => {
                let concepts = self.llm.extract_concepts(&args.target, deadline).await;
                let mut attributes = text_attributes(&args.target);
                attributes["operation"] = json!("analyze_text");
                attributes["concepts"] = json!(concepts);
                attributes
            }
            AugmentOperation::Relationships => {
                let concepts = self.llm.extract_concepts(&args.target, deadline).await;
                let mut relationships = Vec::new();
                for (i, a) in concepts.iter().enumerate() {
                    for b in concepts.iter().skip(i + 1) {
                        let weight = self.graph.edge_weight(a, b);
                        if weight > 0.0 {
                            relationships.push(json!({"a": a, "b": b, "weight": weight}));
                        }
                    }
                }
                json!({"operation": "relationships", "relationships": relationships})
            }
            AugmentOperation::ConceptEmbeddings => {
                let concepts = self.llm.extract_concepts(&args.target, deadline).await;
                let vectors = self.embeddings.generate_batch(&concepts, deadline).await?;
                json!({
                    "operation": "concept_embeddings",
                    "concepts": concepts.len(),
                    "dimension": vectors.first().map_or(0, Vec::len),
                })
            }
            AugmentOperation::Auto => {
                let concepts = self.llm.extract_concepts(&args.target, deadline).await;
                let embedding = self.embeddings.generate(&args.target, deadline).await?;
                json!({
                    "operation": "auto",
                    "concepts": concepts,
                    "dimension": embedding.len(),
                })
            }
        };
        Ok((result, timed(started)))
    }

    async fn verb_inspect(
        &self,
        args: &Value,
        session: &Arc<Session>,
        deadline: Deadline,
    ) -> Result<(Value, Diagnostics)> {
        let started = Instant::now();
        let args: InspectArgs = parse_args(args)?;

        let result = match args.inspect_type {
            InspectType::System => {
                let pending_lazy = self.store.lazy_ids(deadline).await.unwrap_or_default();
                let mut report = json!({
                    "degraded": self.is_degraded(),
                    "pendingWrites": self.store.pending_len().await,
                    "pendingLazy": pending_lazy.len(),
                    "indexSize": self.index.len(),
                    "indexPendingWrites": self.index.pending_len(),
                    "graphEdges": self.graph.edge_count(),
                    "sessions": self.sessions.len().await,
                    "llmProviders": self.llm.provider_names(),
                    "caches": {
                        "interactions": self.store.cache_metrics(),
                        "enhancements": self.coordinator.cache_metrics(),
                        "queryEmbeddings": self.embeddings.cache_metrics(),
                    },
                });
                if args.include_recommendations {
                    report["recommendations"] = json!(self.recommendations(pending_lazy.len()));
                }
                report
            }
            InspectType::Session => {
                json!({
                    "sessionId": session.id,
                    "recentInteractions": session.recent_len(),
                    "zptState": session.navigation().await,
                })
            }
            InspectType::Concept => {
                let label = args.target.as_deref().ok_or_else(|| {
                    Error::Validation("target is required for concept inspection".to_string())
                })?;
                let (occurrences, degree, interactions) = self
                    .graph
                    .concept_info(label)
                    .ok_or_else(|| Error::NotFound(format!("concept \"{label}\"")))?;
                json!({
                    "label": label,
                    "occurrences": occurrences,
                    "degree": degree,
                    "interactions": interactions,
                })
            }
            InspectType::Memory => {
                let id = args.target.as_deref().ok_or_else(|| {
                    Error::Validation("target is required for memory inspection".to_string())
                })?;
                let interaction = self
                    .store
                    .get(id, deadline)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("interaction {id}")))?;
                interaction_json(&interaction)
            }
        };
        Ok((result, timed(started)))
    }

    async fn verb_state(&self, session: &Arc<Session>) -> Result<(Value, Diagnostics)> {
        let nav = session.navigation().await;
        Ok((json!(nav), Diagnostics::default()))
    }

    async fn verb_zoom(
        &self,
        args: &Value,
        session: &Arc<Session>,
        deadline: Deadline,
    ) -> Result<(Value, Diagnostics)> {
        let args: ZoomArgs = parse_args(args)?;
        let nav = session
            .update_navigation(|nav| nav.zoom = args.level)
            .await;
        self.sessions.persist_navigation(session, deadline).await;
        Ok((json!(nav), Diagnostics::default()))
    }

    async fn verb_pan(
        &self,
        args: &Value,
        session: &Arc<Session>,
        deadline: Deadline,
    ) -> Result<(Value, Diagnostics)> {
        let args: PanArgs = parse_args(args)?;
        let filter = args.filter();
        let nav = session
            .update_navigation(|nav| {
                if args.reset {
                    nav.pan = filter;
                } else {
                    nav.pan.merge(filter);
                }
            })
            .await;
        self.sessions.persist_navigation(session, deadline).await;
        Ok((json!(nav), Diagnostics::default()))
    }

    async fn verb_tilt(
        &self,
        args: &Value,
        session: &Arc<Session>,
        deadline: Deadline,
    ) -> Result<(Value, Diagnostics)> {
        let args: TiltArgs = parse_args(args)?;
        let nav = session
            .update_navigation(|nav| nav.tilt = args.style)
            .await;
        self.sessions.persist_navigation(session, deadline).await;
        Ok((json!(nav), Diagnostics::default()))
    }

    async fn verb_remember(
        &self,
        args: &Value,
        session: &Arc<Session>,
        deadline: Deadline,
    ) -> Result<(Value, Diagnostics)> {
        let started = Instant::now();
        let args: RememberArgs = parse_args(args)?;
        let mut metadata = InteractionMetadata {
            domain: args.domain,
            tags: args.tags,
            importance: Some(args.importance.unwrap_or(Importance::Medium)),
            source: Some("remember".to_string()),
            ..InteractionMetadata::default()
        };
        if let Some(context) = args.context {
            metadata.extra.insert("context".to_string(), json!(context));
        }

        let outcome = self
            .manager
            .store(MemoryKind::Interaction, &args.content, metadata, false, deadline)
            .await?;
        session.remember_recent(outcome.interaction.clone());
        Ok((json!({"id": outcome.interaction.id}), timed(started)))
    }

    async fn verb_recall(&self, args: &Value, deadline: Deadline) -> Result<(Value, Diagnostics)> {
        let started = Instant::now();
        let args: RecallArgs = parse_args(args)?;

        // Over-fetch so post-filters do not starve the caller's limit
        let candidates = self
            .manager
            .retrieve(
                &args.query,
                args.limit.saturating_mul(4),
                args.threshold,
                deadline,
            )
            .await?;

        let memories: Vec<Value> = candidates
            .into_iter()
            .filter(|item| {
                args.domain
                    .as_ref()
                    .is_none_or(|d| item.interaction.metadata.domain.as_ref() == Some(d))
            })
            .filter(|item| {
                args.tags.is_empty()
                    || args
                        .tags
                        .iter()
                        .any(|t| item.interaction.metadata.tags.contains(t))
            })
            .filter(|item| {
                args.time_range.as_ref().is_none_or(|range| {
                    let created = item.interaction.created_at();
                    range.start.is_none_or(|s| created >= s)
                        && range.end.is_none_or(|e| created <= e)
                })
            })
            .take(args.limit)
            .map(|item| {
                json!({
                    "id": item.interaction.id,
                    "content": item.interaction.content(),
                    "score": item.score,
                    "domain": item.interaction.metadata.domain,
                    "tags": item.interaction.metadata.tags,
                    "importance": item.interaction.metadata.importance,
                    "created": item.interaction.metadata.created,
                })
            })
            .collect();

        Ok((json!({"memories": memories}), timed(started)))
    }

    async fn verb_chat(&self, args: &Value, deadline: Deadline) -> Result<(Value, Diagnostics)> {
        let started = Instant::now();
        let args: ChatArgs = parse_args(args)?;
        let outcome = self
            .llm
            .chat(
                "You are a helpful assistant backed by a personal semantic memory.",
                &args.message,
                deadline,
            )
            .await?;
        let mut diagnostics = timed(started);
        diagnostics.llm_provider = Some(outcome.provider);
        Ok((json!({"response": outcome.text}), diagnostics))
    }

    async fn verb_chat_enhanced(
        &self,
        args: &Value,
        session: &Arc<Session>,
        deadline: Deadline,
    ) -> Result<(Value, Diagnostics)> {
        let args: ChatEnhancedArgs = parse_args(args)?;
        let enabled = self.resolve_enhancement_flags(args.enabled_providers.as_deref())?;
        let opts = AskOptions {
            use_context: true,
            use_wikipedia: enabled.contains(&EnhancementProviderKind::Encyclopedic),
            use_wikidata: enabled.contains(&EnhancementProviderKind::Factual),
            use_hyde: enabled.contains(&EnhancementProviderKind::Hypothetical),
            ..AskOptions::default()
        };
        let nav = session.navigation().await;
        let outcome = self
            .retriever
            .ask(&args.message, &nav, &opts, deadline)
            .await?;

        let diagnostics = Diagnostics {
            timings_ms: outcome.timings_ms,
            sources_used: outcome.sources_used.clone(),
            cache_hits: outcome.cache_hits,
            llm_provider: Some(outcome.llm_provider),
        };
        let result = json!({
            "response": outcome.answer,
            "sourcesUsed": outcome.sources_used,
        });
        Ok((result, diagnostics))
    }

    /// Map caller-facing provider labels onto configured provider families;
    /// absent list means "everything configured"
    fn resolve_enhancement_flags(
        &self,
        requested: Option<&[String]>,
    ) -> Result<Vec<EnhancementProviderKind>> {
        let all = [
            EnhancementProviderKind::Encyclopedic,
            EnhancementProviderKind::Factual,
            EnhancementProviderKind::Hypothetical,
        ];
        match requested {
            None => Ok(all
                .into_iter()
                .filter(|kind| self.coordinator.has_provider(*kind))
                .collect()),
            Some(labels) => {
                let mut enabled = Vec::new();
                for label in labels {
                    let kind = match label.to_lowercase().as_str() {
                        "wikipedia" | "encyclopedic" => EnhancementProviderKind::Encyclopedic,
                        "wikidata" | "factual" => EnhancementProviderKind::Factual,
                        "hyde" | "hypothetical" => EnhancementProviderKind::Hypothetical,
                        other => {
                            return Err(Error::Validation(format!(
                                "unknown enhancement provider \"{other}\""
                            )))
                        }
                    };
                    if !enabled.contains(&kind) {
                        enabled.push(kind);
                    }
                }
                Ok(enabled)
            }
        }
    }

    fn recommendations(&self, pending_lazy: usize) -> Vec<String> {
        let mut hints = Vec::new();
        if self.is_degraded() {
            hints.push(
                "persistent store unreachable; operating session-cache-only until it returns"
                    .to_string(),
            );
        }
        if pending_lazy > 0 {
            hints.push(format!(
                "{pending_lazy} lazy records awaiting processing; run augment(operation=process_lazy)"
            ));
        }
        let enh = self.coordinator.cache_metrics();
        if enh.hits + enh.misses >= 20 && !enh.is_effective() {
            hints.push("enhancement cache hit rate below 40%; consider a longer cacheTtl".to_string());
        }
        if self.index.is_empty() {
            hints.push("vector index empty; run warmup() to rebuild from the store".to_string());
        }
        hints
    }
}

fn timed(started: Instant) -> Diagnostics {
    let mut timings = HashMap::new();
    timings.insert("totalMs".to_string(), started.elapsed().as_millis() as u64);
    Diagnostics {
        timings_ms: timings,
        ..Diagnostics::default()
    }
}

fn text_attributes(text: &str) -> Value {
    json!({
        "operation": "attributes",
        "length": text.len(),
        "tokens": text.split_whitespace().count(),
        "lines": text.lines().count(),
        "hasMarkdownHeaders": text.lines().any(|l| l.trim_start().starts_with('#')),
    })
}

fn context_item_json(item: &ScoredInteraction) -> Value {
    json!({
        "id": item.interaction.id,
        "kind": item.interaction.kind,
        "content": item.interaction.content(),
        "concepts": item.interaction.concepts,
        "score": item.score,
        "domain": item.interaction.metadata.domain,
        "source": item.interaction.metadata.source,
    })
}

fn interaction_json(interaction: &Interaction) -> Value {
    json!({
        "id": interaction.id,
        "kind": interaction.kind,
        "prompt": interaction.prompt,
        "response": interaction.response,
        "concepts": interaction.concepts,
        "hasEmbedding": interaction.embedding.is_some(),
        "pendingProcessing": interaction.metadata.pending_processing,
        "metadata": {
            "domain": interaction.metadata.domain,
            "tags": interaction.metadata.tags,
            "created": interaction.metadata.created,
            "source": interaction.metadata.source,
            "importance": interaction.metadata.importance,
        },
        "chunk": interaction.chunk,
        "enhancement": interaction.enhancement,
    })
}

fn metadata_from_value(value: Option<&Value>) -> InteractionMetadata {
    let mut metadata = InteractionMetadata::default();
    let Some(Value::Object(map)) = value else {
        return metadata;
    };
    for (key, entry) in map {
        match key.as_str() {
            "domain" => metadata.domain = entry.as_str().map(str::to_string),
            "title" => metadata.title = entry.as_str().map(str::to_string),
            "source" => metadata.source = entry.as_str().map(str::to_string),
            "tags" => {
                if let Value::Array(tags) = entry {
                    metadata.tags = tags
                        .iter()
                        .filter_map(|t| t.as_str().map(str::to_string))
                        .collect();
                }
            }
            "importance" => {
                metadata.importance = entry
                    .as_str()
                    .and_then(crate::store::interactions::parse_importance);
            }
            _ => {
                metadata.extra.insert(key.clone(), entry.clone());
            }
        }
    }
    metadata
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, ModelConfig};
    use crate::embeddings::MockEmbeddingProvider;
    use crate::engine::SememEngineBuilder;
    use crate::llm::MockChatProvider;

    async fn engine() -> Arc<SememEngine> {
        let mut config = EngineConfig::default();
        config.embedding.model = ModelConfig::custom("mock", 64);
        SememEngineBuilder::new(config)
            .embedding_provider(Arc::new(MockEmbeddingProvider::new("mock", 64)))
            .chat_providers(vec![Arc::new(MockChatProvider::new("primary"))])
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_verb_is_validation_error() {
        let engine = engine().await;
        let response = engine
            .execute(VerbRequest::new("explode", json!({})))
            .await;
        assert!(!response.success);
        assert_eq!(
            response.error_kind,
            Some(crate::error::ErrorKind::Validation)
        );
    }

    #[tokio::test]
    async fn test_missing_required_field_is_validation_error() {
        let engine = engine().await;
        let response = engine.execute(VerbRequest::new("tell", json!({}))).await;
        assert!(!response.success);
        assert!(response.error_message.unwrap().contains("content"));
    }

    #[tokio::test]
    async fn test_state_zoom_pan_tilt_round_trip() {
        let engine = engine().await;
        let session = "nav-session";

        let zoomed = engine
            .execute(VerbRequest::new("zoom", json!({"level": "unit"})).with_session(session))
            .await;
        assert!(zoomed.success);

        let panned = engine
            .execute(
                VerbRequest::new("pan", json!({"domains": ["biology"]})).with_session(session),
            )
            .await;
        assert!(panned.success);

        let tilted = engine
            .execute(VerbRequest::new("tilt", json!({"style": "graph"})).with_session(session))
            .await;
        assert!(tilted.success);

        let state = engine
            .execute(VerbRequest::new("state", json!({})).with_session(session))
            .await;
        assert!(state.success);
        let nav = state.result.unwrap();
        assert_eq!(nav["zoom"], json!("unit"));
        assert_eq!(nav["tilt"], json!("graph"));
        assert_eq!(nav["pan"]["domains"], json!(["biology"]));
    }

    #[tokio::test]
    async fn test_pan_reset_replaces() {
        let engine = engine().await;
        let session = "pan-session";
        engine
            .execute(VerbRequest::new("pan", json!({"domains": ["a"]})).with_session(session))
            .await;
        engine
            .execute(
                VerbRequest::new("pan", json!({"domains": ["b"], "reset": true}))
                    .with_session(session),
            )
            .await;
        let state = engine
            .execute(VerbRequest::new("state", json!({})).with_session(session))
            .await;
        assert_eq!(state.result.unwrap()["pan"]["domains"], json!(["b"]));
    }

    #[tokio::test]
    async fn test_tell_then_inspect_memory() {
        let engine = engine().await;
        let told = engine
            .execute(VerbRequest::new(
                "tell",
                json!({"content": "Mitochondria produce ATP.", "type": "concept"}),
            ))
            .await;
        assert!(told.success);
        let id = told.result.unwrap()["id"].as_str().unwrap().to_string();

        let inspected = engine
            .execute(VerbRequest::new(
                "inspect",
                json!({"type": "memory", "target": id}),
            ))
            .await;
        assert!(inspected.success);
        assert_eq!(inspected.result.unwrap()["hasEmbedding"], json!(true));
    }

    #[tokio::test]
    async fn test_inspect_unknown_memory_is_not_found() {
        let engine = engine().await;
        let response = engine
            .execute(VerbRequest::new(
                "inspect",
                json!({"type": "memory", "target": "semem:interaction:missing"}),
            ))
            .await;
        assert_eq!(response.error_kind, Some(crate::error::ErrorKind::NotFound));
    }

    #[tokio::test]
    async fn test_remember_and_recall() {
        let engine = engine().await;
        let remembered = engine
            .execute(VerbRequest::new(
                "remember",
                json!({
                    "content": "The staging database password rotates monthly",
                    "importance": "high",
                    "domain": "ops",
                    "tags": ["credentials"],
                }),
            ))
            .await;
        assert!(remembered.success);

        let recalled = engine
            .execute(VerbRequest::new(
                "recall",
                json!({"query": "database password rotation", "domain": "ops"}),
            ))
            .await;
        assert!(recalled.success);
        let memories = recalled.result.unwrap()["memories"].clone();
        assert_eq!(memories.as_array().unwrap().len(), 1);
        assert_eq!(memories[0]["importance"], json!("high"));
    }

    #[tokio::test]
    async fn test_chat_reports_provider() {
        let engine = engine().await;
        let response = engine
            .execute(VerbRequest::new("chat", json!({"message": "hello"})))
            .await;
        assert!(response.success);
        assert_eq!(
            response.diagnostics.llm_provider.as_deref(),
            Some("primary")
        );
    }

    #[tokio::test]
    async fn test_augment_attributes() {
        let engine = engine().await;
        let response = engine
            .execute(VerbRequest::new(
                "augment",
                json!({"target": "# Title\nbody text", "operation": "attributes"}),
            ))
            .await;
        let result = response.result.unwrap();
        assert_eq!(result["hasMarkdownHeaders"], json!(true));
        assert_eq!(result["lines"], json!(2));
    }

    #[tokio::test]
    async fn test_envelope_always_carries_zpt_state() {
        let engine = engine().await;
        let response = engine
            .execute(VerbRequest::new("state", json!({})).with_session("s"))
            .await;
        let value = serde_json::to_value(&response).unwrap();
        assert!(value["zptState"]["zoom"].is_string());
    }
}
