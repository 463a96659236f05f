//! Hybrid retriever
//!
//! The ask-side pipeline: a local branch (vector search plus concept-graph
//! spreading activation, shaped by the session's ZPT state) runs in parallel
//! with the enhancement branch (external providers behind the cache). The
//! merged, weighted context goes to the LLM with a synthesis template that
//! attributes personal and external sources separately.
//!
//! Ordering is deterministic: the merged list sorts by `(weight desc, id
//! asc)`, and fresh enhancement records are persisted before the answer is
//! returned so identical follow-up queries hit cache.

use crate::config::{RetrievalConfig, WeightSet};
use crate::deadline::Deadline;
use crate::embeddings::{cosine_similarity, EmbeddingService};
use crate::enhancement::{EnhancementCoordinator, EnhancementOutcome};
use crate::error::Result;
use crate::graph::ConceptGraph;
use crate::index::VectorIndex;
use crate::llm::LlmService;
use crate::memory::sort_with_tie_breaks;
use crate::store::InteractionStore;
use crate::types::{
    ContextSource, EnhancementProviderKind, Interaction, MemoryKind, ScoredInteraction,
};
use crate::zpt::{NavigationState, TiltStyle, ZoomLevel};
use regex::Regex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::LazyLock;
use std::time::Instant;
use tracing::{debug, instrument, warn};

/// Retrieval depth modes
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalMode {
    /// Few candidates, fastest
    Basic,
    /// Balanced depth
    #[default]
    Standard,
    /// Widest candidate pool
    Comprehensive,
}

impl RetrievalMode {
    fn k_index(self) -> usize {
        match self {
            RetrievalMode::Basic => 0,
            RetrievalMode::Standard => 1,
            RetrievalMode::Comprehensive => 2,
        }
    }
}

/// Options for one `ask` invocation
#[derive(Debug, Clone, Default)]
pub struct AskOptions {
    /// Retrieval depth
    pub mode: RetrievalMode,
    /// Include personal context from the local branch
    pub use_context: bool,
    /// Enable hypothetical-document expansion
    pub use_hyde: bool,
    /// Enable encyclopedic lookup
    pub use_wikipedia: bool,
    /// Enable factual lookup
    pub use_wikidata: bool,
}

impl AskOptions {
    fn enabled_providers(&self) -> Vec<EnhancementProviderKind> {
        let mut enabled = Vec::new();
        if self.use_wikipedia {
            enabled.push(EnhancementProviderKind::Encyclopedic);
        }
        if self.use_wikidata {
            enabled.push(EnhancementProviderKind::Factual);
        }
        if self.use_hyde {
            enabled.push(EnhancementProviderKind::Hypothetical);
        }
        enabled
    }
}

/// The answer and its provenance
#[derive(Debug, Clone)]
pub struct AskOutcome {
    /// Synthesized answer text
    pub answer: String,
    /// Context items that grounded the answer, weight order
    pub context_items: Vec<ScoredInteraction>,
    /// Source attributions: "personal" plus cited provider families
    pub sources_used: Vec<String>,
    /// Stage timings in milliseconds
    pub timings_ms: HashMap<String, u64>,
    /// Per-provider cache-hit flags for this round
    pub cache_hits: HashMap<String, bool>,
    /// Which chat provider served the synthesis (after failover)
    pub llm_provider: String,
}

/// Query classification driving the weighting policy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryClass {
    Factual,
    Personal,
    EntityTemporal,
    Default,
}

static FACTUAL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*(who|when|where)\b").unwrap());
static FIRST_PERSON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(i|me|my|mine|we|our|us)\b").unwrap());
static TEMPORAL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d{4}|yesterday|today|tomorrow|last\s+\w+|ago|recently|when)\b").unwrap()
});

fn classify_query(question: &str) -> QueryClass {
    let first_person = FIRST_PERSON_RE.is_match(question);
    if first_person {
        return QueryClass::Personal;
    }
    if FACTUAL_RE.is_match(question) {
        return QueryClass::Factual;
    }
    let has_proper_noun = question
        .split_whitespace()
        .skip(1)
        .any(|w| w.chars().next().is_some_and(char::is_uppercase));
    if has_proper_noun && TEMPORAL_RE.is_match(question) {
        return QueryClass::EntityTemporal;
    }
    QueryClass::Default
}

/// Hybrid ask pipeline over the engine's shared components
pub struct HybridRetriever {
    embeddings: Arc<EmbeddingService>,
    llm: Arc<LlmService>,
    index: Arc<VectorIndex>,
    graph: Arc<ConceptGraph>,
    store: Arc<InteractionStore>,
    coordinator: Arc<EnhancementCoordinator>,
    config: RetrievalConfig,
}

struct Candidate {
    interaction: Interaction,
    cosine: f32,
    activation: f32,
    source: ContextSource,
}

impl HybridRetriever {
    /// Wire the retriever over shared components
    pub fn new(
        embeddings: Arc<EmbeddingService>,
        llm: Arc<LlmService>,
        index: Arc<VectorIndex>,
        graph: Arc<ConceptGraph>,
        store: Arc<InteractionStore>,
        coordinator: Arc<EnhancementCoordinator>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            embeddings,
            llm,
            index,
            graph,
            store,
            coordinator,
            config,
        }
    }

    /// Answer `question` against stored memory and enabled enhancements
    #[instrument(skip(self, question, nav, opts), fields(mode = ?opts.mode))]
    pub async fn ask(
        &self,
        question: &str,
        nav: &NavigationState,
        opts: &AskOptions,
        deadline: Deadline,
    ) -> Result<AskOutcome> {
        let started = Instant::now();
        let mut timings: HashMap<String, u64> = HashMap::new();

        // Query embedding and concepts drive both branches
        let query_embedding = self.embeddings.generate(question, deadline).await?;
        let question_concepts = self.llm.extract_concepts(question, deadline).await;
        timings.insert("prepareMs".into(), started.elapsed().as_millis() as u64);

        let k_local = self.config.k_local[opts.mode.k_index()];
        let local_deadline = deadline.halfway();
        let enabled = opts.enabled_providers();

        // Branch fan-out: local is soft-bounded by T_total/2, enhancement by
        // its own per-provider timeouts inside the total deadline.
        let local_branch = async {
            if !opts.use_context {
                return (Vec::new(), 0);
            }
            let local_started = Instant::now();
            let result = local_deadline
                .run(self.local_branch(
                    &query_embedding,
                    &question_concepts,
                    nav,
                    k_local,
                    deadline,
                ))
                .await;
            let elapsed = local_started.elapsed().as_millis() as u64;
            match result {
                Ok(Ok(candidates)) => (candidates, elapsed),
                Ok(Err(err)) => {
                    warn!(error = %err, "local branch failed; continuing without it");
                    (Vec::new(), elapsed)
                }
                Err(_) => {
                    warn!("local branch exceeded its soft deadline; returning best-effort");
                    (Vec::new(), elapsed)
                }
            }
        };
        let enhancement_branch = async {
            let enh_started = Instant::now();
            let outcomes = if enabled.is_empty() {
                Vec::new()
            } else {
                self.coordinator.enhance(question, &enabled, deadline).await
            };
            (outcomes, enh_started.elapsed().as_millis() as u64)
        };

        let ((mut candidates, local_ms), (enhancements, enh_ms)) =
            tokio::join!(local_branch, enhancement_branch);
        timings.insert("localMs".into(), local_ms);
        timings.insert("enhancementMs".into(), enh_ms);

        let mut cache_hits: HashMap<String, bool> = HashMap::new();
        for outcome in &enhancements {
            cache_hits.insert(outcome.provider.to_string(), outcome.cache_hit);
        }

        // Hypothetical expansion seeds a second local round; it is never a
        // candidate itself.
        if let Some(hyde) = enhancements
            .iter()
            .find(|o| o.provider == EnhancementProviderKind::Hypothetical)
        {
            if opts.use_context {
                let round = self
                    .hyde_round(&hyde.record.response, &query_embedding, nav, k_local, deadline)
                    .await;
                merge_candidates(&mut candidates, round);
            }
        }

        for outcome in &enhancements {
            if outcome.provider == EnhancementProviderKind::Hypothetical {
                continue;
            }
            let source = match outcome.provider {
                EnhancementProviderKind::Factual => ContextSource::Factual,
                _ => ContextSource::Encyclopedic,
            };
            candidates.push(Candidate {
                interaction: outcome.record.clone(),
                cosine: 0.0,
                activation: 0.0,
                source,
            });
        }

        // Durability before reply: fresh enhancement records land in the
        // store before the caller sees the answer.
        self.persist_enhancements(&enhancements, &candidates, deadline)
            .await;

        let weights = self.weights_for(classify_query(question));
        let mut context = self.merge_and_weight(candidates, question, nav, weights);
        context.truncate(self.config.k_final);

        let sources_used = collect_sources(&context);
        let synth_started = Instant::now();
        let (answer, llm_provider) = self
            .synthesize(question, &context, deadline)
            .await?;
        timings.insert("synthesisMs".into(), synth_started.elapsed().as_millis() as u64);
        timings.insert("totalMs".into(), started.elapsed().as_millis() as u64);

        Ok(AskOutcome {
            answer,
            context_items: context,
            sources_used,
            timings_ms: timings,
            cache_hits,
            llm_provider,
        })
    }

    /// Local branch: vector NN + spreading activation, ZPT-filtered
    async fn local_branch(
        &self,
        query_embedding: &[f32],
        question_concepts: &[String],
        nav: &NavigationState,
        k_local: usize,
        deadline: Deadline,
    ) -> Result<Vec<Candidate>> {
        let vector_hits = self.index.search(query_embedding, k_local * 2);

        let mut activations: HashMap<String, f32> = HashMap::new();
        if !question_concepts.is_empty() {
            let hits = self.graph.activated_interactions(question_concepts);
            let max = hits.first().map_or(1.0, |(_, a)| a.max(1e-6));
            for (id, activation) in hits {
                let normalized = activation / max;
                if normalized > self.config.concept_overlap_threshold {
                    activations.insert(id, normalized);
                }
            }
        }

        let community = if nav.zoom == ZoomLevel::Community {
            Some(self.graph.community_of(question_concepts))
        } else {
            None
        };

        let mut merged: HashMap<String, (f32, f32)> = HashMap::new();
        for (id, cosine) in vector_hits {
            merged.entry(id).or_insert((0.0, 0.0)).0 = cosine;
        }
        for (id, activation) in activations {
            merged.entry(id).or_insert((0.0, 0.0)).1 = activation;
        }

        let mut candidates = Vec::new();
        for (id, (cosine, activation)) in merged {
            let Some(interaction) = self.store.get(&id, deadline).await? else {
                continue;
            };
            // Hypothetical records never surface as candidates; expired
            // enhancements are demoted out of weighting.
            if let Some(info) = &interaction.enhancement {
                if info.provider == EnhancementProviderKind::Hypothetical
                    || interaction.is_demoted(chrono::Utc::now())
                {
                    continue;
                }
            }
            if interaction.is_lazy() {
                continue;
            }
            if !nav.zoom_admits(&interaction) || !nav.admits(&interaction) {
                continue;
            }
            if let Some(members) = &community {
                if !interaction.concepts.iter().any(|c| members.contains(c)) {
                    continue;
                }
            }
            let local_score = cosine.max(activation);
            if local_score < nav.relevance_threshold {
                continue;
            }
            let source = if interaction.kind == MemoryKind::Enhancement {
                match interaction.enhancement.as_ref().map(|e| e.provider) {
                    Some(EnhancementProviderKind::Factual) => ContextSource::Factual,
                    _ => ContextSource::Encyclopedic,
                }
            } else {
                ContextSource::Personal
            };
            candidates.push(Candidate {
                interaction,
                cosine,
                activation,
                source,
            });
        }
        debug!(candidates = candidates.len(), "local branch complete");
        Ok(candidates)
    }

    /// Second local round seeded by the hypothetical answer: average the
    /// probe embedding into the query and search again
    async fn hyde_round(
        &self,
        hypothetical: &str,
        query_embedding: &[f32],
        nav: &NavigationState,
        k_local: usize,
        deadline: Deadline,
    ) -> Vec<Candidate> {
        let Ok(probe) = self.embeddings.generate(hypothetical, deadline).await else {
            return Vec::new();
        };
        let blended: Vec<f32> = query_embedding
            .iter()
            .zip(probe.iter())
            .map(|(q, p)| (q + p) / 2.0)
            .collect();
        match self
            .local_branch(&blended, &[], nav, k_local, deadline)
            .await
        {
            Ok(candidates) => candidates,
            Err(err) => {
                warn!(error = %err, "hyde round failed");
                Vec::new()
            }
        }
    }

    /// Embed fresh enhancement records, link them to the personal items
    /// found this round, and buffer them for durable write-back
    async fn persist_enhancements(
        &self,
        enhancements: &[EnhancementOutcome],
        candidates: &[Candidate],
        deadline: Deadline,
    ) {
        let personal_ids: Vec<String> = candidates
            .iter()
            .filter(|c| c.source == ContextSource::Personal)
            .map(|c| c.interaction.id.clone())
            .collect();

        let mut records = Vec::new();
        for outcome in enhancements {
            if outcome.cache_hit {
                continue; // already durable from the round that produced it
            }
            let mut record = outcome.record.clone();
            match self.embeddings.generate(&record.content(), deadline).await {
                Ok(embedding) => {
                    self.index.add(&record.id, embedding.clone());
                    record.embedding = Some(embedding);
                }
                Err(err) => {
                    warn!(provider = %outcome.provider, error = %err, "enhancement embedding failed; persisting without one");
                }
            }
            if let Some(info) = &mut record.enhancement {
                info.linked_personal_ids = personal_ids.clone();
            }
            records.push(record);
        }
        if !records.is_empty() {
            self.index.schedule_flush();
            self.store.put_all(records).await;
            // Durability-before-reply: drain the buffer now instead of
            // waiting out the debounce window.
            if let Err(err) = self.store.flush_now(deadline).await {
                warn!(error = %err, "enhancement flush deferred; store degraded");
            }
        }
    }

    fn weights_for(&self, class: QueryClass) -> WeightSet {
        let policy = &self.config.weights;
        match class {
            QueryClass::Factual => policy.factual,
            QueryClass::Personal => policy.personal,
            QueryClass::EntityTemporal => policy.entity_temporal,
            QueryClass::Default => policy.default,
        }
    }

    /// Composite weighting, dedup by ID, near-duplicate suppression, and
    /// deterministic ordering
    fn merge_and_weight(
        &self,
        candidates: Vec<Candidate>,
        question: &str,
        nav: &NavigationState,
        weights: WeightSet,
    ) -> Vec<ScoredInteraction> {
        let now = chrono::Utc::now();
        let question_tokens: HashSet<String> = tokenize(question);

        let mut best: HashMap<String, (Candidate, f32)> = HashMap::new();
        for candidate in candidates {
            let personal = if candidate.source == ContextSource::Personal {
                match nav.tilt {
                    TiltStyle::Embedding => candidate.cosine.max(0.0),
                    TiltStyle::Graph => candidate.activation,
                    TiltStyle::Keywords => {
                        keyword_overlap(&question_tokens, &candidate.interaction)
                    }
                    TiltStyle::Temporal => recency_score(&candidate.interaction, now),
                }
            } else {
                0.0
            };
            let authority = if candidate.source == ContextSource::Personal {
                0.0
            } else {
                1.0
            };
            let recency = recency_score(&candidate.interaction, now);
            let zpt = nav.zpt_match(&candidate.interaction);
            let weight = weights.personal * personal
                + weights.authority * authority
                + weights.recency * recency
                + weights.zpt * zpt;

            let improves = best
                .get(&candidate.interaction.id)
                .is_none_or(|(_, existing)| *existing < weight);
            if improves {
                best.insert(candidate.interaction.id.clone(), (candidate, weight));
            }
        }

        let mut scored: Vec<ScoredInteraction> = best
            .into_values()
            .map(|(candidate, weight)| ScoredInteraction {
                interaction: candidate.interaction,
                score: weight,
            })
            .collect();
        sort_with_tie_breaks(&mut scored, self.config.tie_epsilon);

        // Near-duplicate suppression: keep the higher-weight item
        let mut kept: Vec<ScoredInteraction> = Vec::new();
        for item in scored {
            let duplicate = kept.iter().any(|existing| {
                match (&existing.interaction.embedding, &item.interaction.embedding) {
                    (Some(a), Some(b)) => cosine_similarity(a, b)
                        .is_ok_and(|sim| sim >= self.config.near_duplicate_cosine),
                    _ => false,
                }
            });
            if !duplicate {
                kept.push(item);
            }
        }
        kept
    }

    /// Grounded synthesis with distinct personal/external attribution
    async fn synthesize(
        &self,
        question: &str,
        context: &[ScoredInteraction],
        deadline: Deadline,
    ) -> Result<(String, String)> {
        const SYNTHESIS_PROMPT: &str = "Answer the question using the numbered context. \
Ground every claim in a context item, preferring PERSONAL MEMORY for the caller's own \
facts and EXTERNAL REFERENCE for world knowledge. Say so when the context is insufficient.";

        let mut prompt = String::new();
        let personal: Vec<&ScoredInteraction> = context
            .iter()
            .filter(|c| c.interaction.kind != MemoryKind::Enhancement)
            .collect();
        let external: Vec<&ScoredInteraction> = context
            .iter()
            .filter(|c| c.interaction.kind == MemoryKind::Enhancement)
            .collect();

        if !personal.is_empty() {
            prompt.push_str("PERSONAL MEMORY:\n");
            for (i, item) in personal.iter().enumerate() {
                prompt.push_str(&format!("[P{}] {}\n", i + 1, item.interaction.content()));
            }
        }
        if !external.is_empty() {
            prompt.push_str("EXTERNAL REFERENCE:\n");
            for (i, item) in external.iter().enumerate() {
                let provider = item
                    .interaction
                    .metadata
                    .source
                    .as_deref()
                    .unwrap_or("external");
                prompt.push_str(&format!(
                    "[E{}] ({provider}) {}\n",
                    i + 1,
                    item.interaction.response
                ));
            }
        }
        prompt.push_str(&format!("\nQuestion: {question}"));

        let outcome = self.llm.chat(SYNTHESIS_PROMPT, &prompt, deadline).await?;
        Ok((outcome.text, outcome.provider))
    }
}

fn merge_candidates(into: &mut Vec<Candidate>, extra: Vec<Candidate>) {
    for candidate in extra {
        if let Some(existing) = into
            .iter_mut()
            .find(|c| c.interaction.id == candidate.interaction.id)
        {
            existing.cosine = existing.cosine.max(candidate.cosine);
            existing.activation = existing.activation.max(candidate.activation);
        } else {
            into.push(candidate);
        }
    }
}

fn collect_sources(context: &[ScoredInteraction]) -> Vec<String> {
    let mut sources = Vec::new();
    for item in context {
        let label = if item.interaction.kind == MemoryKind::Enhancement {
            item.interaction
                .enhancement
                .as_ref()
                .map(|e| e.provider.to_string())
                .unwrap_or_else(|| "external".to_string())
        } else {
            ContextSource::Personal.to_string()
        };
        if !sources.contains(&label) {
            sources.push(label);
        }
    }
    sources
}

fn tokenize(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(str::to_string)
        .collect()
}

fn keyword_overlap(question_tokens: &HashSet<String>, interaction: &Interaction) -> f32 {
    if question_tokens.is_empty() {
        return 0.0;
    }
    let content_tokens = tokenize(&format!(
        "{} {}",
        interaction.content(),
        interaction.metadata.tags.join(" ")
    ));
    let shared = question_tokens.intersection(&content_tokens).count();
    shared as f32 / question_tokens.len() as f32
}

fn recency_score(interaction: &Interaction, now: chrono::DateTime<chrono::Utc>) -> f32 {
    let age_days = now
        .signed_duration_since(interaction.created_at())
        .num_seconds()
        .max(0) as f32
        / 86_400.0;
    1.0 / (1.0 + age_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_query_classification() {
        assert_eq!(
            classify_query("Who was the first president?"),
            QueryClass::Factual
        );
        assert_eq!(
            classify_query("When did I last update my notes?"),
            QueryClass::Personal
        );
        assert_eq!(
            classify_query("What happened to Apollo in 1969?"),
            QueryClass::EntityTemporal
        );
        assert_eq!(
            classify_query("how does photosynthesis work"),
            QueryClass::Default
        );
    }

    #[test]
    fn test_tokenize_and_overlap() {
        let question: HashSet<String> = tokenize("How do cells produce energy?");
        let mut interaction =
            Interaction::new(MemoryKind::Concept, "Cells produce ATP energy".into(), String::new());
        interaction.metadata.tags = vec![];
        let overlap = keyword_overlap(&question, &interaction);
        assert!(overlap > 0.5);
    }

    #[test]
    fn test_recency_score_decays() {
        let now = chrono::Utc::now();
        let fresh = Interaction::new(MemoryKind::Concept, "new".into(), String::new());
        let mut old = Interaction::new(MemoryKind::Concept, "old".into(), String::new());
        old.metadata.created = Some(now - chrono::Duration::days(30));
        assert!(recency_score(&fresh, now) > recency_score(&old, now));
    }

    #[test]
    fn test_enabled_providers_mapping() {
        let opts = AskOptions {
            use_wikipedia: true,
            use_hyde: true,
            ..AskOptions::default()
        };
        let enabled = opts.enabled_providers();
        assert_eq!(
            enabled,
            vec![
                EnhancementProviderKind::Encyclopedic,
                EnhancementProviderKind::Hypothetical
            ]
        );
    }
}
