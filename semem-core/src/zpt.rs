//! ZPT navigation state
//!
//! A per-session three-axis view over stored memory: zoom selects candidate
//! granularity, pan narrows by metadata predicates, tilt picks the primary
//! ranking signal. Navigation never mutates stored content; "forgetting" is
//! the `fade_out` list moving items out of view.

use crate::types::{Interaction, MemoryKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Zoom granularity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ZoomLevel {
    /// Fine-grained attributes of any kind
    Micro,
    /// Interactions whose concepts include named entities
    Entity,
    /// Chunks and concepts
    Unit,
    /// Whole documents
    Text,
    /// Concept-graph communities
    Community,
    /// Everything; ranking favours summaries
    #[default]
    Corpus,
}

/// Tilt: the primary ranking signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TiltStyle {
    /// Term match over content and metadata
    Keywords,
    /// Cosine similarity of embeddings
    #[default]
    Embedding,
    /// Concept-graph spreading-activation score
    Graph,
    /// Inverse age
    Temporal,
}

/// Inclusive temporal window for pan filtering
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct TemporalRange {
    /// Window start (inclusive)
    pub start: Option<DateTime<Utc>>,
    /// Window end (inclusive)
    pub end: Option<DateTime<Utc>>,
}

impl TemporalRange {
    fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none()
    }

    fn contains(&self, at: DateTime<Utc>) -> bool {
        self.start.is_none_or(|s| at >= s) && self.end.is_none_or(|e| at <= e)
    }
}

/// Additive pan predicates; a candidate must satisfy every present predicate
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct PanFilter {
    /// Domain labels (candidate domain must be one of them)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub domains: Vec<String>,
    /// Keywords (candidate content/tags must contain at least one)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
    /// Entities (candidate concepts must contain at least one)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub entities: Vec<String>,
    /// Temporal window over creation time
    #[serde(default, skip_serializing_if = "TemporalRange::is_default")]
    pub temporal: TemporalRange,
    /// Geographic label matched against tags
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub geographic: Option<String>,
}

impl TemporalRange {
    fn is_default(&self) -> bool {
        self.is_empty()
    }
}

impl PanFilter {
    /// Whether no predicate is present (matches everything)
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
            && self.keywords.is_empty()
            && self.entities.is_empty()
            && self.temporal.is_empty()
            && self.geographic.is_none()
    }

    /// Merge `other` into `self` additively
    pub fn merge(&mut self, other: PanFilter) {
        for domain in other.domains {
            if !self.domains.contains(&domain) {
                self.domains.push(domain);
            }
        }
        for keyword in other.keywords {
            if !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
        for entity in other.entities {
            if !self.entities.contains(&entity) {
                self.entities.push(entity);
            }
        }
        if other.temporal.start.is_some() {
            self.temporal.start = other.temporal.start;
        }
        if other.temporal.end.is_some() {
            self.temporal.end = other.temporal.end;
        }
        if other.geographic.is_some() {
            self.geographic = other.geographic;
        }
    }

    /// Evaluate each present predicate against a candidate.
    ///
    /// Returns `(present, satisfied)` counts; full match means
    /// `satisfied == present`.
    #[must_use]
    pub fn evaluate(&self, candidate: &Interaction) -> (usize, usize) {
        let mut present = 0;
        let mut satisfied = 0;

        if !self.domains.is_empty() {
            present += 1;
            if candidate
                .metadata
                .domain
                .as_ref()
                .is_some_and(|d| self.domains.contains(d))
            {
                satisfied += 1;
            }
        }
        if !self.keywords.is_empty() {
            present += 1;
            let haystack = format!(
                "{} {} {}",
                candidate.prompt.to_lowercase(),
                candidate.response.to_lowercase(),
                candidate.metadata.tags.join(" ").to_lowercase()
            );
            if self
                .keywords
                .iter()
                .any(|k| haystack.contains(&k.to_lowercase()))
            {
                satisfied += 1;
            }
        }
        if !self.entities.is_empty() {
            present += 1;
            if self
                .entities
                .iter()
                .any(|e| candidate.concepts.iter().any(|c| c.eq_ignore_ascii_case(e)))
            {
                satisfied += 1;
            }
        }
        if !self.temporal.is_empty() {
            present += 1;
            if self.temporal.contains(candidate.created_at()) {
                satisfied += 1;
            }
        }
        if let Some(geo) = &self.geographic {
            present += 1;
            if candidate
                .metadata
                .tags
                .iter()
                .any(|t| t.eq_ignore_ascii_case(geo))
            {
                satisfied += 1;
            }
        }

        (present, satisfied)
    }

    /// Whether the candidate satisfies every present predicate
    #[must_use]
    pub fn matches(&self, candidate: &Interaction) -> bool {
        let (present, satisfied) = self.evaluate(candidate);
        satisfied == present
    }
}

/// Per-session navigation state
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationState {
    /// Current zoom level
    pub zoom: ZoomLevel,
    /// Current pan predicates
    pub pan: PanFilter,
    /// Current tilt style
    pub tilt: TiltStyle,
    /// Minimum retrieval score for local candidates
    pub relevance_threshold: f32,
    /// Interaction IDs navigated out of view
    #[serde(default)]
    pub fade_out: Vec<String>,
}

impl Default for NavigationState {
    fn default() -> Self {
        Self {
            zoom: ZoomLevel::default(),
            pan: PanFilter::default(),
            tilt: TiltStyle::default(),
            relevance_threshold: 0.0,
            fade_out: Vec::new(),
        }
    }
}

impl NavigationState {
    /// Whether `kind` falls inside the current zoom level.
    ///
    /// `community` membership needs graph context and is resolved by the
    /// retriever; at the kind level it admits everything.
    #[must_use]
    pub fn zoom_admits(&self, candidate: &Interaction) -> bool {
        match self.zoom {
            ZoomLevel::Micro | ZoomLevel::Corpus | ZoomLevel::Community => true,
            ZoomLevel::Entity => has_named_entity(candidate),
            ZoomLevel::Unit => matches!(
                candidate.kind,
                MemoryKind::DocumentChunk | MemoryKind::Concept
            ),
            ZoomLevel::Text => matches!(candidate.kind, MemoryKind::Document),
        }
    }

    /// The ZPT match score used in merge weighting:
    /// 1.0 full match, 0.5 partial, 0.0 otherwise
    #[must_use]
    pub fn zpt_match(&self, candidate: &Interaction) -> f32 {
        let kind_ok = self.zoom_admits(candidate);
        let (present, satisfied) = self.pan.evaluate(candidate);
        let pan_full = satisfied == present;
        let pan_any = present == 0 || satisfied > 0;

        if kind_ok && pan_full {
            1.0
        } else if (kind_ok && pan_any) || (!kind_ok && pan_full) {
            0.5
        } else {
            0.0
        }
    }

    /// Hard visibility filter for the local branch: pan predicates AND
    /// fade-out exclusion
    #[must_use]
    pub fn admits(&self, candidate: &Interaction) -> bool {
        !self.fade_out.contains(&candidate.id) && self.pan.matches(candidate)
    }
}

/// Whether the candidate's concepts include a named entity.
///
/// Concept labels are lowercased during extraction, so the casing signal is
/// recovered from the candidate's own text: a concept counts as a named
/// entity when its leading word occurs capitalized there, away from a
/// sentence start.
fn has_named_entity(candidate: &Interaction) -> bool {
    if candidate.concepts.is_empty() {
        return false;
    }
    let text = candidate.content();
    candidate
        .concepts
        .iter()
        .any(|concept| concept_is_entity(concept, &text))
}

fn concept_is_entity(concept: &str, text: &str) -> bool {
    let Some(head) = concept.split_whitespace().next() else {
        return false;
    };
    let mut sentence_start = true;
    for word in text.split_whitespace() {
        let trimmed = word.trim_matches(|c: char| !c.is_alphanumeric());
        if !sentence_start
            && trimmed.eq_ignore_ascii_case(head)
            && trimmed.chars().next().is_some_and(char::is_uppercase)
        {
            return true;
        }
        sentence_start = word.ends_with(['.', '!', '?', ':']);
    }
    false
}
