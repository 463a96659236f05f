//! Persistent store abstraction
//!
//! The authoritative store speaks a triple-pattern query/update protocol.
//! The engine only touches it through [`TripleStore`]: `select`, `construct`,
//! `update`, `ask`, and transactional `batch`. Backends parameterize
//! templates from these typed patterns; no query text is ever concatenated
//! from user input.

pub mod interactions;
pub mod memory;
pub mod vocab;

pub use interactions::InteractionStore;
pub use memory::InMemoryTripleStore;
pub use vocab::Vocab;

use crate::deadline::Deadline;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// An RDF term in object position
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Term {
    /// An IRI reference
    Iri(String),
    /// A plain string literal
    Literal(String),
    /// A literal with a datatype IRI (embeddings, timestamps, counters)
    Typed {
        /// Lexical value
        value: String,
        /// Datatype IRI
        datatype: String,
    },
}

impl Term {
    /// The lexical value regardless of term shape
    #[must_use]
    pub fn lexical(&self) -> &str {
        match self {
            Term::Iri(v) | Term::Literal(v) => v,
            Term::Typed { value, .. } => value,
        }
    }
}

/// One triple inside a named graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Triple {
    /// Subject IRI
    pub subject: String,
    /// Predicate IRI
    pub predicate: String,
    /// Object term
    pub object: Term,
}

impl Triple {
    /// Convenience constructor
    #[must_use]
    pub fn new(subject: &str, predicate: &str, object: Term) -> Self {
        Self {
            subject: subject.to_string(),
            predicate: predicate.to_string(),
            object,
        }
    }
}

/// A triple pattern: `None` slots are wildcards bound by the query
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriplePattern {
    /// Named graph to match in
    pub graph: String,
    /// Subject IRI, or wildcard
    pub subject: Option<String>,
    /// Predicate IRI, or wildcard
    pub predicate: Option<String>,
    /// Object term, or wildcard
    pub object: Option<Term>,
}

impl TriplePattern {
    /// Pattern over everything in `graph`
    #[must_use]
    pub fn any(graph: &str) -> Self {
        Self {
            graph: graph.to_string(),
            ..Self::default()
        }
    }

    /// Pattern for all triples of `subject`
    #[must_use]
    pub fn subject(graph: &str, subject: &str) -> Self {
        Self {
            graph: graph.to_string(),
            subject: Some(subject.to_string()),
            ..Self::default()
        }
    }

    /// Pattern for `(?, predicate, object)`
    #[must_use]
    pub fn predicate_object(graph: &str, predicate: &str, object: Term) -> Self {
        Self {
            graph: graph.to_string(),
            predicate: Some(predicate.to_string()),
            object: Some(object),
            ..Self::default()
        }
    }

    /// Whether a concrete triple matches this pattern
    #[must_use]
    pub fn matches(&self, triple: &Triple) -> bool {
        self.subject.as_ref().is_none_or(|s| *s == triple.subject)
            && self
                .predicate
                .as_ref()
                .is_none_or(|p| *p == triple.predicate)
            && self.object.as_ref().is_none_or(|o| *o == triple.object)
    }
}

/// One row of variable bindings from `select`.
///
/// Wildcard slots bind under `"s"`, `"p"`, `"o"`.
pub type BindingRow = HashMap<String, Term>;

/// A mutation against a named graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Mutation {
    /// Insert one triple
    Insert {
        /// Target named graph
        graph: String,
        /// Triple to insert
        triple: Triple,
    },
    /// Delete every triple matching the pattern
    Delete(TriplePattern),
}

/// The narrow protocol every backend implements
#[async_trait]
pub trait TripleStore: Send + Sync {
    /// Bind wildcard slots of `pattern` against the graph
    async fn select(&self, pattern: &TriplePattern, deadline: Deadline)
        -> Result<Vec<BindingRow>>;

    /// Return all triples matching `pattern`
    async fn construct(&self, pattern: &TriplePattern, deadline: Deadline) -> Result<Vec<Triple>>;

    /// Apply a single mutation
    async fn update(&self, mutation: Mutation, deadline: Deadline) -> Result<()>;

    /// Whether any triple matches `pattern`
    async fn ask(&self, pattern: &TriplePattern, deadline: Deadline) -> Result<bool>;

    /// Apply all mutations transactionally: either all land or none do
    async fn batch(&self, mutations: Vec<Mutation>, deadline: Deadline) -> Result<()>;

    /// Liveness probe
    async fn probe(&self, deadline: Deadline) -> Result<()>;
}
