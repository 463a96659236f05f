//! In-memory triple store
//!
//! Backs tests and degraded-mode operation. Honors the same transactional
//! `batch` contract as remote backends and can simulate an unreachable
//! store for failure-path tests.

use super::{BindingRow, Mutation, Term, Triple, TriplePattern, TripleStore};
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

/// In-memory named-graph triple store with failure injection
#[derive(Default)]
pub struct InMemoryTripleStore {
    graphs: RwLock<HashMap<String, Vec<Triple>>>,
    unavailable: AtomicBool,
}

impl InMemoryTripleStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an unreachable backend (every call errs)
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Total triple count across graphs
    pub async fn len(&self) -> usize {
        self.graphs.read().await.values().map(Vec::len).sum()
    }

    /// Whether the store holds no triples
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    fn check_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(Error::StoreUnavailable("in-memory store offline".into()));
        }
        Ok(())
    }

    fn apply(graphs: &mut HashMap<String, Vec<Triple>>, mutation: Mutation) {
        match mutation {
            Mutation::Insert { graph, triple } => {
                graphs.entry(graph).or_default().push(triple);
            }
            Mutation::Delete(pattern) => {
                if let Some(triples) = graphs.get_mut(&pattern.graph) {
                    triples.retain(|t| !pattern.matches(t));
                }
            }
        }
    }
}

#[async_trait]
impl TripleStore for InMemoryTripleStore {
    async fn select(
        &self,
        pattern: &TriplePattern,
        _deadline: Deadline,
    ) -> Result<Vec<BindingRow>> {
        self.check_available()?;
        let graphs = self.graphs.read().await;
        let Some(triples) = graphs.get(&pattern.graph) else {
            return Ok(vec![]);
        };
        let mut rows = Vec::new();
        for triple in triples.iter().filter(|t| pattern.matches(t)) {
            let mut row = BindingRow::new();
            if pattern.subject.is_none() {
                row.insert("s".to_string(), Term::Iri(triple.subject.clone()));
            }
            if pattern.predicate.is_none() {
                row.insert("p".to_string(), Term::Iri(triple.predicate.clone()));
            }
            if pattern.object.is_none() {
                row.insert("o".to_string(), triple.object.clone());
            }
            rows.push(row);
        }
        Ok(rows)
    }

    async fn construct(
        &self,
        pattern: &TriplePattern,
        _deadline: Deadline,
    ) -> Result<Vec<Triple>> {
        self.check_available()?;
        let graphs = self.graphs.read().await;
        Ok(graphs
            .get(&pattern.graph)
            .map(|triples| {
                triples
                    .iter()
                    .filter(|t| pattern.matches(t))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn update(&self, mutation: Mutation, _deadline: Deadline) -> Result<()> {
        self.check_available()?;
        let mut graphs = self.graphs.write().await;
        Self::apply(&mut graphs, mutation);
        Ok(())
    }

    async fn ask(&self, pattern: &TriplePattern, _deadline: Deadline) -> Result<bool> {
        self.check_available()?;
        let graphs = self.graphs.read().await;
        Ok(graphs
            .get(&pattern.graph)
            .is_some_and(|triples| triples.iter().any(|t| pattern.matches(t))))
    }

    async fn batch(&self, mutations: Vec<Mutation>, _deadline: Deadline) -> Result<()> {
        self.check_available()?;
        // Single write-lock acquisition makes the batch atomic
        let mut graphs = self.graphs.write().await;
        for mutation in mutations {
            Self::apply(&mut graphs, mutation);
        }
        Ok(())
    }

    async fn probe(&self, _deadline: Deadline) -> Result<()> {
        self.check_available()
    }
}
