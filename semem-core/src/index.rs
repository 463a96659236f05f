//! In-memory vector index
//!
//! Pure cache over the Persistent Store: `(id, vector)` pairs with cosine
//! nearest-neighbour search. Writes land in a pending buffer and are folded
//! into the scan storage by a debounced flush so bulk chunk ingestion does
//! not thrash the structure; searches always see buffered entries, which
//! keeps read-your-writes inside a session.
//!
//! Single-writer / multi-reader: mutations take the write lock, searches the
//! read lock.

use crate::embeddings::cosine_similarity;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Default)]
struct IndexState {
    /// Flushed entries, scanned in insertion order
    entries: Vec<(String, Vec<f32>)>,
    /// Position of each flushed id in `entries`
    positions: HashMap<String, usize>,
    /// Writes waiting for the next flush
    pending: HashMap<String, Option<Vec<f32>>>,
}

/// In-memory NN index with buffered, debounced writes
pub struct VectorIndex {
    state: RwLock<IndexState>,
    flush_debounce: Duration,
    flush_scheduled: AtomicBool,
}

impl VectorIndex {
    /// Create an empty index flushing `flush_debounce` after the first
    /// buffered write
    #[must_use]
    pub fn new(flush_debounce: Duration) -> Self {
        Self {
            state: RwLock::new(IndexState::default()),
            flush_debounce,
            flush_scheduled: AtomicBool::new(false),
        }
    }

    /// Buffer an upsert of `(id, vector)`
    pub fn add(&self, id: &str, vector: Vec<f32>) {
        let mut state = self.state.write();
        state.pending.insert(id.to_string(), Some(vector));
    }

    /// Buffer a removal of `id`
    pub fn remove(&self, id: &str) {
        let mut state = self.state.write();
        state.pending.insert(id.to_string(), None);
    }

    /// Cosine top-`k` over flushed and buffered entries.
    ///
    /// Deterministic: ties break by id ascending. Vectors whose length does
    /// not match `query` are skipped rather than scored.
    #[must_use]
    pub fn search(&self, query: &[f32], k: usize) -> Vec<(String, f32)> {
        let state = self.state.read();
        let mut scored: Vec<(String, f32)> = Vec::new();

        for (id, vector) in &state.entries {
            if state.pending.contains_key(id) {
                continue; // superseded by a buffered write
            }
            if let Ok(score) = cosine_similarity(query, vector) {
                scored.push((id.clone(), score));
            }
        }
        for (id, slot) in &state.pending {
            if let Some(vector) = slot {
                if let Ok(score) = cosine_similarity(query, vector) {
                    scored.push((id.clone(), score));
                }
            }
        }

        scored.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        scored.truncate(k);
        scored
    }

    /// Fetch the indexed vector for `id`, buffered writes included
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Vec<f32>> {
        let state = self.state.read();
        if let Some(slot) = state.pending.get(id) {
            return slot.clone();
        }
        state
            .positions
            .get(id)
            .map(|&pos| state.entries[pos].1.clone())
    }

    /// Whether `id` is present (buffered writes included)
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.get(id).is_some()
    }

    /// Number of live entries (buffered writes included)
    #[must_use]
    pub fn len(&self) -> usize {
        let state = self.state.read();
        let mut count = state.entries.len();
        for (id, slot) in &state.pending {
            let flushed = state.positions.contains_key(id);
            match (slot, flushed) {
                (Some(_), false) => count += 1,
                (None, true) => count -= 1,
                _ => {}
            }
        }
        count
    }

    /// Whether the index holds no entries
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of writes waiting for a flush
    #[must_use]
    pub fn pending_len(&self) -> usize {
        self.state.read().pending.len()
    }

    /// Fold all buffered writes into the scan storage.
    ///
    /// Takes the exclusive lock for the duration of the fold.
    pub fn flush(&self) {
        let mut state = self.state.write();
        if state.pending.is_empty() {
            return;
        }
        let pending = std::mem::take(&mut state.pending);
        let flushed = pending.len();
        for (id, slot) in pending {
            match slot {
                Some(vector) => {
                    if let Some(&pos) = state.positions.get(&id) {
                        state.entries[pos].1 = vector;
                    } else {
                        let pos = state.entries.len();
                        state.entries.push((id.clone(), vector));
                        state.positions.insert(id, pos);
                    }
                }
                None => {
                    if let Some(pos) = state.positions.remove(&id) {
                        state.entries.remove(pos);
                        for moved_pos in state.positions.values_mut() {
                            if *moved_pos > pos {
                                *moved_pos -= 1;
                            }
                        }
                    }
                }
            }
        }
        debug!(flushed, total = state.entries.len(), "vector index flushed");
    }

    /// Schedule a debounced flush if none is already pending.
    ///
    /// The flush runs `flush_debounce` from now on the Tokio runtime.
    pub fn schedule_flush(self: &Arc<Self>) {
        if self
            .flush_scheduled
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return;
        }
        let index = Arc::clone(self);
        tokio::spawn(async move {
            tokio::time::sleep(index.flush_debounce).await;
            index.flush_scheduled.store(false, Ordering::SeqCst);
            index.flush();
        });
    }
}
