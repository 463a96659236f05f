//! Session registry
//!
//! Sessions are opaque IDs owning a navigation state, a bounded working set
//! of recent interactions, and a write lock serializing navigation
//! mutations. State is persisted through the store so a session survives
//! process restarts; idle sessions are evicted from memory only.

use crate::config::SessionConfig;
use crate::deadline::Deadline;
use crate::store::InteractionStore;
use crate::types::Interaction;
use crate::zpt::NavigationState;
use chrono::{DateTime, Utc};
use lru::LruCache;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

/// One live session
pub struct Session {
    /// Opaque session identifier
    pub id: String,
    nav: RwLock<NavigationState>,
    recent: Mutex<LruCache<String, Interaction>>,
    last_active: Mutex<DateTime<Utc>>,
}

impl Session {
    fn new(id: String, nav: NavigationState, cache_capacity: usize) -> Arc<Self> {
        let capacity = NonZeroUsize::new(cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Arc::new(Self {
            id,
            nav: RwLock::new(nav),
            recent: Mutex::new(LruCache::new(capacity)),
            last_active: Mutex::new(Utc::now()),
        })
    }

    /// Snapshot of the navigation state
    pub async fn navigation(&self) -> NavigationState {
        self.nav.read().await.clone()
    }

    /// Mutate the navigation state under the session's write lock.
    ///
    /// The write lock serializes concurrent zoom/pan/tilt calls from the
    /// same session; readers proceed in parallel.
    pub async fn update_navigation<F>(&self, mutate: F) -> NavigationState
    where
        F: FnOnce(&mut NavigationState),
    {
        let mut nav = self.nav.write().await;
        mutate(&mut nav);
        nav.clone()
    }

    /// Record an interaction in the session working set
    pub fn remember_recent(&self, interaction: Interaction) {
        self.recent
            .lock()
            .put(interaction.id.clone(), interaction);
    }

    /// Recent interactions, most recently used first
    pub fn recent(&self) -> Vec<Interaction> {
        self.recent
            .lock()
            .iter()
            .map(|(_, interaction)| interaction.clone())
            .collect()
    }

    /// Number of working-set entries
    pub fn recent_len(&self) -> usize {
        self.recent.lock().len()
    }

    fn touch(&self) {
        *self.last_active.lock() = Utc::now();
    }

    fn idle_since(&self) -> DateTime<Utc> {
        *self.last_active.lock()
    }
}

/// Registry of live sessions with TTL eviction
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    store: Arc<InteractionStore>,
    config: SessionConfig,
}

impl SessionRegistry {
    /// Create a registry persisting navigation state through `store`
    pub fn new(store: Arc<InteractionStore>, config: SessionConfig) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            store,
            config,
        }
    }

    /// Resolve or create a session, restoring persisted navigation state
    /// for sessions not currently in memory
    pub async fn resolve(&self, session_id: &str, deadline: Deadline) -> Arc<Session> {
        {
            let sessions = self.sessions.read().await;
            if let Some(session) = sessions.get(session_id) {
                session.touch();
                return Arc::clone(session);
            }
        }

        let nav = self
            .store
            .load_navigation(session_id, deadline)
            .await
            .ok()
            .flatten()
            .unwrap_or_default();

        let mut sessions = self.sessions.write().await;
        let session = sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                Session::new(session_id.to_string(), nav, self.config.cache_capacity)
            });
        session.touch();
        Arc::clone(session)
    }

    /// Persist a session's navigation state
    pub async fn persist_navigation(&self, session: &Session, deadline: Deadline) {
        let nav = session.navigation().await;
        if let Err(err) = self
            .store
            .save_navigation(&session.id, &nav, deadline)
            .await
        {
            tracing::warn!(session = %session.id, error = %err, "failed to persist navigation state");
        }
    }

    /// Number of live sessions
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Whether no session is live
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }

    /// Evict sessions idle longer than the configured TTL.
    ///
    /// Durable navigation state is untouched; an evicted session restores on
    /// its next verb.
    pub async fn evict_idle(&self) -> usize {
        let ttl = chrono::Duration::from_std(self.config.session_ttl)
            .unwrap_or_else(|_| chrono::Duration::hours(24));
        let cutoff = Utc::now() - ttl;
        let mut sessions = self.sessions.write().await;
        let before = sessions.len();
        sessions.retain(|_, session| session.idle_since() > cutoff);
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!(evicted, "idle sessions evicted from memory");
        }
        evicted
    }
}
