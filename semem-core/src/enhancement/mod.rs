//! Enhancement coordinator
//!
//! Fans a question out to the enabled external-knowledge providers, caching
//! results as first-class enhancement records keyed by
//! `(provider, normalized question)`. Misses run with a per-call timeout and
//! bounded retries; failures drop that provider from the round, never the
//! verb.

pub mod hypothetical;
#[cfg(feature = "http-providers")]
pub mod lookup;
pub mod mock;
pub mod provider;

pub use hypothetical::HypotheticalProvider;
#[cfg(feature = "http-providers")]
pub use lookup::{EncyclopedicLookupProvider, FactualLookupProvider};
pub use mock::MockEnhancementProvider;
pub use provider::EnhancementProvider;

use crate::config::EnhancementConfig;
use crate::deadline::Deadline;
use crate::metrics::CacheMetrics;
use crate::types::{
    derive_enhancement_id, EnhancementInfo, EnhancementProviderKind, Interaction, MemoryKind,
};
use lru::LruCache;
use parking_lot::Mutex;
use rand::RngExt;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::Arc;
use tracing::{debug, warn};

/// One provider's contribution to a retrieval round
#[derive(Debug, Clone)]
pub struct EnhancementOutcome {
    /// The enhancement record (cached or fresh)
    pub record: Interaction,
    /// Which provider family produced it
    pub provider: EnhancementProviderKind,
    /// Whether the cache served it without an outbound call
    pub cache_hit: bool,
}

/// Coordinator over the configured enhancement providers
pub struct EnhancementCoordinator {
    providers: HashMap<EnhancementProviderKind, Arc<dyn EnhancementProvider>>,
    cache: Mutex<LruCache<(EnhancementProviderKind, String), Interaction>>,
    metrics: Mutex<CacheMetrics>,
    config: EnhancementConfig,
}

impl EnhancementCoordinator {
    /// Create a coordinator over `providers` (at most one per family)
    pub fn new(providers: Vec<Arc<dyn EnhancementProvider>>, config: EnhancementConfig) -> Self {
        let capacity =
            NonZeroUsize::new(config.cache_capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        let metrics = CacheMetrics {
            capacity: capacity.get(),
            ..CacheMetrics::default()
        };
        let providers = providers
            .into_iter()
            .map(|provider| (provider.kind(), provider))
            .collect();
        Self {
            providers,
            cache: Mutex::new(LruCache::new(capacity)),
            metrics: Mutex::new(metrics),
            config,
        }
    }

    /// Whether a provider of this family is configured
    #[must_use]
    pub fn has_provider(&self, kind: EnhancementProviderKind) -> bool {
        self.providers.contains_key(&kind)
    }

    /// Cache counters
    pub fn cache_metrics(&self) -> CacheMetrics {
        let mut metrics = self.metrics.lock().clone();
        metrics.size = self.cache.lock().len();
        metrics
    }

    /// Run the enabled providers concurrently and return the successful
    /// subset. Never errs; per-provider failures are logged and dropped.
    pub async fn enhance(
        &self,
        question: &str,
        enabled: &[EnhancementProviderKind],
        deadline: Deadline,
    ) -> Vec<EnhancementOutcome> {
        let normalized = normalize_question(question);
        let futures: Vec<_> = enabled
            .iter()
            .filter_map(|kind| {
                self.providers
                    .get(kind)
                    .map(|provider| self.run_provider(question, &normalized, provider, deadline))
            })
            .collect();

        let results = futures::future::join_all(futures).await;
        results.into_iter().flatten().collect()
    }

    async fn run_provider(
        &self,
        question: &str,
        normalized: &str,
        provider: &Arc<dyn EnhancementProvider>,
        deadline: Deadline,
    ) -> Option<EnhancementOutcome> {
        let kind = provider.kind();

        if let Some(record) = self.cache_get(kind, normalized) {
            debug!(provider = provider.name(), "enhancement cache hit");
            return Some(EnhancementOutcome {
                record,
                provider: kind,
                cache_hit: true,
            });
        }

        let content = self
            .lookup_with_retry(question, provider, deadline)
            .await?;

        let record = self.build_record(kind, provider.name(), question, normalized, content);
        self.cache_put(kind, normalized, record.clone());
        Some(EnhancementOutcome {
            record,
            provider: kind,
            cache_hit: false,
        })
    }

    /// Per-call timeout with ≤ `max_retries` retries under exponential
    /// backoff (jittered), all inside the caller's deadline
    async fn lookup_with_retry(
        &self,
        question: &str,
        provider: &Arc<dyn EnhancementProvider>,
        deadline: Deadline,
    ) -> Option<String> {
        for attempt in 0..=self.config.max_retries {
            if deadline.expired() {
                warn!(provider = provider.name(), "enhancement deadline expired");
                return None;
            }
            let effective = deadline.capped(self.config.provider_timeout);
            match effective
                .run_provider(provider.name(), provider.lookup(question))
                .await
            {
                Ok(Ok(content)) => return Some(content),
                Ok(Err(err)) => {
                    warn!(provider = provider.name(), attempt, error = %err, "enhancement lookup failed");
                }
                Err(_) => {
                    warn!(provider = provider.name(), attempt, "enhancement lookup timed out");
                }
            }
            if attempt < self.config.max_retries {
                tokio::time::sleep(self.backoff_delay(attempt)).await;
            }
        }
        None
    }

    fn backoff_delay(&self, attempt: u32) -> std::time::Duration {
        let base = self.config.backoff_base.as_millis() as f64;
        let raw = base * 2f64.powi(attempt as i32);
        let capped = raw.min(self.config.backoff_cap.as_millis() as f64);
        let jitter = self.config.backoff_jitter;
        let factor = rand::rng().random_range(1.0 - jitter..=1.0 + jitter);
        std::time::Duration::from_millis((capped * factor) as u64)
    }

    fn build_record(
        &self,
        kind: EnhancementProviderKind,
        provider_name: &str,
        question: &str,
        normalized: &str,
        content: String,
    ) -> Interaction {
        let mut record =
            Interaction::new(MemoryKind::Enhancement, question.to_string(), content);
        record.id = derive_enhancement_id(kind, normalized);
        record.metadata.source = Some(provider_name.to_string());
        record.enhancement = Some(EnhancementInfo {
            source_query: normalized.to_string(),
            provider: kind,
            cache_ttl_secs: self.config.cache_ttl.as_secs(),
            linked_personal_ids: Vec::new(),
        });
        record
    }

    fn cache_get(&self, kind: EnhancementProviderKind, normalized: &str) -> Option<Interaction> {
        let key = (kind, normalized.to_string());
        let mut cache = self.cache.lock();
        let mut metrics = self.metrics.lock();
        match cache.get(&key) {
            Some(record) => {
                if record.is_demoted(chrono::Utc::now()) {
                    cache.pop(&key);
                    metrics.misses += 1;
                    metrics.evictions += 1;
                    None
                } else {
                    metrics.hits += 1;
                    Some(record.clone())
                }
            }
            None => {
                metrics.misses += 1;
                None
            }
        }
    }

    fn cache_put(&self, kind: EnhancementProviderKind, normalized: &str, record: Interaction) {
        let key = (kind, normalized.to_string());
        let mut cache = self.cache.lock();
        let mut metrics = self.metrics.lock();
        if cache.len() == cache.cap().get() && !cache.contains(&key) {
            metrics.evictions += 1;
        }
        cache.put(key, record);
        metrics.size = cache.len();
    }
}

/// Cache-key normalization: lowercase, punctuation stripped, whitespace
/// collapsed
#[must_use]
pub fn normalize_question(question: &str) -> String {
    question
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(10))
    }

    fn coordinator_with(
        providers: Vec<Arc<MockEnhancementProvider>>,
    ) -> EnhancementCoordinator {
        let dyns: Vec<Arc<dyn EnhancementProvider>> = providers
            .into_iter()
            .map(|p| p as Arc<dyn EnhancementProvider>)
            .collect();
        let config = EnhancementConfig {
            backoff_base: Duration::from_millis(1),
            backoff_cap: Duration::from_millis(4),
            ..EnhancementConfig::default()
        };
        EnhancementCoordinator::new(dyns, config)
    }

    #[test]
    fn test_normalize_question() {
        assert_eq!(
            normalize_question("  What   IS  cellular respiration?! "),
            "what is cellular respiration"
        );
        assert_eq!(normalize_question("ATP's role"), "atp s role");
    }

    #[tokio::test]
    async fn test_enhance_returns_records_with_namespaced_ids() {
        let wiki = Arc::new(MockEnhancementProvider::new(
            EnhancementProviderKind::Encyclopedic,
            "wikipedia",
        ));
        let coordinator = coordinator_with(vec![wiki]);
        let outcomes = coordinator
            .enhance(
                "What is ATP?",
                &[EnhancementProviderKind::Encyclopedic],
                deadline(),
            )
            .await;
        assert_eq!(outcomes.len(), 1);
        assert!(!outcomes[0].cache_hit);
        assert!(outcomes[0].record.id.contains(":encyclopedic:"));
        assert_eq!(outcomes[0].record.kind, MemoryKind::Enhancement);
    }

    #[tokio::test]
    async fn test_second_call_hits_cache_without_outbound_call() {
        let wiki = Arc::new(MockEnhancementProvider::new(
            EnhancementProviderKind::Encyclopedic,
            "wikipedia",
        ));
        let coordinator = coordinator_with(vec![wiki.clone()]);
        let enabled = [EnhancementProviderKind::Encyclopedic];

        let first = coordinator.enhance("What is ATP?", &enabled, deadline()).await;
        // Different surface form, same normalized key
        let second = coordinator
            .enhance("what is atp", &enabled, deadline())
            .await;

        assert!(!first[0].cache_hit);
        assert!(second[0].cache_hit);
        assert_eq!(first[0].record.id, second[0].record.id);
        assert_eq!(wiki.call_count(), 1);
    }

    #[tokio::test]
    async fn test_failing_provider_dropped_others_survive() {
        let wiki = Arc::new(MockEnhancementProvider::new(
            EnhancementProviderKind::Encyclopedic,
            "wikipedia",
        ));
        let wd = Arc::new(MockEnhancementProvider::new(
            EnhancementProviderKind::Factual,
            "wikidata",
        ));
        wd.set_failing(true);
        let coordinator = coordinator_with(vec![wiki, wd.clone()]);

        let outcomes = coordinator
            .enhance(
                "What is ATP?",
                &[
                    EnhancementProviderKind::Encyclopedic,
                    EnhancementProviderKind::Factual,
                ],
                deadline(),
            )
            .await;

        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].provider, EnhancementProviderKind::Encyclopedic);
        // Initial attempt + two retries
        assert_eq!(wd.call_count(), 3);
    }

    #[tokio::test]
    async fn test_unconfigured_provider_is_skipped() {
        let coordinator = coordinator_with(vec![]);
        let outcomes = coordinator
            .enhance(
                "anything",
                &[EnhancementProviderKind::Encyclopedic],
                deadline(),
            )
            .await;
        assert!(outcomes.is_empty());
    }

    #[tokio::test]
    async fn test_expired_record_is_a_miss() {
        let wiki = Arc::new(MockEnhancementProvider::new(
            EnhancementProviderKind::Encyclopedic,
            "wikipedia",
        ));
        let dyns: Vec<Arc<dyn EnhancementProvider>> = vec![wiki.clone()];
        let config = EnhancementConfig {
            cache_ttl: Duration::from_secs(0),
            backoff_base: Duration::from_millis(1),
            ..EnhancementConfig::default()
        };
        let coordinator = EnhancementCoordinator::new(dyns, config);
        let enabled = [EnhancementProviderKind::Encyclopedic];

        coordinator.enhance("q", &enabled, deadline()).await;
        let second = coordinator.enhance("q", &enabled, deadline()).await;
        assert!(!second[0].cache_hit);
        assert_eq!(wiki.call_count(), 2);
    }
}
