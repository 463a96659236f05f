//! LLM service: chat completion and concept extraction with failover
//!
//! Providers form a priority-ordered chain; a failure moves to the next
//! provider and the chain itself never retries a provider. Concept
//! extraction normalizes to a lowercase, de-duplicated, length-capped set
//! and degrades to an empty set instead of failing a verb.

pub mod mock;
pub mod provider;
#[cfg(feature = "http-providers")]
pub mod remote;

pub use mock::MockChatProvider;
pub use provider::{ChatProvider, CONCEPT_EXTRACTION_PROMPT};
#[cfg(feature = "http-providers")]
pub use remote::RemoteChatProvider;

use crate::config::LlmConfig;
use crate::deadline::Deadline;
use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, warn};

/// A chat completion together with the provider that served it
#[derive(Debug, Clone)]
pub struct ChatOutcome {
    /// The completion text
    pub text: String,
    /// Name of the provider that answered (after failover)
    pub provider: String,
}

/// Failover-chain front end over one or more [`ChatProvider`]s
pub struct LlmService {
    chain: Vec<Arc<dyn ChatProvider>>,
    config: LlmConfig,
}

impl LlmService {
    /// Create a service over a priority-ordered provider chain.
    ///
    /// # Errors
    ///
    /// `Validation` when the chain is empty.
    pub fn new(chain: Vec<Arc<dyn ChatProvider>>, config: LlmConfig) -> Result<Self> {
        if chain.is_empty() {
            return Err(Error::Validation(
                "LLM provider chain must not be empty".to_string(),
            ));
        }
        Ok(Self { chain, config })
    }

    /// Names of the chain providers in priority order
    #[must_use]
    pub fn provider_names(&self) -> Vec<String> {
        self.chain.iter().map(|p| p.name().to_string()).collect()
    }

    /// Run a chat completion through the failover chain.
    ///
    /// # Errors
    ///
    /// `ProviderUnavailable` when every provider fails,
    /// `ProviderTimeout`/`DeadlineExceeded` on expiry.
    pub async fn chat(&self, system: &str, prompt: &str, deadline: Deadline) -> Result<ChatOutcome> {
        let mut last_error = None;
        for provider in &self.chain {
            let effective = deadline.capped(self.config.timeout);
            match effective
                .run_provider(provider.name(), provider.chat(system, prompt))
                .await
            {
                Ok(Ok(text)) => {
                    debug!(provider = provider.name(), "chat completion served");
                    return Ok(ChatOutcome {
                        text,
                        provider: provider.name().to_string(),
                    });
                }
                Ok(Err(err)) => {
                    warn!(provider = provider.name(), error = %err, "chat provider failed, trying next");
                    last_error = Some(Error::ProviderUnavailable(format!(
                        "chat provider {}: {err}",
                        provider.name()
                    )));
                }
                Err(timeout) => {
                    warn!(provider = provider.name(), "chat provider timed out, trying next");
                    last_error = Some(timeout);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| {
            Error::ProviderUnavailable("no chat provider configured".to_string())
        }))
    }

    /// Extract a normalized concept set from `text`.
    ///
    /// Never fails: any provider or parse error yields the empty set.
    pub async fn extract_concepts(&self, text: &str, deadline: Deadline) -> Vec<String> {
        for provider in &self.chain {
            let effective = deadline.capped(self.config.timeout);
            match effective
                .run_provider(provider.name(), provider.complete_concepts(text))
                .await
            {
                Ok(Ok(raw)) => {
                    let concepts = self.normalize_concepts(&raw);
                    if !concepts.is_empty() {
                        return concepts;
                    }
                }
                Ok(Err(err)) => {
                    warn!(provider = provider.name(), error = %err, "concept extraction failed, trying next");
                }
                Err(_) => {
                    warn!(provider = provider.name(), "concept extraction timed out, trying next");
                }
            }
        }
        Vec::new()
    }

    /// Parse a raw extraction completion into the normalized set:
    /// lowercase, trimmed, de-duplicated, each ≤ `max_concept_len`,
    /// at most `max_concepts` entries.
    fn normalize_concepts(&self, raw: &str) -> Vec<String> {
        let candidates: Vec<String> = match serde_json::from_str::<Vec<String>>(raw.trim()) {
            Ok(list) => list,
            // Fall back to comma/newline-separated text from sloppier models
            Err(_) => raw
                .split(|c| c == ',' || c == '\n')
                .map(|s| s.trim_matches(|c: char| !c.is_alphanumeric() && c != ' ' && c != '-'))
                .map(str::to_string)
                .collect(),
        };

        let mut seen = BTreeSet::new();
        let mut out = Vec::new();
        for candidate in candidates {
            let concept = candidate.trim().to_lowercase();
            if concept.is_empty() || concept.len() > self.config.max_concept_len {
                continue;
            }
            if seen.insert(concept.clone()) {
                out.push(concept);
                if out.len() >= self.config.max_concepts {
                    break;
                }
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn deadline() -> Deadline {
        Deadline::after(Duration::from_secs(5))
    }

    #[tokio::test]
    async fn test_chat_uses_first_healthy_provider() {
        let primary = Arc::new(MockChatProvider::new("primary"));
        let secondary = Arc::new(MockChatProvider::new("secondary"));
        let service = LlmService::new(
            vec![primary.clone(), secondary.clone()],
            LlmConfig::default(),
        )
        .unwrap();

        let outcome = service.chat("system", "hello", deadline()).await.unwrap();
        assert_eq!(outcome.provider, "primary");
        assert_eq!(secondary.call_count(), 0);
    }

    #[tokio::test]
    async fn test_failover_to_secondary() {
        let primary = Arc::new(MockChatProvider::new("primary"));
        let secondary = Arc::new(MockChatProvider::new("secondary"));
        primary.set_failing(true);
        let service = LlmService::new(
            vec![primary.clone(), secondary.clone()],
            LlmConfig::default(),
        )
        .unwrap();

        let outcome = service.chat("system", "hello", deadline()).await.unwrap();
        assert_eq!(outcome.provider, "secondary");
        assert_eq!(primary.call_count(), 1);
    }

    #[tokio::test]
    async fn test_all_providers_down() {
        let only = Arc::new(MockChatProvider::new("only"));
        only.set_failing(true);
        let service = LlmService::new(vec![only], LlmConfig::default()).unwrap();
        let result = service.chat("s", "p", deadline()).await;
        assert!(matches!(result, Err(Error::ProviderUnavailable(_))));
    }

    #[tokio::test]
    async fn test_extract_concepts_normalized() {
        let provider = Arc::new(MockChatProvider::new("primary"));
        let service = LlmService::new(vec![provider], LlmConfig::default()).unwrap();
        let concepts = service
            .extract_concepts(
                "Mitochondria produce ATP via cellular respiration.",
                deadline(),
            )
            .await;
        assert!(concepts.len() >= 2);
        assert!(concepts.iter().all(|c| c.chars().all(|ch| !ch.is_uppercase())));
        let unique: BTreeSet<_> = concepts.iter().collect();
        assert_eq!(unique.len(), concepts.len());
    }

    #[tokio::test]
    async fn test_extract_concepts_never_fails() {
        let provider = Arc::new(MockChatProvider::new("down"));
        provider.set_failing(true);
        let service = LlmService::new(vec![provider], LlmConfig::default()).unwrap();
        let concepts = service.extract_concepts("anything", deadline()).await;
        assert!(concepts.is_empty());
    }

    #[test]
    fn test_empty_chain_rejected() {
        assert!(LlmService::new(vec![], LlmConfig::default()).is_err());
    }

    #[test]
    fn test_normalize_parses_loose_comma_lists() {
        let provider: Arc<dyn ChatProvider> = Arc::new(MockChatProvider::new("p"));
        let service = LlmService::new(vec![provider], LlmConfig::default()).unwrap();
        let concepts = service.normalize_concepts("Alpha, beta , ALPHA\ngamma-ray");
        assert_eq!(concepts, vec!["alpha", "beta", "gamma-ray"]);
    }
}
