//! Hypothetical-document expansion provider
//!
//! Generates an "as-if" answer to the question through the LLM service. The
//! output is a retrieval-only signal: it augments the query embedding and
//! seeds a second local search round, and is never cited as a source.

use super::provider::EnhancementProvider;
use crate::deadline::Deadline;
use crate::llm::LlmService;
use crate::types::EnhancementProviderKind;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

const HYPOTHETICAL_PROMPT: &str = "Write a short, plausible answer to the question as if you \
had perfect knowledge. It will be used only as a search probe, so prefer concrete nouns and \
terminology over hedging.";

/// LLM-backed hypothetical expansion
pub struct HypotheticalProvider {
    llm: Arc<LlmService>,
    budget: Duration,
}

impl HypotheticalProvider {
    /// Create a provider over the engine's LLM service
    #[must_use]
    pub fn new(llm: Arc<LlmService>, budget: Duration) -> Self {
        Self { llm, budget }
    }
}

#[async_trait]
impl EnhancementProvider for HypotheticalProvider {
    fn kind(&self) -> EnhancementProviderKind {
        EnhancementProviderKind::Hypothetical
    }

    fn name(&self) -> &str {
        "hyde"
    }

    async fn lookup(&self, question: &str) -> Result<String> {
        let outcome = self
            .llm
            .chat(HYPOTHETICAL_PROMPT, question, Deadline::after(self.budget))
            .await?;
        Ok(outcome.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;
    use crate::llm::MockChatProvider;

    #[tokio::test]
    async fn test_expansion_produces_probe_text() {
        let llm = Arc::new(
            LlmService::new(
                vec![Arc::new(MockChatProvider::new("primary"))],
                LlmConfig::default(),
            )
            .unwrap(),
        );
        let provider = HypotheticalProvider::new(llm, Duration::from_secs(5));
        assert_eq!(provider.kind(), EnhancementProviderKind::Hypothetical);
        let text = provider.lookup("How do cells produce energy?").await.unwrap();
        assert!(text.contains("energy"));
    }
}
