//! Chat provider trait

use anyhow::Result;
use async_trait::async_trait;

/// System prompt used for concept extraction completions
pub const CONCEPT_EXTRACTION_PROMPT: &str = "Extract the key concepts from the text as a \
JSON array of short lowercase strings. Return only the JSON array, nothing else.";

/// Trait for LLM chat providers.
///
/// Providers do not retry; retries and failover belong to the
/// [`LlmService`](super::LlmService) chain.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name used in diagnostics and failover logs
    fn name(&self) -> &str;

    /// Run a chat completion with a system prompt and user message
    async fn chat(&self, system: &str, prompt: &str) -> Result<String>;

    /// Raw concept-extraction completion; the service parses and normalizes.
    ///
    /// Default goes through [`chat`](Self::chat) with the extraction prompt.
    async fn complete_concepts(&self, text: &str) -> Result<String> {
        self.chat(CONCEPT_EXTRACTION_PROMPT, text).await
    }

    /// Check if the provider is reachable and configured
    async fn is_available(&self) -> bool {
        self.chat("You are a health check.", "ping").await.is_ok()
    }
}
