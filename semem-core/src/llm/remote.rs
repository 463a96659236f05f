//! Remote chat provider speaking the OpenAI-style chat-completions API

#![cfg(feature = "http-providers")]

use super::provider::ChatProvider;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Chat provider backed by an OpenAI-compatible `/chat/completions` endpoint
pub struct RemoteChatProvider {
    name: String,
    api_key: String,
    model: String,
    client: reqwest::Client,
    base_url: String,
}

impl RemoteChatProvider {
    /// Create a provider against a custom base URL.
    ///
    /// `name` is the failover-chain label reported in diagnostics.
    pub fn new(name: &str, api_key: String, model: String, base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            name: name.to_string(),
            api_key,
            model,
            client,
            base_url,
        })
    }
}

#[async_trait]
impl ChatProvider for RemoteChatProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, system: &str, prompt: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("failed to send chat request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("chat API error {status}: {body}");
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .context("failed to parse chat response")?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("chat API returned no choices")
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}
