//! Remote embedding provider speaking the OpenAI-style embeddings API

#![cfg(feature = "http-providers")]

use super::provider::EmbeddingProvider;
use crate::config::ModelConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Embedding provider backed by an OpenAI-compatible `/embeddings` endpoint.
///
/// Works against OpenAI itself, Azure deployments, and local gateways
/// (Ollama's compatibility layer) by switching `base_url`.
pub struct RemoteEmbeddingProvider {
    api_key: String,
    config: ModelConfig,
    client: reqwest::Client,
    base_url: String,
}

impl RemoteEmbeddingProvider {
    /// Create a provider against the default OpenAI endpoint
    pub fn new(api_key: String, config: ModelConfig) -> Result<Self> {
        Self::with_base_url(api_key, config, "https://api.openai.com/v1".to_string())
    }

    /// Create a provider against a custom base URL
    pub fn with_base_url(api_key: String, config: ModelConfig, base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self {
            api_key,
            config,
            client,
            base_url,
        })
    }

    async fn request_embeddings(&self, input: EmbeddingInput) -> Result<EmbeddingResponse> {
        let url = format!("{}/embeddings", self.base_url);
        let request = EmbeddingRequest {
            input,
            model: self.config.model_name.clone(),
            encoding_format: Some("float".to_string()),
        };

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .context("failed to send embedding request")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("embedding API error {status}: {body}");
        }

        response
            .json()
            .await
            .context("failed to parse embedding response")
    }
}

#[async_trait]
impl EmbeddingProvider for RemoteEmbeddingProvider {
    async fn embed_text(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let response = self
            .request_embeddings(EmbeddingInput::Single(text.to_string()))
            .await?;
        let first = response
            .data
            .into_iter()
            .next()
            .context("embedding API returned no vectors")?;
        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            dimension = first.embedding.len(),
            "generated remote embedding"
        );
        Ok(first.embedding)
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(vec![]);
        }
        let response = self
            .request_embeddings(EmbeddingInput::Batch(texts.to_vec()))
            .await?;
        if response.data.len() != texts.len() {
            anyhow::bail!(
                "embedding API returned {} vectors for {} texts",
                response.data.len(),
                texts.len()
            );
        }
        let mut data = response.data;
        data.sort_by_key(|item| item.index);
        Ok(data.into_iter().map(|item| item.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        &self.config.model_name
    }
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest {
    input: EmbeddingInput,
    model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding_format: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum EmbeddingInput {
    Single(String),
    Batch(Vec<String>),
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    #[serde(default)]
    index: usize,
}
