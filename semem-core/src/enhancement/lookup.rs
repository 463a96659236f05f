//! HTTP-backed lookup providers: encyclopedic article snippets and
//! structured knowledge-base facts

#![cfg(feature = "http-providers")]

use super::provider::EnhancementProvider;
use crate::types::EnhancementProviderKind;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

/// Encyclopedic lookup against a MediaWiki-compatible summary API
pub struct EncyclopedicLookupProvider {
    client: reqwest::Client,
    base_url: String,
}

impl EncyclopedicLookupProvider {
    /// Create a provider against the public Wikipedia REST API
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://en.wikipedia.org/api/rest_v1".to_string())
    }

    /// Create a provider against a custom MediaWiki REST endpoint
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self { client, base_url })
    }
}

#[derive(Debug, Deserialize)]
struct SummaryResponse {
    #[serde(default)]
    title: String,
    #[serde(default)]
    extract: String,
}

#[async_trait]
impl EnhancementProvider for EncyclopedicLookupProvider {
    fn kind(&self) -> EnhancementProviderKind {
        EnhancementProviderKind::Encyclopedic
    }

    fn name(&self) -> &str {
        "wikipedia"
    }

    async fn lookup(&self, question: &str) -> Result<String> {
        // Title heuristic: the question minus interrogative boilerplate
        let topic = question
            .trim()
            .trim_end_matches(['?', '.', '!'])
            .split_whitespace()
            .filter(|w| {
                !matches!(
                    w.to_lowercase().as_str(),
                    "what" | "who" | "when" | "where" | "why" | "how" | "is" | "are" | "the"
                        | "a" | "an" | "of" | "do" | "does"
                )
            })
            .collect::<Vec<_>>()
            .join(" ");
        let url = format!(
            "{}/page/summary/{}",
            self.base_url,
            urlencode(topic.trim())
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .context("encyclopedic lookup request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("encyclopedic lookup returned {}", response.status());
        }
        let summary: SummaryResponse = response
            .json()
            .await
            .context("failed to parse summary response")?;
        if summary.extract.is_empty() {
            anyhow::bail!("no article found for query");
        }
        Ok(format!("{}: {}", summary.title, summary.extract))
    }
}

/// Factual lookup against a Wikidata-compatible entity-search API
pub struct FactualLookupProvider {
    client: reqwest::Client,
    base_url: String,
}

impl FactualLookupProvider {
    /// Create a provider against the public Wikidata API
    pub fn new() -> Result<Self> {
        Self::with_base_url("https://www.wikidata.org/w/api.php".to_string())
    }

    /// Create a provider against a custom wbsearchentities endpoint
    pub fn with_base_url(base_url: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("failed to create HTTP client")?;
        Ok(Self { client, base_url })
    }
}

#[derive(Debug, Deserialize)]
struct EntitySearchResponse {
    #[serde(default)]
    search: Vec<EntityHit>,
}

#[derive(Debug, Deserialize)]
struct EntityHit {
    #[serde(default)]
    label: String,
    #[serde(default)]
    description: String,
}

#[async_trait]
impl EnhancementProvider for FactualLookupProvider {
    fn kind(&self) -> EnhancementProviderKind {
        EnhancementProviderKind::Factual
    }

    fn name(&self) -> &str {
        "wikidata"
    }

    async fn lookup(&self, question: &str) -> Result<String> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("action", "wbsearchentities"),
                ("format", "json"),
                ("language", "en"),
                ("limit", "3"),
                ("search", question),
            ])
            .send()
            .await
            .context("factual lookup request failed")?;
        if !response.status().is_success() {
            anyhow::bail!("factual lookup returned {}", response.status());
        }
        let parsed: EntitySearchResponse = response
            .json()
            .await
            .context("failed to parse entity search response")?;
        if parsed.search.is_empty() {
            anyhow::bail!("no entities found for query");
        }
        let facts: Vec<String> = parsed
            .search
            .iter()
            .filter(|hit| !hit.description.is_empty())
            .map(|hit| format!("{}: {}", hit.label, hit.description))
            .collect();
        if facts.is_empty() {
            anyhow::bail!("entities found but none carried descriptions");
        }
        Ok(facts.join("\n"))
    }
}

fn urlencode(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for byte in input.replace(' ', "_").bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char);
            }
            other => out.push_str(&format!("%{other:02X}")),
        }
    }
    out
}
