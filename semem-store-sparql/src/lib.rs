#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

//! # Semem SPARQL Store
//!
//! [`TripleStore`] backend speaking the SPARQL 1.1 protocol against a
//! query/update endpoint pair (Fuseki, qEndpoint, any standards-compliant
//! store). All query text renders from templates parameterized with
//! escaped RDF terms; `batch` submits its mutations as one update request
//! so the endpoint applies them in a single transaction.

pub mod templates;
pub mod terms;

pub use templates::QueryTemplates;

use async_trait::async_trait;
use semem_core::{
    BindingRow, Deadline, Error, Mutation, Result, Term, Triple, TriplePattern, TripleStore,
};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::debug;

/// Connection settings for a SPARQL endpoint pair
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SparqlConfig {
    /// Query endpoint URL
    pub query_endpoint: String,
    /// Update endpoint URL
    pub update_endpoint: String,
    /// Optional basic-auth credentials
    #[serde(default)]
    pub credentials: Option<(String, String)>,
}

impl SparqlConfig {
    /// Point both operations at a Fuseki-style dataset URL
    /// (`{base}/query`, `{base}/update`)
    #[must_use]
    pub fn for_dataset(base: &str) -> Self {
        Self {
            query_endpoint: format!("{}/query", base.trim_end_matches('/')),
            update_endpoint: format!("{}/update", base.trim_end_matches('/')),
            credentials: None,
        }
    }
}

/// SPARQL-protocol triple store
pub struct SparqlStore {
    config: SparqlConfig,
    templates: QueryTemplates,
    client: reqwest::Client,
}

impl SparqlStore {
    /// Create a store with the built-in templates
    pub fn new(config: SparqlConfig) -> Result<Self> {
        Self::with_templates(config, QueryTemplates::default())
    }

    /// Create a store with templates loaded from `dir` at startup
    pub fn from_template_dir(config: SparqlConfig, dir: &Path) -> Result<Self> {
        let templates = QueryTemplates::from_dir(dir)
            .map_err(|err| Error::Internal(format!("failed to load templates: {err}")))?;
        Self::with_templates(config, templates)
    }

    /// Create a store with explicit templates
    pub fn with_templates(config: SparqlConfig, templates: QueryTemplates) -> Result<Self> {
        url::Url::parse(&config.query_endpoint)
            .map_err(|_| Error::Validation("invalid query endpoint URL".to_string()))?;
        url::Url::parse(&config.update_endpoint)
            .map_err(|_| Error::Validation("invalid update endpoint URL".to_string()))?;
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|err| Error::Internal(format!("failed to create HTTP client: {err}")))?;
        Ok(Self {
            config,
            templates,
            client,
        })
    }

    fn pattern_params(pattern: &TriplePattern) -> Result<HashMap<&'static str, String>> {
        let slots = terms::pattern_slots(pattern)
            .map_err(|err| Error::Validation(format!("unserializable pattern: {err}")))?;
        let graph = terms::iri(&pattern.graph)
            .map_err(|err| Error::Validation(format!("invalid graph IRI: {err}")))?;
        let mut params = HashMap::new();
        params.insert("graph", graph);
        params.insert("subject", slots.subject);
        params.insert("predicate", slots.predicate);
        params.insert("object", slots.object);
        Ok(params)
    }

    fn render_mutation(&self, mutation: &Mutation) -> Result<String> {
        match mutation {
            Mutation::Insert { graph, triple } => {
                let mut params = HashMap::new();
                params.insert(
                    "graph",
                    terms::iri(graph)
                        .map_err(|err| Error::Validation(format!("invalid graph IRI: {err}")))?,
                );
                params.insert(
                    "subject",
                    terms::iri(&triple.subject)
                        .map_err(|err| Error::Validation(format!("invalid subject: {err}")))?,
                );
                params.insert(
                    "predicate",
                    terms::iri(&triple.predicate)
                        .map_err(|err| Error::Validation(format!("invalid predicate: {err}")))?,
                );
                params.insert(
                    "object",
                    terms::object(&triple.object)
                        .map_err(|err| Error::Validation(format!("invalid object: {err}")))?,
                );
                Ok(templates::render(&self.templates.insert, &params))
            }
            Mutation::Delete(pattern) => {
                let params = Self::pattern_params(pattern)?;
                Ok(templates::render(&self.templates.delete, &params))
            }
        }
    }

    async fn run_query(&self, query: String, deadline: Deadline) -> Result<SparqlResults> {
        debug!(query = %query, "sparql query");
        let response = deadline
            .run(async {
                let mut request = self
                    .client
                    .post(&self.config.query_endpoint)
                    .header("Content-Type", "application/sparql-query")
                    .header("Accept", "application/sparql-results+json")
                    .body(query);
                if let Some((user, pass)) = &self.config.credentials {
                    request = request.basic_auth(user, Some(pass));
                }
                request.send().await
            })
            .await?
            .map_err(|err| Error::StoreUnavailable(format!("query endpoint: {err}")))?;

        if !response.status().is_success() {
            return Err(Error::StoreUnavailable(format!(
                "query endpoint returned {}",
                response.status()
            )));
        }
        deadline
            .run(response.json::<SparqlResults>())
            .await?
            .map_err(|err| Error::StoreUnavailable(format!("malformed results: {err}")))
    }

    async fn run_update(&self, update: String, deadline: Deadline) -> Result<()> {
        debug!(update = %update, "sparql update");
        let response = deadline
            .run(async {
                let mut request = self
                    .client
                    .post(&self.config.update_endpoint)
                    .header("Content-Type", "application/sparql-update")
                    .body(update);
                if let Some((user, pass)) = &self.config.credentials {
                    request = request.basic_auth(user, Some(pass));
                }
                request.send().await
            })
            .await?
            .map_err(|err| Error::StoreUnavailable(format!("update endpoint: {err}")))?;

        if !response.status().is_success() {
            return Err(Error::StoreUnavailable(format!(
                "update endpoint returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl TripleStore for SparqlStore {
    async fn select(
        &self,
        pattern: &TriplePattern,
        deadline: Deadline,
    ) -> Result<Vec<BindingRow>> {
        let params = Self::pattern_params(pattern)?;
        let query = templates::render(&self.templates.select, &params);
        let results = self.run_query(query, deadline).await?;
        Ok(results.into_rows())
    }

    async fn construct(&self, pattern: &TriplePattern, deadline: Deadline) -> Result<Vec<Triple>> {
        // Triple assembly happens client-side from SELECT bindings, so the
        // protocol needs no RDF serialization round-trip.
        let rows = self.select(pattern, deadline).await?;
        let mut triples = Vec::with_capacity(rows.len());
        for row in rows {
            let subject = match row.get("s") {
                Some(term) => term.lexical().to_string(),
                None => pattern.subject.clone().unwrap_or_default(),
            };
            let predicate = match row.get("p") {
                Some(term) => term.lexical().to_string(),
                None => pattern.predicate.clone().unwrap_or_default(),
            };
            let object = match row.get("o") {
                Some(term) => term.clone(),
                None => pattern.object.clone().unwrap_or(Term::Literal(String::new())),
            };
            triples.push(Triple {
                subject,
                predicate,
                object,
            });
        }
        Ok(triples)
    }

    async fn update(&self, mutation: Mutation, deadline: Deadline) -> Result<()> {
        let rendered = self.render_mutation(&mutation)?;
        self.run_update(rendered, deadline).await
    }

    async fn ask(&self, pattern: &TriplePattern, deadline: Deadline) -> Result<bool> {
        let params = Self::pattern_params(pattern)?;
        let query = templates::render(&self.templates.ask, &params);
        let results = self.run_query(query, deadline).await?;
        Ok(results.boolean.unwrap_or(false))
    }

    async fn batch(&self, mutations: Vec<Mutation>, deadline: Deadline) -> Result<()> {
        if mutations.is_empty() {
            return Ok(());
        }
        // One request, semicolon-separated operations: the endpoint applies
        // them as a single transaction.
        let mut parts = Vec::with_capacity(mutations.len());
        for mutation in &mutations {
            parts.push(self.render_mutation(mutation)?);
        }
        self.run_update(parts.join(" ;\n"), deadline).await
    }

    async fn probe(&self, deadline: Deadline) -> Result<()> {
        self.run_query(self.templates.probe.clone(), deadline)
            .await
            .map(|_| ())
    }
}

// ========== SPARQL results JSON ==========

#[derive(Debug, Deserialize)]
struct SparqlResults {
    #[serde(default)]
    results: Option<Bindings>,
    #[serde(default)]
    boolean: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct Bindings {
    #[serde(default)]
    bindings: Vec<HashMap<String, SparqlTerm>>,
}

#[derive(Debug, Deserialize)]
struct SparqlTerm {
    #[serde(rename = "type")]
    term_type: String,
    value: String,
    #[serde(default)]
    datatype: Option<String>,
}

impl SparqlResults {
    fn into_rows(self) -> Vec<BindingRow> {
        let Some(results) = self.results else {
            return Vec::new();
        };
        results
            .bindings
            .into_iter()
            .map(|binding| {
                binding
                    .into_iter()
                    .map(|(var, term)| (var, term.into_term()))
                    .collect()
            })
            .collect()
    }
}

impl SparqlTerm {
    fn into_term(self) -> Term {
        match (self.term_type.as_str(), self.datatype) {
            ("uri", _) => Term::Iri(self.value),
            (_, Some(datatype)) => Term::Typed {
                value: self.value,
                datatype,
            },
            _ => Term::Literal(self.value),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> SparqlStore {
        SparqlStore::new(SparqlConfig::for_dataset("http://localhost:3030/semem")).unwrap()
    }

    #[test]
    fn test_config_for_dataset() {
        let config = SparqlConfig::for_dataset("http://localhost:3030/semem/");
        assert_eq!(config.query_endpoint, "http://localhost:3030/semem/query");
        assert_eq!(config.update_endpoint, "http://localhost:3030/semem/update");
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let config = SparqlConfig {
            query_endpoint: "not a url".to_string(),
            update_endpoint: "http://localhost:3030/update".to_string(),
            credentials: None,
        };
        assert!(matches!(
            SparqlStore::new(config),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_insert_rendering_escapes_literals() {
        let store = store();
        let mutation = Mutation::Insert {
            graph: "http://semem.org/graph/content".to_string(),
            triple: Triple::new(
                "http://semem.org/id/1",
                "http://semem.org/vocab#prompt",
                Term::Literal("he said \"run\"".to_string()),
            ),
        };
        let rendered = store.render_mutation(&mutation).unwrap();
        assert!(rendered.starts_with("INSERT DATA"));
        assert!(rendered.contains("\\\"run\\\""));
        assert!(rendered.contains("<http://semem.org/graph/content>"));
    }

    #[test]
    fn test_delete_rendering_uses_variables_for_wildcards() {
        let store = store();
        let mutation = Mutation::Delete(TriplePattern::subject(
            "http://semem.org/graph/content",
            "http://semem.org/id/1",
        ));
        let rendered = store.render_mutation(&mutation).unwrap();
        assert!(rendered.starts_with("DELETE WHERE"));
        assert!(rendered.contains("<http://semem.org/id/1> ?p ?o"));
    }

    #[test]
    fn test_malicious_subject_rejected() {
        let store = store();
        let mutation = Mutation::Insert {
            graph: "http://g".to_string(),
            triple: Triple::new(
                "http://x> } ; DROP ALL ; INSERT DATA { <http://y",
                "http://p",
                Term::Literal("v".to_string()),
            ),
        };
        assert!(matches!(
            store.render_mutation(&mutation),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_results_parsing() {
        let raw = serde_json::json!({
            "head": {"vars": ["p", "o"]},
            "results": {"bindings": [
                {
                    "p": {"type": "uri", "value": "http://semem.org/vocab#kind"},
                    "o": {"type": "literal", "value": "concept"}
                },
                {
                    "p": {"type": "uri", "value": "http://semem.org/vocab#embedding"},
                    "o": {
                        "type": "literal",
                        "value": "[0.1,0.2]",
                        "datatype": "http://semem.org/vocab#vector"
                    }
                }
            ]}
        });
        let parsed: SparqlResults = serde_json::from_value(raw).unwrap();
        let rows = parsed.into_rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(
            rows[0]["o"],
            Term::Literal("concept".to_string())
        );
        assert_eq!(
            rows[1]["o"],
            Term::Typed {
                value: "[0.1,0.2]".to_string(),
                datatype: "http://semem.org/vocab#vector".to_string()
            }
        );
    }

    #[test]
    fn test_ask_parsing() {
        let parsed: SparqlResults =
            serde_json::from_value(serde_json::json!({"head": {}, "boolean": true})).unwrap();
        assert_eq!(parsed.boolean, Some(true));
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_store_unavailable() {
        let store = SparqlStore::new(SparqlConfig::for_dataset("http://127.0.0.1:1/nowhere"))
            .unwrap();
        let result = store
            .probe(Deadline::after(std::time::Duration::from_millis(500)))
            .await;
        assert!(matches!(
            result,
            Err(Error::StoreUnavailable(_) | Error::DeadlineExceeded)
        ));
    }
}
