//! Query/update templates
//!
//! Every SPARQL string the store sends is rendered from one of these
//! templates by substituting pre-serialized RDF terms — user input never
//! reaches query text directly; it always passes through the term
//! serializers in [`crate::terms`] first.

use std::collections::HashMap;
use std::path::Path;

/// The template set, one per protocol operation
#[derive(Debug, Clone)]
pub struct QueryTemplates {
    /// SELECT over one triple pattern
    pub select: String,
    /// ASK over one triple pattern
    pub ask: String,
    /// INSERT DATA for one triple
    pub insert: String,
    /// DELETE WHERE for one pattern
    pub delete: String,
    /// Liveness probe
    pub probe: String,
}

impl Default for QueryTemplates {
    fn default() -> Self {
        Self {
            select: "SELECT ?s ?p ?o WHERE { GRAPH {graph} { {subject} {predicate} {object} } }"
                .to_string(),
            ask: "ASK { GRAPH {graph} { {subject} {predicate} {object} } }".to_string(),
            insert: "INSERT DATA { GRAPH {graph} { {subject} {predicate} {object} . } }"
                .to_string(),
            delete: "DELETE WHERE { GRAPH {graph} { {subject} {predicate} {object} } }"
                .to_string(),
            probe: "ASK { }".to_string(),
        }
    }
}

impl QueryTemplates {
    /// Load templates from a directory at startup.
    ///
    /// Recognized files: `select.rq`, `ask.rq`, `insert.rq`, `delete.rq`,
    /// `probe.rq`. Missing files keep their built-in defaults.
    pub fn from_dir(dir: &Path) -> std::io::Result<Self> {
        let mut templates = Self::default();
        for (name, slot) in [
            ("select.rq", &mut templates.select),
            ("ask.rq", &mut templates.ask),
            ("insert.rq", &mut templates.insert),
            ("delete.rq", &mut templates.delete),
            ("probe.rq", &mut templates.probe),
        ] {
            let path = dir.join(name);
            if path.is_file() {
                *slot = std::fs::read_to_string(path)?.trim().to_string();
            }
        }
        Ok(templates)
    }
}

/// Substitute `{name}` placeholders with pre-serialized terms
#[must_use]
pub fn render(template: &str, params: &HashMap<&str, String>) -> String {
    let mut out = template.to_string();
    for (name, value) in params {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}
