//! RDF term serialization
//!
//! The only path from engine data into query text. IRIs are validated and
//! angle-bracketed; literals are escaped per the N-Triples grammar; pattern
//! wildcards become SPARQL variables.

use semem_core::{Term, TriplePattern};

/// Serialize an IRI reference, rejecting characters that would escape the
/// angle brackets
pub fn iri(value: &str) -> anyhow::Result<String> {
    if value.chars().any(|c| {
        matches!(c, '<' | '>' | '"' | '{' | '}' | '|' | '^' | '`' | '\\') || c.is_control()
    }) || value.contains(' ')
    {
        anyhow::bail!("invalid IRI: {value:?}");
    }
    Ok(format!("<{value}>"))
}

/// Serialize a literal with N-Triples escaping
#[must_use]
pub fn literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            other => out.push(other),
        }
    }
    out.push('"');
    out
}

/// Serialize an object term
pub fn object(term: &Term) -> anyhow::Result<String> {
    Ok(match term {
        Term::Iri(value) => iri(value)?,
        Term::Literal(value) => literal(value),
        Term::Typed { value, datatype } => {
            format!("{}^^{}", literal(value), iri(datatype)?)
        }
    })
}

/// Rendered slots for one triple pattern: bound terms inline, wildcards as
/// `?s ?p ?o`
pub struct PatternSlots {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

/// Render a pattern's slots
pub fn pattern_slots(pattern: &TriplePattern) -> anyhow::Result<PatternSlots> {
    Ok(PatternSlots {
        subject: match &pattern.subject {
            Some(value) => iri(value)?,
            None => "?s".to_string(),
        },
        predicate: match &pattern.predicate {
            Some(value) => iri(value)?,
            None => "?p".to_string(),
        },
        object: match &pattern.object {
            Some(term) => object(term)?,
            None => "?o".to_string(),
        },
    })
}
