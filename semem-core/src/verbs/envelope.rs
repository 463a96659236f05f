//! Verb request/response envelope
//!
//! The uniform wire surface between the engine and any transport. Errors
//! travel as envelopes with a typed `errorKind`; the transport never sees a
//! raw engine error.

use crate::error::{Error, ErrorKind};
use crate::zpt::NavigationState;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A verb invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerbRequest {
    /// Verb name (one of the twelve)
    pub verb: String,
    /// Verb arguments
    #[serde(default)]
    pub args: Value,
    /// Session identifier; a fresh session is created when absent
    #[serde(default)]
    pub session_id: Option<String>,
}

impl VerbRequest {
    /// Build a request
    #[must_use]
    pub fn new(verb: &str, args: Value) -> Self {
        Self {
            verb: verb.to_string(),
            args,
            session_id: None,
        }
    }

    /// Attach a session ID
    #[must_use]
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }
}

/// Execution diagnostics carried by every envelope
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostics {
    /// Stage timings in milliseconds
    #[serde(default)]
    pub timings_ms: HashMap<String, u64>,
    /// Source attributions for retrieval verbs
    #[serde(default)]
    pub sources_used: Vec<String>,
    /// Per-provider cache-hit flags
    #[serde(default)]
    pub cache_hits: HashMap<String, bool>,
    /// Chat provider that served synthesis, after failover
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llm_provider: Option<String>,
}

/// A verb result envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerbResponse {
    /// Whether the verb succeeded
    pub success: bool,
    /// Echo of the verb name
    pub verb: String,
    /// Verb-specific result payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Session ID the verb ran under
    pub session_id: String,
    /// Navigation state after the verb
    pub zpt_state: NavigationState,
    /// Execution diagnostics
    #[serde(default)]
    pub diagnostics: Diagnostics,
    /// Typed error classification, on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    /// Short human-readable error message, on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl VerbResponse {
    /// A success envelope
    #[must_use]
    pub fn ok(
        verb: &str,
        session_id: &str,
        result: Value,
        zpt_state: NavigationState,
        diagnostics: Diagnostics,
    ) -> Self {
        Self {
            success: true,
            verb: verb.to_string(),
            result: Some(result),
            session_id: session_id.to_string(),
            zpt_state,
            diagnostics,
            error_kind: None,
            error_message: None,
        }
    }

    /// A failure envelope carrying the typed kind and a safe message
    #[must_use]
    pub fn fail(verb: &str, session_id: &str, zpt_state: NavigationState, error: &Error) -> Self {
        Self {
            success: false,
            verb: verb.to_string(),
            result: None,
            session_id: session_id.to_string(),
            zpt_state,
            diagnostics: Diagnostics::default(),
            error_kind: Some(error.kind()),
            error_message: Some(error.envelope_message()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_envelope_serializes_camel_case() {
        let response = VerbResponse::ok(
            "tell",
            "s1",
            json!({"id": "x", "stored": true}),
            NavigationState::default(),
            Diagnostics::default(),
        );
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], json!(true));
        assert!(value.get("zptState").is_some());
        assert!(value.get("errorKind").is_none());
    }

    #[test]
    fn test_failure_envelope_carries_kind() {
        let error = Error::Validation("missing field `content`".into());
        let response = VerbResponse::fail("tell", "s1", NavigationState::default(), &error);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["success"], json!(false));
        assert_eq!(value["errorKind"], json!("validation"));
        assert!(value["errorMessage"]
            .as_str()
            .unwrap()
            .contains("content"));
    }

    #[test]
    fn test_failure_envelope_hides_backend_details() {
        let error = Error::StoreUnavailable("http://127.0.0.1:3030 refused".into());
        let response = VerbResponse::fail("ask", "s1", NavigationState::default(), &error);
        assert!(!response.error_message.unwrap().contains("127.0.0.1"));
    }

    #[test]
    fn test_request_round_trip() {
        let request = VerbRequest::new("ask", json!({"question": "q"})).with_session("s9");
        let json = serde_json::to_string(&request).unwrap();
        let back: VerbRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back.verb, "ask");
        assert_eq!(back.session_id.as_deref(), Some("s9"));
    }
}
