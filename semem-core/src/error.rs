/// Result type alias for verb-engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the semantic memory engine
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Embedding dimension mismatch: got {got}, expected {expected}")]
    Dimension { got: usize, expected: usize },

    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Provider timed out: {0}")]
    ProviderTimeout(String),

    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Wire-level error classification carried in verb envelopes.
///
/// Transports serialize this instead of the full [`Error`] so backing-service
/// details never leak to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ErrorKind {
    Validation,
    Dimension,
    ProviderUnavailable,
    ProviderTimeout,
    StoreUnavailable,
    NotFound,
    Conflict,
    DeadlineExceeded,
    Cancelled,
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Dimension => "dimension",
            ErrorKind::ProviderUnavailable => "providerUnavailable",
            ErrorKind::ProviderTimeout => "providerTimeout",
            ErrorKind::StoreUnavailable => "storeUnavailable",
            ErrorKind::NotFound => "notFound",
            ErrorKind::Conflict => "conflict",
            ErrorKind::DeadlineExceeded => "deadlineExceeded",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        write!(f, "{s}")
    }
}

impl Error {
    /// Map this error onto the wire-level taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation(_) => ErrorKind::Validation,
            Error::Dimension { .. } => ErrorKind::Dimension,
            Error::ProviderUnavailable(_) => ErrorKind::ProviderUnavailable,
            Error::ProviderTimeout(_) => ErrorKind::ProviderTimeout,
            Error::StoreUnavailable(_) => ErrorKind::StoreUnavailable,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::DeadlineExceeded => ErrorKind::DeadlineExceeded,
            Error::Cancelled => ErrorKind::Cancelled,
            Error::Serialization(_) => ErrorKind::Internal,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Check if this error is recoverable (degrade locally, retry later)
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Validation(_) => false,
            Error::Dimension { .. } => false,
            Error::ProviderUnavailable(_) => true,
            Error::ProviderTimeout(_) => true,
            Error::StoreUnavailable(_) => true,
            Error::NotFound(_) => false,
            Error::Conflict(_) => false,
            Error::DeadlineExceeded => true,
            Error::Cancelled => false,
            Error::Serialization(_) => false,
            Error::Internal(_) => false,
        }
    }

    /// Short human-readable message safe for the error envelope.
    ///
    /// Strips provider/store detail strings that may contain endpoint URLs.
    pub fn envelope_message(&self) -> String {
        match self {
            Error::Validation(msg) => msg.clone(),
            Error::Dimension { got, expected } => {
                format!("embedding dimension mismatch: got {got}, expected {expected}")
            }
            Error::ProviderUnavailable(_) => "a required provider is unavailable".to_string(),
            Error::ProviderTimeout(_) => "a provider call timed out".to_string(),
            Error::StoreUnavailable(_) => "the persistent store is unavailable".to_string(),
            Error::NotFound(what) => format!("not found: {what}"),
            Error::Conflict(msg) => msg.clone(),
            Error::DeadlineExceeded => "operation deadline exceeded".to_string(),
            Error::Cancelled => "operation cancelled".to_string(),
            Error::Serialization(_) | Error::Internal(_) => "internal error".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_mapping() {
        assert_eq!(
            Error::Validation("bad".into()).kind(),
            ErrorKind::Validation
        );
        assert_eq!(
            Error::Dimension {
                got: 10,
                expected: 768
            }
            .kind(),
            ErrorKind::Dimension
        );
        assert_eq!(Error::DeadlineExceeded.kind(), ErrorKind::DeadlineExceeded);
    }

    #[test]
    fn test_recoverability() {
        assert!(Error::ProviderTimeout("embed".into()).is_recoverable());
        assert!(Error::StoreUnavailable("probe failed".into()).is_recoverable());
        assert!(!Error::Validation("missing field".into()).is_recoverable());
        assert!(
            !Error::Dimension {
                got: 3,
                expected: 4
            }
            .is_recoverable()
        );
    }

    #[test]
    fn test_envelope_message_hides_backend_detail() {
        let err = Error::StoreUnavailable("http://10.0.0.3:3030/ds timed out".into());
        assert!(!err.envelope_message().contains("10.0.0.3"));
    }

    #[test]
    fn test_error_kind_wire_names() {
        assert_eq!(ErrorKind::ProviderTimeout.to_string(), "providerTimeout");
        assert_eq!(ErrorKind::Validation.to_string(), "validation");
    }
}
