//! Error taxonomy for traversals

use webprobe_core::{LoadError, Method};

/// Error returned by a full-traversal callback
pub type CallbackError = Box<dyn std::error::Error + Send + Sync>;

/// A secured endpoint answered an anonymous call with something other than 401
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Endpoint {method} {uri} ({operation}) returned HTTP {status} instead of 401")]
pub struct VerificationFailure {
    pub method: Method,
    /// Resolved request URI
    pub uri: String,
    /// operationId, summary or description; "METHOD path" when none is declared
    pub operation: String,
    pub status: u16,
}

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Request cancelled")]
    Cancelled,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("Request failed: {0}")]
    Request(String),
}

#[derive(Debug, thiserror::Error)]
pub enum ExerciseError {
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Verification(VerificationFailure),
    #[error("Traversal cancelled")]
    Cancelled,
    #[error("Transport error: {0}")]
    Transport(TransportError),
    #[error("Callback failed: {0}")]
    Callback(#[source] CallbackError),
}

impl From<TransportError> for ExerciseError {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::Cancelled => Self::Cancelled,
            other => Self::Transport(other),
        }
    }
}

impl ExerciseError {
    /// The verification failure, if this error is one.
    #[must_use]
    pub fn as_verification(&self) -> Option<&VerificationFailure> {
        match self {
            Self::Verification(failure) => Some(failure),
            _ => None,
        }
    }
}
