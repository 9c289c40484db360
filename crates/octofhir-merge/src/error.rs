//! Error types for the merge engine.
//!
//! Eligibility and parse errors are returned synchronously to the caller that
//! issued the offending request. Dispatch errors are batch-wide: the same
//! [`MergeError`] value is delivered to every caller waiting on the batch,
//! which is why the type is `Clone` and wraps transport failures in an `Arc`.

use std::sync::Arc;

use crate::transport::TransportError;

/// Errors surfaced by [`MergeEngine`](crate::MergeEngine).
#[derive(Debug, Clone, thiserror::Error)]
pub enum MergeError {
    /// The request violates an engine precondition (wrong method, mixed
    /// destinations within one batch).
    #[error("Precondition failed: {0}")]
    Precondition(String),

    /// The request body could not be parsed.
    #[error("Invalid request body: {0}")]
    Parse(String),

    /// The underlying transport failed to send the request.
    #[error("Transport error: {0}")]
    Transport(Arc<TransportError>),

    /// The pending request was discarded before its batch was sent.
    #[error("Request cancelled before dispatch")]
    Cancelled,

    /// The engine no longer accepts mergeable requests.
    #[error("Merge engine is shut down")]
    Shutdown,
}

impl MergeError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    /// Returns a stable code for logs and diagnostics.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Precondition(_) => "PRECONDITION_FAILED",
            Self::Parse(_) => "PARSE_ERROR",
            Self::Transport(_) => "TRANSPORT_ERROR",
            Self::Cancelled => "CANCELLED",
            Self::Shutdown => "SHUTDOWN",
        }
    }
}

impl From<TransportError> for MergeError {
    fn from(err: TransportError) -> Self {
        Self::Transport(Arc::new(err))
    }
}

impl From<async_graphql_parser::Error> for MergeError {
    fn from(err: async_graphql_parser::Error) -> Self {
        Self::Parse(err.to_string())
    }
}

impl From<serde_json::Error> for MergeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Parse(err.to_string())
    }
}
