//! Error types for search cluster operations.

use quarry_config::ConfigError;
use thiserror::Error;

/// Search access layer error type.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The request never produced a response (network, TLS, timeout).
    #[error("Transport error: {0}")]
    Transport(#[from] opensearch::Error),

    /// The transport could not be built or no response was available.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Index not found.
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// Document not found.
    #[error("Document not found: {index}/{id}")]
    DocumentNotFound {
        /// Index name.
        index: String,
        /// Document ID.
        id: String,
    },

    /// Caller input rejected before anything was sent.
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The engine answered with a non-success status.
    #[error("Engine rejected request with status {status} ({error_type}): {reason}")]
    Engine {
        /// HTTP status code.
        status: u16,
        /// Engine error type, e.g. `mapper_parsing_exception`.
        error_type: String,
        /// Engine error reason.
        reason: String,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl SearchError {
    /// Create a validation error.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a document not found error.
    pub fn document_not_found(index: impl Into<String>, id: impl Into<String>) -> Self {
        Self::DocumentNotFound {
            index: index.into(),
            id: id.into(),
        }
    }

    /// Whether this error means the index or document does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            SearchError::IndexNotFound(_) | SearchError::DocumentNotFound { .. }
        )
    }
}

/// Result type alias for search operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Reject empty index names before building a request path.
pub(crate) fn ensure_index_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(SearchError::validation("Index name cannot be empty"));
    }
    Ok(())
}
