//! Store round-trip errors
//!
//! These describe failures of the external document store. They are never
//! retried here; callers own retry and backoff.

use thiserror::Error;

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors raised by store collaborators
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The requested index does not exist in the store
    #[error("Index not found: {0}")]
    IndexNotFound(String),

    /// The store could not be reached or refused the request
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// The store returned data that could not be interpreted
    #[error("Malformed response for index '{index}': {reason}")]
    Malformed { index: String, reason: String },

    /// The store cannot evaluate the given query form
    #[error("Unsupported query: {0}")]
    Unsupported(String),
}

impl StoreError {
    /// Create a malformed-response error
    pub fn malformed(index: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Malformed {
            index: index.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_display() {
        let err = StoreError::IndexNotFound("posts".into());
        assert_eq!(err.to_string(), "Index not found: posts");

        let err = StoreError::malformed("posts", "bad header");
        assert!(err.to_string().contains("posts"));
        assert!(err.to_string().contains("bad header"));
    }
}
