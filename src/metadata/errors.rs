//! Metadata error types
//!
//! Error codes:
//! - AERO_LINK_INVALID (REJECT)
//! - AERO_JOIN_NO_PATH (REJECT)
//! - AERO_MAPPING_INVALID (REJECT)
//! - AERO_METADATA_FETCH_FAILED (ERROR)

use std::fmt;

use crate::errors::Severity;
use crate::store::StoreError;

/// Metadata-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataErrorCode {
    /// Link text could not be parsed
    AeroLinkInvalid,
    /// No join path connects two indexes
    AeroJoinNoPath,
    /// Index mapping is structurally invalid
    AeroMappingInvalid,
    /// Fetching a mapping from the store failed
    AeroMetadataFetchFailed,
}

impl MetadataErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            MetadataErrorCode::AeroLinkInvalid => "AERO_LINK_INVALID",
            MetadataErrorCode::AeroJoinNoPath => "AERO_JOIN_NO_PATH",
            MetadataErrorCode::AeroMappingInvalid => "AERO_MAPPING_INVALID",
            MetadataErrorCode::AeroMetadataFetchFailed => "AERO_METADATA_FETCH_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            MetadataErrorCode::AeroMetadataFetchFailed => Severity::Error,
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for MetadataErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Metadata error with context
#[derive(Debug, Clone)]
pub struct MetadataError {
    code: MetadataErrorCode,
    message: String,
    index: Option<String>,
}

impl MetadataError {
    /// Create an invalid link error
    pub fn invalid_link(text: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            code: MetadataErrorCode::AeroLinkInvalid,
            message: format!("Invalid index link '{}': {}", text.into(), reason.into()),
            index: None,
        }
    }

    /// Create a no-path error
    pub fn no_path(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            code: MetadataErrorCode::AeroJoinNoPath,
            message: format!(
                "No join path between index '{}' and index '{}'",
                from.into(),
                to.into()
            ),
            index: None,
        }
    }

    /// Create an invalid mapping error
    pub fn invalid_mapping(index: impl Into<String>, reason: impl Into<String>) -> Self {
        let index = index.into();
        Self {
            code: MetadataErrorCode::AeroMappingInvalid,
            message: format!("Invalid mapping for index '{}': {}", index, reason.into()),
            index: Some(index),
        }
    }

    /// Create a fetch failure from a store error
    pub fn fetch_failed(index: impl Into<String>, source: StoreError) -> Self {
        let index = index.into();
        Self {
            code: MetadataErrorCode::AeroMetadataFetchFailed,
            message: format!("Failed to load metadata for '{}': {}", index, source),
            index: Some(index),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> MetadataErrorCode {
        self.code
    }

    /// Returns the severity level
    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    /// Returns the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the index involved, if any
    pub fn index(&self) -> Option<&str> {
        self.index.as_deref()
    }
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for MetadataError {}

/// Result type for metadata operations
pub type MetadataResult<T> = Result<T, MetadataError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(MetadataErrorCode::AeroLinkInvalid.code(), "AERO_LINK_INVALID");
        assert_eq!(MetadataErrorCode::AeroJoinNoPath.code(), "AERO_JOIN_NO_PATH");
        assert_eq!(
            MetadataErrorCode::AeroMetadataFetchFailed.code(),
            "AERO_METADATA_FETCH_FAILED"
        );
    }

    #[test]
    fn test_fetch_failures_are_not_rejections() {
        let err = MetadataError::fetch_failed("posts", StoreError::Unavailable("down".into()));
        assert_eq!(err.severity(), Severity::Error);
        assert_eq!(err.index(), Some("posts"));

        let err = MetadataError::no_path("posts", "tags");
        assert_eq!(err.severity(), Severity::Reject);
    }

    #[test]
    fn test_error_display() {
        let err = MetadataError::no_path("posts", "tags");
        let display = err.to_string();
        assert!(display.contains("REJECT"));
        assert!(display.contains("AERO_JOIN_NO_PATH"));
        assert!(display.contains("tags"));
    }
}
