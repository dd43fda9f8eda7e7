//! Visibility error types
//!
//! Error codes:
//! - AERO_SNAPSHOT_INVALID (REJECT)
//! - AERO_TUPLE_HEADER_INVALID (ERROR)
//! - AERO_VISIBILITY_SCAN_FAILED (ERROR)

use std::fmt;

use crate::errors::Severity;
use crate::store::StoreError;

/// Visibility-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VisibilityErrorCode {
    /// Snapshot descriptor is missing a field or inconsistent
    AeroSnapshotInvalid,
    /// A stored per-document header could not be decoded
    AeroTupleHeaderInvalid,
    /// A store round trip during the computation failed
    AeroVisibilityScanFailed,
}

impl VisibilityErrorCode {
    /// Returns the string code
    pub fn code(&self) -> &'static str {
        match self {
            VisibilityErrorCode::AeroSnapshotInvalid => "AERO_SNAPSHOT_INVALID",
            VisibilityErrorCode::AeroTupleHeaderInvalid => "AERO_TUPLE_HEADER_INVALID",
            VisibilityErrorCode::AeroVisibilityScanFailed => "AERO_VISIBILITY_SCAN_FAILED",
        }
    }

    /// Returns the severity level for this error
    pub fn severity(&self) -> Severity {
        match self {
            VisibilityErrorCode::AeroSnapshotInvalid => Severity::Reject,
            _ => Severity::Error,
        }
    }
}

impl fmt::Display for VisibilityErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Visibility error with context
#[derive(Debug, Clone)]
pub struct VisibilityError {
    code: VisibilityErrorCode,
    message: String,
}

impl VisibilityError {
    /// Create an invalid snapshot error
    pub fn invalid_snapshot(reason: impl Into<String>) -> Self {
        Self {
            code: VisibilityErrorCode::AeroSnapshotInvalid,
            message: format!("Invalid snapshot descriptor: {}", reason.into()),
        }
    }

    /// Create a header decode error
    pub fn invalid_header(reason: impl Into<String>) -> Self {
        Self {
            code: VisibilityErrorCode::AeroTupleHeaderInvalid,
            message: format!("Invalid tuple header: {}", reason.into()),
        }
    }

    /// Create a scan failure from a store error
    pub fn scan_failed(index: &str, source: StoreError) -> Self {
        Self {
            code: VisibilityErrorCode::AeroVisibilityScanFailed,
            message: format!("Visibility scan of '{}' failed: {}", index, source),
        }
    }

    /// Returns the error code
    pub fn code(&self) -> VisibilityErrorCode {
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
}

impl fmt::Display for VisibilityError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for VisibilityError {}

/// Result type for visibility operations
pub type VisibilityResult<T> = Result<T, VisibilityError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_and_severity() {
        let err = VisibilityError::invalid_snapshot("xmin is required");
        assert_eq!(err.code(), VisibilityErrorCode::AeroSnapshotInvalid);
        assert_eq!(err.severity(), Severity::Reject);

        let err = VisibilityError::scan_failed("posts", StoreError::Unavailable("timeout".into()));
        assert_eq!(err.severity(), Severity::Error);
        assert!(err.to_string().starts_with("[ERROR] AERO_VISIBILITY_SCAN_FAILED"));
    }
}
