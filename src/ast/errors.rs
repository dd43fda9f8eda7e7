//! Query shape errors
//!
//! Error codes:
//! - AERO_QUERY_INVALID (REJECT)
//! - AERO_LINK_INVALID (REJECT)

use std::fmt;

use crate::errors::Severity;
use crate::metadata::{MetadataError, MetadataErrorCode};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AstErrorCode {
    /// Malformed query structure
    AeroQueryInvalid,
    /// A user-written link could not be parsed
    AeroLinkInvalid,
}

impl AstErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            AstErrorCode::AeroQueryInvalid => "AERO_QUERY_INVALID",
            AstErrorCode::AeroLinkInvalid => "AERO_LINK_INVALID",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for AstErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// A query that cannot be turned into a tree
#[derive(Debug, Clone)]
pub struct AstError {
    code: AstErrorCode,
    message: String,
}

impl AstError {
    /// Create a malformed query error
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            code: AstErrorCode::AeroQueryInvalid,
            message: message.into(),
        }
    }

    pub fn code(&self) -> AstErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<MetadataError> for AstError {
    fn from(err: MetadataError) -> Self {
        let code = match err.code() {
            MetadataErrorCode::AeroLinkInvalid => AstErrorCode::AeroLinkInvalid,
            _ => AstErrorCode::AeroQueryInvalid,
        };
        Self {
            code,
            message: err.message().to_string(),
        }
    }
}

impl fmt::Display for AstError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for AstError {}

pub type AstResult<T> = Result<T, AstError>;
