//! Emission error types
//!
//! Error codes:
//! - AERO_PROXIMITY_MIXED_FIELDS (REJECT)
//! - AERO_NESTED_PATH_MISMATCH (REJECT)
//! - AERO_QUERY_INVALID (REJECT)
//! - AERO_VALUE_INVALID (REJECT)

use std::fmt;

use crate::errors::Severity;

/// Emitter-specific error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitErrorCode {
    /// A proximity chain spans more than one field
    AeroProximityMixedFields,
    /// Predicates inside a WITH group live in different nested objects
    AeroNestedPathMismatch,
    /// Operator and value cannot be combined
    AeroQueryInvalid,
    /// A value cannot be coerced to its field's type
    AeroValueInvalid,
}

impl EmitErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            EmitErrorCode::AeroProximityMixedFields => "AERO_PROXIMITY_MIXED_FIELDS",
            EmitErrorCode::AeroNestedPathMismatch => "AERO_NESTED_PATH_MISMATCH",
            EmitErrorCode::AeroQueryInvalid => "AERO_QUERY_INVALID",
            EmitErrorCode::AeroValueInvalid => "AERO_VALUE_INVALID",
        }
    }

    pub fn severity(&self) -> Severity {
        Severity::Reject
    }
}

impl fmt::Display for EmitErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Emission error with context
#[derive(Debug, Clone)]
pub struct EmitError {
    code: EmitErrorCode,
    message: String,
    field: Option<String>,
}

impl EmitError {
    pub fn mixed_proximity_fields(first: &str, second: &str) -> Self {
        Self {
            code: EmitErrorCode::AeroProximityMixedFields,
            message: format!(
                "Proximity chain mixes fields '{}' and '{}'",
                first, second
            ),
            field: Some(first.to_string()),
        }
    }

    pub fn nested_mismatch(expected: Option<&str>, found: Option<&str>, field: &str) -> Self {
        Self {
            code: EmitErrorCode::AeroNestedPathMismatch,
            message: format!(
                "WITH group expects nested path '{}' but '{}' is in '{}'",
                expected.unwrap_or("<none>"),
                field,
                found.unwrap_or("<none>")
            ),
            field: Some(field.to_string()),
        }
    }

    pub fn invalid(field: &str, reason: impl Into<String>) -> Self {
        Self {
            code: EmitErrorCode::AeroQueryInvalid,
            message: format!("Invalid predicate on '{}': {}", field, reason.into()),
            field: Some(field.to_string()),
        }
    }

    pub fn invalid_value(field: &str, value: &str, expected: &str) -> Self {
        Self {
            code: EmitErrorCode::AeroValueInvalid,
            message: format!(
                "Value '{}' for field '{}' is not a valid {}",
                value, field, expected
            ),
            field: Some(field.to_string()),
        }
    }

    pub fn code(&self) -> EmitErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn field(&self) -> Option<&str> {
        self.field.as_deref()
    }
}

impl fmt::Display for EmitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for EmitError {}

pub type EmitResult<T> = Result<T, EmitError>;
