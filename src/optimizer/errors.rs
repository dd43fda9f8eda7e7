//! Optimizer error types
//!
//! Error codes:
//! - AERO_QUERY_INVALID (REJECT)
//! - AERO_REWRITE_LIMIT_EXCEEDED (REJECT)
//! - AERO_ESTIMATE_FAILED (ERROR)
//!
//! Metadata and emission failures raised while optimizing keep their own
//! codes.

use std::fmt;

use crate::emitter::{EmitError, EmitErrorCode};
use crate::errors::Severity;
use crate::metadata::{MetadataError, MetadataErrorCode};
use crate::store::StoreError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptimizerErrorCode {
    /// Tree shape the optimizer cannot work with
    AeroQueryInvalid,
    /// A fixed-point rewrite did not settle within the pass limit
    AeroRewriteLimitExceeded,
    /// A selectivity count round trip failed
    AeroEstimateFailed,
    Metadata(MetadataErrorCode),
    Emit(EmitErrorCode),
}

impl OptimizerErrorCode {
    pub fn code(&self) -> &'static str {
        match self {
            OptimizerErrorCode::AeroQueryInvalid => "AERO_QUERY_INVALID",
            OptimizerErrorCode::AeroRewriteLimitExceeded => "AERO_REWRITE_LIMIT_EXCEEDED",
            OptimizerErrorCode::AeroEstimateFailed => "AERO_ESTIMATE_FAILED",
            OptimizerErrorCode::Metadata(code) => code.code(),
            OptimizerErrorCode::Emit(code) => code.code(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            OptimizerErrorCode::AeroEstimateFailed => Severity::Error,
            OptimizerErrorCode::Metadata(code) => code.severity(),
            OptimizerErrorCode::Emit(code) => code.severity(),
            _ => Severity::Reject,
        }
    }
}

impl fmt::Display for OptimizerErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Optimizer error with context
#[derive(Debug, Clone)]
pub struct OptimizerError {
    code: OptimizerErrorCode,
    message: String,
}

impl OptimizerError {
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self {
            code: OptimizerErrorCode::AeroQueryInvalid,
            message: reason.into(),
        }
    }

    pub fn rewrite_limit(step: &str, passes: usize) -> Self {
        Self {
            code: OptimizerErrorCode::AeroRewriteLimitExceeded,
            message: format!("'{}' did not reach a fixed point within {} passes", step, passes),
        }
    }

    pub fn estimate_failed(index: &str, source: StoreError) -> Self {
        Self {
            code: OptimizerErrorCode::AeroEstimateFailed,
            message: format!("Count estimate against '{}' failed: {}", index, source),
        }
    }

    pub fn code(&self) -> OptimizerErrorCode {
        self.code
    }

    pub fn severity(&self) -> Severity {
        self.code.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl From<MetadataError> for OptimizerError {
    fn from(err: MetadataError) -> Self {
        Self {
            code: OptimizerErrorCode::Metadata(err.code()),
            message: err.message().to_string(),
        }
    }
}

impl From<EmitError> for OptimizerError {
    fn from(err: EmitError) -> Self {
        Self {
            code: OptimizerErrorCode::Emit(err.code()),
            message: err.message().to_string(),
        }
    }
}

impl fmt::Display for OptimizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.code.severity(), self.code.code(), self.message)
    }
}

impl std::error::Error for OptimizerError {}

pub type OptimizerResult<T> = Result<T, OptimizerError>;
