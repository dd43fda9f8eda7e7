//! Compilation errors
//!
//! Every stage keeps its own error type; this enum only gathers them so a
//! caller sees one result type and one stable code per failure.

use thiserror::Error;

use crate::ast::AstError;
use crate::emitter::EmitError;
use crate::errors::Severity;
use crate::metadata::MetadataError;
use crate::optimizer::OptimizerError;
use crate::visibility::VisibilityError;

/// Result type for compilation
pub type CompileResult<T> = Result<T, CompileError>;

/// Any failure between a parsed query and its target query
#[derive(Debug, Clone, Error)]
pub enum CompileError {
    /// Unreadable or out-of-range configuration
    #[error("[ERROR] AERO_CONFIG_INVALID: {0}")]
    Config(String),

    // ==================
    // Rejections
    // ==================
    #[error("{0}")]
    Ast(#[from] AstError),

    #[error("{0}")]
    Optimizer(#[from] OptimizerError),

    #[error("{0}")]
    Emit(#[from] EmitError),

    // ==================
    // Store-facing
    // ==================
    #[error("{0}")]
    Metadata(#[from] MetadataError),

    #[error("{0}")]
    Visibility(#[from] VisibilityError),
}

impl CompileError {
    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::Config(_) => "AERO_CONFIG_INVALID",
            CompileError::Ast(e) => e.code().code(),
            CompileError::Optimizer(e) => e.code().code(),
            CompileError::Emit(e) => e.code().code(),
            CompileError::Metadata(e) => e.code().code(),
            CompileError::Visibility(e) => e.code().code(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            CompileError::Config(_) => Severity::Error,
            CompileError::Ast(e) => e.severity(),
            CompileError::Optimizer(e) => e.severity(),
            CompileError::Emit(e) => e.severity(),
            CompileError::Metadata(e) => e.severity(),
            CompileError::Visibility(e) => e.severity(),
        }
    }

    /// Message without the code prefix
    pub fn message(&self) -> String {
        match self {
            CompileError::Config(reason) => reason.clone(),
            CompileError::Ast(e) => e.message().to_string(),
            CompileError::Optimizer(e) => e.message().to_string(),
            CompileError::Emit(e) => e.message().to_string(),
            CompileError::Metadata(e) => e.message().to_string(),
            CompileError::Visibility(e) => e.message().to_string(),
        }
    }

    /// True when the query itself is at fault rather than the store
    pub fn is_rejection(&self) -> bool {
        self.severity() == Severity::Reject
    }
}
