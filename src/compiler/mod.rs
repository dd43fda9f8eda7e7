//! Query compilation
//!
//! `QueryCompiler` ties the pipeline together: tree building, metadata
//! loading, optimization, emission and the visibility predicate.

#[allow(clippy::module_inception)]
mod compiler;
mod config;
mod errors;

pub use compiler::{CompiledQuery, QueryCompiler};
pub use config::CompilerConfig;
pub use errors::{CompileError, CompileResult};
