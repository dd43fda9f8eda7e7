//! Query tree
//!
//! The external parser produces a `QueryExpr`; the pipeline works on the
//! arena-backed `QueryTree` built from it. Rewrites edit the tree in place.

mod errors;
mod expr;
mod node;
mod tree;

pub use errors::{AstError, AstErrorCode, AstResult};
pub use expr::QueryExpr;
pub use node::{Node, NodeId, NodeKind, Operator, Predicate, PredicateValue};
pub use tree::QueryTree;
