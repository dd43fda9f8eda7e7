//! aerosearch - MVCC-aware query compilation for a sharded search store
//!
//! A user query tree is resolved against index metadata, rewritten (field
//! expansion, normalization, cross-index joins, join inversion, negation
//! hoisting) and lowered to the store's query form. Alongside it, the
//! visibility engine works out which stored tuples a transaction snapshot
//! must not see.

pub mod ast;
pub mod cli;
pub mod compiler;
pub mod emitter;
pub mod errors;
pub mod estimate;
pub mod metadata;
pub mod observability;
pub mod optimizer;
pub mod store;
pub mod visibility;
