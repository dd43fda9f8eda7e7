//! Target-query emission
//!
//! Turns the optimized tree into the store's query form: typed terms,
//! ranges, span chains for phrases and proximity, nested scopes, and
//! cross-index joins that subtract each joined index's invisible tuples.

mod emit;
mod errors;
mod target;

pub use emit::{coerce, Emitter};
pub use errors::{EmitError, EmitErrorCode, EmitResult};
pub use target::TargetQuery;
