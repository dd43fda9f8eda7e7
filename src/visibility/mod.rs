//! Visibility engine
//!
//! Reproduces MVCC tuple visibility on top of a store with no transaction
//! concept. Documents are never updated in place; each carries the creating
//! transaction in its header and may be superseded by a separate record.
//!
//! Two outputs:
//! - `VisibilityEngine::compute` - per-shard bitmap of invisible documents,
//!   used to filter hits after execution
//! - `VisibilityEngine::exclusion_predicate` - the same rule as a target
//!   query the store evaluates itself

mod engine;
mod errors;
mod invisible;
mod snapshot;
mod tuple;

pub use engine::{is_visible, ScanFilter, VisibilityEngine};
pub use errors::{VisibilityError, VisibilityErrorCode, VisibilityResult};
pub use invisible::InvisibleSet;
pub use snapshot::SnapshotDescriptor;
pub use tuple::{
    StoredTuple, SupersessionRecord, TupleHeader, TupleId, TupleRecord, TUPLE_HEADER_LEN,
};
