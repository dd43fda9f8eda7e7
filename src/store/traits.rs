//! Contracts with the external document store
//!
//! Every call is a blocking round trip. Implementations never retry; errors
//! propagate to the caller, which owns retry policy.

use crate::emitter::TargetQuery;
use crate::metadata::IndexMapping;
use crate::visibility::{ScanFilter, StoredTuple, SupersessionRecord};

use super::errors::StoreResult;

/// Fetches index mappings by name
pub trait MetadataSource {
    fn fetch_mapping(&self, index: &str) -> StoreResult<IndexMapping>;
}

/// Counts documents for selectivity estimates
pub trait CountSource {
    /// All documents when `query` is `None`, else the matching ones
    fn count(&self, index: &str, query: Option<&TargetQuery>) -> StoreResult<u64>;
}

/// Exposes stored transaction metadata
pub trait TupleSource {
    /// Documents stored in the index
    fn total_docs(&self, index: &str) -> StoreResult<u64>;

    /// Transaction ids recorded as aborted
    fn aborted_xids(&self, index: &str) -> StoreResult<Vec<u64>>;

    /// Every supersession record
    fn superseded(&self, index: &str) -> StoreResult<Vec<SupersessionRecord>>;

    /// Documents admitted by `filter`
    fn scan(&self, index: &str, filter: &ScanFilter) -> StoreResult<Vec<StoredTuple>>;
}
