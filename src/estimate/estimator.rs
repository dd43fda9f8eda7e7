//! Selectivity estimates through the count cache

use crate::emitter::TargetQuery;
use crate::store::{CountSource, StoreResult};

use super::cache::EstimateCache;

/// Counts documents of an index, memoized in a shared cache
pub struct CountEstimator<'a> {
    source: &'a dyn CountSource,
    cache: &'a dyn EstimateCache,
}

impl<'a> CountEstimator<'a> {
    pub fn new(source: &'a dyn CountSource, cache: &'a dyn EstimateCache) -> Self {
        Self { source, cache }
    }

    /// Documents in `index`
    pub fn total(&self, index: &str) -> StoreResult<u64> {
        self.cached(format!("{}\u{0}*", index), || self.source.count(index, None))
    }

    /// Documents in `index` matching `query`
    pub fn matching(&self, index: &str, query: &TargetQuery) -> StoreResult<u64> {
        match serde_json::to_string(query) {
            Ok(text) => self.cached(format!("{}\u{0}{}", index, text), || {
                self.source.count(index, Some(query))
            }),
            Err(_) => self.source.count(index, Some(query)),
        }
    }

    fn cached(&self, key: String, fetch: impl FnOnce() -> StoreResult<u64>) -> StoreResult<u64> {
        if let Some(count) = self.cache.get(&key) {
            return Ok(count);
        }
        let count = fetch()?;
        self.cache.insert(key, count);
        Ok(count)
    }
}
