//! Count estimation for join inversion
//!
//! The cache is the only mutable state shared between concurrently
//! compiling queries. It is injected rather than global so tests and
//! embedders can supply their own.

mod cache;
mod estimator;

pub use cache::{CacheStats, EstimateCache, SharedCountCache, DEFAULT_CACHE_CAPACITY};
pub use estimator::CountEstimator;
