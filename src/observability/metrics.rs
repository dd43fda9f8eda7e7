//! Metrics registry
//!
//! - Counters only
//! - Monotonic increase
//! - Thread-safe but lock-free

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Operational counters for compilation and visibility
///
/// Counters use Relaxed ordering; metrics tolerate eventual consistency.
#[derive(Debug, Default)]
pub struct MetricsRegistry {
    queries_compiled: AtomicU64,
    queries_rejected: AtomicU64,
    expansions_generated: AtomicU64,
    joins_inverted: AtomicU64,
    not_hoists: AtomicU64,
    visibility_computations: AtomicU64,
    visibility_short_circuits: AtomicU64,
    invisible_tuples: AtomicU64,
}

impl MetricsRegistry {
    /// Create a new metrics registry with all counters at zero
    pub fn new() -> Self {
        Self::default()
    }

    // Compilation

    pub fn increment_queries_compiled(&self) {
        self.queries_compiled.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_queries_rejected(&self) {
        self.queries_rejected.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_expansions_generated(&self, count: u64) {
        self.expansions_generated.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_joins_inverted(&self, count: u64) {
        self.joins_inverted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn add_not_hoists(&self, count: u64) {
        self.not_hoists.fetch_add(count, Ordering::Relaxed);
    }

    // Visibility

    pub fn increment_visibility_computations(&self) {
        self.visibility_computations.fetch_add(1, Ordering::Relaxed);
    }

    pub fn increment_visibility_short_circuits(&self) {
        self.visibility_short_circuits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_invisible_tuples(&self, count: u64) {
        self.invisible_tuples.fetch_add(count, Ordering::Relaxed);
    }

    /// Current snapshot serialized as JSON
    pub fn to_json(&self) -> String {
        // A struct of u64 fields always serializes
        serde_json::to_string(&self.snapshot()).unwrap_or_default()
    }

    /// Get all metrics as a snapshot
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            queries_compiled: self.queries_compiled.load(Ordering::Relaxed),
            queries_rejected: self.queries_rejected.load(Ordering::Relaxed),
            expansions_generated: self.expansions_generated.load(Ordering::Relaxed),
            joins_inverted: self.joins_inverted.load(Ordering::Relaxed),
            not_hoists: self.not_hoists.load(Ordering::Relaxed),
            visibility_computations: self.visibility_computations.load(Ordering::Relaxed),
            visibility_short_circuits: self.visibility_short_circuits.load(Ordering::Relaxed),
            invisible_tuples: self.invisible_tuples.load(Ordering::Relaxed),
        }
    }
}

/// A point-in-time snapshot of all metrics
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    pub queries_compiled: u64,
    pub queries_rejected: u64,
    pub expansions_generated: u64,
    pub joins_inverted: u64,
    pub not_hoists: u64,
    pub visibility_computations: u64,
    pub visibility_short_circuits: u64,
    pub invisible_tuples: u64,
}
