//! Visibility computation
//!
//! One computation per snapshot, no state carried between calls:
//!
//! 1. Collect aborted transaction ids
//! 2. Collect supersession records and the blocks they touch
//! 3. Choose a scan strategy
//! 4. Evaluate the satisfies-now predicate for every candidate
//! 5. Mark failures in the per-shard invisible bitmap
//!
//! Steps 1-2 and step 4 are separate store round trips with no common
//! point-in-time view. A transaction committing between them can be judged
//! against stale abort/supersession data; callers accept this window.

use std::collections::{BTreeSet, HashMap};

use crate::emitter::TargetQuery;
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};
use crate::store::TupleSource;

use super::errors::{VisibilityError, VisibilityResult};
use super::invisible::InvisibleSet;
use super::snapshot::SnapshotDescriptor;
use super::tuple::{SupersessionRecord, TupleHeader, TupleId, TupleRecord};

/// Which stored documents the store should return for evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanFilter {
    /// Every document
    All,
    /// Documents on a dirty block, created by an active or aborted
    /// transaction, or created at or after `min_xmin`
    Restricted {
        dirty_blocks: BTreeSet<u32>,
        xids: BTreeSet<u64>,
        min_xmin: u64,
    },
}

impl ScanFilter {
    /// Full scan once superseded documents reach a third of the index
    pub fn choose(
        superseded: u64,
        total_docs: u64,
        dirty_blocks: BTreeSet<u32>,
        xids: BTreeSet<u64>,
        min_xmin: u64,
    ) -> Self {
        if superseded.saturating_mul(3) >= total_docs {
            ScanFilter::All
        } else {
            ScanFilter::Restricted {
                dirty_blocks,
                xids,
                min_xmin,
            }
        }
    }

    /// True if a document with this header is a scan candidate
    pub fn admits(&self, header: &TupleHeader) -> bool {
        match self {
            ScanFilter::All => true,
            ScanFilter::Restricted {
                dirty_blocks,
                xids,
                min_xmin,
            } => {
                dirty_blocks.contains(&header.id.block)
                    || xids.contains(&header.xmin)
                    || header.xmin >= *min_xmin
            }
        }
    }
}

/// MVCC satisfies-now
pub fn is_visible(
    tuple: &TupleRecord,
    snapshot: &SnapshotDescriptor,
    aborted: &BTreeSet<u64>,
) -> bool {
    let my = snapshot.my_xid();
    let command = snapshot.command_id();

    let committed = |xid: u64| {
        xid != my && !aborted.contains(&xid) && !snapshot.is_active(xid) && xid < snapshot.xmax()
    };

    let deleted_by_me_later = matches!(
        (tuple.xmax, tuple.cmax),
        (Some(xmax), Some(cmax)) if xmax == my && cmax >= command
    );

    let mine = tuple.xmin == my
        && tuple.cmin < command
        && (tuple.xmax.is_none() || deleted_by_me_later);

    let theirs = committed(tuple.xmin)
        && match tuple.xmax {
            None => true,
            Some(xmax) => deleted_by_me_later || (xmax != my && !committed(xmax)),
        };

    mine || theirs
}

/// Computes invisible sets against a tuple source
pub struct VisibilityEngine<'a> {
    source: &'a dyn TupleSource,
    metrics: Option<&'a MetricsRegistry>,
}

impl<'a> VisibilityEngine<'a> {
    pub fn new(source: &'a dyn TupleSource) -> Self {
        Self {
            source,
            metrics: None,
        }
    }

    /// Records computations and invisible counts in `metrics`
    pub fn with_metrics(mut self, metrics: &'a MetricsRegistry) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Store-side form of the exclusion: matches documents invisible to `snapshot`
    pub fn exclusion_predicate(index: &str, snapshot: &SnapshotDescriptor) -> TargetQuery {
        TargetQuery::InvisibleTuples {
            index: index.to_string(),
            my_xid: snapshot.my_xid(),
            xmin: snapshot.xmin(),
            xmax: snapshot.xmax(),
            command_id: snapshot.command_id(),
            active_xids: snapshot.active_xids().iter().copied().collect(),
        }
    }

    /// Every document of `index` invisible to `snapshot`, per shard
    pub fn compute(
        &self,
        index: &str,
        snapshot: &SnapshotDescriptor,
    ) -> VisibilityResult<InvisibleSet> {
        let scope = ObservationScope::with_fields("VISIBILITY", &[("index", index)]);

        match self.compute_inner(index, snapshot) {
            Ok(set) => {
                let invisible = set.len().to_string();
                scope.complete_with_fields(&[("invisible", invisible.as_str())]);
                Ok(set)
            }
            Err(e) => {
                scope.fail(e.message());
                Err(e)
            }
        }
    }

    fn compute_inner(
        &self,
        index: &str,
        snapshot: &SnapshotDescriptor,
    ) -> VisibilityResult<InvisibleSet> {
        if let Some(metrics) = self.metrics {
            metrics.increment_visibility_computations();
        }

        let aborted: BTreeSet<u64> = self
            .source
            .aborted_xids(index)
            .map_err(|e| VisibilityError::scan_failed(index, e))?
            .into_iter()
            .collect();

        let records = self
            .source
            .superseded(index)
            .map_err(|e| VisibilityError::scan_failed(index, e))?;

        // the caller's rows and rows at or after snapshot xmin are always candidates
        let mut xids: BTreeSet<u64> = aborted
            .iter()
            .chain(snapshot.active_xids().iter())
            .copied()
            .collect();
        xids.insert(snapshot.my_xid());

        let mut superseded: HashMap<TupleId, SupersessionRecord> = HashMap::new();
        let filter =
            if records.is_empty() && aborted.is_empty() && snapshot.active_xids().is_empty() {
                log_event_with_fields(Event::VisibilityShortCircuit, &[("index", index)]);
                if let Some(metrics) = self.metrics {
                    metrics.increment_visibility_short_circuits();
                }
                ScanFilter::Restricted {
                    dirty_blocks: BTreeSet::new(),
                    xids,
                    min_xmin: snapshot.xmin(),
                }
            } else {
                let mut dirty_blocks = BTreeSet::new();
                for record in records {
                    dirty_blocks.insert(record.origin.block);
                    superseded.insert(record.origin, record);
                }

                let total = self
                    .source
                    .total_docs(index)
                    .map_err(|e| VisibilityError::scan_failed(index, e))?;

                ScanFilter::choose(
                    superseded.len() as u64,
                    total,
                    dirty_blocks,
                    xids,
                    snapshot.xmin(),
                )
            };

        let candidates = self
            .source
            .scan(index, &filter)
            .map_err(|e| VisibilityError::scan_failed(index, e))?;

        let mut invisible = InvisibleSet::new();
        for stored in candidates {
            let header = TupleHeader::decode(&stored.header)?;
            let tuple = TupleRecord::from_parts(header, superseded.get(&header.id));
            if !is_visible(&tuple, snapshot, &aborted) {
                invisible.insert(stored.shard, stored.ordinal);
            }
        }

        if let Some(metrics) = self.metrics {
            metrics.add_invisible_tuples(invisible.len());
        }

        Ok(invisible)
    }
}
