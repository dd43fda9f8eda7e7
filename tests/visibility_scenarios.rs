//! Visibility Scenario Tests
//!
//! End-to-end invisible-set computation against the in-memory store:
//! - The six satisfies-now scenarios for one snapshot
//! - Full scan vs restricted scan give the same answer
//! - Short-circuit scans only rows the snapshot may not see
//! - Store-side predicate agrees with the computed bitmap

use std::sync::Arc;

use aerosearch::compiler::{CompilerConfig, QueryCompiler};
use aerosearch::emitter::TargetQuery;
use aerosearch::observability::MetricsRegistry;
use aerosearch::store::MemoryStore;
use aerosearch::visibility::{SnapshotDescriptor, VisibilityEngine};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn snapshot() -> SnapshotDescriptor {
    SnapshotDescriptor::new(100, 90, 110, 5, []).unwrap()
}

fn doc(block: u32, offset: u16, xmin: u64, cmin: u32) -> Value {
    json!({
        "block": block,
        "offset": offset,
        "xmin": xmin,
        "cmin": cmin,
        "source": { "id": format!("{}-{}", block, offset) }
    })
}

fn store(documents: Vec<Value>, aborted: Vec<u64>, superseded: Vec<Value>) -> MemoryStore {
    MemoryStore::from_fixture_value(json!({
        "indexes": {
            "rows": {
                "mapping": { "primary_key": "id", "properties": { "id": { "type": "keyword" } } },
                "documents": documents,
                "aborted": aborted,
                "superseded": superseded
            }
        }
    }))
    .unwrap()
}

/// One document per scenario, in ordinal order:
/// 0. own insert, earlier command, not deleted          -> visible
/// 1. own insert, deleted by self at a later command    -> visible
/// 2. own insert, deleted by self at an earlier command -> invisible
/// 3. committed insert, not deleted                     -> visible
/// 4. committed insert, deleted by another committed tx -> invisible
/// 5. insert by an aborted tx                           -> invisible
fn scenario_store() -> MemoryStore {
    store(
        vec![
            doc(1, 1, 100, 3),
            doc(1, 2, 100, 3),
            doc(1, 3, 100, 3),
            doc(2, 1, 50, 0),
            doc(2, 2, 50, 0),
            doc(3, 1, 95, 0),
        ],
        vec![95],
        vec![
            json!({ "block": 1, "offset": 2, "xmax": 100, "cmax": 7 }),
            json!({ "block": 1, "offset": 3, "xmax": 100, "cmax": 2 }),
            json!({ "block": 2, "offset": 2, "xmax": 60, "cmax": 0 }),
        ],
    )
}

fn invisible_ordinals(store: &MemoryStore, snapshot: &SnapshotDescriptor) -> Vec<u32> {
    let set = VisibilityEngine::new(store).compute("rows", snapshot).unwrap();
    set.shard(0).map(|b| b.iter().collect()).unwrap_or_default()
}

// =============================================================================
// Scenario Tests
// =============================================================================

#[test]
fn test_six_scenarios() {
    let store = scenario_store();
    assert_eq!(invisible_ordinals(&store, &snapshot()), vec![2, 4, 5]);
}

#[test]
fn test_aborted_insert_invisible_regardless_of_delete() {
    let store = store(
        vec![doc(1, 1, 95, 0)],
        vec![95],
        vec![json!({ "block": 1, "offset": 1, "xmax": 60, "cmax": 0 })],
    );
    assert_eq!(invisible_ordinals(&store, &snapshot()), vec![0]);
}

#[test]
fn test_restricted_scan_matches_full_scan() {
    // 1 superseded of 12 keeps the scan restricted; the old committed rows
    // on clean blocks are never candidates and stay visible
    let mut documents: Vec<Value> = (0..10).map(|i| doc(10 + i, 1, 20, 0)).collect();
    documents.push(doc(1, 1, 50, 0));
    documents.push(doc(3, 1, 95, 0));
    let superseded = vec![json!({ "block": 1, "offset": 1, "xmax": 60, "cmax": 0 })];

    let restricted = store(documents, vec![95], superseded);
    assert_eq!(invisible_ordinals(&restricted, &snapshot()), vec![10, 11]);
}

#[test]
fn test_in_progress_insert_invisible() {
    let store = store(vec![doc(1, 1, 20, 0), doc(1, 2, 97, 0)], vec![], vec![]);
    let snapshot = SnapshotDescriptor::new(100, 90, 110, 5, [97]).unwrap();
    assert_eq!(invisible_ordinals(&store, &snapshot), vec![1]);
}

#[test]
fn test_insert_after_snapshot_invisible() {
    let store = store(vec![doc(1, 1, 20, 0), doc(1, 2, 120, 0)], vec![96], vec![]);
    assert_eq!(invisible_ordinals(&store, &snapshot()), vec![1]);
}

// =============================================================================
// Short-circuit
// =============================================================================

#[test]
fn test_short_circuit_still_catches_uncommitted_rows() {
    // no aborts, no supersessions, no active writers
    let store = store(
        vec![doc(1, 1, 50, 0), doc(1, 2, 120, 0), doc(1, 3, 100, 5)],
        vec![],
        vec![],
    );
    let metrics = MetricsRegistry::new();

    let set = VisibilityEngine::new(&store)
        .with_metrics(&metrics)
        .compute("rows", &snapshot())
        .unwrap();

    // insert after the snapshot and own insert at the current command
    assert_eq!(set.shard(0).map(|b| b.iter().collect::<Vec<_>>()), Some(vec![1, 2]));
    let counters = metrics.snapshot();
    assert_eq!(counters.visibility_computations, 1);
    assert_eq!(counters.visibility_short_circuits, 1);

    let predicate = VisibilityEngine::exclusion_predicate("rows", &snapshot());
    assert_eq!(store.search("rows", &predicate).unwrap(), vec![(0, 1), (0, 2)]);
}

#[test]
fn test_short_circuit_old_rows_visible() {
    let store = store(vec![doc(1, 1, 20, 0), doc(2, 1, 50, 0)], vec![], vec![]);
    assert!(invisible_ordinals(&store, &snapshot()).is_empty());
}

#[test]
fn test_active_xids_disable_short_circuit() {
    let store = store(vec![doc(1, 1, 97, 0)], vec![], vec![]);
    let snapshot = SnapshotDescriptor::new(100, 90, 110, 5, [97]).unwrap();
    let metrics = MetricsRegistry::new();

    let set = VisibilityEngine::new(&store)
        .with_metrics(&metrics)
        .compute("rows", &snapshot)
        .unwrap();

    assert_eq!(set.len(), 1);
    assert_eq!(metrics.snapshot().visibility_short_circuits, 0);
    assert_eq!(metrics.snapshot().invisible_tuples, 1);
}

// =============================================================================
// Store-side predicate and post-filtering
// =============================================================================

#[test]
fn test_exclusion_predicate_matches_bitmap() {
    let store = scenario_store();
    let predicate = VisibilityEngine::exclusion_predicate("rows", &snapshot());

    let hits: Vec<u32> = store
        .search("rows", &predicate)
        .unwrap()
        .into_iter()
        .map(|(_, ordinal)| ordinal)
        .collect();
    assert_eq!(hits, vec![2, 4, 5]);

    let visible = store
        .search("rows", &TargetQuery::excluding(TargetQuery::MatchAll, predicate))
        .unwrap();
    assert_eq!(visible, vec![(0, 0), (0, 1), (0, 3)]);
}

#[test]
fn test_retain_visible_filters_hits() {
    let store = scenario_store();
    let metrics = Arc::new(MetricsRegistry::new());
    let compiler = QueryCompiler::new(CompilerConfig::default()).with_metrics(metrics.clone());

    let invisible = compiler.visibility(&store, "rows", &snapshot()).unwrap();
    let hits = store.search("rows", &TargetQuery::MatchAll).unwrap();
    let visible = invisible.retain_visible(hits, |&hit| hit);

    assert_eq!(visible, vec![(0, 0), (0, 1), (0, 3)]);
    assert_eq!(metrics.snapshot().invisible_tuples, 3);
}

#[test]
fn test_snapshot_wire_form() {
    let snapshot = SnapshotDescriptor::from_json(
        r#"{ "myXid": 100, "xmin": 90, "xmax": 110, "commandId": 5, "activeXids": [] }"#,
    )
    .unwrap();
    assert_eq!(snapshot, self::snapshot());

    let err = SnapshotDescriptor::from_json(
        r#"{ "myXid": 100, "xmin": 120, "xmax": 110, "commandId": 5 }"#,
    )
    .unwrap_err();
    assert_eq!(err.code().code(), "AERO_SNAPSHOT_INVALID");
}
