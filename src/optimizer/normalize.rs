//! Structural normalization
//!
//! Three rewrites run together until the rendered tree stops changing:
//!
//! 1. rollup: AND under AND, OR under OR and WITH under WITH are flattened
//! 2. array merge: sibling membership tests on one field become an array
//! 3. reduce: single-child groups are replaced by their child

use std::sync::Arc;

use crate::ast::{NodeId, NodeKind, Predicate, PredicateValue, QueryTree};
use crate::metadata::IndexLink;

use super::errors::{OptimizerError, OptimizerResult};

/// Runs the rewrites to a fixed point; returns the passes taken
pub(super) fn normalize(tree: &mut QueryTree, max_passes: usize) -> OptimizerResult<usize> {
    let mut previous = tree.to_string();

    for pass in 1..=max_passes {
        rollup(tree);
        merge_arrays(tree);
        reduce(tree);

        let current = tree.to_string();
        if current == previous {
            return Ok(pass);
        }
        previous = current;
    }

    Err(OptimizerError::rewrite_limit("normalize", max_passes))
}

pub(super) fn rollup(tree: &mut QueryTree) {
    for id in tree.postorder(tree.root()) {
        let Some(parent) = tree.parent(id) else {
            continue;
        };
        let same = matches!(
            (tree.kind(parent), tree.kind(id)),
            (NodeKind::And, NodeKind::And) | (NodeKind::Or, NodeKind::Or) | (NodeKind::With, NodeKind::With)
        );
        if same {
            tree.splice(id);
        }
    }
}

pub(super) fn reduce(tree: &mut QueryTree) {
    for id in tree.postorder(tree.root()) {
        if !tree.kind(id).is_group() || tree.children(id).len() != 1 {
            continue;
        }
        if let Some(parent) = tree.parent(id) {
            let child = tree.children(id)[0];
            tree.replace(parent, id, child);
        }
    }
}

#[derive(Debug, PartialEq)]
struct MergeKey {
    field: String,
    link: Option<Arc<IndexLink>>,
    boost: Option<u32>,
}

/// Folds sibling EQ/CONTAINS tests on the same field, link and boost into
/// one array. Under AND the array needs every value, under OR any one.
pub(super) fn merge_arrays(tree: &mut QueryTree) {
    for id in tree.postorder(tree.root()) {
        let match_all = match tree.kind(id) {
            NodeKind::And => true,
            NodeKind::Or => false,
            _ => continue,
        };

        let mut buckets: Vec<(MergeKey, Vec<NodeId>)> = Vec::new();
        for child in tree.child_ids(id) {
            let Some(key) = merge_key(tree, child, match_all) else {
                continue;
            };
            match buckets.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(child),
                None => buckets.push((key, vec![child])),
            }
        }

        for (_, members) in buckets.into_iter().filter(|(_, m)| m.len() > 1) {
            let mut values: Vec<String> = Vec::new();
            for member in &members {
                for value in member_values(tree, *member) {
                    if !values.contains(&value) {
                        values.push(value);
                    }
                }
            }

            let head = members[0];
            if let Some(predicate) = tree.predicate_mut(head) {
                predicate.value = PredicateValue::Array { values, match_all };
            }
            for member in &members[1..] {
                tree.detach(*member);
            }
        }
    }
}

fn merge_key(tree: &QueryTree, id: NodeId, match_all: bool) -> Option<MergeKey> {
    let predicate = tree.predicate(id)?;
    if !predicate.operator.is_membership() || !mergeable_value(predicate, match_all) {
        return None;
    }
    Some(MergeKey {
        field: predicate.field.clone(),
        link: tree.link(id).cloned(),
        boost: predicate.boost.map(f32::to_bits),
    })
}

fn mergeable_value(predicate: &Predicate, match_all: bool) -> bool {
    match &predicate.value {
        PredicateValue::Word(_) => true,
        PredicateValue::Array {
            values,
            match_all: existing,
        } => *existing == match_all || values.len() == 1,
        _ => false,
    }
}

fn member_values(tree: &QueryTree, id: NodeId) -> Vec<String> {
    match tree.predicate(id).map(|p| &p.value) {
        Some(PredicateValue::Word(word)) => vec![word.clone()],
        Some(PredicateValue::Array { values, .. }) => values.clone(),
        _ => Vec::new(),
    }
}
