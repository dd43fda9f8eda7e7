//! Negation hoisting
//!
//! Inside an AND, `NOT pk:[b]` next to `pk:[a,b,c]` becomes `pk:[a,c]`.
//! This is only sound for the primary key of the index the predicates
//! resolve through: a single-valued field cannot hold two of the values at
//! once, so removing them from the positive set is exact.

use crate::ast::{NodeId, NodeKind, PredicateValue, QueryTree};
use crate::metadata::IndexMetadataRegistry;

/// Folds negated primary-key arrays into positive siblings; returns the
/// number of negations removed
pub(super) fn hoist_negations(tree: &mut QueryTree, registry: &IndexMetadataRegistry) -> usize {
    let mut hoisted = 0;

    for id in tree.postorder(tree.root()) {
        if !matches!(tree.kind(id), NodeKind::And) {
            continue;
        }

        for not in tree.child_ids(id) {
            let Some((negated, excluded)) = negated_key(tree, registry, not) else {
                continue;
            };
            let Some(positive) = positive_sibling(tree, id, negated) else {
                continue;
            };
            let remaining: Vec<String> = member_values(tree, positive)
                .into_iter()
                .filter(|v| !excluded.contains(v))
                .collect();
            if remaining.is_empty() {
                continue;
            }

            if let Some(predicate) = tree.predicate_mut(positive) {
                predicate.value = PredicateValue::Array {
                    values: remaining,
                    match_all: false,
                };
            }
            tree.detach(not);
            hoisted += 1;
        }
    }

    hoisted
}

/// The predicate under a `NOT` and the values it excludes, when it is a
/// membership test on a primary key
fn negated_key(
    tree: &QueryTree,
    registry: &IndexMetadataRegistry,
    not: NodeId,
) -> Option<(NodeId, Vec<String>)> {
    if !matches!(tree.kind(not), NodeKind::Not) {
        return None;
    }
    let [inner] = tree.children(not) else {
        return None;
    };
    let predicate = tree.predicate(*inner)?;
    if !predicate.operator.is_membership() {
        return None;
    }

    let excluded = match &predicate.value {
        PredicateValue::Word(word) => vec![word.clone()],
        PredicateValue::Array { values, match_all } if !match_all || values.len() == 1 => {
            values.clone()
        }
        _ => return None,
    };

    let link = tree.link(*inner)?;
    let meta = registry.metadata(link.index_name()).ok()?;
    (meta.primary_key() == predicate.field).then_some((*inner, excluded))
}

fn positive_sibling(tree: &QueryTree, parent: NodeId, negated: NodeId) -> Option<NodeId> {
    let target = tree.predicate(negated)?;
    let link = tree.link(negated);

    tree.children(parent).iter().copied().find(|&sibling| {
        tree.predicate(sibling).is_some_and(|p| {
            p.field == target.field
                && p.operator.is_membership()
                && matches!(p.value, PredicateValue::Array { match_all: false, .. })
                && tree.link(sibling) == link
        })
    })
}

fn member_values(tree: &QueryTree, id: NodeId) -> Vec<String> {
    match tree.predicate(id).map(|p| &p.value) {
        Some(PredicateValue::Array { values, .. }) => values.clone(),
        _ => Vec::new(),
    }
}
