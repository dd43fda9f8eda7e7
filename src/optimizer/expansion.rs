//! Cross-index expansion
//!
//! Every predicate is bound to the link of the index that owns its field.
//! Maximal subtrees owned by an index other than the one in scope are then
//! wrapped in generated expansions, one per leg of the join path, innermost
//! first:
//!
//! ```text
//! posts scope, orgs.country:"nz"
//!   => #join<user_id=<users>id>(#join<org_id=<orgs>id>(country:"nz"))
//! ```
//!
//! Sibling expansions over the same link are folded into one, and each
//! outermost generated expansion is inverted when its inner query matches
//! more than half of the joined index.

use std::sync::Arc;

use crate::ast::{NodeId, NodeKind, QueryTree};
use crate::compiler::CompilerConfig;
use crate::emitter::Emitter;
use crate::estimate::CountEstimator;
use crate::metadata::{IndexLink, IndexMetadataRegistry};
use crate::observability::{log_event_with_fields, Event};

use super::errors::{OptimizerError, OptimizerResult};

/// Outermost generated expansions and the legs built for them
#[derive(Debug, Default)]
pub(super) struct Generated {
    pub outermost: Vec<NodeId>,
    pub legs: usize,
}

/// Binds every node to the link it resolves through.
///
/// Predicates get the owner of their field (prefixes stripped), user-written
/// expansions are registered relative to the enclosing index, and groups get
/// the link their children share, or none when they disagree.
pub(super) fn assign_links(
    tree: &mut QueryTree,
    registry: &mut IndexMetadataRegistry,
) -> OptimizerResult<()> {
    let home = Arc::clone(registry.home());
    let root = tree.root();
    assign(tree, registry, root, &home)?;
    Ok(())
}

fn assign(
    tree: &mut QueryTree,
    registry: &mut IndexMetadataRegistry,
    id: NodeId,
    context: &Arc<IndexLink>,
) -> OptimizerResult<Option<Arc<IndexLink>>> {
    if let NodeKind::Expansion { link, generated } = tree.kind(id) {
        let (link, generated) = (Arc::clone(link), *generated);
        let registered = registry.load_link(context.index_name(), &link)?;
        *tree.kind_mut(id) = NodeKind::Expansion {
            link: Arc::clone(&registered),
            generated,
        };
        for child in tree.child_ids(id) {
            assign(tree, registry, child, &registered)?;
        }
        let outer = registry.canonical(context);
        tree.set_link(id, Some(Arc::clone(&outer)));
        return Ok(Some(outer));
    }

    if let Some(predicate) = tree.predicate(id) {
        if let Some(link) = tree.link(id) {
            return Ok(Some(Arc::clone(link)));
        }
        let (owner, field) = registry.field_owner(&predicate.field, context);
        if let Some(predicate) = tree.predicate_mut(id) {
            predicate.field = field;
        }
        tree.set_link(id, Some(Arc::clone(&owner)));
        return Ok(Some(owner));
    }

    let mut shared: Option<Option<Arc<IndexLink>>> = None;
    for child in tree.child_ids(id) {
        let link = assign(tree, registry, child, context)?;
        shared = match shared {
            None => Some(link),
            Some(previous) if previous == link => Some(previous),
            Some(_) => Some(None),
        };
    }
    let link = shared.flatten();
    tree.set_link(id, link.clone());
    Ok(link)
}

/// Wraps foreign subtrees in generated expansions
pub(super) fn generate(
    tree: &mut QueryTree,
    registry: &IndexMetadataRegistry,
) -> OptimizerResult<Generated> {
    let home = Arc::clone(registry.home());
    let mut generated = Generated::default();
    for child in tree.child_ids(tree.root()) {
        wrap_foreign(tree, registry, child, &home, &mut generated)?;
    }
    Ok(generated)
}

fn wrap_foreign(
    tree: &mut QueryTree,
    registry: &IndexMetadataRegistry,
    id: NodeId,
    context: &Arc<IndexLink>,
    out: &mut Generated,
) -> OptimizerResult<()> {
    if let NodeKind::Expansion { link, .. } = tree.kind(id) {
        let inner = Arc::clone(link);
        for child in tree.child_ids(id) {
            wrap_foreign(tree, registry, child, &inner, out)?;
        }
        return Ok(());
    }

    match tree.link(id).cloned() {
        Some(link) if link.index_name() != context.index_name() => {
            build_expansion(tree, registry, id, &link, context, out)
        }
        _ => {
            for child in tree.child_ids(id) {
                wrap_foreign(tree, registry, child, context, out)?;
            }
            Ok(())
        }
    }
}

fn build_expansion(
    tree: &mut QueryTree,
    registry: &IndexMetadataRegistry,
    id: NodeId,
    foreign: &Arc<IndexLink>,
    context: &Arc<IndexLink>,
    out: &mut Generated,
) -> OptimizerResult<()> {
    let legs: Vec<Arc<IndexLink>> = if registry.declared_from(context.index_name(), foreign) {
        vec![Arc::clone(foreign)]
    } else {
        registry
            .path(foreign, context)?
            .iter()
            .map(|leg| registry.canonical(&leg.oriented()))
            .collect()
    };

    if legs.is_empty() {
        return Ok(());
    }
    if join_key_shortcut(tree, registry, id, &legs, context) {
        return Ok(());
    }

    let mut current = id;
    let mut previous: Option<&Arc<IndexLink>> = None;
    let mut built = 0;
    for (i, leg) in legs.iter().enumerate().rev() {
        if previous == Some(leg) {
            continue;
        }
        let outer = if i == 0 { context } else { &legs[i - 1] };
        let expansion = tree.wrap(
            current,
            NodeKind::Expansion {
                link: Arc::clone(leg),
                generated: true,
            },
        );
        tree.set_link(expansion, Some(Arc::clone(outer)));
        current = expansion;
        previous = Some(leg);
        built += 1;
    }

    let legs_text = built.to_string();
    log_event_with_fields(
        Event::ExpansionGenerated,
        &[("index", foreign.index_name()), ("legs", legs_text.as_str())],
    );
    out.outermost.push(current);
    out.legs += built;
    Ok(())
}

/// `pk <> null` on a directly joined index only asks whether the join key
/// is set, which the outer index can answer itself
fn join_key_shortcut(
    tree: &mut QueryTree,
    registry: &IndexMetadataRegistry,
    id: NodeId,
    legs: &[Arc<IndexLink>],
    context: &Arc<IndexLink>,
) -> bool {
    let [leg] = legs else {
        return false;
    };
    let Some(predicate) = tree.predicate(id) else {
        return false;
    };
    let on_key = predicate.is_not_null()
        && predicate.field == leg.right_field()
        && registry
            .metadata(leg.index_name())
            .is_ok_and(|m| m.primary_key() == leg.right_field());
    if !on_key {
        return false;
    }

    if let Some(predicate) = tree.predicate_mut(id) {
        predicate.field = leg.left_field().to_string();
    }
    tree.set_link(id, Some(registry.canonical(context)));
    true
}

/// Folds sibling expansions over the same link into one.
///
/// Under OR this always holds. Under AND it holds only when the link joins
/// on the target's primary key, since then each outer row meets at most one
/// inner row.
pub(super) fn merge_siblings(
    tree: &mut QueryTree,
    registry: &IndexMetadataRegistry,
    generated: &mut Generated,
) {
    // popped in postorder; groups built by a merge are pushed back so the
    // inner expansions they collect get merged as well
    let mut pending = tree.postorder(tree.root());
    pending.reverse();
    while let Some(id) = pending.pop() {
        pending.extend(merge_children(tree, registry, generated, id));
    }
}

/// Merges same-link expansions among `id`'s children; returns the new groups
fn merge_children(
    tree: &mut QueryTree,
    registry: &IndexMetadataRegistry,
    generated: &mut Generated,
    id: NodeId,
) -> Vec<NodeId> {
    let is_and = match tree.kind(id) {
        NodeKind::And => true,
        NodeKind::Or => false,
        _ => return Vec::new(),
    };

    let mut groups = Vec::new();
    let children = tree.child_ids(id);
    for (i, &keep) in children.iter().enumerate() {
        if tree.parent(keep) != Some(id) {
            continue;
        }
        let Some((link, flag)) = expansion_of(tree, keep) else {
            continue;
        };
        if is_and && !joins_on_primary_key(registry, &link) {
            continue;
        }

        let mut group = None;
        for &other in &children[i + 1..] {
            if tree.parent(other) != Some(id) {
                continue;
            }
            if expansion_of(tree, other) != Some((Arc::clone(&link), flag)) {
                continue;
            }

            let target = match group {
                Some(target) => target,
                None => {
                    let target = tree.add(if is_and { NodeKind::And } else { NodeKind::Or });
                    for child in tree.child_ids(keep) {
                        tree.append_child(target, child);
                    }
                    tree.append_child(keep, target);
                    groups.push(target);
                    group = Some(target);
                    target
                }
            };
            for child in tree.child_ids(other) {
                tree.append_child(target, child);
            }
            tree.detach(other);
            generated.outermost.retain(|g| *g != other);
        }
    }
    groups
}

fn expansion_of(tree: &QueryTree, id: NodeId) -> Option<(Arc<IndexLink>, bool)> {
    match tree.kind(id) {
        NodeKind::Expansion { link, generated } => Some((Arc::clone(link), *generated)),
        _ => None,
    }
}

fn joins_on_primary_key(registry: &IndexMetadataRegistry, link: &IndexLink) -> bool {
    registry
        .metadata(link.index_name())
        .is_ok_and(|m| m.primary_key() == link.right_field())
}

/// Inverts outermost generated expansions whose inner query matches more
/// than half of the joined index: `#join(q)` becomes `NOT #join(NOT q)`.
/// Returns the inverted expansions.
pub(super) fn invert(
    tree: &mut QueryTree,
    registry: &IndexMetadataRegistry,
    config: &CompilerConfig,
    estimator: &CountEstimator,
    generated: &Generated,
) -> OptimizerResult<Vec<NodeId>> {
    let mut inverted = Vec::new();
    if !config.invert_joins {
        return Ok(inverted);
    }

    let emitter = Emitter::new(registry, config);
    for &id in &generated.outermost {
        let Some((link, true)) = expansion_of(tree, id) else {
            continue;
        };
        if tree.parent(id).is_none() || registry.metadata(link.index_name())?.always_resolve_joins() {
            continue;
        }
        let [inner] = tree.children(id) else {
            continue;
        };
        let inner = *inner;

        let index = link.index_name();
        let total = estimator
            .total(index)
            .map_err(|e| OptimizerError::estimate_failed(index, e))?;
        if total == 0 {
            continue;
        }
        let query = emitter.emit_from(tree, inner, &link)?;
        let matching = estimator
            .matching(index, &query)
            .map_err(|e| OptimizerError::estimate_failed(index, e))?;

        if matching.saturating_mul(2) > total {
            tree.wrap(inner, NodeKind::Not);
            let outer = tree.link(id).cloned();
            let not = tree.wrap(id, NodeKind::Not);
            tree.set_link(not, outer);

            let (matching_text, total_text) = (matching.to_string(), total.to_string());
            log_event_with_fields(
                Event::JoinInverted,
                &[
                    ("index", index),
                    ("matching", matching_text.as_str()),
                    ("total", total_text.as_str()),
                ],
            );
            inverted.push(id);
        }
    }

    Ok(inverted)
}

/// Pairs every generated expansion with a copy of its inner query:
/// `#join(q)` becomes `(#join(q) OR q)`. For an inverted expansion the copy
/// is the positive inner query and the whole `NOT #join(NOT q)` is paired.
pub(super) fn pair_with_inner(tree: &mut QueryTree, inverted: &[NodeId]) -> usize {
    let mut paired = 0;

    for id in tree.postorder(tree.root()) {
        if !matches!(tree.kind(id), NodeKind::Expansion { generated: true, .. }) {
            continue;
        }
        let Some(&inner) = tree.children(id).first() else {
            continue;
        };

        let (target, source) = if inverted.contains(&id) {
            match (tree.parent(id), tree.children(inner).first()) {
                (Some(not), Some(&positive)) => (not, positive),
                _ => continue,
            }
        } else {
            (id, inner)
        };
        let Some(parent) = tree.parent(target) else {
            continue;
        };

        let copy = tree.deep_copy(source);
        let or = tree.add_linked(NodeKind::Or, tree.link(target).cloned());
        tree.replace(parent, target, or);
        tree.append_child(or, target);
        tree.append_child(or, copy);
        paired += 1;
    }

    paired
}
