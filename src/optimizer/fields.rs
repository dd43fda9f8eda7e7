//! Logical field fan-out
//!
//! A field-list name stands for several physical fields, and the all-fields
//! sentinel stands for every field in each loaded index's default full-text
//! view. Both are replaced by an OR of copies, one per physical field, with
//! each copy already bound to the index that owns the field.
//!
//! A proximity chain fans out as a whole: its terms must stay on one field.

use std::sync::Arc;

use crate::ast::{NodeId, NodeKind, QueryTree};
use crate::metadata::{IndexLink, IndexMetadataRegistry};

type Targets = Vec<(Arc<IndexLink>, String)>;

/// Replaces field-list names; returns the number of nodes fanned out
pub(super) fn expand_field_lists(tree: &mut QueryTree, registry: &IndexMetadataRegistry) -> usize {
    fan_out_all(tree, |field| field_list_targets(registry, field))
}

/// Replaces the all-fields sentinel; returns the number of nodes fanned out
pub(super) fn expand_all_fields(
    tree: &mut QueryTree,
    registry: &IndexMetadataRegistry,
    all_field: &str,
) -> usize {
    let targets = all_view_targets(registry);
    if targets.is_empty() {
        return 0;
    }
    fan_out_all(tree, |field| (field == all_field).then(|| targets.clone()))
}

fn fan_out_all(tree: &mut QueryTree, lookup: impl Fn(&str) -> Option<Targets>) -> usize {
    let mut jobs = Vec::new();

    for id in tree.preorder(tree.root()) {
        let field = match tree.kind(id) {
            NodeKind::Predicate(predicate) => {
                let under_proximity = tree
                    .parent(id)
                    .is_some_and(|p| matches!(tree.kind(p), NodeKind::Proximity { .. }));
                if under_proximity {
                    continue;
                }
                predicate.field.clone()
            }
            NodeKind::Proximity { .. } => match tree.shared_field(id) {
                Some(field) => field,
                None => continue,
            },
            _ => continue,
        };

        if let Some(targets) = lookup(&field) {
            jobs.push((id, targets));
        }
    }

    let count = jobs.len();
    for (id, targets) in jobs {
        fan_out(tree, id, &targets);
    }
    count
}

fn fan_out(tree: &mut QueryTree, id: NodeId, targets: &[(Arc<IndexLink>, String)]) {
    let Some(parent) = tree.parent(id) else {
        return;
    };

    let or = tree.add(NodeKind::Or);
    for (link, field) in targets {
        let copy = tree.deep_copy(id);
        for node in tree.preorder(copy) {
            if let Some(predicate) = tree.predicate_mut(node) {
                predicate.field = field.clone();
                tree.set_link(node, Some(Arc::clone(link)));
            }
        }
        tree.append_child(or, copy);
    }
    tree.replace(parent, id, or);
}

fn field_list_targets(registry: &IndexMetadataRegistry, field: &str) -> Option<Targets> {
    registry.index_links().into_iter().find_map(|link| {
        let meta = registry.metadata(link.index_name()).ok()?;
        let physical = meta.field_list(field)?;
        Some(
            physical
                .iter()
                .map(|name| (Arc::clone(&link), name.clone()))
                .collect(),
        )
    })
}

fn all_view_targets(registry: &IndexMetadataRegistry) -> Targets {
    let mut targets = Vec::new();
    for link in registry.index_links() {
        if let Ok(meta) = registry.metadata(link.index_name()) {
            for field in meta.all_view_fields() {
                targets.push((Arc::clone(&link), field.to_string()));
            }
        }
    }
    targets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::QueryExpr;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::from_fixture_value(json!({
            "indexes": {
                "posts": {
                    "mapping": {
                        "primary_key": "id",
                        "links": ["user_id=<users>id"],
                        "field_lists": { "names": ["title", "subtitle"] },
                        "properties": {
                            "title": { "type": "text" },
                            "subtitle": { "type": "text" },
                            "user_id": { "type": "long" }
                        }
                    }
                },
                "users": {
                    "mapping": {
                        "primary_key": "id",
                        "properties": {
                            "bio": { "type": "text" },
                            "age": { "type": "integer" }
                        }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn tree(expr: serde_json::Value) -> QueryTree {
        let expr: QueryExpr = serde_json::from_value(expr).unwrap();
        QueryTree::from_expr(&expr).unwrap()
    }

    #[test]
    fn test_field_list_fans_out() {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let mut tree = tree(json!({ "word": { "field": "names", "value": "rust" } }));

        assert_eq!(expand_field_lists(&mut tree, &registry), 1);
        assert_eq!(tree.to_string(), r#"(title:"rust" OR subtitle:"rust")"#);
    }

    #[test]
    fn test_all_fields_binds_owning_index() {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let mut tree = tree(json!({ "word": { "field": "_all", "value": "rust" } }));

        assert_eq!(expand_all_fields(&mut tree, &registry, "_all"), 1);
        assert_eq!(
            tree.to_string(),
            r#"(subtitle:"rust" OR title:"rust" OR bio:"rust")"#
        );

        let or = tree.query().unwrap();
        let owners: Vec<&str> = tree
            .children(or)
            .iter()
            .map(|c| tree.link(*c).unwrap().index_name())
            .collect();
        assert_eq!(owners, vec!["posts", "posts", "users"]);
    }

    #[test]
    fn test_proximity_fans_out_whole_chain() {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let mut tree = tree(json!({ "proximity": {
            "distance": 2,
            "terms": [
                { "word": { "field": "names", "value": "rust" } },
                { "word": { "field": "names", "value": "book" } }
            ]
        }}));

        assert_eq!(expand_field_lists(&mut tree, &registry), 1);
        assert_eq!(
            tree.to_string(),
            r#"((title:"rust" W/2 title:"book") OR (subtitle:"rust" W/2 subtitle:"book"))"#
        );
    }

    #[test]
    fn test_plain_fields_untouched() {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let mut tree = tree(json!({ "word": { "field": "title", "value": "rust" } }));
        let before = tree.to_string();

        assert_eq!(expand_field_lists(&mut tree, &registry), 0);
        assert_eq!(expand_all_fields(&mut tree, &registry, "_all"), 0);
        assert_eq!(tree.to_string(), before);
    }
}
