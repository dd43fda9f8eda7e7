//! Arena query tree
//!
//! Nodes live in a `Vec` and refer to each other by `NodeId`. Every node
//! except the synthetic root has exactly one parent once attached; all
//! structural edits go through methods here so the parent slot and the
//! parent's child list always change together.
//!
//! Rewrites that walk the tree while editing it take a snapshot of the child
//! list first (`child_ids`). Detached nodes stay in the arena unreferenced.

use std::fmt;
use std::sync::Arc;

use crate::metadata::IndexLink;

use super::node::{Node, NodeId, NodeKind, Predicate};

/// A query tree
#[derive(Debug, Clone)]
pub struct QueryTree {
    nodes: Vec<Node>,
    root: NodeId,
}

impl Default for QueryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl QueryTree {
    /// An empty tree holding only the root
    pub fn new() -> Self {
        Self {
            nodes: vec![Node::new(NodeKind::Root)],
            root: NodeId(0),
        }
    }

    /// Builds a tree whose query is `kind`; returns the tree and the query node
    pub fn with_query(kind: NodeKind) -> (Self, NodeId) {
        let mut tree = Self::new();
        let query = tree.add(kind);
        let root = tree.root;
        tree.append_child(root, query);
        (tree, query)
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    /// The query below the root, if any
    pub fn query(&self) -> Option<NodeId> {
        self.nodes[self.root.0].children.first().copied()
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn kind(&self, id: NodeId) -> &NodeKind {
        &self.nodes[id.0].kind
    }

    pub fn kind_mut(&mut self, id: NodeId) -> &mut NodeKind {
        &mut self.nodes[id.0].kind
    }

    pub fn predicate(&self, id: NodeId) -> Option<&Predicate> {
        self.nodes[id.0].predicate()
    }

    pub fn predicate_mut(&mut self, id: NodeId) -> Option<&mut Predicate> {
        match &mut self.nodes[id.0].kind {
            NodeKind::Predicate(p) => Some(p),
            _ => None,
        }
    }

    pub fn link(&self, id: NodeId) -> Option<&Arc<IndexLink>> {
        self.nodes[id.0].link.as_ref()
    }

    pub fn set_link(&mut self, id: NodeId, link: Option<Arc<IndexLink>>) {
        self.nodes[id.0].link = link;
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes[id.0].parent
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        &self.nodes[id.0].children
    }

    /// Snapshot of the child list, safe to hold across edits
    pub fn child_ids(&self, id: NodeId) -> Vec<NodeId> {
        self.nodes[id.0].children.clone()
    }

    /// Adds a detached node
    pub fn add(&mut self, kind: NodeKind) -> NodeId {
        self.nodes.push(Node::new(kind));
        NodeId(self.nodes.len() - 1)
    }

    /// Adds a detached node carrying `link`
    pub fn add_linked(&mut self, kind: NodeKind, link: Option<Arc<IndexLink>>) -> NodeId {
        let id = self.add(kind);
        self.nodes[id.0].link = link;
        id
    }

    /// Moves `child` (from wherever it is) to the end of `parent`'s children
    pub fn append_child(&mut self, parent: NodeId, child: NodeId) {
        self.detach(child);
        self.nodes[parent.0].children.push(child);
        self.nodes[child.0].parent = Some(parent);
    }

    /// Same as `append_child`
    pub fn reparent(&mut self, child: NodeId, new_parent: NodeId) {
        self.append_child(new_parent, child);
    }

    /// Unlinks `child` from its parent; a no-op for detached nodes
    pub fn detach(&mut self, child: NodeId) {
        if let Some(parent) = self.nodes[child.0].parent.take() {
            self.nodes[parent.0].children.retain(|c| *c != child);
        }
    }

    /// Puts `new` in `old`'s slot under `parent` and detaches `old`.
    ///
    /// `new` may currently be anywhere in the tree, including below `old`.
    /// If `old` is not a child of `parent`, `new` is appended instead.
    pub fn replace(&mut self, parent: NodeId, old: NodeId, new: NodeId) -> NodeId {
        if old == new {
            return new;
        }
        self.detach(new);

        match self.nodes[parent.0].children.iter().position(|c| *c == old) {
            Some(pos) => {
                self.nodes[parent.0].children[pos] = new;
                self.nodes[old.0].parent = None;
                self.nodes[new.0].parent = Some(parent);
            }
            None => self.append_child(parent, new),
        }
        new
    }

    /// Inserts a new `kind` node between `target` and its parent
    pub fn wrap(&mut self, target: NodeId, kind: NodeKind) -> NodeId {
        let wrapper = self.add(kind);
        if let Some(parent) = self.parent(target) {
            self.replace(parent, target, wrapper);
        }
        self.append_child(wrapper, target);
        wrapper
    }

    /// Replaces `id` in its parent by `id`'s own children, in order
    pub fn splice(&mut self, id: NodeId) {
        let Some(parent) = self.parent(id) else {
            return;
        };
        let Some(pos) = self.nodes[parent.0].children.iter().position(|c| *c == id) else {
            return;
        };

        let children = std::mem::take(&mut self.nodes[id.0].children);
        for child in &children {
            self.nodes[child.0].parent = Some(parent);
        }
        self.nodes[parent.0]
            .children
            .splice(pos..=pos, children.iter().copied());
        self.nodes[id.0].parent = None;
    }

    /// Copies the subtree under `id`; the copy is detached
    pub fn deep_copy(&mut self, id: NodeId) -> NodeId {
        let kind = self.nodes[id.0].kind.clone();
        let link = self.nodes[id.0].link.clone();
        let copy = self.add_linked(kind, link);
        for child in self.child_ids(id) {
            let child_copy = self.deep_copy(child);
            self.append_child(copy, child_copy);
        }
        copy
    }

    /// Nodes below and including `from`, children before parents
    pub fn postorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.collect_postorder(from, &mut out);
        out
    }

    fn collect_postorder(&self, id: NodeId, out: &mut Vec<NodeId>) {
        for child in &self.nodes[id.0].children {
            self.collect_postorder(*child, out);
        }
        out.push(id);
    }

    /// Nodes below and including `from`, parents before children
    pub fn preorder(&self, from: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![from];
        while let Some(id) = stack.pop() {
            out.push(id);
            stack.extend(self.nodes[id.0].children.iter().rev());
        }
        out
    }

    /// Nodes reachable from the root, root included
    pub fn node_count(&self) -> usize {
        self.preorder(self.root).len()
    }

    /// True if `ancestor` is `id` or lies on its parent chain
    pub fn is_within(&self, id: NodeId, ancestor: NodeId) -> bool {
        let mut cursor = Some(id);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// The field every child of `id` tests, if they are all predicates on one field
    pub fn shared_field(&self, id: NodeId) -> Option<String> {
        let mut fields = self.children(id).iter().map(|c| self.predicate(*c).map(|p| &p.field));
        let first = fields.next()??;
        fields
            .all(|f| f == Some(first))
            .then(|| first.clone())
    }

    /// Renders the subtree under `id`
    pub fn render(&self, id: NodeId) -> String {
        let mut out = String::new();
        // writing into a String cannot fail
        let _ = self.write_node(id, &mut out);
        out
    }

    fn write_node(&self, id: NodeId, f: &mut impl fmt::Write) -> fmt::Result {
        let node = &self.nodes[id.0];
        match &node.kind {
            NodeKind::Root => {
                for child in &node.children {
                    self.write_node(*child, f)?;
                }
                Ok(())
            }
            NodeKind::And => self.write_group(&node.children, " AND ", f),
            NodeKind::Or => self.write_group(&node.children, " OR ", f),
            NodeKind::With => self.write_group(&node.children, " WITH ", f),
            NodeKind::Proximity { distance, ordered } => {
                let op = if *ordered {
                    format!(" PW/{} ", distance)
                } else {
                    format!(" W/{} ", distance)
                };
                self.write_group(&node.children, &op, f)
            }
            NodeKind::Not => {
                write!(f, "NOT ")?;
                self.write_group(&node.children, " ", f)
            }
            NodeKind::Expansion { link, generated } => {
                let marker = if *generated { "#join" } else { "#expand" };
                write!(f, "{}<{}>", marker, link)?;
                self.write_group(&node.children, " ", f)
            }
            NodeKind::Predicate(predicate) => write!(f, "{}", predicate),
        }
    }

    fn write_group(&self, children: &[NodeId], separator: &str, f: &mut impl fmt::Write) -> fmt::Result {
        write!(f, "(")?;
        for (i, child) in children.iter().enumerate() {
            if i > 0 {
                write!(f, "{}", separator)?;
            }
            self.write_node(*child, f)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for QueryTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_node(self.root, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::{Operator, PredicateValue};

    fn word(tree: &mut QueryTree, field: &str, value: &str) -> NodeId {
        tree.add(NodeKind::Predicate(Predicate::new(
            field,
            Operator::Contains,
            PredicateValue::Word(value.into()),
        )))
    }

    fn and_of_two() -> (QueryTree, NodeId, NodeId, NodeId) {
        let (mut tree, and) = QueryTree::with_query(NodeKind::And);
        let a = word(&mut tree, "title", "a");
        let b = word(&mut tree, "title", "b");
        tree.append_child(and, a);
        tree.append_child(and, b);
        (tree, and, a, b)
    }

    #[test]
    fn test_render() {
        let (tree, _, _, _) = and_of_two();
        assert_eq!(tree.to_string(), r#"(title:"a" AND title:"b")"#);
        assert_eq!(tree.node_count(), 4);
    }

    #[test]
    fn test_replace_updates_both_sides() {
        let (mut tree, and, a, _) = and_of_two();
        let c = word(&mut tree, "title", "c");
        tree.replace(and, a, c);

        assert_eq!(tree.parent(c), Some(and));
        assert_eq!(tree.parent(a), None);
        assert_eq!(tree.children(and)[0], c);
    }

    #[test]
    fn test_replace_with_own_descendant() {
        let (mut tree, and, a, _) = and_of_two();
        let root = tree.root();
        tree.replace(root, and, a);
        assert_eq!(tree.query(), Some(a));
        assert_eq!(tree.parent(a), Some(root));
        assert_eq!(tree.to_string(), r#"title:"a""#);
    }

    #[test]
    fn test_wrap_and_splice() {
        let (mut tree, and, a, _) = and_of_two();
        let not = tree.wrap(a, NodeKind::Not);
        assert_eq!(tree.children(and)[0], not);
        assert_eq!(tree.parent(a), Some(not));
        assert_eq!(tree.to_string(), r#"(NOT (title:"a") AND title:"b")"#);

        let or = tree.wrap(and, NodeKind::Or);
        tree.splice(and);
        assert_eq!(tree.children(or).len(), 2);
        assert_eq!(tree.parent(not), Some(or));
    }

    #[test]
    fn test_deep_copy_is_detached_and_equal() {
        let (mut tree, and, _, _) = and_of_two();
        let copy = tree.deep_copy(and);
        assert_eq!(tree.parent(copy), None);
        assert_eq!(tree.render(copy), tree.render(and));
        assert_ne!(tree.children(copy)[0], tree.children(and)[0]);
    }

    #[test]
    fn test_reparent_moves_between_parents() {
        let (mut tree, and, a, b) = and_of_two();
        let or = tree.add(NodeKind::Or);
        tree.append_child(and, or);
        let boosted = tree.add(NodeKind::Predicate(
            Predicate::new("tag", Operator::Eq, PredicateValue::Word("x".into())).with_boost(2.0),
        ));
        tree.append_child(and, boosted);

        tree.reparent(b, or);
        tree.reparent(boosted, or);

        assert_eq!(tree.children(and), &[a, or]);
        assert_eq!(tree.children(or), &[b, boosted]);
        assert_eq!(tree.parent(b), Some(or));
        assert_eq!(tree.predicate(boosted).and_then(|p| p.boost), Some(2.0));
    }

    #[test]
    fn test_traversal_orders() {
        let (tree, and, a, b) = and_of_two();
        assert_eq!(tree.postorder(and), vec![a, b, and]);
        assert_eq!(tree.preorder(and), vec![and, a, b]);
        assert!(tree.is_within(a, and));
        assert!(!tree.is_within(and, a));
    }
}
