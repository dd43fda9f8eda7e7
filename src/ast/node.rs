//! Query tree node types
//!
//! The node vocabulary is a closed enum; every rewrite and the emitter match
//! on it exhaustively.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::metadata::IndexLink;

/// Index of a node inside a `QueryTree` arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) usize);

impl NodeId {
    /// Raw arena slot
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Comparison operator of a predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Operator {
    #[default]
    Contains,
    Eq,
    Ne,
    Lt,
    Gt,
    Lte,
    Gte,
    Regex,
    Concept,
    FuzzyConcept,
}

impl Operator {
    /// Query-language symbol
    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Contains => ":",
            Operator::Eq => "=",
            Operator::Ne => "<>",
            Operator::Lt => "<",
            Operator::Gt => ">",
            Operator::Lte => "<=",
            Operator::Gte => ">=",
            Operator::Regex => ":~",
            Operator::Concept => ":@",
            Operator::FuzzyConcept => ":@~",
        }
    }

    /// EQ and CONTAINS both reduce to membership tests and share array buckets
    pub fn is_membership(&self) -> bool {
        matches!(self, Operator::Eq | Operator::Contains)
    }
}

/// Value side of a predicate
#[derive(Debug, Clone, PartialEq)]
pub enum PredicateValue {
    Word(String),
    Phrase(String),
    Prefix(String),
    Wildcard(String),
    Fuzzy { term: String, distance: u8 },
    Range { lower: Option<String>, upper: Option<String> },
    Null,
    /// `match_all` arrays require every value; otherwise any value matches
    Array { values: Vec<String>, match_all: bool },
}

/// A leaf test against one field
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: PredicateValue,
    pub boost: Option<f32>,
}

impl Predicate {
    /// Creates a predicate without boost
    pub fn new(field: impl Into<String>, operator: Operator, value: PredicateValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            boost: None,
        }
    }

    /// Sets the boost
    pub fn with_boost(mut self, boost: f32) -> Self {
        self.boost = Some(boost);
        self
    }

    /// True for a `field <> null` test
    pub fn is_not_null(&self) -> bool {
        self.operator == Operator::Ne && self.value == PredicateValue::Null
    }
}

/// Kind of a tree node
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    /// Synthetic root holding the query as its only child
    Root,
    And,
    Or,
    Not,
    /// Children must co-occur inside the same nested object
    With,
    Proximity { distance: u32, ordered: bool },
    /// Resolve the child against `link`'s index and join back
    Expansion { link: Arc<IndexLink>, generated: bool },
    Predicate(Predicate),
}

impl NodeKind {
    /// True for AND/OR/WITH groups
    pub fn is_group(&self) -> bool {
        matches!(self, NodeKind::And | NodeKind::Or | NodeKind::With)
    }
}

/// Arena slot
#[derive(Debug, Clone)]
pub struct Node {
    pub(crate) kind: NodeKind,
    pub(crate) link: Option<Arc<IndexLink>>,
    pub(crate) parent: Option<NodeId>,
    pub(crate) children: Vec<NodeId>,
}

impl Node {
    pub(crate) fn new(kind: NodeKind) -> Self {
        Self {
            kind,
            link: None,
            parent: None,
            children: Vec::new(),
        }
    }

    /// Node kind
    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    /// Link the node resolves through, once assigned
    pub fn link(&self) -> Option<&Arc<IndexLink>> {
        self.link.as_ref()
    }

    /// Parent, `None` for the root and for detached nodes
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Children in order
    pub fn children(&self) -> &[NodeId] {
        &self.children
    }

    /// The predicate, if this is a leaf
    pub fn predicate(&self) -> Option<&Predicate> {
        match &self.kind {
            NodeKind::Predicate(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Display for PredicateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PredicateValue::Word(w) => write!(f, "{:?}", w),
            PredicateValue::Phrase(p) => write!(f, "'{}'", p),
            PredicateValue::Prefix(p) => write!(f, "{}*", p),
            PredicateValue::Wildcard(w) => write!(f, "{}", w),
            PredicateValue::Fuzzy { term, distance } => write!(f, "{}~{}", term, distance),
            PredicateValue::Range { lower, upper } => write!(
                f,
                "[{} TO {}]",
                lower.as_deref().unwrap_or("*"),
                upper.as_deref().unwrap_or("*")
            ),
            PredicateValue::Null => write!(f, "null"),
            PredicateValue::Array { values, match_all } => {
                let prefix = if *match_all { "&" } else { "" };
                write!(f, "{}[", prefix)?;
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        write!(f, ",")?;
                    }
                    write!(f, "{:?}", v)?;
                }
                write!(f, "]")
            }
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.field, self.operator.symbol(), self.value)?;
        if let Some(boost) = self.boost {
            write!(f, "^{}", boost)?;
        }
        Ok(())
    }
}
