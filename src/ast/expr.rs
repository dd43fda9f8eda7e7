//! Wire form of a parsed query
//!
//! The query language parser is external; it hands over this serde tree.
//! `QueryTree::from_expr` validates its shape and builds the arena.
//!
//! ```text
//! {"and": [
//!   {"word":  {"field": "title", "value": "rust"}},
//!   {"expand": {"link": "user_id=<users>id",
//!               "query": {"word": {"field": "name", "op": "eq", "value": "ann"}}}}
//! ]}
//! ```

use serde::{Deserialize, Serialize};

use crate::metadata::IndexLink;

use super::errors::{AstError, AstResult};
use super::node::{NodeId, NodeKind, Operator, Predicate, PredicateValue};
use super::tree::QueryTree;

fn default_fuzzy_distance() -> u8 {
    2
}

/// One node of the wire tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryExpr {
    And(Vec<QueryExpr>),
    Or(Vec<QueryExpr>),
    Not(Box<QueryExpr>),
    With(Vec<QueryExpr>),
    Proximity {
        distance: u32,
        #[serde(default)]
        ordered: bool,
        terms: Vec<QueryExpr>,
    },
    Expand {
        link: String,
        query: Box<QueryExpr>,
    },
    Word {
        field: String,
        #[serde(default)]
        op: Operator,
        value: String,
        #[serde(default)]
        boost: Option<f32>,
    },
    Phrase {
        field: String,
        #[serde(default)]
        op: Operator,
        value: String,
        #[serde(default)]
        boost: Option<f32>,
    },
    Prefix {
        field: String,
        value: String,
        #[serde(default)]
        boost: Option<f32>,
    },
    Wildcard {
        field: String,
        value: String,
        #[serde(default)]
        boost: Option<f32>,
    },
    Fuzzy {
        field: String,
        value: String,
        #[serde(default = "default_fuzzy_distance")]
        distance: u8,
        #[serde(default)]
        boost: Option<f32>,
    },
    Range {
        field: String,
        #[serde(default)]
        lower: Option<String>,
        #[serde(default)]
        upper: Option<String>,
        #[serde(default)]
        boost: Option<f32>,
    },
    Null {
        field: String,
        #[serde(default = "default_null_op")]
        op: Operator,
    },
    Array {
        field: String,
        #[serde(default)]
        op: Operator,
        values: Vec<String>,
        #[serde(default)]
        match_all: bool,
        #[serde(default)]
        boost: Option<f32>,
    },
}

fn default_null_op() -> Operator {
    Operator::Eq
}

impl QueryExpr {
    /// Parses the JSON wire form
    pub fn from_json(text: &str) -> AstResult<Self> {
        serde_json::from_str(text).map_err(|e| AstError::invalid(e.to_string()))
    }
}

impl QueryTree {
    /// Validates `expr` and builds a tree from it
    pub fn from_expr(expr: &QueryExpr) -> AstResult<Self> {
        let mut tree = QueryTree::new();
        let query = tree.build(expr)?;
        let root = tree.root();
        tree.append_child(root, query);
        Ok(tree)
    }

    fn build(&mut self, expr: &QueryExpr) -> AstResult<NodeId> {
        match expr {
            QueryExpr::And(items) => self.build_group(NodeKind::And, "and", items),
            QueryExpr::Or(items) => self.build_group(NodeKind::Or, "or", items),
            QueryExpr::With(items) => self.build_group(NodeKind::With, "with", items),
            QueryExpr::Not(inner) => {
                let not = self.add(NodeKind::Not);
                let child = self.build(inner)?;
                self.append_child(not, child);
                Ok(not)
            }
            QueryExpr::Proximity {
                distance,
                ordered,
                terms,
            } => {
                if terms.len() < 2 {
                    return Err(AstError::invalid("proximity needs at least two terms"));
                }
                for term in terms {
                    if !matches!(
                        term,
                        QueryExpr::Word { .. }
                            | QueryExpr::Phrase { .. }
                            | QueryExpr::Prefix { .. }
                            | QueryExpr::Wildcard { .. }
                            | QueryExpr::Fuzzy { .. }
                    ) {
                        return Err(AstError::invalid(
                            "proximity terms must be words, phrases, prefixes, wildcards or fuzzy terms",
                        ));
                    }
                }
                self.build_group(
                    NodeKind::Proximity {
                        distance: *distance,
                        ordered: *ordered,
                    },
                    "proximity",
                    terms,
                )
            }
            QueryExpr::Expand { link, query } => {
                if link.trim().is_empty() {
                    return Err(AstError::invalid("expand requires a link"));
                }
                let link = IndexLink::parse(link).map_err(AstError::from)?;
                let expansion = self.add(NodeKind::Expansion {
                    link: std::sync::Arc::new(link),
                    generated: false,
                });
                let child = self.build(query)?;
                self.append_child(expansion, child);
                Ok(expansion)
            }
            QueryExpr::Word {
                field,
                op,
                value,
                boost,
            } => self.leaf(field, *op, PredicateValue::Word(value.clone()), *boost),
            QueryExpr::Phrase {
                field,
                op,
                value,
                boost,
            } => {
                if value.split_whitespace().next().is_none() {
                    return Err(AstError::invalid(format!("empty phrase on '{}'", field)));
                }
                self.leaf(field, *op, PredicateValue::Phrase(value.clone()), *boost)
            }
            QueryExpr::Prefix {
                field,
                value,
                boost,
            } => self.leaf(field, Operator::Contains, PredicateValue::Prefix(value.clone()), *boost),
            QueryExpr::Wildcard {
                field,
                value,
                boost,
            } => self.leaf(
                field,
                Operator::Contains,
                PredicateValue::Wildcard(value.clone()),
                *boost,
            ),
            QueryExpr::Fuzzy {
                field,
                value,
                distance,
                boost,
            } => self.leaf(
                field,
                Operator::Contains,
                PredicateValue::Fuzzy {
                    term: value.clone(),
                    distance: *distance,
                },
                *boost,
            ),
            QueryExpr::Range {
                field,
                lower,
                upper,
                boost,
            } => {
                if lower.is_none() && upper.is_none() {
                    return Err(AstError::invalid(format!("range on '{}' has no bounds", field)));
                }
                self.leaf(
                    field,
                    Operator::Contains,
                    PredicateValue::Range {
                        lower: lower.clone(),
                        upper: upper.clone(),
                    },
                    *boost,
                )
            }
            QueryExpr::Null { field, op } => {
                if !matches!(op, Operator::Eq | Operator::Ne) {
                    return Err(AstError::invalid(format!(
                        "null test on '{}' must use '=' or '<>'",
                        field
                    )));
                }
                self.leaf(field, *op, PredicateValue::Null, None)
            }
            QueryExpr::Array {
                field,
                op,
                values,
                match_all,
                boost,
            } => {
                if values.is_empty() {
                    return Err(AstError::invalid(format!("empty array on '{}'", field)));
                }
                self.leaf(
                    field,
                    *op,
                    PredicateValue::Array {
                        values: values.clone(),
                        match_all: *match_all,
                    },
                    *boost,
                )
            }
        }
    }

    fn build_group(&mut self, kind: NodeKind, name: &str, items: &[QueryExpr]) -> AstResult<NodeId> {
        if items.is_empty() {
            return Err(AstError::invalid(format!("empty '{}' group", name)));
        }
        let group = self.add(kind);
        for item in items {
            let child = self.build(item)?;
            self.append_child(group, child);
        }
        Ok(group)
    }

    fn leaf(
        &mut self,
        field: &str,
        operator: Operator,
        value: PredicateValue,
        boost: Option<f32>,
    ) -> AstResult<NodeId> {
        if field.trim().is_empty() {
            return Err(AstError::invalid("predicate without a field"));
        }
        let mut predicate = Predicate::new(field, operator, value);
        predicate.boost = boost;
        Ok(self.add(NodeKind::Predicate(predicate)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::AstErrorCode;
    use serde_json::json;

    fn parse(value: serde_json::Value) -> AstResult<QueryTree> {
        let expr: QueryExpr = serde_json::from_value(value).unwrap();
        QueryTree::from_expr(&expr)
    }

    #[test]
    fn test_builds_tree() {
        let tree = parse(json!({"and": [
            {"word": {"field": "title", "value": "rust"}},
            {"not": {"null": {"field": "user_id"}}},
            {"expand": {"link": "user_id=<users>id",
                        "query": {"word": {"field": "name", "op": "eq", "value": "ann"}}}}
        ]}))
        .unwrap();

        assert_eq!(
            tree.to_string(),
            r#"(title:"rust" AND NOT (user_id=null) AND #expand<user_id=<users>id>(name="ann"))"#
        );
    }

    #[test]
    fn test_empty_group_rejected() {
        let err = parse(json!({"or": []})).unwrap_err();
        assert_eq!(err.code(), AstErrorCode::AeroQueryInvalid);
    }

    #[test]
    fn test_bad_link_rejected() {
        let err = parse(json!({"expand": {"link": "users", "query": {"word": {"field": "a", "value": "b"}}}}))
            .unwrap_err();
        assert_eq!(err.code(), AstErrorCode::AeroLinkInvalid);
    }

    #[test]
    fn test_proximity_shape_checked() {
        assert!(parse(json!({"proximity": {"distance": 2, "terms": [
            {"word": {"field": "title", "value": "a"}}
        ]}}))
        .is_err());

        assert!(parse(json!({"proximity": {"distance": 2, "terms": [
            {"word": {"field": "title", "value": "a"}},
            {"and": [{"word": {"field": "title", "value": "b"}}]}
        ]}}))
        .is_err());

        let tree = parse(json!({"proximity": {"distance": 2, "ordered": true, "terms": [
            {"word": {"field": "title", "value": "a"}},
            {"prefix": {"field": "title", "value": "b"}}
        ]}}))
        .unwrap();
        assert_eq!(tree.to_string(), r#"(title:"a" PW/2 title:b*)"#);
    }

    #[test]
    fn test_range_requires_bound() {
        assert!(parse(json!({"range": {"field": "age"}})).is_err());
        assert!(parse(json!({"range": {"field": "age", "lower": "3"}})).is_ok());
    }

    #[test]
    fn test_from_json_reports_shape_errors() {
        let err = QueryExpr::from_json(r#"{"bogus": 1}"#).unwrap_err();
        assert_eq!(err.code(), AstErrorCode::AeroQueryInvalid);
    }
}
