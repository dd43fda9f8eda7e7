//! Tree to target-query lowering
//!
//! The emitter walks the optimized tree top-down with a scope holding the
//! link whose index is being queried and, inside a WITH group, the nested
//! path already opened. Predicates carry the link the optimizer assigned;
//! anything unassigned falls back to the scope link.

use std::sync::Arc;

use regex::Regex;
use serde_json::{Number, Value};

use crate::ast::{NodeId, NodeKind, Operator, Predicate, PredicateValue, QueryTree};
use crate::compiler::CompilerConfig;
use crate::metadata::{FieldProperties, FieldType, IndexLink, IndexMetadataRegistry};
use crate::visibility::{SnapshotDescriptor, VisibilityEngine};

use super::errors::{EmitError, EmitResult};
use super::target::TargetQuery;

#[derive(Clone)]
struct Scope {
    link: Arc<IndexLink>,
    with_path: Option<String>,
}

/// Lowers a query tree into a `TargetQuery`
pub struct Emitter<'r, 's> {
    registry: &'r IndexMetadataRegistry<'s>,
    config: &'r CompilerConfig,
    snapshot: Option<&'r SnapshotDescriptor>,
}

impl<'r, 's> Emitter<'r, 's> {
    pub fn new(registry: &'r IndexMetadataRegistry<'s>, config: &'r CompilerConfig) -> Self {
        Self {
            registry,
            config,
            snapshot: None,
        }
    }

    /// Every cross-index join subtracts the snapshot's invisible tuples of
    /// the joined index
    pub fn with_snapshot(mut self, snapshot: &'r SnapshotDescriptor) -> Self {
        self.snapshot = Some(snapshot);
        self
    }

    /// Emits the whole tree against the home index
    pub fn emit(&self, tree: &QueryTree) -> EmitResult<TargetQuery> {
        match tree.query() {
            Some(query) => self.emit_from(tree, query, self.registry.home()),
            None => Ok(TargetQuery::MatchAll),
        }
    }

    /// Emits the subtree under `id` against `link`'s index
    pub fn emit_from(
        &self,
        tree: &QueryTree,
        id: NodeId,
        link: &Arc<IndexLink>,
    ) -> EmitResult<TargetQuery> {
        let scope = Scope {
            link: Arc::clone(link),
            with_path: None,
        };
        self.emit_node(tree, id, &scope)
    }

    fn emit_node(&self, tree: &QueryTree, id: NodeId, scope: &Scope) -> EmitResult<TargetQuery> {
        match tree.kind(id) {
            NodeKind::Root => match tree.children(id).first() {
                Some(child) => self.emit_node(tree, *child, scope),
                None => Ok(TargetQuery::MatchAll),
            },
            NodeKind::And => Ok(TargetQuery::and(self.emit_children(tree, id, scope)?)),
            NodeKind::Or => {
                if tree.children(id).is_empty() {
                    return Ok(TargetQuery::MatchNone);
                }
                Ok(TargetQuery::or(self.emit_children(tree, id, scope)?))
            }
            NodeKind::Not => {
                let mut clauses = self.emit_children(tree, id, scope)?;
                match clauses.len() {
                    0 => Err(EmitError::invalid("NOT", "negation without an operand")),
                    1 => Ok(TargetQuery::not(clauses.remove(0))),
                    _ => Ok(TargetQuery::not(TargetQuery::and(clauses))),
                }
            }
            NodeKind::With => self.emit_with(tree, id, scope),
            NodeKind::Proximity { distance, ordered } => {
                self.emit_proximity(tree, id, *distance, *ordered, scope)
            }
            NodeKind::Expansion { link, .. } => self.emit_expansion(tree, id, link, scope),
            NodeKind::Predicate(predicate) => {
                let link = tree.link(id).unwrap_or(&scope.link);
                self.emit_predicate(predicate, link, scope)
            }
        }
    }

    fn emit_children(
        &self,
        tree: &QueryTree,
        id: NodeId,
        scope: &Scope,
    ) -> EmitResult<Vec<TargetQuery>> {
        tree.children(id)
            .iter()
            .map(|child| self.emit_node(tree, *child, scope))
            .collect()
    }

    fn emit_with(&self, tree: &QueryTree, id: NodeId, scope: &Scope) -> EmitResult<TargetQuery> {
        let Some(path) = self.with_path(tree, id, scope)? else {
            return Ok(TargetQuery::and(self.emit_children(tree, id, scope)?));
        };

        let inner = Scope {
            link: Arc::clone(&scope.link),
            with_path: Some(path.clone()),
        };
        let query = TargetQuery::and(self.emit_children(tree, id, &inner)?);

        if scope.with_path.as_deref() == Some(path.as_str()) {
            Ok(query)
        } else {
            Ok(TargetQuery::Nested {
                path,
                query: Box::new(query),
            })
        }
    }

    /// The single nested path shared by every predicate under a WITH group
    fn with_path(&self, tree: &QueryTree, id: NodeId, scope: &Scope) -> EmitResult<Option<String>> {
        let mut expected: Option<(String, Option<String>)> = None;

        for node in tree.preorder(id) {
            if matches!(tree.kind(node), NodeKind::Expansion { .. }) {
                return Err(EmitError::invalid("WITH", "joins cannot appear inside WITH"));
            }
            let Some(predicate) = tree.predicate(node) else {
                continue;
            };
            let link = tree.link(node).unwrap_or(&scope.link);
            let found = self
                .registry
                .field_properties(link, &predicate.field)
                .and_then(|p| p.nested_path.clone());

            match &expected {
                None => expected = Some((predicate.field.clone(), found)),
                Some((_, path)) if *path == found => {}
                Some((_, path)) => {
                    return Err(EmitError::nested_mismatch(
                        path.as_deref(),
                        found.as_deref(),
                        &predicate.field,
                    ))
                }
            }
        }

        Ok(expected.and_then(|(_, path)| path))
    }

    fn emit_proximity(
        &self,
        tree: &QueryTree,
        id: NodeId,
        distance: u32,
        ordered: bool,
        scope: &Scope,
    ) -> EmitResult<TargetQuery> {
        let mut first: Option<(&Predicate, &Arc<IndexLink>)> = None;
        let mut clauses = Vec::new();

        for child in tree.children(id) {
            let predicate = tree
                .predicate(*child)
                .ok_or_else(|| EmitError::invalid("proximity", "operands must be terms"))?;
            let link = tree.link(*child).unwrap_or(&scope.link);

            match first {
                None => first = Some((predicate, link)),
                Some((head, _)) if head.field != predicate.field => {
                    return Err(EmitError::mixed_proximity_fields(&head.field, &predicate.field))
                }
                Some(_) => {}
            }
            clauses.push(span_clause(predicate)?);
        }

        let Some((head, link)) = first else {
            return Err(EmitError::invalid("proximity", "no operands"));
        };
        let props = self.registry.field_properties(link, &head.field);
        let query = TargetQuery::SpanNear {
            clauses,
            slop: distance,
            in_order: ordered,
        };
        nest(query, props, scope, &head.field)
    }

    fn emit_expansion(
        &self,
        tree: &QueryTree,
        id: NodeId,
        link: &Arc<IndexLink>,
        scope: &Scope,
    ) -> EmitResult<TargetQuery> {
        let inner_scope = Scope {
            link: Arc::clone(link),
            with_path: None,
        };
        let mut clauses = self.emit_children(tree, id, &inner_scope)?;
        let mut inner = match clauses.len() {
            0 => TargetQuery::MatchAll,
            1 => clauses.remove(0),
            _ => TargetQuery::and(clauses),
        };

        if let Some(snapshot) = self.snapshot {
            inner = TargetQuery::excluding(
                inner,
                VisibilityEngine::exclusion_predicate(link.index_name(), snapshot),
            );
        }

        let join = TargetQuery::CrossJoin {
            index: link.index_name().to_string(),
            left_field: link.left_field().to_string(),
            right_field: link.right_field().to_string(),
            query: Box::new(inner),
            max_terms: self.config.join_term_limit(),
        };

        match &scope.with_path {
            Some(_) => Err(EmitError::invalid(link.left_field(), "joins cannot appear inside WITH")),
            None => Ok(join),
        }
    }

    fn emit_predicate(
        &self,
        predicate: &Predicate,
        link: &IndexLink,
        scope: &Scope,
    ) -> EmitResult<TargetQuery> {
        let props = self.registry.field_properties(link, &predicate.field);
        let mut query = self.predicate_query(predicate, props)?;
        if let Some(boost) = predicate.boost {
            query = TargetQuery::Boost {
                query: Box::new(query),
                boost,
            };
        }
        nest(query, props, scope, &predicate.field)
    }

    fn predicate_query(
        &self,
        predicate: &Predicate,
        props: Option<&FieldProperties>,
    ) -> EmitResult<TargetQuery> {
        let field = predicate.field.as_str();
        let field_type = props.map(|p| &p.field_type);
        let op = predicate.operator;

        let query = match &predicate.value {
            PredicateValue::Null => {
                let exists = TargetQuery::Exists {
                    field: field.to_string(),
                };
                return match op {
                    Operator::Eq => Ok(TargetQuery::not(exists)),
                    Operator::Ne => Ok(exists),
                    _ => Err(EmitError::invalid(field, "null only supports = and <>")),
                };
            }
            PredicateValue::Array { values, match_all } => {
                require_membership(field, op)?;
                let values = values
                    .iter()
                    .map(|v| coerce(field, field_type, v))
                    .collect::<EmitResult<Vec<_>>>()?;
                if *match_all {
                    TargetQuery::and(values.into_iter().map(|v| TargetQuery::term(field, v)).collect())
                } else if values.len() > self.config.bulk_terms_threshold {
                    TargetQuery::BulkTerms {
                        field: field.to_string(),
                        values,
                    }
                } else {
                    TargetQuery::Terms {
                        field: field.to_string(),
                        values,
                    }
                }
            }
            PredicateValue::Range { lower, upper } => {
                require_membership(field, op)?;
                TargetQuery::Range {
                    field: field.to_string(),
                    gt: None,
                    gte: lower.as_deref().map(|v| coerce(field, field_type, v)).transpose()?,
                    lt: None,
                    lte: upper.as_deref().map(|v| coerce(field, field_type, v)).transpose()?,
                }
            }
            PredicateValue::Word(word) => return word_query(field, field_type, op, word),
            PredicateValue::Phrase(text) => match op {
                Operator::Concept | Operator::FuzzyConcept => more_like_this(field, op, text),
                _ => {
                    require_membership(field, op)?;
                    phrase_query(field, text)?
                }
            },
            PredicateValue::Prefix(prefix) => {
                require_membership(field, op)?;
                TargetQuery::Prefix {
                    field: field.to_string(),
                    value: prefix.clone(),
                }
            }
            PredicateValue::Wildcard(pattern) => {
                require_membership(field, op)?;
                TargetQuery::Wildcard {
                    field: field.to_string(),
                    value: pattern.clone(),
                }
            }
            PredicateValue::Fuzzy { term, distance } => {
                require_membership(field, op)?;
                TargetQuery::Fuzzy {
                    field: field.to_string(),
                    value: term.clone(),
                    distance: *distance,
                }
            }
        };

        Ok(if op == Operator::Ne {
            TargetQuery::not(query)
        } else {
            query
        })
    }
}

fn word_query(
    field: &str,
    field_type: Option<&FieldType>,
    op: Operator,
    word: &str,
) -> EmitResult<TargetQuery> {
    let range = |gt, gte, lt, lte| TargetQuery::Range {
        field: field.to_string(),
        gt,
        gte,
        lt,
        lte,
    };

    Ok(match op {
        Operator::Contains | Operator::Eq => TargetQuery::term(field, coerce(field, field_type, word)?),
        Operator::Ne => TargetQuery::not(TargetQuery::term(field, coerce(field, field_type, word)?)),
        Operator::Lt => range(None, None, Some(coerce(field, field_type, word)?), None),
        Operator::Gt => range(Some(coerce(field, field_type, word)?), None, None, None),
        Operator::Lte => range(None, None, None, Some(coerce(field, field_type, word)?)),
        Operator::Gte => range(None, Some(coerce(field, field_type, word)?), None, None),
        Operator::Regex => {
            Regex::new(word).map_err(|e| EmitError::invalid(field, format!("bad pattern: {}", e)))?;
            TargetQuery::Regexp {
                field: field.to_string(),
                pattern: word.to_string(),
            }
        }
        Operator::Concept | Operator::FuzzyConcept => more_like_this(field, op, word),
    })
}

fn more_like_this(field: &str, op: Operator, text: &str) -> TargetQuery {
    TargetQuery::MoreLikeThis {
        fields: vec![field.to_string()],
        like: text.to_string(),
        fuzzy: op == Operator::FuzzyConcept,
    }
}

fn phrase_query(field: &str, text: &str) -> EmitResult<TargetQuery> {
    let tokens: Vec<&str> = text.split_whitespace().collect();
    match tokens.as_slice() {
        [] => Err(EmitError::invalid(field, "empty phrase")),
        [single] => Ok(TargetQuery::term(field, *single)),
        _ => Ok(TargetQuery::SpanNear {
            clauses: tokens
                .iter()
                .map(|t| TargetQuery::SpanTerm {
                    field: field.to_string(),
                    value: t.to_string(),
                })
                .collect(),
            slop: 0,
            in_order: true,
        }),
    }
}

fn require_membership(field: &str, op: Operator) -> EmitResult<()> {
    if op.is_membership() || op == Operator::Ne {
        Ok(())
    } else {
        Err(EmitError::invalid(
            field,
            format!("operator '{}' does not apply to this value", op.symbol()),
        ))
    }
}

/// One clause of a span chain
fn span_clause(predicate: &Predicate) -> EmitResult<TargetQuery> {
    let field = predicate.field.clone();
    if !predicate.operator.is_membership() {
        return Err(EmitError::invalid(&field, "proximity operands must be positive terms"));
    }

    let multi = |query: TargetQuery| TargetQuery::SpanMulti {
        query: Box::new(query),
    };

    match &predicate.value {
        PredicateValue::Word(word) => Ok(TargetQuery::SpanTerm {
            field,
            value: word.clone(),
        }),
        PredicateValue::Phrase(text) => match phrase_query(&field, text)? {
            TargetQuery::Term { value, .. } => Ok(TargetQuery::SpanTerm {
                field,
                value: value.as_str().unwrap_or_default().to_string(),
            }),
            near => Ok(near),
        },
        PredicateValue::Prefix(value) => Ok(multi(TargetQuery::Prefix {
            field,
            value: value.clone(),
        })),
        PredicateValue::Wildcard(value) => Ok(multi(TargetQuery::Wildcard {
            field,
            value: value.clone(),
        })),
        PredicateValue::Fuzzy { term, distance } => Ok(multi(TargetQuery::Fuzzy {
            field,
            value: term.clone(),
            distance: *distance,
        })),
        other => Err(EmitError::invalid(
            &predicate.field,
            format!("'{}' cannot be part of a proximity chain", other),
        )),
    }
}

/// Wraps `query` in its field's nested scope unless a WITH group already
/// opened it
fn nest(
    query: TargetQuery,
    props: Option<&FieldProperties>,
    scope: &Scope,
    field: &str,
) -> EmitResult<TargetQuery> {
    let Some(path) = props.and_then(|p| p.nested_path.as_deref()) else {
        return Ok(query);
    };

    match scope.with_path.as_deref() {
        None => Ok(TargetQuery::Nested {
            path: path.to_string(),
            query: Box::new(query),
        }),
        Some(open) if open == path => Ok(query),
        Some(open) => Err(EmitError::nested_mismatch(Some(open), Some(path), field)),
    }
}

/// Converts query text to the field's value type. Fields of unknown type
/// probe int, then long, then double, then fall back to text.
pub fn coerce(field: &str, field_type: Option<&FieldType>, text: &str) -> EmitResult<Value> {
    let integer = |expected: &str, min: i64, max: i64| {
        text.trim()
            .parse::<i64>()
            .ok()
            .filter(|v| (min..=max).contains(v))
            .map(Value::from)
            .ok_or_else(|| EmitError::invalid_value(field, text, expected))
    };

    match field_type {
        Some(FieldType::Byte) => integer("byte", i8::MIN as i64, i8::MAX as i64),
        Some(FieldType::Short) => integer("short", i16::MIN as i64, i16::MAX as i64),
        Some(FieldType::Integer) => integer("integer", i32::MIN as i64, i32::MAX as i64),
        Some(FieldType::Long) => integer("long", i64::MIN, i64::MAX),
        Some(FieldType::Float | FieldType::Double) => text
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| EmitError::invalid_value(field, text, "number")),
        Some(FieldType::Boolean) => match text.trim().to_ascii_lowercase().as_str() {
            "true" => Ok(Value::Bool(true)),
            "false" => Ok(Value::Bool(false)),
            _ => Err(EmitError::invalid_value(field, text, "boolean")),
        },
        Some(FieldType::Other(_)) | None => Ok(probe(text)),
        Some(_) => Ok(Value::String(text.to_string())),
    }
}

fn probe(text: &str) -> Value {
    if let Ok(v) = text.parse::<i32>() {
        return Value::from(v);
    }
    if let Ok(v) = text.parse::<i64>() {
        return Value::from(v);
    }
    text.parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::QueryExpr;
    use crate::emitter::EmitErrorCode;
    use crate::store::MemoryStore;
    use serde_json::json;

    fn store() -> MemoryStore {
        MemoryStore::from_fixture_value(json!({
            "indexes": {
                "posts": {
                    "mapping": {
                        "primary_key": "id",
                        "links": ["user_id=<users>id"],
                        "properties": {
                            "id": { "type": "long" },
                            "title": { "type": "text" },
                            "score": { "type": "integer" },
                            "rating": { "type": "double" },
                            "draft": { "type": "boolean" },
                            "comments": {
                                "type": "nested",
                                "properties": {
                                    "body": { "type": "text" },
                                    "author": { "type": "keyword" }
                                }
                            },
                            "tags": {
                                "type": "nested",
                                "properties": { "name": { "type": "keyword" } }
                            }
                        }
                    }
                },
                "users": {
                    "mapping": {
                        "primary_key": "id",
                        "properties": { "name": { "type": "keyword" } }
                    }
                }
            }
        }))
        .unwrap()
    }

    fn emit(expr: serde_json::Value) -> EmitResult<TargetQuery> {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let config = CompilerConfig::default();
        let expr: QueryExpr = serde_json::from_value(expr).unwrap();
        let tree = QueryTree::from_expr(&expr).unwrap();
        Emitter::new(&registry, &config).emit(&tree)
    }

    #[test]
    fn test_typed_terms() {
        let query = emit(json!({ "word": { "field": "score", "op": "eq", "value": "42" } })).unwrap();
        assert_eq!(query, TargetQuery::term("score", 42));

        let err = emit(json!({ "word": { "field": "score", "value": "lots" } })).unwrap_err();
        assert_eq!(err.code(), EmitErrorCode::AeroValueInvalid);

        let query = emit(json!({ "word": { "field": "draft", "value": "TRUE" } })).unwrap();
        assert_eq!(query, TargetQuery::term("draft", true));
    }

    #[test]
    fn test_unknown_fields_try_numeric_types() {
        assert_eq!(probe("7"), json!(7));
        assert_eq!(probe("9000000000"), json!(9000000000i64));
        assert_eq!(probe("2.5"), json!(2.5));
        assert_eq!(probe("NaN"), json!("NaN"));
        assert_eq!(probe("rust"), json!("rust"));
    }

    #[test]
    fn test_comparison_operators_become_ranges() {
        let query = emit(json!({ "word": { "field": "rating", "op": "gte", "value": "4.5" } })).unwrap();
        assert_eq!(
            query,
            TargetQuery::Range {
                field: "rating".into(),
                gt: None,
                gte: Some(json!(4.5)),
                lt: None,
                lte: None
            }
        );
    }

    #[test]
    fn test_null_tests() {
        let query = emit(json!({ "null": { "field": "title" } })).unwrap();
        assert_eq!(
            query,
            TargetQuery::not(TargetQuery::Exists { field: "title".into() })
        );
        let query = emit(json!({ "null": { "field": "title", "op": "ne" } })).unwrap();
        assert_eq!(query, TargetQuery::Exists { field: "title".into() });
    }

    #[test]
    fn test_bad_regex_rejected() {
        let err = emit(json!({ "word": { "field": "title", "op": "regex", "value": "(" } })).unwrap_err();
        assert_eq!(err.code(), EmitErrorCode::AeroQueryInvalid);
    }

    #[test]
    fn test_phrase_lowers_to_ordered_span() {
        let query = emit(json!({ "phrase": { "field": "title", "value": "rust in action" } })).unwrap();
        match query {
            TargetQuery::SpanNear { clauses, slop, in_order } => {
                assert_eq!(clauses.len(), 3);
                assert_eq!(slop, 0);
                assert!(in_order);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_proximity_requires_one_field() {
        let err = emit(json!({ "proximity": {
            "distance": 2,
            "terms": [
                { "word": { "field": "title", "value": "rust" } },
                { "word": { "field": "comments.body", "value": "fast" } }
            ]
        }}))
        .unwrap_err();
        assert_eq!(err.code(), EmitErrorCode::AeroProximityMixedFields);

        let query = emit(json!({ "proximity": {
            "distance": 3,
            "ordered": true,
            "terms": [
                { "word": { "field": "title", "value": "rust" } },
                { "prefix": { "field": "title", "value": "act" } }
            ]
        }}))
        .unwrap();
        assert!(matches!(query, TargetQuery::SpanNear { slop: 3, in_order: true, .. }));
    }

    #[test]
    fn test_nested_fields_wrap_unless_inside_with() {
        let query = emit(json!({ "word": { "field": "comments.body", "value": "nice" } })).unwrap();
        assert!(matches!(query, TargetQuery::Nested { ref path, .. } if path == "comments"));

        let query = emit(json!({ "with": [
            { "word": { "field": "comments.body", "value": "nice" } },
            { "word": { "field": "comments.author", "value": "ann" } }
        ]}))
        .unwrap();
        match query {
            TargetQuery::Nested { path, query } => {
                assert_eq!(path, "comments");
                assert_eq!(
                    *query,
                    TargetQuery::and(vec![
                        TargetQuery::term("comments.body", "nice"),
                        TargetQuery::term("comments.author", "ann"),
                    ])
                );
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = emit(json!({ "with": [
            { "word": { "field": "comments.body", "value": "nice" } },
            { "word": { "field": "tags.name", "value": "db" } }
        ]}))
        .unwrap_err();
        assert_eq!(err.code(), EmitErrorCode::AeroNestedPathMismatch);
    }

    #[test]
    fn test_arrays() {
        let query = emit(json!({ "array": { "field": "score", "values": ["1", "2"] } })).unwrap();
        assert_eq!(
            query,
            TargetQuery::Terms { field: "score".into(), values: vec![json!(1), json!(2)] }
        );

        let query = emit(json!({ "array": { "field": "title", "values": ["a", "b"], "match_all": true } })).unwrap();
        assert_eq!(
            query,
            TargetQuery::and(vec![TargetQuery::term("title", "a"), TargetQuery::term("title", "b")])
        );
    }

    #[test]
    fn test_bulk_terms_above_threshold() {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let config = CompilerConfig {
            bulk_terms_threshold: 2,
            ..CompilerConfig::default()
        };
        let expr: QueryExpr = serde_json::from_value(
            json!({ "array": { "field": "id", "values": ["1", "2", "3"] } }),
        )
        .unwrap();
        let tree = QueryTree::from_expr(&expr).unwrap();
        let query = Emitter::new(&registry, &config).emit(&tree).unwrap();
        assert!(matches!(query, TargetQuery::BulkTerms { ref values, .. } if values.len() == 3));
    }

    #[test]
    fn test_boost_wraps_predicate() {
        let query = emit(json!({ "word": { "field": "title", "value": "rust", "boost": 2.0 } })).unwrap();
        assert_eq!(
            query,
            TargetQuery::Boost { query: Box::new(TargetQuery::term("title", "rust")), boost: 2.0 }
        );
    }

    #[test]
    fn test_expansion_becomes_cross_join_with_visibility() {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let config = CompilerConfig::default();
        let snapshot = SnapshotDescriptor::new(10, 5, 12, 0, vec![7]).unwrap();
        let expr: QueryExpr = serde_json::from_value(json!({ "expand": {
            "link": "user_id=<users>id",
            "query": { "word": { "field": "name", "value": "ann" } }
        }}))
        .unwrap();
        let tree = QueryTree::from_expr(&expr).unwrap();

        let query = Emitter::new(&registry, &config)
            .with_snapshot(&snapshot)
            .emit(&tree)
            .unwrap();
        match query {
            TargetQuery::CrossJoin { index, left_field, right_field, query, max_terms } => {
                assert_eq!(index, "users");
                assert_eq!(left_field, "user_id");
                assert_eq!(right_field, "id");
                assert_eq!(max_terms, Some(1024));
                assert!(matches!(*query, TargetQuery::Bool { ref must_not, .. }
                    if matches!(must_not[0], TargetQuery::InvisibleTuples { .. })));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
