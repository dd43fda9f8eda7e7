//! Abstract target query
//!
//! The store-facing predicate tree. It is opaque to callers except for its
//! composition rule: the executable query is
//! `bool { must: [query], must_not: [visibility] }`.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A store query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetQuery {
    MatchAll,
    MatchNone,
    Bool {
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        must: Vec<TargetQuery>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        should: Vec<TargetQuery>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        must_not: Vec<TargetQuery>,
    },
    Term {
        field: String,
        value: Value,
    },
    /// Any of `values`
    Terms {
        field: String,
        values: Vec<Value>,
    },
    /// Any of `values`, shipped in the store's compact bulk form
    BulkTerms {
        field: String,
        values: Vec<Value>,
    },
    Range {
        field: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gt: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        gte: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lt: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        lte: Option<Value>,
    },
    Exists {
        field: String,
    },
    Prefix {
        field: String,
        value: String,
    },
    Wildcard {
        field: String,
        value: String,
    },
    Regexp {
        field: String,
        pattern: String,
    },
    Fuzzy {
        field: String,
        value: String,
        distance: u8,
    },
    /// Clauses within `slop` positions of each other
    SpanNear {
        clauses: Vec<TargetQuery>,
        slop: u32,
        in_order: bool,
    },
    SpanTerm {
        field: String,
        value: String,
    },
    /// Adapts a multi-term query (prefix, wildcard, fuzzy) into a span clause
    SpanMulti {
        query: Box<TargetQuery>,
    },
    MoreLikeThis {
        fields: Vec<String>,
        like: String,
        fuzzy: bool,
    },
    Boost {
        query: Box<TargetQuery>,
        boost: f32,
    },
    Nested {
        path: String,
        query: Box<TargetQuery>,
    },
    /// Resolve `query` against `index`, collect its `right_field` values and
    /// match them against `left_field` of the current index
    CrossJoin {
        index: String,
        left_field: String,
        right_field: String,
        query: Box<TargetQuery>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_terms: Option<usize>,
    },
    /// Documents of `index` invisible to the described snapshot
    InvisibleTuples {
        index: String,
        my_xid: u64,
        xmin: u64,
        xmax: u64,
        command_id: u32,
        active_xids: Vec<u64>,
    },
}

impl TargetQuery {
    /// All of `clauses`
    pub fn and(clauses: Vec<TargetQuery>) -> Self {
        TargetQuery::Bool {
            must: clauses,
            should: Vec::new(),
            must_not: Vec::new(),
        }
    }

    /// Any of `clauses`
    pub fn or(clauses: Vec<TargetQuery>) -> Self {
        TargetQuery::Bool {
            must: Vec::new(),
            should: clauses,
            must_not: Vec::new(),
        }
    }

    /// Everything except `query`
    pub fn not(query: TargetQuery) -> Self {
        TargetQuery::Bool {
            must: Vec::new(),
            should: Vec::new(),
            must_not: vec![query],
        }
    }

    /// `query` minus `excluded`
    pub fn excluding(query: TargetQuery, excluded: TargetQuery) -> Self {
        TargetQuery::Bool {
            must: vec![query],
            should: Vec::new(),
            must_not: vec![excluded],
        }
    }

    pub fn term(field: impl Into<String>, value: impl Into<Value>) -> Self {
        TargetQuery::Term {
            field: field.into(),
            value: value.into(),
        }
    }
}
