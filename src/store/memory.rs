//! In-memory document store
//!
//! Loads indexes from a JSON fixture and evaluates the target queries the
//! pipeline emits: enough to drive selectivity counts, cross-index joins and
//! the visibility predicate without a remote store.
//!
//! ```text
//! {
//!   "indexes": {
//!     "posts": {
//!       "mapping":    { "primary_key": "id", "properties": { ... } },
//!       "documents":  [ { "shard": 0, "block": 1, "offset": 1,
//!                         "xmin": 50, "cmin": 0, "source": { ... } } ],
//!       "aborted":    [95],
//!       "superseded": [ { "block": 1, "offset": 1, "xmax": 60, "cmax": 0 } ]
//!     }
//!   }
//! }
//! ```
//!
//! Text matching is deliberately naive: lowercase, split on
//! non-alphanumerics.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;
use serde_json::{Map, Value};

use crate::emitter::TargetQuery;
use crate::metadata::IndexMapping;
use crate::visibility::{
    ScanFilter, SnapshotDescriptor, StoredTuple, SupersessionRecord, TupleHeader, TupleId,
    VisibilityEngine,
};

use super::errors::{StoreError, StoreResult};
use super::traits::{CountSource, MetadataSource, TupleSource};

#[derive(Debug, Deserialize)]
struct Fixture {
    indexes: BTreeMap<String, IndexFixture>,
}

#[derive(Debug, Deserialize)]
struct IndexFixture {
    mapping: IndexMapping,
    #[serde(default)]
    documents: Vec<DocumentFixture>,
    #[serde(default)]
    aborted: Vec<u64>,
    #[serde(default)]
    superseded: Vec<SupersessionFixture>,
}

#[derive(Debug, Deserialize)]
struct DocumentFixture {
    #[serde(default)]
    shard: u32,
    #[serde(default)]
    ordinal: Option<u32>,
    #[serde(default)]
    block: u32,
    #[serde(default)]
    offset: Option<u16>,
    #[serde(default = "default_xmin")]
    xmin: u64,
    #[serde(default)]
    cmin: u32,
    #[serde(default)]
    source: Value,
}

fn default_xmin() -> u64 {
    1
}

#[derive(Debug, Deserialize)]
struct SupersessionFixture {
    block: u32,
    offset: u16,
    xmax: u64,
    #[serde(default)]
    cmax: u32,
}

#[derive(Debug)]
struct MemoryDocument {
    shard: u32,
    ordinal: u32,
    header: Vec<u8>,
    source: Value,
}

#[derive(Debug)]
struct MemoryIndex {
    mapping: IndexMapping,
    documents: Vec<MemoryDocument>,
    aborted: Vec<u64>,
    superseded: Vec<SupersessionRecord>,
}

/// Fixture-backed implementation of every store contract
#[derive(Debug, Default)]
pub struct MemoryStore {
    indexes: BTreeMap<String, MemoryIndex>,
}

impl MemoryStore {
    /// Builds a store from a parsed fixture
    pub fn from_fixture_value(value: Value) -> StoreResult<Self> {
        let fixture: Fixture = serde_json::from_value(value)
            .map_err(|e| StoreError::malformed("<fixture>", e.to_string()))?;

        let indexes: BTreeMap<String, MemoryIndex> = fixture
            .indexes
            .into_iter()
            .map(|(name, index)| {
                let index = MemoryIndex::from_fixture(&name, index)?;
                Ok((name, index))
            })
            .collect::<StoreResult<_>>()?;

        Ok(Self { indexes })
    }

    /// Builds a store from fixture text
    pub fn from_fixture(text: &str) -> StoreResult<Self> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| StoreError::malformed("<fixture>", e.to_string()))?;
        Self::from_fixture_value(value)
    }

    /// Reads a fixture file
    pub fn from_path(path: &Path) -> StoreResult<Self> {
        let text = fs::read_to_string(path)
            .map_err(|e| StoreError::Unavailable(format!("{}: {}", path.display(), e)))?;
        Self::from_fixture(&text)
    }

    /// Executes `query` and returns `(shard, ordinal)` of every hit
    pub fn search(&self, index: &str, query: &TargetQuery) -> StoreResult<Vec<(u32, u32)>> {
        let selected = self.select(index, query)?;
        Ok(self
            .index(index)?
            .documents
            .iter()
            .zip(selected)
            .filter(|(_, hit)| *hit)
            .map(|(doc, _)| (doc.shard, doc.ordinal))
            .collect())
    }

    fn index(&self, name: &str) -> StoreResult<&MemoryIndex> {
        self.indexes
            .get(name)
            .ok_or_else(|| StoreError::IndexNotFound(name.to_string()))
    }

    /// One flag per document of `name`
    fn select(&self, name: &str, query: &TargetQuery) -> StoreResult<Vec<bool>> {
        let index = self.index(name)?;
        let n = index.documents.len();

        match query {
            TargetQuery::MatchAll => Ok(vec![true; n]),
            TargetQuery::MatchNone => Ok(vec![false; n]),
            TargetQuery::Bool {
                must,
                should,
                must_not,
            } => {
                let mut out = vec![true; n];
                for clause in must {
                    let hits = self.select(name, clause)?;
                    out.iter_mut().zip(hits).for_each(|(o, h)| *o &= h);
                }
                if !should.is_empty() {
                    let mut any = vec![false; n];
                    for clause in should {
                        let hits = self.select(name, clause)?;
                        any.iter_mut().zip(hits).for_each(|(a, h)| *a |= h);
                    }
                    out.iter_mut().zip(any).for_each(|(o, a)| *o &= a);
                }
                for clause in must_not {
                    let hits = self.select(name, clause)?;
                    out.iter_mut().zip(hits).for_each(|(o, h)| *o &= !h);
                }
                Ok(out)
            }
            TargetQuery::Boost { query, .. } => self.select(name, query),
            TargetQuery::CrossJoin {
                index: foreign,
                left_field,
                right_field,
                query,
                max_terms,
            } => {
                let foreign_hits = self.select(foreign, query)?;
                let foreign_index = self.index(foreign)?;

                let mut keys = Vec::new();
                let mut seen = HashSet::new();
                for (doc, hit) in foreign_index.documents.iter().zip(foreign_hits) {
                    if !hit {
                        continue;
                    }
                    for value in lookup(&doc.source, right_field) {
                        let key = value_key(value);
                        if seen.insert(key.clone()) {
                            keys.push(key);
                        }
                    }
                }
                if let Some(max) = max_terms {
                    keys.truncate(*max);
                }
                let keys: HashSet<String> = keys.into_iter().collect();

                Ok(index
                    .documents
                    .iter()
                    .map(|doc| {
                        lookup(&doc.source, left_field)
                            .iter()
                            .any(|v| keys.contains(&value_key(v)))
                    })
                    .collect())
            }
            TargetQuery::InvisibleTuples {
                index: target,
                my_xid,
                xmin,
                xmax,
                command_id,
                active_xids,
            } => {
                let snapshot = SnapshotDescriptor::new(
                    *my_xid,
                    *xmin,
                    *xmax,
                    *command_id,
                    active_xids.iter().copied(),
                )
                .map_err(|e| StoreError::malformed(target.as_str(), e.to_string()))?;
                let invisible = VisibilityEngine::new(self)
                    .compute(target, &snapshot)
                    .map_err(|e| StoreError::malformed(target.as_str(), e.to_string()))?;

                Ok(index
                    .documents
                    .iter()
                    .map(|doc| invisible.is_invisible(doc.shard, doc.ordinal))
                    .collect())
            }
            leaf => index
                .documents
                .iter()
                .map(|doc| matches_doc(&doc.source, leaf))
                .collect(),
        }
    }
}

impl MemoryIndex {
    fn from_fixture(name: &str, fixture: IndexFixture) -> StoreResult<Self> {
        let documents = fixture
            .documents
            .into_iter()
            .enumerate()
            .map(|(i, doc)| {
                let offset = match doc.offset {
                    Some(offset) => offset,
                    None => u16::try_from(i + 1).map_err(|_| {
                        StoreError::malformed(name, format!("document {} needs an explicit offset", i))
                    })?,
                };
                let ordinal = match doc.ordinal {
                    Some(ordinal) => ordinal,
                    None => u32::try_from(i).map_err(|_| {
                        StoreError::malformed(name, format!("document {} needs an explicit ordinal", i))
                    })?,
                };
                let header = TupleHeader {
                    id: TupleId::new(doc.block, offset),
                    xmin: doc.xmin,
                    cmin: doc.cmin,
                };
                Ok(MemoryDocument {
                    shard: doc.shard,
                    ordinal,
                    header: header.encode().to_vec(),
                    source: doc.source,
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        let superseded = fixture
            .superseded
            .into_iter()
            .map(|s| SupersessionRecord {
                origin: TupleId::new(s.block, s.offset),
                xmax: s.xmax,
                cmax: s.cmax,
            })
            .collect();

        Ok(Self {
            mapping: fixture.mapping,
            documents,
            aborted: fixture.aborted,
            superseded,
        })
    }
}

impl MetadataSource for MemoryStore {
    fn fetch_mapping(&self, index: &str) -> StoreResult<IndexMapping> {
        Ok(self.index(index)?.mapping.clone())
    }
}

impl CountSource for MemoryStore {
    fn count(&self, index: &str, query: Option<&TargetQuery>) -> StoreResult<u64> {
        match query {
            None => Ok(self.index(index)?.documents.len() as u64),
            Some(query) => Ok(self.select(index, query)?.into_iter().filter(|h| *h).count() as u64),
        }
    }
}

impl TupleSource for MemoryStore {
    fn total_docs(&self, index: &str) -> StoreResult<u64> {
        Ok(self.index(index)?.documents.len() as u64)
    }

    fn aborted_xids(&self, index: &str) -> StoreResult<Vec<u64>> {
        Ok(self.index(index)?.aborted.clone())
    }

    fn superseded(&self, index: &str) -> StoreResult<Vec<SupersessionRecord>> {
        Ok(self.index(index)?.superseded.clone())
    }

    fn scan(&self, index: &str, filter: &ScanFilter) -> StoreResult<Vec<StoredTuple>> {
        let mut out = Vec::new();
        for doc in &self.index(index)?.documents {
            let header = TupleHeader::decode(&doc.header)
                .map_err(|e| StoreError::malformed(index, e.to_string()))?;
            if filter.admits(&header) {
                out.push(StoredTuple {
                    shard: doc.shard,
                    ordinal: doc.ordinal,
                    header: doc.header.clone(),
                });
            }
        }
        Ok(out)
    }
}

fn matches_doc(doc: &Value, query: &TargetQuery) -> StoreResult<bool> {
    match query {
        TargetQuery::MatchAll => Ok(true),
        TargetQuery::MatchNone => Ok(false),
        TargetQuery::Bool {
            must,
            should,
            must_not,
        } => {
            for clause in must {
                if !matches_doc(doc, clause)? {
                    return Ok(false);
                }
            }
            for clause in must_not {
                if matches_doc(doc, clause)? {
                    return Ok(false);
                }
            }
            if should.is_empty() {
                return Ok(true);
            }
            for clause in should {
                if matches_doc(doc, clause)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        TargetQuery::Boost { query, .. } => matches_doc(doc, query),
        TargetQuery::Term { field, value } => {
            Ok(lookup(doc, field).iter().any(|v| value_matches(v, value)))
        }
        TargetQuery::Terms { field, values } | TargetQuery::BulkTerms { field, values } => {
            let found = lookup(doc, field);
            Ok(values
                .iter()
                .any(|target| found.iter().any(|v| value_matches(v, target))))
        }
        TargetQuery::Range {
            field,
            gt,
            gte,
            lt,
            lte,
        } => Ok(lookup(doc, field).iter().any(|v| {
            let check = |bound: &Option<Value>, ok: fn(Ordering) -> bool| {
                bound
                    .as_ref()
                    .map_or(true, |b| compare(v, b).is_some_and(ok))
            };
            check(gt, |o| o == Ordering::Greater)
                && check(gte, |o| o != Ordering::Less)
                && check(lt, |o| o == Ordering::Less)
                && check(lte, |o| o != Ordering::Greater)
        })),
        TargetQuery::Exists { field } => Ok(lookup(doc, field).iter().any(|v| !v.is_null())),
        TargetQuery::Prefix { field, value } => {
            let prefix = value.to_lowercase();
            Ok(texts(doc, field).iter().any(|t| t.starts_with(&prefix)))
        }
        TargetQuery::Wildcard { field, value } => {
            let pattern = wildcard_regex(value)?;
            Ok(texts(doc, field).iter().any(|t| pattern.is_match(t)))
        }
        TargetQuery::Regexp { field, pattern } => {
            let pattern = Regex::new(&format!("^(?:{})$", pattern))
                .map_err(|e| StoreError::Unsupported(format!("regexp: {}", e)))?;
            Ok(texts(doc, field).iter().any(|t| pattern.is_match(t)))
        }
        TargetQuery::Fuzzy {
            field,
            value,
            distance,
        } => {
            let term = value.to_lowercase();
            Ok(tokens(doc, field)
                .iter()
                .any(|t| levenshtein(t, &term) <= *distance as usize))
        }
        TargetQuery::SpanTerm { field, value } => {
            let term = value.to_lowercase();
            Ok(tokens(doc, field).iter().any(|t| *t == term))
        }
        TargetQuery::SpanMulti { query } => matches_doc(doc, query),
        TargetQuery::SpanNear {
            clauses,
            slop,
            in_order,
        } => span_near(doc, clauses, *slop, *in_order),
        TargetQuery::MoreLikeThis { fields, like, .. } => {
            let wanted: HashSet<String> = tokenize(like).into_iter().collect();
            Ok(fields
                .iter()
                .any(|f| tokens(doc, f).iter().any(|t| wanted.contains(t))))
        }
        TargetQuery::Nested { path, query } => {
            for element in lookup(doc, path) {
                if matches_doc(&wrap_path(path, element.clone()), query)? {
                    return Ok(true);
                }
            }
            Ok(false)
        }
        TargetQuery::CrossJoin { .. } | TargetQuery::InvisibleTuples { .. } => Err(
            StoreError::Unsupported("index-level query inside a nested or span scope".to_string()),
        ),
    }
}

/// Values at a dotted path; arrays are flattened at every step. A missing
/// multi-field (`title.raw`) falls back to its parent field.
fn lookup<'v>(doc: &'v Value, path: &str) -> Vec<&'v Value> {
    let mut current = vec![doc];
    for part in path.split('.') {
        let mut next = Vec::new();
        for value in current {
            match value.get(part) {
                Some(Value::Array(items)) => next.extend(items.iter()),
                Some(v) => next.push(v),
                None => {}
            }
        }
        current = next;
    }

    if current.is_empty() {
        if let Some((parent, _)) = path.rsplit_once('.') {
            let found = lookup(doc, parent);
            if found.iter().all(|v| !v.is_object()) {
                return found;
            }
        }
    }
    current
}

fn wrap_path(path: &str, element: Value) -> Value {
    path.rsplit('.').fold(element, |inner, part| {
        let mut map = Map::new();
        map.insert(part.to_string(), inner);
        Value::Object(map)
    })
}

fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

fn tokens(doc: &Value, field: &str) -> Vec<String> {
    lookup(doc, field)
        .into_iter()
        .flat_map(|v| match v {
            Value::String(s) => tokenize(s),
            other => vec![value_key(other)],
        })
        .collect()
}

/// Whole lowercased values plus their tokens
fn texts(doc: &Value, field: &str) -> Vec<String> {
    let mut out = Vec::new();
    for value in lookup(doc, field) {
        match value {
            Value::String(s) => {
                out.push(s.to_lowercase());
                out.extend(tokenize(s));
            }
            other => out.push(value_key(other)),
        }
    }
    out
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

fn value_key(value: &Value) -> String {
    match value {
        Value::Number(n) => n.as_f64().map_or_else(|| n.to_string(), |f| f.to_string()),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn value_matches(found: &Value, target: &Value) -> bool {
    match (found, target) {
        (Value::String(f), Value::String(t)) => {
            let t = t.to_lowercase();
            f.to_lowercase() == t || tokenize(f).iter().any(|tok| *tok == t)
        }
        _ => match (as_number(found), as_number(target)) {
            (Some(a), Some(b)) => a == b,
            _ => value_key(found) == value_key(target),
        },
    }
}

fn compare(found: &Value, bound: &Value) -> Option<Ordering> {
    match (as_number(found), as_number(bound)) {
        (Some(a), Some(b)) => a.partial_cmp(&b),
        _ => Some(value_key(found).cmp(&value_key(bound))),
    }
}

fn wildcard_regex(pattern: &str) -> StoreResult<Regex> {
    let mut source = String::from("^");
    for c in pattern.to_lowercase().chars() {
        match c {
            '*' => source.push_str(".*"),
            '?' => source.push('.'),
            c => source.push_str(&regex::escape(&c.to_string())),
        }
    }
    source.push('$');
    Regex::new(&source).map_err(|e| StoreError::Unsupported(format!("wildcard: {}", e)))
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut previous: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut current = vec![i + 1];
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            current.push((previous[j] + cost).min(previous[j + 1] + 1).min(current[j] + 1));
        }
        previous = current;
    }
    previous[b.len()]
}

fn span_clause_field(clause: &TargetQuery) -> StoreResult<&str> {
    match clause {
        TargetQuery::SpanTerm { field, .. } => Ok(field),
        TargetQuery::SpanMulti { query } => match query.as_ref() {
            TargetQuery::Prefix { field, .. }
            | TargetQuery::Wildcard { field, .. }
            | TargetQuery::Fuzzy { field, .. } => Ok(field),
            other => Err(StoreError::Unsupported(format!("span_multi over {:?}", other))),
        },
        other => Err(StoreError::Unsupported(format!("span clause {:?}", other))),
    }
}

fn span_clause_matches(clause: &TargetQuery, token: &str) -> StoreResult<bool> {
    match clause {
        TargetQuery::SpanTerm { value, .. } => Ok(token == value.to_lowercase()),
        TargetQuery::SpanMulti { query } => match query.as_ref() {
            TargetQuery::Prefix { value, .. } => Ok(token.starts_with(&value.to_lowercase())),
            TargetQuery::Wildcard { value, .. } => Ok(wildcard_regex(value)?.is_match(token)),
            TargetQuery::Fuzzy {
                value, distance, ..
            } => Ok(levenshtein(token, &value.to_lowercase()) <= *distance as usize),
            other => Err(StoreError::Unsupported(format!("span_multi over {:?}", other))),
        },
        other => Err(StoreError::Unsupported(format!("span clause {:?}", other))),
    }
}

fn span_near(doc: &Value, clauses: &[TargetQuery], slop: u32, in_order: bool) -> StoreResult<bool> {
    let Some(first) = clauses.first() else {
        return Ok(false);
    };
    let field = span_clause_field(first)?;
    let field_tokens = tokens(doc, field);

    let mut positions = Vec::with_capacity(clauses.len());
    for clause in clauses {
        let mut found = Vec::new();
        for (pos, token) in field_tokens.iter().enumerate() {
            if span_clause_matches(clause, token)? {
                found.push(pos);
            }
        }
        if found.is_empty() {
            return Ok(false);
        }
        positions.push(found);
    }

    Ok(choose_span(&positions, &mut Vec::new(), slop as usize, in_order))
}

fn choose_span(positions: &[Vec<usize>], chosen: &mut Vec<usize>, slop: usize, in_order: bool) -> bool {
    if chosen.len() == positions.len() {
        let (Some(min), Some(max)) = (chosen.iter().min(), chosen.iter().max()) else {
            return false;
        };
        return max - min + 1 - chosen.len() <= slop;
    }
    for &pos in &positions[chosen.len()] {
        if chosen.contains(&pos) {
            continue;
        }
        if in_order && chosen.last().is_some_and(|last| pos <= *last) {
            continue;
        }
        chosen.push(pos);
        if choose_span(positions, chosen, slop, in_order) {
            return true;
        }
        chosen.pop();
    }
    false
}
