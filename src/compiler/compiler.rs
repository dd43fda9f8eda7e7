//! Query compiler
//!
//! Drives one query through the pipeline:
//!
//! ```text
//! QueryExpr -> QueryTree -> optimize -> emit -> CompiledQuery
//!                  ^            ^
//!          metadata registry   count estimates (shared cache)
//! ```
//!
//! The registry is rebuilt per query; the count cache and metrics outlive
//! queries and are shared by every compile on this compiler.

use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::ast::{QueryExpr, QueryTree};
use crate::emitter::{Emitter, TargetQuery};
use crate::estimate::{CountEstimator, EstimateCache, SharedCountCache};
use crate::metadata::{IndexLink, IndexMetadataRegistry, JoinLeg};
use crate::observability::{log_event_with_fields, Event, MetricsRegistry, ObservationScope};
use crate::optimizer::{OptimizeReport, Optimizer};
use crate::store::{CountSource, MetadataSource, TupleSource};
use crate::visibility::{InvisibleSet, SnapshotDescriptor, VisibilityEngine};

use super::config::CompilerConfig;
use super::errors::CompileResult;

/// Output of a compile
#[derive(Debug, Clone, Serialize)]
pub struct CompiledQuery {
    pub query_id: String,
    /// The user's query, joins already filtered by visibility
    pub query: TargetQuery,
    /// Tuples of the home index the snapshot must not see
    #[serde(skip_serializing_if = "Option::is_none")]
    pub visibility: Option<TargetQuery>,
    /// Rendered optimized tree
    pub explain: String,
    pub report: OptimizeReport,
}

impl CompiledQuery {
    /// The query to execute: `query` minus the invisible home tuples
    pub fn executable(&self) -> TargetQuery {
        match &self.visibility {
            Some(visibility) => TargetQuery::excluding(self.query.clone(), visibility.clone()),
            None => self.query.clone(),
        }
    }
}

/// Compiles queries against a store
pub struct QueryCompiler {
    config: CompilerConfig,
    cache: Arc<dyn EstimateCache>,
    metrics: Arc<MetricsRegistry>,
}

impl QueryCompiler {
    /// Creates a compiler with its own count cache and metrics
    pub fn new(config: CompilerConfig) -> Self {
        let cache = Arc::new(SharedCountCache::new(config.estimate_cache_capacity));
        Self {
            config,
            cache,
            metrics: Arc::new(MetricsRegistry::new()),
        }
    }

    /// Shares a count cache with other compilers
    pub fn with_cache(mut self, cache: Arc<dyn EstimateCache>) -> Self {
        self.cache = cache;
        self
    }

    /// Shares a metrics registry with other components
    pub fn with_metrics(mut self, metrics: Arc<MetricsRegistry>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    pub fn metrics(&self) -> &Arc<MetricsRegistry> {
        &self.metrics
    }

    /// Compiles `expr` against `home`, filtering by `snapshot` when given
    pub fn compile<S>(
        &self,
        store: &S,
        home: &str,
        expr: &QueryExpr,
        snapshot: Option<&SnapshotDescriptor>,
    ) -> CompileResult<CompiledQuery>
    where
        S: MetadataSource + CountSource,
    {
        let query_id = Uuid::new_v4().to_string();
        let scope = ObservationScope::with_fields(
            "QUERY_COMPILE",
            &[("query_id", query_id.as_str()), ("index", home)],
        );

        match self.compile_inner(store, home, expr, snapshot, &query_id) {
            Ok(compiled) => {
                self.metrics.increment_queries_compiled();
                let expansions = compiled.report.expansions_generated.to_string();
                scope.complete_with_fields(&[("expansions", expansions.as_str())]);
                Ok(compiled)
            }
            Err(e) => {
                self.metrics.increment_queries_rejected();
                let message = e.message();
                log_event_with_fields(
                    Event::QueryRejected,
                    &[
                        ("query_id", query_id.as_str()),
                        ("code", e.code()),
                        ("reason", message.as_str()),
                    ],
                );
                scope.fail(&message);
                Err(e)
            }
        }
    }

    fn compile_inner<S>(
        &self,
        store: &S,
        home: &str,
        expr: &QueryExpr,
        snapshot: Option<&SnapshotDescriptor>,
        query_id: &str,
    ) -> CompileResult<CompiledQuery>
    where
        S: MetadataSource + CountSource,
    {
        // 1. Validate and build the tree
        let mut tree = QueryTree::from_expr(expr)?;

        // 2. Load metadata for everything reachable from home
        let mut registry = IndexMetadataRegistry::new(store, home)?;

        // 3. Rewrite
        let estimator = CountEstimator::new(store, self.cache.as_ref());
        let report = Optimizer::new(&mut registry, &self.config, &estimator)
            .with_metrics(&self.metrics)
            .optimize(&mut tree)?;

        // 4. Lower
        let mut emitter = Emitter::new(&registry, &self.config);
        if let Some(snapshot) = snapshot {
            emitter = emitter.with_snapshot(snapshot);
        }
        let query = emitter.emit(&tree)?;

        Ok(CompiledQuery {
            query_id: query_id.to_string(),
            query,
            visibility: snapshot.map(|s| VisibilityEngine::exclusion_predicate(home, s)),
            explain: tree.to_string(),
            report,
        })
    }

    /// Invisible tuples of `index` under `snapshot`
    pub fn visibility(
        &self,
        source: &dyn TupleSource,
        index: &str,
        snapshot: &SnapshotDescriptor,
    ) -> CompileResult<InvisibleSet> {
        let set = VisibilityEngine::new(source)
            .with_metrics(&self.metrics)
            .compute(index, snapshot)?;
        Ok(set)
    }

    /// Join legs to walk from `dest` back to `source`, as seen from `home`
    pub fn join_path(
        &self,
        store: &dyn MetadataSource,
        home: &str,
        source: &str,
        dest: &str,
    ) -> CompileResult<Vec<JoinLeg>> {
        let registry = IndexMetadataRegistry::new(store, home)?;
        let (source, dest) = (IndexLink::home(source, ""), IndexLink::home(dest, ""));
        Ok(registry.path(&source, &dest)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
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
                            "title": { "type": "text" },
                            "user_id": { "type": "long" }
                        }
                    },
                    "documents": [
                        { "source": { "id": 1, "title": "rust", "user_id": 10 } }
                    ]
                },
                "users": {
                    "mapping": {
                        "primary_key": "id",
                        "properties": { "name": { "type": "keyword" } }
                    },
                    "documents": [
                        { "source": { "id": 10, "name": "ann" } },
                        { "source": { "id": 11, "name": "bob" } },
                        { "source": { "id": 12, "name": "cy" } }
                    ]
                }
            }
        }))
        .unwrap()
    }

    fn expr(value: serde_json::Value) -> QueryExpr {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_compile_without_snapshot() {
        let store = store();
        let compiler = QueryCompiler::new(CompilerConfig::default());
        let compiled = compiler
            .compile(&store, "posts", &expr(json!({ "word": { "field": "title", "value": "rust" } })), None)
            .unwrap();

        assert_eq!(compiled.query, TargetQuery::term("title", "rust"));
        assert!(compiled.visibility.is_none());
        assert_eq!(compiled.executable(), compiled.query);
        assert_eq!(compiler.metrics().snapshot().queries_compiled, 1);
    }

    #[test]
    fn test_compile_with_snapshot_adds_visibility() {
        let store = store();
        let compiler = QueryCompiler::new(CompilerConfig::default());
        let snapshot = SnapshotDescriptor::new(20, 15, 25, 0, vec![]).unwrap();
        let compiled = compiler
            .compile(
                &store,
                "posts",
                &expr(json!({ "word": { "field": "name", "op": "eq", "value": "ann" } })),
                Some(&snapshot),
            )
            .unwrap();

        assert!(matches!(
            compiled.visibility,
            Some(TargetQuery::InvisibleTuples { ref index, .. }) if index == "posts"
        ));
        let executable = serde_json::to_value(compiled.executable()).unwrap();
        assert!(executable.to_string().contains("invisible_tuples"));
        assert!(compiled.explain.contains("#join<user_id=<users>id>"));
    }

    #[test]
    fn test_rejection_is_counted() {
        let store = store();
        let compiler = QueryCompiler::new(CompilerConfig::default());
        let err = compiler
            .compile(&store, "posts", &expr(json!({ "and": [] })), None)
            .unwrap_err();

        assert_eq!(err.code(), "AERO_QUERY_INVALID");
        assert_eq!(compiler.metrics().snapshot().queries_rejected, 1);
    }

    #[test]
    fn test_unknown_home_index() {
        let store = store();
        let compiler = QueryCompiler::new(CompilerConfig::default());
        let err = compiler
            .compile(&store, "nope", &expr(json!({ "word": { "field": "t", "value": "x" } })), None)
            .unwrap_err();
        assert_eq!(err.code(), "AERO_METADATA_FETCH_FAILED");
        assert!(!err.is_rejection());
    }

    #[test]
    fn test_join_path() {
        let store = store();
        let compiler = QueryCompiler::new(CompilerConfig::default());
        let legs = compiler.join_path(&store, "posts", "users", "posts").unwrap();
        assert_eq!(legs.len(), 1);
        assert_eq!(legs[0].oriented().to_string(), "user_id=<users>id");
    }

    #[test]
    fn test_shared_cache_reused_across_queries() {
        let store = store();
        let cache: Arc<SharedCountCache> = Arc::new(SharedCountCache::new(8));
        let compiler = QueryCompiler::new(CompilerConfig::default()).with_cache(cache.clone());
        let query = expr(json!({ "word": { "field": "name", "op": "eq", "value": "ann" } }));

        compiler.compile(&store, "posts", &query, None).unwrap();
        let after_first = cache.len();
        compiler.compile(&store, "posts", &query, None).unwrap();
        assert_eq!(cache.len(), after_first);
        assert!(after_first >= 2);
    }
}
