//! CLI command implementations
//!
//! Every command loads a store fixture, runs one pipeline operation and
//! prints a single JSON response. Failures print an error response as well
//! and exit non-zero.

use std::fs;
use std::path::Path;

use serde_json::{json, Value};

use crate::ast::QueryExpr;
use crate::compiler::{CompiledQuery, CompilerConfig, QueryCompiler};
use crate::observability::Logger;
use crate::store::MemoryStore;
use crate::visibility::SnapshotDescriptor;

use super::args::Command;
use super::errors::{CliError, CliResult};
use super::io::{read_json, write_error, write_response};

/// Main CLI entry point
///
/// Parses arguments and dispatches to the appropriate command.
/// This is the only function that main.rs should call.
pub fn run() -> CliResult<()> {
    let cli = super::args::Cli::parse_args();
    Logger::set_min_severity(cli.log_level.into());
    run_command(cli.command).map_err(|e| {
        // stdout may be gone; the error still reaches stderr via main
        let _ = write_error(e.code_str(), e.message());
        e
    })
}

/// Run the appropriate command based on CLI args
pub fn run_command(cmd: Command) -> CliResult<()> {
    match cmd {
        Command::Compile {
            store,
            index,
            query,
            snapshot,
            config,
            explain,
        } => {
            let data = compile(
                &store,
                &index,
                query.as_deref(),
                snapshot.as_deref(),
                config.as_deref(),
                explain,
            )?;
            write_response(data)
        }
        Command::Search {
            store,
            index,
            query,
            snapshot,
            config,
        } => {
            let data = search(
                &store,
                &index,
                query.as_deref(),
                snapshot.as_deref(),
                config.as_deref(),
            )?;
            write_response(data)
        }
        Command::Visibility {
            store,
            index,
            snapshot,
        } => write_response(visibility(&store, &index, &snapshot)?),
        Command::Path {
            store,
            index,
            from,
            to,
        } => write_response(path(&store, &index, &from, &to)?),
    }
}

/// Compile a query against a fixture
pub fn compile(
    store_path: &Path,
    index: &str,
    query_path: Option<&Path>,
    snapshot_path: Option<&Path>,
    config_path: Option<&Path>,
    explain: bool,
) -> CliResult<Value> {
    let compiled = compile_query(store_path, index, query_path, snapshot_path, config_path)?.1;

    let mut data = json!({
        "query_id": compiled.query_id,
        "query": compiled.query,
        "visibility": compiled.visibility,
        "executable": compiled.executable(),
        "report": compiled.report,
    });
    if explain {
        data["explain"] = json!(compiled.explain);
    }
    Ok(data)
}

/// Compile a query and run it against the fixture.
///
/// The user query runs without the visibility predicate; invisible hits are
/// then dropped with the invisible set, the same result the executable form
/// gives.
pub fn search(
    store_path: &Path,
    index: &str,
    query_path: Option<&Path>,
    snapshot_path: Option<&Path>,
    config_path: Option<&Path>,
) -> CliResult<Value> {
    let (
        Loaded {
            store,
            compiler,
            snapshot,
        },
        compiled,
    ) = compile_query(store_path, index, query_path, snapshot_path, config_path)?;

    let mut hits = store.search(index, &compiled.query)?;
    if let Some(snapshot) = &snapshot {
        let invisible = compiler.visibility(&store, index, snapshot)?;
        hits = invisible.retain_visible(hits, |&hit| hit);
    }

    let hits: Vec<Value> = hits
        .into_iter()
        .map(|(shard, ordinal)| json!({ "shard": shard, "ordinal": ordinal }))
        .collect();
    Ok(json!({
        "query_id": compiled.query_id,
        "total": hits.len(),
        "hits": hits,
    }))
}

/// Invisible tuples of one index
pub fn visibility(store_path: &Path, index: &str, snapshot_path: &Path) -> CliResult<Value> {
    let store = MemoryStore::from_path(store_path)?;
    let snapshot = load_snapshot(snapshot_path)?;
    let compiler = QueryCompiler::new(CompilerConfig::default());

    let invisible = compiler.visibility(&store, index, &snapshot)?;
    Ok(json!({
        "index": index,
        "count": invisible.len(),
        "shards": invisible.to_json(),
    }))
}

/// Join legs between two indexes reachable from `home`
pub fn path(store_path: &Path, home: &str, from: &str, to: &str) -> CliResult<Value> {
    let store = MemoryStore::from_path(store_path)?;
    let compiler = QueryCompiler::new(CompilerConfig::default());

    let legs: Vec<Value> = compiler
        .join_path(&store, home, from, to)?
        .iter()
        .map(|leg| {
            json!({
                "link": leg.oriented().to_string(),
                "declared_on": leg.source_index(),
                "reversed": leg.is_reversed(),
            })
        })
        .collect();
    Ok(json!({ "from": from, "to": to, "legs": legs }))
}

struct Loaded {
    store: MemoryStore,
    compiler: QueryCompiler,
    snapshot: Option<SnapshotDescriptor>,
}

fn compile_query(
    store_path: &Path,
    index: &str,
    query_path: Option<&Path>,
    snapshot_path: Option<&Path>,
    config_path: Option<&Path>,
) -> CliResult<(Loaded, CompiledQuery)> {
    // 1. Configuration
    let config = match config_path {
        Some(path) => CompilerConfig::load(path)?,
        None => CompilerConfig::default(),
    };

    // 2. Store and inputs
    let store = MemoryStore::from_path(store_path)?;
    let snapshot = snapshot_path.map(load_snapshot).transpose()?;
    let expr: QueryExpr = read_json(query_path)?;

    // 3. Compile
    let compiler = QueryCompiler::new(config);
    let compiled = compiler.compile(&store, index, &expr, snapshot.as_ref())?;

    Ok((
        Loaded {
            store,
            compiler,
            snapshot,
        },
        compiled,
    ))
}

fn load_snapshot(path: &Path) -> CliResult<SnapshotDescriptor> {
    let text = fs::read_to_string(path)
        .map_err(|e| CliError::io_error(format!("{}: {}", path.display(), e)))?;
    Ok(SnapshotDescriptor::from_json(&text)?)
}

#[cfg(test)]
mod tests {
    use super::super::errors::CliErrorCode;
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn write(dir: &TempDir, name: &str, value: Value) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, value.to_string()).unwrap();
        path
    }

    fn fixture(dir: &TempDir) -> PathBuf {
        write(
            dir,
            "store.json",
            json!({
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
                            { "block": 1, "offset": 1, "xmin": 10, "source": { "id": 1, "title": "rust tips", "user_id": 10 } },
                            { "block": 1, "offset": 2, "xmin": 10, "source": { "id": 2, "title": "rust news", "user_id": 11 } },
                            { "block": 1, "offset": 3, "xmin": 97, "source": { "id": 3, "title": "rust draft", "user_id": 10 } }
                        ]
                    },
                    "users": {
                        "mapping": {
                            "primary_key": "id",
                            "properties": { "name": { "type": "keyword" } }
                        },
                        "documents": [
                            { "source": { "id": 10, "name": "ann" } },
                            { "source": { "id": 11, "name": "bob" } }
                        ]
                    }
                }
            }),
        )
    }

    fn snapshot(dir: &TempDir) -> PathBuf {
        write(
            dir,
            "snapshot.json",
            json!({ "myXid": 100, "xmin": 90, "xmax": 110, "commandId": 0, "activeXids": [97] }),
        )
    }

    #[test]
    fn test_compile_outputs_query_and_visibility() {
        let dir = TempDir::new().unwrap();
        let store = fixture(&dir);
        let query = write(&dir, "q.json", json!({ "word": { "field": "title", "value": "rust" } }));
        let snap = snapshot(&dir);

        let data = compile(&store, "posts", Some(&query), Some(&snap), None, true).unwrap();
        assert_eq!(data["query"], json!({ "term": { "field": "title", "value": "rust" } }));
        assert_eq!(data["visibility"]["invisible_tuples"]["index"], "posts");
        assert_eq!(data["explain"], r#"title:"rust""#);
    }

    #[test]
    fn test_search_drops_invisible_hits() {
        let dir = TempDir::new().unwrap();
        let store = fixture(&dir);
        let query = write(&dir, "q.json", json!({ "word": { "field": "title", "value": "rust" } }));
        let snap = snapshot(&dir);

        let without = search(&store, "posts", Some(&query), None, None).unwrap();
        assert_eq!(without["total"], 3);

        let with = search(&store, "posts", Some(&query), Some(&snap), None).unwrap();
        assert_eq!(with["total"], 2);
    }

    #[test]
    fn test_search_through_join() {
        let dir = TempDir::new().unwrap();
        let store = fixture(&dir);
        let query = write(
            &dir,
            "q.json",
            json!({ "word": { "field": "name", "op": "eq", "value": "bob" } }),
        );

        let data = search(&store, "posts", Some(&query), None, None).unwrap();
        assert_eq!(data["total"], 1);
        assert_eq!(data["hits"][0]["ordinal"], 1);
    }

    #[test]
    fn test_visibility_lists_active_writer() {
        let dir = TempDir::new().unwrap();
        let store = fixture(&dir);
        let snap = snapshot(&dir);

        let data = visibility(&store, "posts", &snap).unwrap();
        assert_eq!(data["count"], 1);
        assert_eq!(data["shards"]["0"], json!([2]));
    }

    #[test]
    fn test_path_lists_legs() {
        let dir = TempDir::new().unwrap();
        let store = fixture(&dir);

        let data = path(&store, "posts", "users", "posts").unwrap();
        assert_eq!(data["legs"][0]["link"], "user_id=<users>id");
        assert_eq!(data["legs"][0]["reversed"], false);
    }

    #[test]
    fn test_bad_config_is_config_error() {
        let dir = TempDir::new().unwrap();
        let store = fixture(&dir);
        let query = write(&dir, "q.json", json!({ "word": { "field": "title", "value": "rust" } }));
        let config = write(&dir, "config.json", json!({ "max_rewrite_passes": 0 }));

        let err = compile(&store, "posts", Some(&query), None, Some(&config), false).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::ConfigError);
    }

    #[test]
    fn test_missing_store() {
        let dir = TempDir::new().unwrap();
        let err = visibility(&dir.path().join("nope.json"), "posts", &snapshot(&dir)).unwrap_err();
        assert_eq!(err.code(), &CliErrorCode::StoreError);
    }
}
