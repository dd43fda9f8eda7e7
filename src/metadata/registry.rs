//! Index metadata registry
//!
//! One registry per query. It loads the home index, then breadth-first every
//! index reachable through declared links, and answers three questions for
//! the optimizer:
//!
//! - `load(index)` - metadata for an index (no-op when already loaded)
//! - `field_owner(field, current)` - which link a field resolves through
//! - `path(source, dest)` - join legs between two links
//!
//! Unknown fields resolve to the home index so the store can report them.

use std::cell::OnceCell;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use crate::observability::{log_event_with_fields, Event};
use crate::store::MetadataSource;

use super::errors::{MetadataError, MetadataResult};
use super::link::IndexLink;
use super::mapping::{FieldProperties, IndexMetadata};
use super::relationships::{JoinLeg, RelationshipGraph};

/// Per-query cache of index metadata and links
pub struct IndexMetadataRegistry<'a> {
    source: &'a dyn MetadataSource,
    home: Arc<IndexLink>,
    loaded: HashMap<String, Arc<IndexMetadata>>,
    load_order: Vec<String>,
    links: Vec<Arc<IndexLink>>,
    declared: Vec<(String, Arc<IndexLink>)>,
    graph: OnceCell<RelationshipGraph>,
}

impl<'a> IndexMetadataRegistry<'a> {
    /// Loads the home index and everything reachable through its links
    pub fn new(source: &'a dyn MetadataSource, home_index: &str) -> MetadataResult<Self> {
        let mut registry = Self {
            source,
            home: Arc::new(IndexLink::home(home_index, "")),
            loaded: HashMap::new(),
            load_order: Vec::new(),
            links: Vec::new(),
            declared: Vec::new(),
            graph: OnceCell::new(),
        };

        let home_meta = registry.load(home_index)?;
        let home = Arc::new(IndexLink::home(home_index, home_meta.primary_key()));
        registry.home = Arc::clone(&home);
        registry.links.push(home);
        registry.load_declared_links(home_index)?;

        Ok(registry)
    }

    /// Loads an index by name; already-loaded indexes are returned as is
    pub fn load(&mut self, index: &str) -> MetadataResult<Arc<IndexMetadata>> {
        if let Some(meta) = self.loaded.get(index) {
            return Ok(Arc::clone(meta));
        }

        let mapping = self
            .source
            .fetch_mapping(index)
            .map_err(|e| MetadataError::fetch_failed(index, e))?;
        let meta = Arc::new(IndexMetadata::from_mapping(index, &mapping)?);

        let field_count = meta.fields().count().to_string();
        log_event_with_fields(
            Event::MetadataLoaded,
            &[("index", index), ("fields", field_count.as_str())],
        );

        self.loaded.insert(index.to_string(), Arc::clone(&meta));
        self.load_order.push(index.to_string());
        Ok(meta)
    }

    /// Registers a link written directly in a query, relative to `source_index`
    pub fn load_link(
        &mut self,
        source_index: &str,
        link: &IndexLink,
    ) -> MetadataResult<Arc<IndexLink>> {
        if let Some(existing) = self.links.iter().find(|l| l.as_ref() == link) {
            return Ok(Arc::clone(existing));
        }

        self.load(link.index_name())?;
        let link = Arc::new(link.clone());
        self.register(source_index, Arc::clone(&link));
        self.load_declared_links(link.index_name())?;
        Ok(link)
    }

    fn load_declared_links(&mut self, start: &str) -> MetadataResult<()> {
        let mut queue = VecDeque::from([start.to_string()]);
        let mut visited = vec![start.to_string()];

        while let Some(index) = queue.pop_front() {
            let meta = self.load(&index)?;
            for link in meta.links() {
                self.load(link.index_name())?;
                if !self.links.iter().any(|l| l.as_ref() == link) {
                    self.register(&index, Arc::new(link.clone()));
                }
                if !visited.iter().any(|v| v == link.index_name()) {
                    visited.push(link.index_name().to_string());
                    queue.push_back(link.index_name().to_string());
                }
            }
        }

        Ok(())
    }

    fn register(&mut self, source_index: &str, link: Arc<IndexLink>) {
        self.declared.push((source_index.to_string(), Arc::clone(&link)));
        self.links.push(link);
        self.graph = OnceCell::new();
    }

    /// The home index's self-link
    pub fn home(&self) -> &Arc<IndexLink> {
        &self.home
    }

    /// Metadata for a loaded index
    pub fn metadata(&self, index: &str) -> MetadataResult<&Arc<IndexMetadata>> {
        self.loaded
            .get(index)
            .ok_or_else(|| MetadataError::invalid_mapping(index, "index was never loaded"))
    }

    /// All registered links, home first, in load order
    pub fn links(&self) -> &[Arc<IndexLink>] {
        &self.links
    }

    /// One representative link per loaded index, home first
    pub fn index_links(&self) -> Vec<Arc<IndexLink>> {
        let mut seen: Vec<&str> = Vec::new();
        let mut out = Vec::new();
        for link in &self.links {
            if !seen.contains(&link.index_name()) {
                seen.push(link.index_name());
                out.push(Arc::clone(link));
            }
        }
        out
    }

    /// The registered `Arc` equal to `link`, or a fresh one
    pub fn canonical(&self, link: &IndexLink) -> Arc<IndexLink> {
        self.links
            .iter()
            .find(|l| l.as_ref() == link)
            .cloned()
            .unwrap_or_else(|| Arc::new(link.clone()))
    }

    /// True if `link` was declared on (or written relative to) `index`
    pub fn declared_from(&self, index: &str, link: &IndexLink) -> bool {
        self.declared
            .iter()
            .any(|(source, l)| source == index && l.as_ref() == link)
    }

    /// Properties of `field` in the index behind `link`
    pub fn field_properties(&self, link: &IndexLink, field: &str) -> Option<&FieldProperties> {
        self.loaded.get(link.index_name())?.field(field)
    }

    /// Resolves which link a field belongs to, returning the field name with
    /// any alias or index prefix stripped.
    ///
    /// Order: `alias.field` prefix, the current context index, every loaded
    /// index in load order, then the home index.
    pub fn field_owner(&self, field: &str, current: &IndexLink) -> (Arc<IndexLink>, String) {
        let current_meta = self.loaded.get(current.index_name());
        let current_link = self.canonical(current);

        if let Some((prefix, rest)) = field.split_once('.') {
            let defined_locally = current_meta.is_some_and(|m| m.has_field(field));
            if !defined_locally {
                if let Some(link) = self.links.iter().find(|l| l.answers_to(prefix)) {
                    return (Arc::clone(link), rest.to_string());
                }
            }
        }

        if current_meta.is_some_and(|m| m.has_field(field)) {
            return (current_link, field.to_string());
        }

        for link in &self.links {
            if self
                .loaded
                .get(link.index_name())
                .is_some_and(|m| m.has_field(field))
            {
                return (Arc::clone(link), field.to_string());
            }
        }

        (Arc::clone(&self.home), field.to_string())
    }

    /// Join legs to walk from `dest` back to `source`, outermost first
    pub fn path(&self, source: &IndexLink, dest: &IndexLink) -> MetadataResult<Vec<JoinLeg>> {
        self.graph
            .get_or_init(|| RelationshipGraph::build(&self.declared))
            .path(source.index_name(), dest.index_name())
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
                            "user_id": { "type": "long" },
                            "name": { "type": "keyword" }
                        }
                    }
                },
                "users": {
                    "mapping": {
                        "primary_key": "id",
                        "links": ["org_id=<orgs>id"],
                        "properties": {
                            "name": { "type": "keyword" },
                            "email": { "type": "keyword" },
                            "org_id": { "type": "long" }
                        }
                    }
                },
                "orgs": {
                    "mapping": {
                        "primary_key": "id",
                        "properties": { "country": { "type": "keyword" } }
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_loads_reachable_indexes() {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let names: Vec<String> = registry
            .index_links()
            .iter()
            .map(|l| l.index_name().to_string())
            .collect();
        assert_eq!(names, vec!["posts", "users", "orgs"]);
        assert_eq!(registry.links().len(), 3);
        assert!(registry.metadata("orgs").is_ok());
    }

    #[test]
    fn test_load_is_idempotent() {
        let store = store();
        let mut registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let a = registry.load("users").unwrap();
        let b = registry.load("users").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_field_owner_prefers_current() {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let home = Arc::clone(registry.home());

        let (owner, field) = registry.field_owner("name", &home);
        assert_eq!(owner.index_name(), "posts");
        assert_eq!(field, "name");

        let (owner, _) = registry.field_owner("email", &home);
        assert_eq!(owner.index_name(), "users");

        let (owner, _) = registry.field_owner("country", &home);
        assert_eq!(owner.index_name(), "orgs");
    }

    #[test]
    fn test_field_owner_prefix_and_fail_open() {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let home = Arc::clone(registry.home());

        let (owner, field) = registry.field_owner("users.name", &home);
        assert_eq!(owner.index_name(), "users");
        assert_eq!(field, "name");

        let (owner, field) = registry.field_owner("no_such_field", &home);
        assert_eq!(owner.index_name(), "posts");
        assert_eq!(field, "no_such_field");
    }

    #[test]
    fn test_path_through_registry() {
        let store = store();
        let registry = IndexMetadataRegistry::new(&store, "posts").unwrap();
        let orgs = registry
            .links()
            .iter()
            .find(|l| l.index_name() == "orgs")
            .cloned()
            .unwrap();
        let legs = registry.path(&orgs, registry.home()).unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs[0].oriented().index_name(), "users");
        assert_eq!(legs[1].oriented().index_name(), "orgs");
    }

    #[test]
    fn test_missing_home_index_fails() {
        let store = store();
        let err = IndexMetadataRegistry::new(&store, "nope").err().unwrap();
        assert_eq!(err.code(), crate::metadata::MetadataErrorCode::AeroMetadataFetchFailed);
    }
}
