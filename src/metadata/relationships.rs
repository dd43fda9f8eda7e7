//! Relationship graph and join-path resolution
//!
//! Vertices are indexes plus one leg vertex per link direction. A link
//! declared on `S` into `D` contributes two directed triangles:
//!
//! ```text
//! S --1--> leg(link, forward) --2--> D
//! D --1--> leg(link, reverse) --2--> S
//! ```
//!
//! Shortest paths use Dijkstra with a heap keyed by (distance, insertion
//! sequence), so among equal-cost routes the first edge added wins.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;

use super::errors::{MetadataError, MetadataResult};
use super::link::IndexLink;

const LEG_ENTRY_WEIGHT: u32 = 1;
const LEG_EXIT_WEIGHT: u32 = 2;

/// One hop of a join path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JoinLeg {
    declared: Arc<IndexLink>,
    source_index: String,
    reversed: bool,
}

impl JoinLeg {
    /// The link as declared on its source index
    pub fn declared(&self) -> &Arc<IndexLink> {
        &self.declared
    }

    /// Index the link was declared on
    pub fn source_index(&self) -> &str {
        &self.source_index
    }

    /// True if the leg walks the declared link backwards
    pub fn is_reversed(&self) -> bool {
        self.reversed
    }

    /// The link oriented for this walk: left field in the nearer index,
    /// `index_name` the index being detoured into
    pub fn oriented(&self) -> IndexLink {
        if self.reversed {
            self.declared.reversed(&self.source_index)
        } else {
            self.declared.as_ref().clone()
        }
    }
}

impl fmt::Display for JoinLeg {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let link = self.oriented();
        write!(f, "{}:{}", link.index_name(), link.right_field())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Vertex {
    Index(String),
    Leg { link: usize, forward: bool },
}

#[derive(Debug, Clone, Copy)]
struct Edge {
    to: usize,
    weight: u32,
}

/// Weighted graph over indexes and link legs
#[derive(Debug, Default)]
pub struct RelationshipGraph {
    vertices: Vec<Vertex>,
    index_ids: HashMap<String, usize>,
    adjacency: Vec<Vec<Edge>>,
    links: Vec<(String, Arc<IndexLink>)>,
}

impl RelationshipGraph {
    /// Builds the graph from `(source index, link)` pairs in declaration order
    pub fn build(declared: &[(String, Arc<IndexLink>)]) -> Self {
        let mut graph = Self::default();

        for (source, link) in declared {
            if source == link.index_name() {
                continue;
            }
            let link_id = graph.links.len();
            graph.links.push((source.clone(), Arc::clone(link)));

            let s = graph.index_vertex(source);
            let d = graph.index_vertex(link.index_name());

            let forward = graph.add_vertex(Vertex::Leg { link: link_id, forward: true });
            graph.add_edge(s, forward, LEG_ENTRY_WEIGHT);
            graph.add_edge(forward, d, LEG_EXIT_WEIGHT);

            let reverse = graph.add_vertex(Vertex::Leg { link: link_id, forward: false });
            graph.add_edge(d, reverse, LEG_ENTRY_WEIGHT);
            graph.add_edge(reverse, s, LEG_EXIT_WEIGHT);
        }

        graph
    }

    /// Number of vertices
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Legs needed to walk from index `to` back to index `from`.
    ///
    /// The shortest vertex sequence `from .. to` is trimmed of its endpoints,
    /// reduced to leg vertices and reversed.
    pub fn path(&self, from: &str, to: &str) -> MetadataResult<Vec<JoinLeg>> {
        if from == to {
            return Ok(Vec::new());
        }

        let (start, goal) = match (self.index_ids.get(from), self.index_ids.get(to)) {
            (Some(s), Some(g)) => (*s, *g),
            _ => return Err(MetadataError::no_path(from, to)),
        };

        let walk = self.shortest(start, goal).ok_or_else(|| MetadataError::no_path(from, to))?;

        let mut legs: Vec<JoinLeg> = walk[1..walk.len() - 1]
            .iter()
            .filter_map(|&v| match &self.vertices[v] {
                Vertex::Leg { link, forward } => {
                    let (source, declared) = &self.links[*link];
                    Some(JoinLeg {
                        declared: Arc::clone(declared),
                        source_index: source.clone(),
                        reversed: *forward,
                    })
                }
                Vertex::Index(_) => None,
            })
            .collect();
        legs.reverse();

        Ok(legs)
    }

    fn shortest(&self, start: usize, goal: usize) -> Option<Vec<usize>> {
        let mut dist: Vec<Option<u32>> = vec![None; self.vertices.len()];
        let mut prev: Vec<Option<usize>> = vec![None; self.vertices.len()];
        let mut heap = BinaryHeap::new();
        let mut seq: u64 = 0;

        dist[start] = Some(0);
        heap.push(Reverse((0u32, seq, start)));

        while let Some(Reverse((d, _, v))) = heap.pop() {
            if v == goal {
                break;
            }
            if dist[v].is_some_and(|best| d > best) {
                continue;
            }
            for edge in &self.adjacency[v] {
                let candidate = d + edge.weight;
                if dist[edge.to].map_or(true, |current| candidate < current) {
                    dist[edge.to] = Some(candidate);
                    prev[edge.to] = Some(v);
                    seq += 1;
                    heap.push(Reverse((candidate, seq, edge.to)));
                }
            }
        }

        dist[goal]?;

        let mut walk = vec![goal];
        let mut cursor = goal;
        while let Some(p) = prev[cursor] {
            walk.push(p);
            cursor = p;
        }
        walk.reverse();
        Some(walk)
    }

    fn index_vertex(&mut self, name: &str) -> usize {
        if let Some(id) = self.index_ids.get(name) {
            return *id;
        }
        let id = self.add_vertex(Vertex::Index(name.to_string()));
        self.index_ids.insert(name.to_string(), id);
        id
    }

    fn add_vertex(&mut self, vertex: Vertex) -> usize {
        self.vertices.push(vertex);
        self.adjacency.push(Vec::new());
        self.vertices.len() - 1
    }

    fn add_edge(&mut self, from: usize, to: usize, weight: u32) {
        self.adjacency[from].push(Edge { to, weight });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn declared(items: &[(&str, &str)]) -> Vec<(String, Arc<IndexLink>)> {
        items
            .iter()
            .map(|(source, text)| (source.to_string(), Arc::new(IndexLink::parse(text).unwrap())))
            .collect()
    }

    #[test]
    fn test_two_triangles_per_link() {
        let graph = RelationshipGraph::build(&declared(&[("posts", "user_id=<users>id")]));
        // two index vertices + two leg vertices
        assert_eq!(graph.vertex_count(), 4);
    }

    #[test]
    fn test_single_hop_path() {
        let graph = RelationshipGraph::build(&declared(&[("posts", "user_id=<users>id")]));
        let legs = graph.path("users", "posts").unwrap();
        assert_eq!(legs.len(), 1);
        assert!(!legs[0].is_reversed());
        assert_eq!(legs[0].oriented().to_string(), "user_id=<users>id");
        assert_eq!(legs[0].to_string(), "users:id");
    }

    #[test]
    fn test_multi_hop_path_outermost_first() {
        let graph = RelationshipGraph::build(&declared(&[
            ("posts", "user_id=<users>id"),
            ("users", "org_id=<orgs>id"),
        ]));
        let legs = graph.path("orgs", "posts").unwrap();
        let rendered: Vec<String> = legs.iter().map(|l| l.oriented().to_string()).collect();
        assert_eq!(rendered, vec!["user_id=<users>id", "org_id=<orgs>id"]);
    }

    #[test]
    fn test_reverse_walk_orients_links() {
        let graph = RelationshipGraph::build(&declared(&[("posts", "user_id=<users>id")]));
        let legs = graph.path("posts", "users").unwrap();
        assert_eq!(legs.len(), 1);
        assert!(legs[0].is_reversed());
        assert_eq!(legs[0].oriented().to_string(), "id=<posts>user_id");
    }

    #[test]
    fn test_same_index_is_empty_path() {
        let graph = RelationshipGraph::build(&declared(&[("posts", "user_id=<users>id")]));
        assert!(graph.path("posts", "posts").unwrap().is_empty());
    }

    #[test]
    fn test_no_path() {
        let graph = RelationshipGraph::build(&declared(&[
            ("posts", "user_id=<users>id"),
            ("tags", "group_id=<groups>id"),
        ]));
        assert!(graph.path("groups", "posts").is_err());
        assert!(graph.path("missing", "posts").is_err());
    }

    #[test]
    fn test_tie_break_first_declared_wins() {
        let graph = RelationshipGraph::build(&declared(&[
            ("posts", "user_id=<users>id"),
            ("posts", "editor_id=<users>id"),
        ]));
        let legs = graph.path("users", "posts").unwrap();
        assert_eq!(legs[0].declared().left_field(), "user_id");
    }
}
