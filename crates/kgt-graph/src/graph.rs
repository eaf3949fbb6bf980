//! Knowledge graph storage
//!
//! Typed entity nodes and labeled directed edges on top of a petgraph
//! `DiGraph`, with a normalized-name index for node identity.

use std::collections::HashMap;

use kgt_core::{normalize_name, Gender};
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

/// Type tag for entities without a known category
pub const UNKNOWN_TYPE: &str = "unknown";

/// Label for edges without a more specific relation
pub const RELATED_TO: &str = "related_to";

// ============================================================================
// Node and Edge Types
// ============================================================================

/// Entity node in the knowledge graph
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Display name (first occurrence wins)
    pub name: String,

    /// Entity category, e.g. person, organization, unknown
    pub entity_type: String,

    /// Gender attached by enrichment
    pub gender: Gender,
}

impl GraphNode {
    /// Normalized identity key
    pub fn key(&self) -> String {
        normalize_name(&self.name)
    }

    pub fn has_specific_type(&self) -> bool {
        self.entity_type != UNKNOWN_TYPE
    }
}

/// Directed relationship between two named nodes
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub label: String,
}

impl GraphEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            label: label.into(),
        }
    }
}

/// Normalize a type tag coming from any extractor
pub fn normalize_type(entity_type: &str) -> String {
    let cleaned = entity_type.trim().to_lowercase().replace([' ', '-'], "_");
    if cleaned.is_empty() || cleaned == "entity" {
        UNKNOWN_TYPE.to_string()
    } else {
        cleaned
    }
}

/// Normalize a relation label; empty labels become `related_to`
pub fn normalize_label(label: &str) -> String {
    let cleaned = label
        .trim()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
        .to_lowercase();
    if cleaned.is_empty() {
        RELATED_TO.to_string()
    } else {
        cleaned
    }
}

// ============================================================================
// Knowledge Graph
// ============================================================================

/// Set of typed entity nodes plus labeled directed edges.
///
/// Invariants enforced at insertion:
/// - node names are unique after normalization
/// - edges never connect a node to itself
/// - edge endpoints always exist (unknown endpoints are created with
///   type `unknown` and gender `unknown`)
/// - identical (source, target, label) edges are stored once
///
/// Nodes and edges iterate in insertion order.
#[derive(Debug, Clone, Default)]
pub struct KnowledgeGraph {
    graph: DiGraph<GraphNode, String>,
    index: HashMap<String, NodeIndex>,
}

impl KnowledgeGraph {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a node or merge it into an existing one.
    ///
    /// Returns `true` if a new node was created. When the name already
    /// exists the first occurrence wins, except that a node of type
    /// `unknown` is upgraded to the newly supplied specific type.
    pub fn add_node(&mut self, name: &str, entity_type: &str) -> bool {
        self.upsert(name, entity_type).map_or(false, |(_, created)| created)
    }

    /// Insert a directed edge.
    ///
    /// Returns `true` if the edge was stored. Self-loops, edges with an
    /// empty endpoint, and exact duplicates are dropped.
    pub fn add_edge(&mut self, source: &str, target: &str, label: &str) -> bool {
        let source_key = normalize_name(source);
        let target_key = normalize_name(target);

        if source_key.is_empty() || target_key.is_empty() {
            return false;
        }
        if source_key == target_key {
            tracing::trace!(node = %source, "Dropping self-loop edge");
            return false;
        }

        let Some((from, _)) = self.upsert(source, UNKNOWN_TYPE) else {
            return false;
        };
        let Some((to, _)) = self.upsert(target, UNKNOWN_TYPE) else {
            return false;
        };

        let label = normalize_label(label);
        let duplicate = self
            .graph
            .edges_connecting(from, to)
            .any(|edge| *edge.weight() == label);
        if duplicate {
            return false;
        }

        self.graph.add_edge(from, to, label);
        true
    }

    fn upsert(&mut self, name: &str, entity_type: &str) -> Option<(NodeIndex, bool)> {
        let key = normalize_name(name);
        if key.is_empty() {
            return None;
        }

        let entity_type = normalize_type(entity_type);

        if let Some(&idx) = self.index.get(&key) {
            let node = &mut self.graph[idx];
            if !node.has_specific_type() && entity_type != UNKNOWN_TYPE {
                node.entity_type = entity_type;
            }
            return Some((idx, false));
        }

        let idx = self.graph.add_node(GraphNode {
            name: display_name(name),
            entity_type,
            gender: Gender::Unknown,
        });
        self.index.insert(key, idx);
        Some((idx, true))
    }

    /// Look up a node by name (any casing)
    pub fn node(&self, name: &str) -> Option<&GraphNode> {
        self.index
            .get(&normalize_name(name))
            .map(|&idx| &self.graph[idx])
    }

    pub fn contains_node(&self, name: &str) -> bool {
        self.index.contains_key(&normalize_name(name))
    }

    /// Nodes in insertion order
    pub fn nodes(&self) -> impl Iterator<Item = &GraphNode> + '_ {
        self.graph.node_indices().map(move |idx| &self.graph[idx])
    }

    /// Edges in insertion order, endpoints as display names
    pub fn edges(&self) -> Vec<GraphEdge> {
        self.graph
            .edge_references()
            .map(|edge| {
                GraphEdge::new(
                    self.graph[edge.source()].name.clone(),
                    self.graph[edge.target()].name.clone(),
                    edge.weight().clone(),
                )
            })
            .collect()
    }

    /// Outgoing (target name, label) pairs of a node
    pub fn outgoing(&self, name: &str) -> Vec<(String, String)> {
        self.adjacent(name, Direction::Outgoing)
    }

    /// Incoming (source name, label) pairs of a node
    pub fn incoming(&self, name: &str) -> Vec<(String, String)> {
        self.adjacent(name, Direction::Incoming)
    }

    fn adjacent(&self, name: &str, direction: Direction) -> Vec<(String, String)> {
        let Some(&idx) = self.index.get(&normalize_name(name)) else {
            return Vec::new();
        };

        let mut pairs: Vec<(String, String)> = self
            .graph
            .edges_directed(idx, direction)
            .map(|edge| {
                let other = match direction {
                    Direction::Outgoing => edge.target(),
                    Direction::Incoming => edge.source(),
                };
                (self.graph[other].name.clone(), edge.weight().clone())
            })
            .collect();
        pairs.sort();
        pairs
    }

    /// Rewrite node genders in place.
    ///
    /// `lookup` receives each node's normalized key and returns the gender
    /// to set, or `None` to leave the node untouched. Structure is never
    /// changed. Returns the number of nodes whose gender changed.
    pub fn update_genders<F>(&mut self, mut lookup: F) -> usize
    where
        F: FnMut(&str) -> Option<Gender>,
    {
        let mut changed = 0;
        for (key, &idx) in &self.index {
            if let Some(gender) = lookup(key) {
                let node = &mut self.graph[idx];
                if node.gender != gender {
                    node.gender = gender;
                    changed += 1;
                }
            }
        }
        changed
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Underlying petgraph storage for analysis
    pub(crate) fn inner(&self) -> &DiGraph<GraphNode, String> {
        &self.graph
    }

    pub(crate) fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.index.get(&normalize_name(name)).copied()
    }
}

impl PartialEq for KnowledgeGraph {
    fn eq(&self, other: &Self) -> bool {
        self.nodes().eq(other.nodes()) && self.edges() == other.edges()
    }
}

impl Eq for KnowledgeGraph {}

/// Display form of a name: trimmed, possessive dropped, whitespace collapsed
fn display_name(name: &str) -> String {
    let trimmed = name.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '’');
    let stripped = trimmed
        .strip_suffix("'s")
        .or_else(|| trimmed.strip_suffix("’s"))
        .unwrap_or(trimmed)
        .trim_matches(|c: char| !c.is_alphanumeric());

    stripped.split_whitespace().collect::<Vec<_>>().join(" ")
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_node_identity_is_case_normalized() {
        let mut graph = KnowledgeGraph::new();
        assert!(graph.add_node("Kiran", "person"));
        assert!(!graph.add_node("KIRAN", "organization"));
        assert!(!graph.add_node("Kiran's", "person"));

        assert_eq!(graph.node_count(), 1);
        let node = graph.node("kiran").unwrap();
        assert_eq!(node.name, "Kiran");
        assert_eq!(node.entity_type, "person");
        assert_eq!(node.gender, Gender::Unknown);
    }

    #[test]
    fn test_unknown_type_is_upgraded() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node("Paris", "unknown");
        graph.add_node("Paris", "GPE");
        graph.add_node("Paris", "person");

        assert_eq!(graph.node("Paris").unwrap().entity_type, "gpe");
    }

    #[test]
    fn test_edge_creates_missing_endpoints() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node("Alice", "person");
        assert!(graph.add_edge("Alice", "Bob", "met"));

        let bob = graph.node("Bob").unwrap();
        assert_eq!(bob.entity_type, UNKNOWN_TYPE);
        assert_eq!(bob.gender, Gender::Unknown);
        assert_eq!(graph.edges(), vec![GraphEdge::new("Alice", "Bob", "met")]);
    }

    #[test]
    fn test_self_loops_rejected() {
        let mut graph = KnowledgeGraph::new();
        assert!(!graph.add_edge("Alice", "alice", "knows"));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 0);
    }

    #[test]
    fn test_parallel_edges_need_distinct_labels() {
        let mut graph = KnowledgeGraph::new();
        assert!(graph.add_edge("Sita", "Kiran", "teaches"));
        assert!(graph.add_edge("Sita", "Kiran", "likes"));
        assert!(!graph.add_edge("sita", "kiran", "teaches"));
        assert!(graph.add_edge("Kiran", "Sita", "teaches"));

        assert_eq!(graph.edge_count(), 3);
    }

    #[test]
    fn test_label_normalization() {
        let mut graph = KnowledgeGraph::new();
        graph.add_edge("A1", "B1", "");
        graph.add_edge("A1", "B1", "Works For");

        let labels: Vec<String> = graph.edges().into_iter().map(|e| e.label).collect();
        assert_eq!(labels, vec!["related_to", "works_for"]);
    }

    #[test]
    fn test_insertion_order_preserved() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node("Zed", "person");
        graph.add_node("Amy", "person");
        graph.add_edge("Zed", "Mia", "knows");

        let names: Vec<&str> = graph.nodes().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["Zed", "Amy", "Mia"]);
    }

    #[test]
    fn test_update_genders() {
        let mut graph = KnowledgeGraph::new();
        graph.add_node("Kiran", "person");
        graph.add_node("Delhi", "gpe");

        let changed = graph.update_genders(|key| (key == "kiran").then_some(Gender::Male));
        assert_eq!(changed, 1);
        assert_eq!(graph.node("Kiran").unwrap().gender, Gender::Male);
        assert_eq!(graph.node("Delhi").unwrap().gender, Gender::Unknown);

        let changed_again = graph.update_genders(|key| (key == "kiran").then_some(Gender::Male));
        assert_eq!(changed_again, 0);
    }

    #[test]
    fn test_adjacency() {
        let mut graph = KnowledgeGraph::new();
        graph.add_edge("Sita", "Kiran", "teaches");
        graph.add_edge("Ravi", "Kiran", "knows");

        assert_eq!(
            graph.incoming("kiran"),
            vec![
                ("Ravi".to_string(), "knows".to_string()),
                ("Sita".to_string(), "teaches".to_string())
            ]
        );
        assert_eq!(
            graph.outgoing("Sita"),
            vec![("Kiran".to_string(), "teaches".to_string())]
        );
        assert!(graph.outgoing("Nobody").is_empty());
    }

    proptest! {
        #[test]
        fn prop_no_self_loops(pairs in prop::collection::vec(("[A-Ca-c]{1,2}", "[A-Ca-c]{1,2}", "[a-z]{0,4}"), 0..40)) {
            let mut graph = KnowledgeGraph::new();
            for (s, t, l) in &pairs {
                graph.add_edge(s, t, l);
            }
            for edge in graph.edges() {
                prop_assert_ne!(normalize_name(&edge.source), normalize_name(&edge.target));
                prop_assert!(graph.contains_node(&edge.source));
                prop_assert!(graph.contains_node(&edge.target));
            }
        }
    }
}
