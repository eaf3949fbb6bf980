//! Graph analysis
//!
//! Structural metrics over a [`KnowledgeGraph`]: counts, density, weak
//! connectivity, centrality rankings, neighbourhoods and shortest paths.
//!
//! Parallel edges (same ordered pair, different labels) count once for
//! every measure except the raw `edge_count`.

use std::collections::VecDeque;

use petgraph::algo::astar;
use petgraph::graph::NodeIndex;
use petgraph::unionfind::UnionFind;
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::KnowledgeGraph;

/// Summary metrics for a graph
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphMetrics {
    pub node_count: usize,
    /// Labeled edges, parallel edges included
    pub edge_count: usize,
    /// Directed density over distinct ordered pairs: p / (n * (n - 1))
    pub density: f64,
    pub is_weakly_connected: bool,
    pub component_count: usize,
    /// Longest shortest path; only defined when every node reaches every other
    pub diameter: Option<usize>,
}

/// Centrality scores of one node.
///
/// Degree scores are normalized by `n - 1`, betweenness by
/// `(n - 1) * (n - 2)`; closeness measures inward distance, scaled by the
/// share of the graph that can reach the node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeCentrality {
    pub name: String,
    pub entity_type: String,
    pub in_degree: f64,
    pub out_degree: f64,
    pub degree: f64,
    pub betweenness: f64,
    pub closeness: f64,
    /// degree + betweenness + closeness
    pub total: f64,
}

/// Labeled neighbours of a node
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Neighbors {
    /// (source, label) of incoming edges
    pub incoming: Vec<(String, String)>,
    /// (target, label) of outgoing edges
    pub outgoing: Vec<(String, String)>,
}

/// Distinct successors and predecessors per node index, ascending
struct Adjacency {
    out: Vec<Vec<usize>>,
    inc: Vec<Vec<usize>>,
}

impl Adjacency {
    fn of(graph: &KnowledgeGraph) -> Self {
        let inner = graph.inner();
        let n = inner.node_count();
        let mut out = vec![Vec::new(); n];
        let mut inc = vec![Vec::new(); n];

        for edge in inner.edge_references() {
            out[edge.source().index()].push(edge.target().index());
            inc[edge.target().index()].push(edge.source().index());
        }
        for list in out.iter_mut().chain(inc.iter_mut()) {
            list.sort_unstable();
            list.dedup();
        }

        Self { out, inc }
    }

    fn len(&self) -> usize {
        self.out.len()
    }

    fn pair_count(&self) -> usize {
        self.out.iter().map(Vec::len).sum()
    }
}

/// Hop distances from `start` following `next`; `None` for unreachable nodes
fn bfs_distances(next: &[Vec<usize>], start: usize) -> Vec<Option<usize>> {
    let mut dist = vec![None; next.len()];
    dist[start] = Some(0);
    let mut queue = VecDeque::from([start]);

    while let Some(v) = queue.pop_front() {
        let d = dist[v].unwrap_or_default();
        for &w in &next[v] {
            if dist[w].is_none() {
                dist[w] = Some(d + 1);
                queue.push_back(w);
            }
        }
    }
    dist
}

/// Brandes' algorithm over unweighted directed edges, unnormalized
fn betweenness_raw(adj: &Adjacency) -> Vec<f64> {
    let n = adj.len();
    let mut scores = vec![0.0; n];

    for s in 0..n {
        let mut order = Vec::with_capacity(n);
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut sigma = vec![0.0_f64; n];
        let mut dist: Vec<Option<usize>> = vec![None; n];
        sigma[s] = 1.0;
        dist[s] = Some(0);

        let mut queue = VecDeque::from([s]);
        while let Some(v) = queue.pop_front() {
            order.push(v);
            let dv = dist[v].unwrap_or_default();
            for &w in &adj.out[v] {
                if dist[w].is_none() {
                    dist[w] = Some(dv + 1);
                    queue.push_back(w);
                }
                if dist[w] == Some(dv + 1) {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        let mut delta = vec![0.0_f64; n];
        while let Some(w) = order.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                scores[w] += delta[w];
            }
        }
    }

    scores
}

/// Read-only analyzer over a knowledge graph
pub struct GraphAnalyzer<'a> {
    graph: &'a KnowledgeGraph,
}

impl<'a> GraphAnalyzer<'a> {
    pub fn new(graph: &'a KnowledgeGraph) -> Self {
        Self { graph }
    }

    /// Compute summary metrics
    pub fn metrics(&self) -> GraphMetrics {
        let adj = Adjacency::of(self.graph);
        let n = adj.len();

        let density = if n > 1 {
            adj.pair_count() as f64 / (n as f64 * (n as f64 - 1.0))
        } else {
            0.0
        };

        let component_count = self.components().len();
        let is_weakly_connected = component_count == 1;
        let diameter = if is_weakly_connected {
            Self::diameter(&adj)
        } else {
            None
        };

        GraphMetrics {
            node_count: n,
            edge_count: self.graph.edge_count(),
            density,
            is_weakly_connected,
            component_count,
            diameter,
        }
    }

    fn diameter(adj: &Adjacency) -> Option<usize> {
        let mut longest = 0;
        for start in 0..adj.len() {
            for dist in bfs_distances(&adj.out, start) {
                longest = longest.max(dist?);
            }
        }
        Some(longest)
    }

    /// Weakly connected components.
    ///
    /// Components are ordered by their earliest node; names inside a
    /// component keep insertion order.
    pub fn components(&self) -> Vec<Vec<String>> {
        let inner = self.graph.inner();
        let mut sets = UnionFind::<usize>::new(inner.node_count());

        for edge in inner.edge_references() {
            sets.union(edge.source().index(), edge.target().index());
        }

        let mut components: Vec<(usize, Vec<String>)> = Vec::new();
        for idx in inner.node_indices() {
            let root = sets.find(idx.index());
            let name = inner[idx].name.clone();
            match components.iter_mut().find(|(r, _)| *r == root) {
                Some((_, members)) => members.push(name),
                None => components.push((root, vec![name])),
            }
        }

        components.into_iter().map(|(_, members)| members).collect()
    }

    /// Degree, betweenness and closeness for every node, highest total first
    pub fn centrality(&self) -> Vec<NodeCentrality> {
        let inner = self.graph.inner();
        let adj = Adjacency::of(self.graph);
        let n = adj.len();

        let degree_scale = if n > 1 { 1.0 / (n as f64 - 1.0) } else { 0.0 };
        let between_scale = if n > 2 {
            1.0 / ((n as f64 - 1.0) * (n as f64 - 2.0))
        } else {
            1.0
        };
        let betweenness = betweenness_raw(&adj);

        let mut scores: Vec<NodeCentrality> = inner
            .node_indices()
            .map(|idx| {
                let i = idx.index();
                let in_degree = adj.inc[i].len() as f64 * degree_scale;
                let out_degree = adj.out[i].len() as f64 * degree_scale;
                let degree = in_degree + out_degree;
                let betweenness = betweenness[i] * between_scale;
                let closeness = Self::closeness(&adj, i);

                NodeCentrality {
                    name: inner[idx].name.clone(),
                    entity_type: inner[idx].entity_type.clone(),
                    in_degree,
                    out_degree,
                    degree,
                    betweenness,
                    closeness,
                    total: degree + betweenness + closeness,
                }
            })
            .collect();

        scores.sort_by(|a, b| {
            b.total
                .partial_cmp(&a.total)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        });
        scores
    }

    fn closeness(adj: &Adjacency, node: usize) -> f64 {
        let n = adj.len();
        let reached: Vec<usize> = bfs_distances(&adj.inc, node)
            .into_iter()
            .flatten()
            .collect();
        let total: usize = reached.iter().sum();

        if total == 0 || n < 2 {
            return 0.0;
        }
        let others = (reached.len() - 1) as f64;
        (others / total as f64) * (others / (n as f64 - 1.0))
    }

    /// Incoming and outgoing neighbours with edge labels
    pub fn neighbors(&self, name: &str) -> Neighbors {
        Neighbors {
            incoming: self.graph.incoming(name),
            outgoing: self.graph.outgoing(name),
        }
    }

    /// Shortest directed path between two entities, by hop count
    pub fn shortest_path(&self, source: &str, target: &str) -> Option<Vec<String>> {
        let inner = self.graph.inner();
        let start = self.graph.index_of(source)?;
        let goal = self.graph.index_of(target)?;

        let (_, path) = astar(inner, start, |n| n == goal, |_| 1usize, |_| 0)?;
        Some(path.into_iter().map(|idx| inner[idx].name.clone()).collect())
    }

    /// Every shortest directed path between two entities.
    ///
    /// Empty when either entity is missing or the target is unreachable.
    pub fn all_shortest_paths(&self, source: &str, target: &str) -> Vec<Vec<String>> {
        let (Some(start), Some(goal)) = (self.graph.index_of(source), self.graph.index_of(target))
        else {
            return Vec::new();
        };
        let (start, goal) = (start.index(), goal.index());

        let adj = Adjacency::of(self.graph);
        let dist = bfs_distances(&adj.out, start);
        if dist[goal].is_none() {
            return Vec::new();
        }

        // Walk back from the goal over predecessors one hop closer to the start
        let inner = self.graph.inner();
        let mut paths = Vec::new();
        let mut stack = vec![(goal, vec![goal])];
        while let Some((node, path)) = stack.pop() {
            if node == start {
                paths.push(
                    path.iter()
                        .rev()
                        .map(|&i| inner[NodeIndex::new(i)].name.clone())
                        .collect(),
                );
                continue;
            }
            let Some(d) = dist[node] else { continue };
            for &prev in adj.inc[node].iter().rev() {
                if dist[prev].is_some_and(|p| p + 1 == d) {
                    let mut next = path.clone();
                    next.push(prev);
                    stack.push((prev, next));
                }
            }
        }

        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_graph() -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        graph.add_node("Sita", "person");
        graph.add_node("Kiran", "person");
        graph.add_edge("Sita", "Kiran", "teaches");
        graph.add_edge("Kiran", "School", "attends");
        graph.add_node("Paris", "gpe");
        graph
    }

    fn names(paths: &[&[&str]]) -> Vec<Vec<String>> {
        paths
            .iter()
            .map(|p| p.iter().map(|s| s.to_string()).collect())
            .collect()
    }

    #[test]
    fn test_metrics() {
        let graph = sample_graph();
        let metrics = GraphAnalyzer::new(&graph).metrics();

        assert_eq!(metrics.node_count, 4);
        assert_eq!(metrics.edge_count, 2);
        assert!((metrics.density - 2.0 / 12.0).abs() < 1e-9);
        assert!(!metrics.is_weakly_connected);
        assert_eq!(metrics.component_count, 2);
        assert_eq!(metrics.diameter, None);
    }

    #[test]
    fn test_parallel_edges_count_once() {
        let mut graph = KnowledgeGraph::new();
        graph.add_edge("Sita", "Kiran", "teaches");
        graph.add_edge("Sita", "Kiran", "likes");
        graph.add_edge("Sita", "Kiran", "knows");
        let analyzer = GraphAnalyzer::new(&graph);

        let metrics = analyzer.metrics();
        assert_eq!(metrics.edge_count, 3);
        assert!((metrics.density - 0.5).abs() < 1e-9);

        let scores = analyzer.centrality();
        let sita = scores.iter().find(|s| s.name == "Sita").unwrap();
        assert!((sita.out_degree - 1.0).abs() < 1e-9);
        assert!((sita.degree - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_diameter_needs_mutual_reachability() {
        let mut graph = KnowledgeGraph::new();
        graph.add_edge("A", "B", "next");
        graph.add_edge("B", "C", "next");
        assert_eq!(GraphAnalyzer::new(&graph).metrics().diameter, None);

        graph.add_edge("C", "A", "next");
        let metrics = GraphAnalyzer::new(&graph).metrics();
        assert!(metrics.is_weakly_connected);
        assert_eq!(metrics.diameter, Some(2));
    }

    #[test]
    fn test_empty_graph_metrics() {
        let graph = KnowledgeGraph::new();
        let metrics = GraphAnalyzer::new(&graph).metrics();

        assert_eq!(metrics.node_count, 0);
        assert_eq!(metrics.density, 0.0);
        assert!(!metrics.is_weakly_connected);
        assert!(GraphAnalyzer::new(&graph).centrality().is_empty());
    }

    #[test]
    fn test_components_keep_insertion_order() {
        let graph = sample_graph();
        let components = GraphAnalyzer::new(&graph).components();

        assert_eq!(
            components,
            vec![
                vec!["Sita".to_string(), "Kiran".to_string(), "School".to_string()],
                vec!["Paris".to_string()],
            ]
        );
    }

    #[test]
    fn test_centrality_ranks_by_total() {
        let graph = sample_graph();
        let scores = GraphAnalyzer::new(&graph).centrality();

        let order: Vec<&str> = scores.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(order, vec!["Kiran", "School", "Sita", "Paris"]);

        let kiran = &scores[0];
        assert!((kiran.degree - 2.0 / 3.0).abs() < 1e-9);
        assert!((kiran.betweenness - 1.0 / 6.0).abs() < 1e-9);
        assert!((kiran.closeness - 1.0 / 3.0).abs() < 1e-9);
        assert!((kiran.total - 7.0 / 6.0).abs() < 1e-9);

        let school = &scores[1];
        assert_eq!(school.betweenness, 0.0);
        assert!((school.closeness - 4.0 / 9.0).abs() < 1e-9);

        assert_eq!(scores[3].total, 0.0);
    }

    #[test]
    fn test_shortest_path() {
        let graph = sample_graph();
        let analyzer = GraphAnalyzer::new(&graph);

        assert_eq!(
            analyzer.shortest_path("sita", "school"),
            Some(vec![
                "Sita".to_string(),
                "Kiran".to_string(),
                "School".to_string()
            ])
        );
        assert_eq!(analyzer.shortest_path("School", "Sita"), None);
        assert_eq!(analyzer.shortest_path("Sita", "Nobody"), None);
    }

    #[test]
    fn test_all_shortest_paths() {
        let mut graph = KnowledgeGraph::new();
        graph.add_edge("Ravi", "Anu", "knows");
        graph.add_edge("Ravi", "Meera", "knows");
        graph.add_edge("Anu", "Delhi", "visited");
        graph.add_edge("Meera", "Delhi", "visited");
        graph.add_edge("Ravi", "Goa", "visited");
        graph.add_edge("Goa", "Pune", "near");
        graph.add_edge("Pune", "Delhi", "near");
        let analyzer = GraphAnalyzer::new(&graph);

        assert_eq!(
            analyzer.all_shortest_paths("Ravi", "Delhi"),
            names(&[&["Ravi", "Anu", "Delhi"], &["Ravi", "Meera", "Delhi"]])
        );
        assert_eq!(analyzer.all_shortest_paths("ravi", "ravi"), names(&[&["Ravi"]]));
        assert!(analyzer.all_shortest_paths("Delhi", "Ravi").is_empty());
        assert!(analyzer.all_shortest_paths("Ravi", "Nobody").is_empty());
    }

    #[test]
    fn test_neighbors() {
        let graph = sample_graph();
        let neighbors = GraphAnalyzer::new(&graph).neighbors("Kiran");

        assert_eq!(
            neighbors.incoming,
            vec![("Sita".to_string(), "teaches".to_string())]
        );
        assert_eq!(
            neighbors.outgoing,
            vec![("School".to_string(), "attends".to_string())]
        );
    }
}
