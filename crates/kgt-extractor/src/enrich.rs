//! Graph enrichment
//!
//! Copies resolved genders onto graph nodes, matching on normalized names.

use kgt_core::EntityGender;
use kgt_graph::KnowledgeGraph;

/// Set the gender of every node whose name appears in `genders`.
///
/// Nodes without a match keep their gender and the structure of the graph
/// is never touched, so applying the same mapping twice changes nothing.
/// Returns the number of nodes whose gender changed.
pub fn enrich(graph: &mut KnowledgeGraph, genders: &EntityGender) -> usize {
    let changed = graph.update_genders(|key| genders.get_normalized(key));
    tracing::debug!(changed, entries = genders.len(), "Graph enriched with genders");
    changed
}
