//! Graph snapshot export/import
//!
//! The JSON shape (`nodes` with id/type/gender, `relationships` with
//! source/target/type) is also what the LLM extraction prompt asks for, so
//! the same structure serves both directions. CSV export writes the same
//! records as two tables.

use kgt_core::Gender;
use serde::{Deserialize, Serialize};

use crate::{KnowledgeGraph, UNKNOWN_TYPE};

/// Serializable node record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotNode {
    #[serde(alias = "name", alias = "entity")]
    pub id: String,

    #[serde(rename = "type", alias = "entity_type", alias = "label", default = "unknown_type")]
    pub entity_type: String,

    #[serde(default, deserialize_with = "lenient_gender")]
    pub gender: Gender,
}

/// Serializable edge record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotRelation {
    #[serde(alias = "subject", alias = "from")]
    pub source: String,

    #[serde(alias = "object", alias = "to")]
    pub target: String,

    #[serde(rename = "type", alias = "label", alias = "relation", alias = "predicate", default)]
    pub label: String,
}

/// Flat, serializable view of a knowledge graph
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSnapshot {
    #[serde(default, alias = "entities")]
    pub nodes: Vec<SnapshotNode>,

    #[serde(default, alias = "edges", alias = "relations")]
    pub relationships: Vec<SnapshotRelation>,
}

fn unknown_type() -> String {
    UNKNOWN_TYPE.to_string()
}

fn lenient_gender<'de, D>(deserializer: D) -> Result<Gender, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let label: Option<String> = Option::deserialize(deserializer)?;
    Ok(label.map(|l| Gender::from_label(&l)).unwrap_or_default())
}

impl GraphSnapshot {
    /// Pretty-printed JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Nodes and relationships as two CSV tables, headers included
    pub fn to_csv(&self) -> csv::Result<(String, String)> {
        Ok((csv_table(&self.nodes)?, csv_table(&self.relationships)?))
    }

    /// Rebuild a graph. Genders carried in the snapshot are kept; edges
    /// pass through the graph's usual insertion invariants.
    pub fn into_graph(self) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();

        for node in &self.nodes {
            graph.add_node(&node.id, &node.entity_type);
        }
        for rel in &self.relationships {
            graph.add_edge(&rel.source, &rel.target, &rel.label);
        }

        let genders: Vec<(String, Gender)> = self
            .nodes
            .iter()
            .filter(|n| n.gender.is_known())
            .map(|n| (kgt_core::normalize_name(&n.id), n.gender))
            .collect();
        graph.update_genders(|key| {
            genders
                .iter()
                .find(|(k, _)| k == key)
                .map(|(_, gender)| *gender)
        });

        graph
    }
}

fn csv_table<T: Serialize>(records: &[T]) -> csv::Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in records {
        writer.serialize(record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    String::from_utf8(bytes)
        .map_err(|e| csv::Error::from(std::io::Error::new(std::io::ErrorKind::InvalidData, e)))
}

impl From<&KnowledgeGraph> for GraphSnapshot {
    fn from(graph: &KnowledgeGraph) -> Self {
        Self {
            nodes: graph
                .nodes()
                .map(|node| SnapshotNode {
                    id: node.name.clone(),
                    entity_type: node.entity_type.clone(),
                    gender: node.gender,
                })
                .collect(),
            relationships: graph
                .edges()
                .into_iter()
                .map(|edge| SnapshotRelation {
                    source: edge.source,
                    target: edge.target,
                    label: edge.label,
                })
                .collect(),
        }
    }
}
