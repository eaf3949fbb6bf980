//! KGT Graph - Knowledge graph model
//!
//! In-memory knowledge graph built from extracted entities and
//! relationships, plus structural analysis and JSON snapshots.

pub mod analysis;
pub mod graph;
pub mod snapshot;

pub use analysis::{GraphAnalyzer, GraphMetrics, Neighbors, NodeCentrality};
pub use graph::{
    normalize_label, normalize_type, GraphEdge, GraphNode, KnowledgeGraph, RELATED_TO,
    UNKNOWN_TYPE,
};
pub use snapshot::{GraphSnapshot, SnapshotNode, SnapshotRelation};
