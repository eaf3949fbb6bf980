//! LLM-structured graph extraction
//!
//! First strategy of the chain: the LLM is asked for nodes and
//! relationships as JSON. Any backend error, timeout or unusable answer
//! makes the strategy unavailable; there is no retry.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kgt_core::{normalize_name, KgtError, LlmClient, Result};
use kgt_graph::{GraphSnapshot, KnowledgeGraph};

use crate::{guarded, json_object_slice, ExtractionStrategy, GraphExtractor};

/// Graph extractor that asks the LLM for a structured graph
pub struct LlmGraphExtractor {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl LlmGraphExtractor {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Build the extraction prompt
    pub fn build_prompt(text: &str) -> String {
        format!(
            r#"Extract the entities and the relationships between them from the text below.

Return ONLY a JSON object of this exact form:
{{"nodes": [{{"id": "entity name as written in the text", "type": "person|organization|location|object|concept"}}],
 "relationships": [{{"source": "entity id", "target": "entity id", "type": "RELATIONSHIP_TYPE"}}]}}

Rules:
- Use each entity's name exactly as it appears in the text.
- Do not include pronouns as entities.
- Relationships must connect two different entities listed in "nodes".

Text:
{text}"#
        )
    }

    /// Parse an LLM completion into a graph.
    ///
    /// Nodes are inserted in order of first appearance in `text` so the
    /// result does not depend on the order the LLM listed them in. Genders
    /// in the answer are ignored.
    pub fn parse_response(text: &str, response: &str) -> Result<KnowledgeGraph> {
        let json = json_object_slice(response).ok_or_else(|| {
            KgtError::MalformedResponse("no JSON object in graph extraction answer".to_string())
        })?;

        let mut snapshot: GraphSnapshot = serde_json::from_str(json)
            .map_err(|e| KgtError::MalformedResponse(format!("graph JSON: {e}")))?;

        if snapshot.nodes.is_empty() && snapshot.relationships.is_empty() {
            return Err(KgtError::MalformedResponse(
                "graph extraction answer has no nodes or relationships".to_string(),
            ));
        }

        let lowered = text.to_lowercase();
        let position = |name: &str| {
            let key = normalize_name(name);
            if key.is_empty() {
                usize::MAX
            } else {
                lowered.find(&key).unwrap_or(usize::MAX)
            }
        };

        snapshot.nodes.sort_by_key(|node| position(&node.id));
        snapshot
            .relationships
            .sort_by_key(|rel| position(&rel.source));

        let mut graph = KnowledgeGraph::new();
        for node in &snapshot.nodes {
            graph.add_node(&node.id, &node.entity_type);
        }
        for rel in &snapshot.relationships {
            graph.add_edge(&rel.source, &rel.target, &rel.label);
        }

        if graph.is_empty() {
            return Err(KgtError::MalformedResponse(
                "graph extraction answer named no usable entities".to_string(),
            ));
        }

        Ok(graph)
    }
}

#[async_trait]
impl GraphExtractor for LlmGraphExtractor {
    async fn extract(&self, text: &str) -> Result<KnowledgeGraph> {
        let prompt = Self::build_prompt(text);
        let response = guarded(self.timeout, self.llm.name(), self.llm.generate(&prompt)).await?;

        if response.trim().is_empty() {
            return Err(KgtError::AdapterUnavailable(format!(
                "{} returned an empty completion",
                self.llm.name()
            )));
        }

        let graph = Self::parse_response(text, &response)?;
        tracing::debug!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "LLM graph extraction parsed"
        );
        Ok(graph)
    }

    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::LlmStructured
    }
}
