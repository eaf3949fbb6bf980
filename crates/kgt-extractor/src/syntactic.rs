//! Syntactic extraction
//!
//! Builds the graph from the NER/dependency backend: named entities
//! become typed nodes, and within each sentence consecutive entities are
//! linked. The edge label is the backend relation connecting their spans
//! when one exists, otherwise the verb phrase between them in the text,
//! otherwise `related_to`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kgt_core::{KgtError, ParsedEntity, ParsedText, Result, SyntacticParser};
use kgt_graph::{KnowledgeGraph, RELATED_TO};

use crate::text::{connecting_phrase, sentence_of, sentences};
use crate::{guarded, ExtractionStrategy, GraphExtractor};

/// Graph extractor backed by an NER/dependency parser
pub struct SyntacticGraphExtractor {
    parser: Arc<dyn SyntacticParser>,
    timeout: Duration,
}

impl SyntacticGraphExtractor {
    pub fn new(parser: Arc<dyn SyntacticParser>, timeout: Duration) -> Self {
        Self { parser, timeout }
    }

    /// Turn a parse into a graph.
    ///
    /// Fails with `MalformedResponse` when an entity span does not fit the
    /// text it was supposedly extracted from.
    pub fn graph_from_parse(text: &str, parsed: &ParsedText) -> Result<KnowledgeGraph> {
        let mut entities: Vec<&ParsedEntity> = parsed.entities.iter().collect();
        for entity in &entities {
            if entity.span.start > entity.span.end || entity.span.end > text.len() {
                return Err(KgtError::MalformedResponse(format!(
                    "entity '{}' span {}..{} outside text of length {}",
                    entity.text,
                    entity.span.start,
                    entity.span.end,
                    text.len()
                )));
            }
        }
        entities.sort_by_key(|e| (e.span.start, e.span.end));

        let mut graph = KnowledgeGraph::new();
        for entity in &entities {
            graph.add_node(&entity.text, &entity.label);
        }

        let sentence_spans = sentences(text);
        let mut by_sentence: Vec<Vec<&ParsedEntity>> = vec![Vec::new(); sentence_spans.len()];
        for entity in &entities {
            if let Some(idx) = sentence_of(&sentence_spans, entity.span.start) {
                by_sentence[idx].push(entity);
            }
        }

        for members in &by_sentence {
            for pair in members.windows(2) {
                let label = Self::connecting_label(text, parsed, pair[0], pair[1]);
                graph.add_edge(&pair[0].text, &pair[1].text, &label);
            }
        }

        Ok(graph)
    }

    /// Edge label for two consecutive entities of one sentence
    fn connecting_label(
        text: &str,
        parsed: &ParsedText,
        first: &ParsedEntity,
        second: &ParsedEntity,
    ) -> String {
        let from_backend = parsed
            .relations
            .iter()
            .find(|rel| {
                (rel.source.overlaps(&first.span) && rel.target.overlaps(&second.span))
                    || (rel.source.overlaps(&second.span) && rel.target.overlaps(&first.span))
            })
            .map(|rel| rel.label.trim())
            .filter(|label| !label.is_empty());

        if let Some(label) = from_backend {
            return label.to_string();
        }

        text.get(first.span.end..second.span.start)
            .and_then(connecting_phrase)
            .unwrap_or_else(|| RELATED_TO.to_string())
    }
}

#[async_trait]
impl GraphExtractor for SyntacticGraphExtractor {
    async fn extract(&self, text: &str) -> Result<KnowledgeGraph> {
        let parsed = guarded(self.timeout, self.parser.name(), self.parser.parse(text)).await?;
        tracing::debug!(
            entities = parsed.entities.len(),
            relations = parsed.relations.len(),
            "Syntactic backend returned parse"
        );
        Self::graph_from_parse(text, &parsed)
    }

    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Syntactic
    }
}
