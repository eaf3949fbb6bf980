//! Capitalization heuristic extraction
//!
//! Terminal fallback of the graph chain. Every capitalized word that is
//! neither a pronoun nor on the stoplist becomes an `unknown`-typed node,
//! and consecutive candidates in the same sentence are joined by
//! `related_to`. No external dependency, so it cannot fail.

use std::collections::HashSet;

use async_trait::async_trait;
use kgt_core::{config::default_stoplist, Result};
use kgt_graph::{KnowledgeGraph, RELATED_TO, UNKNOWN_TYPE};

use crate::text::{capitalized_tokens, stoplist_set};
use crate::{ExtractionStrategy, GraphExtractor};

/// Heuristic extractor based on English capitalization
#[derive(Debug, Clone)]
pub struct HeuristicGraphExtractor {
    stoplist: HashSet<String>,
}

impl HeuristicGraphExtractor {
    /// Create with the default stoplist
    pub fn new() -> Self {
        Self::with_stoplist(&default_stoplist())
    }

    /// Create with a custom stoplist (matched case-insensitively)
    pub fn with_stoplist<S: AsRef<str>>(words: &[S]) -> Self {
        Self {
            stoplist: stoplist_set(words),
        }
    }

    pub fn stoplist(&self) -> &HashSet<String> {
        &self.stoplist
    }

    /// Build the graph; infallible
    pub fn extract_graph(&self, text: &str) -> KnowledgeGraph {
        let mut graph = KnowledgeGraph::new();
        let candidates = capitalized_tokens(text, &self.stoplist);

        for token in &candidates {
            graph.add_node(token.text, UNKNOWN_TYPE);
        }

        for pair in candidates.windows(2) {
            if pair[0].sentence == pair[1].sentence {
                graph.add_edge(pair[0].text, pair[1].text, RELATED_TO);
            }
        }

        graph
    }
}

impl Default for HeuristicGraphExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GraphExtractor for HeuristicGraphExtractor {
    async fn extract(&self, text: &str) -> Result<KnowledgeGraph> {
        Ok(self.extract_graph(text))
    }

    fn strategy(&self) -> ExtractionStrategy {
        ExtractionStrategy::Heuristic
    }
}
