//! Graph Builder
//!
//! Runs the extraction strategies in order and keeps the first graph
//! produced. The capitalization heuristic is always the last resort, so
//! building a graph cannot fail.

use std::sync::Arc;

use kgt_core::{KgtError, Result};
use kgt_graph::KnowledgeGraph;

use crate::{ExtractionStrategy, GraphExtractor, HeuristicGraphExtractor};

/// Ordered list of strategies tried one after another
#[derive(Clone, Default)]
pub struct FallbackChain {
    strategies: Vec<Arc<dyn GraphExtractor>>,
}

impl FallbackChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a strategy; earlier strategies take precedence
    pub fn with(mut self, strategy: Arc<dyn GraphExtractor>) -> Self {
        self.strategies.push(strategy);
        self
    }

    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    /// Strategies in the order they will be tried
    pub fn strategies(&self) -> Vec<ExtractionStrategy> {
        self.strategies.iter().map(|s| s.strategy()).collect()
    }

    /// Try each strategy in turn; return the first success.
    ///
    /// Every error falls through to the next strategy. Errors a strategy is
    /// expected to produce (unavailable backend, malformed answer) are
    /// warnings; anything else is logged as an error before moving on.
    /// The error of the last strategy is returned when all of them fail.
    pub async fn run(&self, text: &str) -> Result<(KnowledgeGraph, ExtractionStrategy)> {
        let mut last_error =
            KgtError::AdapterUnavailable("no graph extraction strategy configured".to_string());

        for strategy in &self.strategies {
            match strategy.extract(text).await {
                Ok(graph) => return Ok((graph, strategy.strategy())),
                Err(e) if e.is_recoverable() => {
                    tracing::warn!(
                        strategy = %strategy.strategy(),
                        error = %e,
                        "Graph extraction strategy failed, falling through"
                    );
                    last_error = e;
                }
                Err(e) => {
                    tracing::error!(
                        strategy = %strategy.strategy(),
                        error = %e,
                        "Unexpected graph extraction error, falling through"
                    );
                    last_error = e;
                }
            }
        }

        Err(last_error)
    }
}

/// Graph plus the strategy that produced it
#[derive(Debug, Clone)]
pub struct BuildOutcome {
    pub graph: KnowledgeGraph,
    pub strategy: ExtractionStrategy,
}

/// Builds a knowledge graph from text
pub struct GraphBuilder {
    chain: FallbackChain,
    terminal: HeuristicGraphExtractor,
}

impl GraphBuilder {
    /// Builder over `chain`, terminated by the default heuristic
    pub fn new(chain: FallbackChain) -> Self {
        Self {
            chain,
            terminal: HeuristicGraphExtractor::new(),
        }
    }

    /// Replace the terminal heuristic (e.g. with a custom stoplist)
    pub fn with_terminal(mut self, terminal: HeuristicGraphExtractor) -> Self {
        self.terminal = terminal;
        self
    }

    /// Build the graph, whichever strategy succeeds
    pub async fn build(&self, text: &str) -> KnowledgeGraph {
        self.build_with_strategy(text).await.graph
    }

    /// Build the graph and report the strategy used
    pub async fn build_with_strategy(&self, text: &str) -> BuildOutcome {
        let outcome = match self.chain.run(text).await {
            Ok((graph, strategy)) => BuildOutcome { graph, strategy },
            Err(_) => BuildOutcome {
                graph: self.terminal.extract_graph(text),
                strategy: ExtractionStrategy::Heuristic,
            },
        };

        tracing::info!(
            strategy = %outcome.strategy,
            nodes = outcome.graph.node_count(),
            edges = outcome.graph.edge_count(),
            "Knowledge graph built"
        );

        outcome
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new(FallbackChain::new())
    }
}
