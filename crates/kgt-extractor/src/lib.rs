//! KGT Extractor - Context extraction pipeline
//!
//! Implements the enrichment stages that run before translation:
//! gender resolution over coreference clusters, knowledge graph
//! extraction through an ordered chain of strategies, and gender
//! enrichment of the resulting graph.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use kgt_core::{KgtError, Result};
use kgt_graph::KnowledgeGraph;
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod enrich;
pub mod gender;
pub mod heuristic;
pub mod llm;
pub mod remote;
pub mod syntactic;
pub mod text;

pub use builder::{BuildOutcome, FallbackChain, GraphBuilder};
pub use enrich::enrich;
pub use gender::{ClusterSignal, GenderResolver, PronounInference};
pub use heuristic::HeuristicGraphExtractor;
pub use llm::LlmGraphExtractor;
pub use remote::{RemoteClusterer, RemoteParser};
pub use syntactic::SyntacticGraphExtractor;

/// Which extraction strategy produced a graph
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStrategy {
    /// Structured extraction by the LLM backend
    LlmStructured,
    /// NER + dependency relations
    Syntactic,
    /// Capitalized-token heuristic
    Heuristic,
}

impl ExtractionStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LlmStructured => "llm_structured",
            Self::Syntactic => "syntactic",
            Self::Heuristic => "heuristic",
        }
    }
}

impl std::fmt::Display for ExtractionStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Trait for knowledge graph extraction strategies
#[async_trait]
pub trait GraphExtractor: Send + Sync {
    /// Extract a graph from text, or report why this strategy is unavailable
    async fn extract(&self, text: &str) -> Result<KnowledgeGraph>;

    /// Strategy identity for logging and reporting
    fn strategy(&self) -> ExtractionStrategy;
}

/// Run a backend call under a deadline.
///
/// Expiry is reported as [`KgtError::AdapterUnavailable`], the same as an
/// unreachable backend.
pub async fn guarded<T, F>(timeout: Duration, backend: &str, call: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(KgtError::AdapterUnavailable(format!(
            "{backend} timed out after {}ms",
            timeout.as_millis()
        ))),
    }
}

/// Slice the outermost JSON object out of an LLM completion.
///
/// Completions often wrap JSON in code fences or prose; everything
/// before the first `{` and after the last `}` is dropped.
pub(crate) fn json_object_slice(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_json_object_slice() {
        let response = "Here you go:\n```json\n{\"a\": {\"b\": 1}}\n```";
        assert_eq!(json_object_slice(response), Some("{\"a\": {\"b\": 1}}"));
        assert_eq!(json_object_slice("no json"), None);
        assert_eq!(json_object_slice("} {"), None);
    }

    #[tokio::test]
    async fn test_guarded_timeout_is_adapter_unavailable() {
        let slow = async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, KgtError>(1)
        };

        let err = guarded(Duration::from_millis(10), "slow-backend", slow)
            .await
            .unwrap_err();
        assert!(matches!(err, KgtError::AdapterUnavailable(msg) if msg.contains("slow-backend")));
    }

    #[tokio::test]
    async fn test_guarded_passes_through() {
        let value = guarded(Duration::from_secs(1), "fast", async { Ok::<_, KgtError>(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
    }
}
