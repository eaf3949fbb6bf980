//! Translation invoker
//!
//! Sends a finished prompt to the LLM backend. This is the one call in the
//! pipeline with no fallback: any failure surfaces as `TranslationFailed`.

use std::sync::Arc;
use std::time::Duration;

use kgt_core::{KgtError, LlmClient, Result};

use crate::prompt::ContextualPrompt;

pub struct TranslationInvoker {
    llm: Arc<dyn LlmClient>,
    timeout: Duration,
}

impl TranslationInvoker {
    pub fn new(llm: Arc<dyn LlmClient>, timeout: Duration) -> Self {
        Self { llm, timeout }
    }

    /// Translate using a composed contextual prompt
    pub async fn invoke(&self, prompt: &ContextualPrompt) -> Result<String> {
        self.send(prompt.as_str()).await
    }

    /// Send any prompt string (used for the context-free comparison run)
    pub async fn send(&self, prompt: &str) -> Result<String> {
        let started = std::time::Instant::now();
        tracing::info!(
            backend = self.llm.name(),
            prompt_chars = prompt.len(),
            "Calling translation backend"
        );

        let completion = match tokio::time::timeout(self.timeout, self.llm.generate(prompt)).await
        {
            Ok(Ok(completion)) => completion,
            Ok(Err(e)) => return Err(KgtError::TranslationFailed(e.to_string())),
            Err(_) => {
                return Err(KgtError::TranslationFailed(format!(
                    "{} timed out after {}ms",
                    self.llm.name(),
                    self.timeout.as_millis()
                )))
            }
        };

        let translation = completion.trim();
        if translation.is_empty() {
            return Err(KgtError::TranslationFailed(
                "backend returned an empty translation".to_string(),
            ));
        }

        tracing::info!(
            chars = translation.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Translation received"
        );
        Ok(translation.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PromptComposer;
    use async_trait::async_trait;
    use kgt_core::UnavailableBackend;
    use kgt_graph::KnowledgeGraph;

    struct Echo(&'static str);

    #[async_trait]
    impl LlmClient for Echo {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    struct Stalled;

    #[async_trait]
    impl LlmClient for Stalled {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    fn prompt() -> ContextualPrompt {
        PromptComposer::default().compose("Hello.", &KnowledgeGraph::new())
    }

    #[tokio::test]
    async fn test_translation_is_trimmed() {
        let invoker = TranslationInvoker::new(Arc::new(Echo("  नमस्ते \n")), Duration::from_secs(1));
        assert_eq!(invoker.invoke(&prompt()).await.unwrap(), "नमस्ते");
    }

    #[tokio::test]
    async fn test_failures_become_translation_failed() {
        let cases: Vec<Arc<dyn LlmClient>> = vec![
            Arc::new(UnavailableBackend::new("down")),
            Arc::new(Echo("   ")),
            Arc::new(Stalled),
        ];

        for llm in cases {
            let invoker = TranslationInvoker::new(llm, Duration::from_millis(50));
            assert!(matches!(
                invoker.invoke(&prompt()).await,
                Err(KgtError::TranslationFailed(_))
            ));
        }
    }
}
