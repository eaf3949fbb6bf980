//! KGT Translate - Knowledge-graph-enriched translation
//!
//! This crate turns the enrichment stages into a translation service:
//! - LLM clients (OpenAI-compatible incl. Groq and Azure, Ollama)
//! - Completion caching
//! - Prompt composition from the enriched knowledge graph
//! - The translation call and the end-to-end pipeline
//!
//! Author: hephaex@gmail.com

pub mod cache;
pub mod invoker;
pub mod llm;
pub mod pipeline;
pub mod prompt;

pub use cache::{CacheStats, CacheStatsReport, CachedLlmClient};
pub use invoker::TranslationInvoker;
pub use llm::{create_llm_client, OllamaClient, OpenAiClient};
pub use pipeline::{Enrichment, PipelineBackends, TranslationPipeline, TranslationReport};
pub use prompt::{ContextualPrompt, PromptBuilder, PromptComposer};

use kgt_core::{AppConfig, Result};
use tokio::sync::OnceCell;

static SHARED_PIPELINE: OnceCell<TranslationPipeline> = OnceCell::const_new();

/// Translate `source_text` with the configuration from the environment.
///
/// The pipeline (and its completion cache) is built by the first call that
/// succeeds in configuring it and reused by every later call. A
/// configuration error is not remembered, so the next call tries again.
/// Callers that need a different configuration build their own
/// [`TranslationPipeline`].
pub async fn translate(source_text: &str) -> Result<String> {
    let pipeline = SHARED_PIPELINE
        .get_or_try_init(|| async {
            let config = AppConfig::from_env()?;
            TranslationPipeline::from_config(&config)
        })
        .await?;

    pipeline.translate(source_text).await
}
