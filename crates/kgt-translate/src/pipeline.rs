//! Translation pipeline
//!
//! text → gender resolution → graph building → enrichment → prompt
//! composition → translation. Stages run in sequence for one text; the
//! pipeline holds no per-run state, so one instance can serve concurrent
//! calls.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use kgt_core::{
    AppConfig, EntityGender, GenderEntry, LlmClient, MentionClusterer, PipelineConfig, Result,
    SyntacticParser, UnavailableBackend,
};
use kgt_extractor::{
    enrich, ExtractionStrategy, FallbackChain, GenderResolver, GraphBuilder,
    HeuristicGraphExtractor, LlmGraphExtractor, RemoteClusterer, RemoteParser,
    SyntacticGraphExtractor,
};
use kgt_graph::{GraphSnapshot, KnowledgeGraph};
use serde::Serialize;

use crate::cache::CachedLlmClient;
use crate::invoker::TranslationInvoker;
use crate::llm::create_llm_client;
use crate::prompt::{ContextualPrompt, PromptComposer};

// ============================================================================
// Backends
// ============================================================================

/// External collaborators of one pipeline
#[derive(Clone)]
pub struct PipelineBackends {
    pub llm: Arc<dyn LlmClient>,
    pub clusterer: Arc<dyn MentionClusterer>,
    pub parser: Arc<dyn SyntacticParser>,
}

impl PipelineBackends {
    /// Only an LLM; coreference and NER report themselves unavailable
    pub fn llm_only(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            clusterer: Arc::new(UnavailableBackend::new("no coreference service configured")),
            parser: Arc::new(UnavailableBackend::new("no NER service configured")),
        }
    }

    /// Every backend unavailable; only the capitalization heuristic runs
    pub fn offline() -> Self {
        Self::llm_only(Arc::new(UnavailableBackend::new("no LLM configured")))
    }

    /// Build real clients from configuration.
    ///
    /// Services without a URL are wired as unavailable so their strategy
    /// falls through immediately.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let timeout = Duration::from_secs(config.backends.timeout_secs);

        let mut llm = create_llm_client(&config.llm)?;
        if config.cache.enabled {
            llm = Arc::new(CachedLlmClient::new(llm, &config.cache)) as Arc<dyn LlmClient>;
        }

        let clusterer: Arc<dyn MentionClusterer> = match &config.backends.coref_url {
            Some(url) => Arc::new(RemoteClusterer::new(url.clone(), timeout)?),
            None => Arc::new(UnavailableBackend::new("no coreference service configured")),
        };

        let parser: Arc<dyn SyntacticParser> = match &config.backends.parser_url {
            Some(url) => Arc::new(RemoteParser::new(url.clone(), timeout)?),
            None => Arc::new(UnavailableBackend::new("no NER service configured")),
        };

        Ok(Self {
            llm,
            clusterer,
            parser,
        })
    }
}

// ============================================================================
// Results
// ============================================================================

/// Output of the enrichment stages, before any translation call
#[derive(Debug, Clone)]
pub struct Enrichment {
    pub genders: EntityGender,
    pub graph: KnowledgeGraph,
    pub strategy: ExtractionStrategy,
}

/// Everything one translation run produced
#[derive(Debug, Clone, Serialize)]
pub struct TranslationReport {
    pub source_text: String,
    pub target_language: String,
    pub genders: Vec<GenderEntry>,
    pub graph: GraphSnapshot,
    pub strategy: ExtractionStrategy,
    pub prompt: String,
    pub translation: String,
    pub processing_time_ms: u64,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Pipeline
// ============================================================================

/// Knowledge-graph-enriched translation pipeline
pub struct TranslationPipeline {
    resolver: GenderResolver,
    builder: GraphBuilder,
    composer: PromptComposer,
    invoker: TranslationInvoker,
}

impl TranslationPipeline {
    /// Wire the pipeline.
    ///
    /// `backend_timeout` bounds every enrichment call (coreference, NER and
    /// LLM extraction); `translation_timeout` bounds the final call.
    pub fn new(
        backends: PipelineBackends,
        config: &PipelineConfig,
        backend_timeout: Duration,
        translation_timeout: Duration,
    ) -> Self {
        let mut resolver = GenderResolver::new(backends.clusterer, backend_timeout)
            .with_stoplist(&config.heuristic_stoplist);
        if config.llm_gender_backup {
            resolver = resolver.with_llm(backends.llm.clone());
        }

        let mut chain = FallbackChain::new();
        if config.llm_graph_extraction {
            chain = chain.with(Arc::new(LlmGraphExtractor::new(
                backends.llm.clone(),
                backend_timeout,
            )));
        }
        if config.syntactic_graph_extraction {
            chain = chain.with(Arc::new(SyntacticGraphExtractor::new(
                backends.parser,
                backend_timeout,
            )));
        }
        let builder = GraphBuilder::new(chain).with_terminal(
            HeuristicGraphExtractor::with_stoplist(&config.heuristic_stoplist),
        );

        Self {
            resolver,
            builder,
            composer: PromptComposer::new(config.target_language.clone()),
            invoker: TranslationInvoker::new(backends.llm, translation_timeout),
        }
    }

    /// Build from application configuration
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let backends = PipelineBackends::from_config(config)?;
        Ok(Self::new(
            backends,
            &config.pipeline,
            Duration::from_secs(config.backends.timeout_secs),
            Duration::from_secs(config.llm.timeout_secs),
        ))
    }

    /// Override the target language
    pub fn with_target_language(mut self, language: impl Into<String>) -> Self {
        self.composer = PromptComposer::new(language);
        self
    }

    pub fn target_language(&self) -> &str {
        self.composer.target_language()
    }

    /// Run the enrichment stages only. Never fails.
    pub async fn enrich_text(&self, text: &str) -> Enrichment {
        let genders = self.resolver.resolve_text(text).await;
        tracing::debug!(
            entities = genders.len(),
            unresolved = genders.unresolved().len(),
            "Genders resolved"
        );

        let outcome = self.builder.build_with_strategy(text).await;
        let mut graph = outcome.graph;
        enrich(&mut graph, &genders);

        Enrichment {
            genders,
            graph,
            strategy: outcome.strategy,
        }
    }

    /// Run enrichment and compose the prompt, without translating
    pub async fn prepare(&self, text: &str) -> (Enrichment, ContextualPrompt) {
        let enrichment = self.enrich_text(text).await;
        let prompt = self.composer.compose(text, &enrichment.graph);
        (enrichment, prompt)
    }

    /// Translate with knowledge graph context.
    ///
    /// Only the final translation call can fail.
    pub async fn translate(&self, text: &str) -> Result<String> {
        let (_, prompt) = self.prepare(text).await;
        self.invoker.invoke(&prompt).await
    }

    /// Translate and report every intermediate result
    pub async fn translate_with_report(&self, text: &str) -> Result<TranslationReport> {
        let start_time = Instant::now();
        tracing::info!(chars = text.len(), "Translation run started");

        let (enrichment, prompt) = self.prepare(text).await;
        let translation = self.invoker.invoke(&prompt).await?;

        let processing_time_ms = start_time.elapsed().as_millis() as u64;
        tracing::info!(
            strategy = %enrichment.strategy,
            processing_time_ms,
            "Translation run finished"
        );

        Ok(TranslationReport {
            source_text: text.to_string(),
            target_language: self.composer.target_language().to_string(),
            genders: enrichment.genders.iter().cloned().collect(),
            graph: GraphSnapshot::from(&enrichment.graph),
            strategy: enrichment.strategy,
            prompt: prompt.into_string(),
            translation,
            processing_time_ms,
            created_at: Utc::now(),
        })
    }

    /// Translate without any context, for comparison
    pub async fn translate_plain(&self, text: &str) -> Result<String> {
        let prompt = self.composer.compose_plain(text);
        self.invoker.send(&prompt).await
    }
}
