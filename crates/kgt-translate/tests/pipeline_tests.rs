//! End-to-end pipeline tests with in-process backends

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kgt_core::{
    CacheConfig, Gender, KgtError, LlmClient, MentionCluster, MentionClusterer, PipelineConfig,
    Result, UnavailableBackend,
};
use kgt_extractor::ExtractionStrategy;
use kgt_translate::{CachedLlmClient, PipelineBackends, TranslationPipeline};

const KIRAN: &str =
    "Kiran is a good student. Sita is his science teacher, and he is Kiran's favorite teacher.";

/// Answers each kind of prompt the pipeline sends and records them
#[derive(Default)]
struct ScriptedLlm {
    graph_reply: Option<&'static str>,
    gender_reply: Option<&'static str>,
    translation_reply: Option<&'static str>,
    prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn generate(&self, prompt: &str) -> Result<String> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(prompt.to_string());
        }

        let reply = if prompt.contains("Extract the entities") {
            self.graph_reply
        } else if prompt.contains("Determine the gender") {
            self.gender_reply
        } else {
            self.translation_reply
        };

        reply
            .map(str::to_string)
            .ok_or_else(|| KgtError::AdapterUnavailable("scripted outage".to_string()))
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

impl ScriptedLlm {
    fn translation_calls(&self) -> usize {
        self.prompts
            .lock()
            .map(|p| {
                p.iter()
                    .filter(|prompt| {
                        !prompt.contains("Extract the entities")
                            && !prompt.contains("Determine the gender")
                    })
                    .count()
            })
            .unwrap_or_default()
    }

    fn last_prompt(&self) -> String {
        self.prompts
            .lock()
            .map(|p| p.last().cloned().unwrap_or_default())
            .unwrap_or_default()
    }
}

struct FixedClusters(Vec<Vec<&'static str>>);

#[async_trait]
impl MentionClusterer for FixedClusters {
    async fn cluster(&self, text: &str) -> Result<Vec<MentionCluster>> {
        Ok(self
            .0
            .iter()
            .map(|spans| MentionCluster::from_texts(text, spans))
            .collect())
    }

    fn name(&self) -> &str {
        "fixed"
    }
}

fn pipeline(llm: Arc<ScriptedLlm>, clusterer: Arc<dyn MentionClusterer>) -> TranslationPipeline {
    let backends = PipelineBackends {
        llm,
        clusterer,
        parser: Arc::new(UnavailableBackend::new("no parser")),
    };
    TranslationPipeline::new(
        backends,
        &PipelineConfig::default(),
        Duration::from_secs(2),
        Duration::from_secs(2),
    )
}

#[tokio::test]
async fn test_kiran_example_end_to_end() {
    let llm = Arc::new(ScriptedLlm {
        graph_reply: Some(
            r#"{"nodes": [{"id": "Kiran", "type": "Person"}, {"id": "Sita", "type": "Person"}],
                "relationships": [{"source": "Sita", "target": "Kiran", "type": "teaches"}]}"#,
        ),
        gender_reply: Some(r#"{"Sita": "female"}"#),
        translation_reply: Some("किरण एक अच्छा छात्र है।"),
        ..Default::default()
    });
    let clusterer = Arc::new(FixedClusters(vec![vec!["Kiran", "his", "he", "Kiran's"]]));

    let report = pipeline(llm.clone(), clusterer)
        .translate_with_report(KIRAN)
        .await
        .unwrap();

    assert_eq!(report.translation, "किरण एक अच्छा छात्र है।");
    assert_eq!(report.strategy, ExtractionStrategy::LlmStructured);
    assert_eq!(report.target_language, "Hindi");

    let kiran = report.genders.iter().find(|g| g.name == "Kiran").unwrap();
    assert_eq!(kiran.gender, Gender::Male);
    let sita = report.genders.iter().find(|g| g.name == "Sita").unwrap();
    assert_eq!(sita.gender, Gender::Female);

    assert!(report.prompt.contains("- Kiran (person, male)"));
    assert!(report.prompt.contains("- Sita (person, female)"));
    assert!(report.prompt.contains("- Sita --teaches--> Kiran"));
    assert!(report.prompt.contains(KIRAN));
    assert_eq!(llm.last_prompt(), report.prompt);

    let json: serde_json::Value = serde_json::to_value(&report).unwrap();
    assert_eq!(json["strategy"], "llm_structured");
    assert_eq!(json["graph"]["nodes"][0]["gender"], "male");
}

#[tokio::test]
async fn test_all_enrichment_backends_down() {
    let llm = Arc::new(ScriptedLlm {
        translation_reply: Some("ऐलिस पेरिस में बॉब से मिली।"),
        ..Default::default()
    });

    let pipeline = pipeline(llm.clone(), Arc::new(UnavailableBackend::new("no coref")));
    let translation = pipeline.translate("Alice met Bob in Paris.").await.unwrap();
    assert_eq!(translation, "ऐलिस पेरिस में बॉब से मिली।");

    let prompt = llm.last_prompt();
    assert!(prompt.contains("- Alice (unknown, unknown)"));
    assert!(prompt.contains("- Bob (unknown, unknown)"));
    assert!(prompt.contains("- Paris (unknown, unknown)"));
    assert!(prompt.contains("- Alice --related_to--> Bob"));
    assert!(prompt.contains("- Bob --related_to--> Paris"));
}

#[tokio::test]
async fn test_enrichment_never_fails() {
    let llm = Arc::new(ScriptedLlm::default());
    let pipeline = pipeline(llm, Arc::new(UnavailableBackend::new("no coref")));

    let enrichment = pipeline.enrich_text("Alice met Bob in Paris.").await;
    assert_eq!(enrichment.strategy, ExtractionStrategy::Heuristic);
    assert_eq!(enrichment.graph.node_count(), 3);
    assert_eq!(enrichment.genders.gender_of("Alice"), Gender::Unknown);
}

#[tokio::test]
async fn test_translation_failure_is_the_only_error() {
    let llm = Arc::new(ScriptedLlm::default());
    let pipeline = pipeline(llm, Arc::new(UnavailableBackend::new("no coref")));

    let err = pipeline.translate(KIRAN).await.unwrap_err();
    assert!(matches!(err, KgtError::TranslationFailed(_)));
}

#[tokio::test]
async fn test_empty_text_has_no_entities() {
    let llm = Arc::new(ScriptedLlm {
        translation_reply: Some("..."),
        ..Default::default()
    });
    let pipeline = pipeline(llm.clone(), Arc::new(UnavailableBackend::new("no coref")));

    pipeline.translate("").await.unwrap();
    assert!(llm.last_prompt().contains("no entities identified"));
}

#[tokio::test]
async fn test_plain_translation_and_target_language() {
    let llm = Arc::new(ScriptedLlm {
        translation_reply: Some("Alicia conoció a Bob."),
        ..Default::default()
    });
    let pipeline = pipeline(llm.clone(), Arc::new(UnavailableBackend::new("no coref")))
        .with_target_language("Spanish");

    let plain = pipeline.translate_plain("Alice met Bob.").await.unwrap();
    assert_eq!(plain, "Alicia conoció a Bob.");

    let prompt = llm.last_prompt();
    assert!(prompt.contains("Spanish"));
    assert!(!prompt.contains("<metadata>"));
    assert_eq!(pipeline.target_language(), "Spanish");
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let llm = Arc::new(ScriptedLlm {
        translation_reply: Some("ok"),
        ..Default::default()
    });
    let pipeline = pipeline(llm, Arc::new(UnavailableBackend::new("no coref")));

    let (first, second) = tokio::join!(
        pipeline.enrich_text("Alice met Bob."),
        pipeline.enrich_text("Ravi visited Delhi.")
    );

    assert!(first.graph.contains_node("Alice"));
    assert!(!first.graph.contains_node("Ravi"));
    assert!(second.graph.contains_node("Delhi"));
    assert!(!second.graph.contains_node("Bob"));
}

#[tokio::test]
async fn test_reused_pipeline_serves_repeat_translation_from_cache() {
    let llm = Arc::new(ScriptedLlm {
        translation_reply: Some("ऐलिस बॉब से मिली।"),
        ..Default::default()
    });
    let cached = Arc::new(CachedLlmClient::new(llm.clone(), &CacheConfig::default()));
    let backends = PipelineBackends {
        llm: cached.clone(),
        clusterer: Arc::new(UnavailableBackend::new("no coref")),
        parser: Arc::new(UnavailableBackend::new("no parser")),
    };
    let pipeline = TranslationPipeline::new(
        backends,
        &PipelineConfig::default(),
        Duration::from_secs(2),
        Duration::from_secs(2),
    );

    let first = pipeline.translate("Alice met Bob.").await.unwrap();
    let second = pipeline.translate("Alice met Bob.").await.unwrap();

    assert_eq!(first, second);
    assert_eq!(llm.translation_calls(), 1);
    assert!(cached.stats().hits() >= 1);
}
