//! Gender resolution
//!
//! Two tiers: gendered pronouns inside coreference clusters first, then a
//! single batched LLM request for every candidate the pronouns could not
//! settle. The resolver never fails; anything it cannot classify is
//! recorded as `unknown`.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use kgt_core::{
    config::default_stoplist, normalize_name, EntityGender, Gender, KgtError, LlmClient,
    MentionCluster, MentionClusterer,
};

use crate::text::{capitalized_tokens, is_pronoun, pronoun_gender, stoplist_set};
use crate::{guarded, json_object_slice};

/// Gender signal carried by the pronouns of one cluster
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClusterSignal {
    Male,
    Female,
    /// Both masculine and feminine pronouns
    Ambiguous,
    /// No gendered pronoun
    None,
}

impl ClusterSignal {
    /// Scan the cluster's spans; only spans that are wholly a pronoun count
    pub fn of(cluster: &MentionCluster) -> Self {
        let mut male = false;
        let mut female = false;

        for mention in cluster.mentions() {
            match pronoun_gender(&mention.text) {
                Some(Gender::Male) => male = true,
                Some(Gender::Female) => female = true,
                _ => {}
            }
        }

        match (male, female) {
            (true, true) => Self::Ambiguous,
            (true, false) => Self::Male,
            (false, true) => Self::Female,
            (false, false) => Self::None,
        }
    }

    pub fn gender(&self) -> Option<Gender> {
        match self {
            Self::Male => Some(Gender::Male),
            Self::Female => Some(Gender::Female),
            Self::Ambiguous | Self::None => None,
        }
    }
}

/// Result of the pronoun tier
#[derive(Debug, Clone, Default)]
pub struct PronounInference {
    /// Every candidate seen so far; queued names are present as `unknown`
    pub genders: EntityGender,
    /// Names left for the LLM tier, in text order
    pub queued: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Verdict {
    Decided(Gender),
    /// Conflicting or ambiguous evidence; final `unknown`
    Unknown,
}

/// Resolves a gender for every entity mentioned in a text
pub struct GenderResolver {
    clusterer: Arc<dyn MentionClusterer>,
    llm: Option<Arc<dyn LlmClient>>,
    timeout: Duration,
    stoplist: HashSet<String>,
}

impl GenderResolver {
    pub fn new(clusterer: Arc<dyn MentionClusterer>, timeout: Duration) -> Self {
        Self {
            clusterer,
            llm: None,
            timeout,
            stoplist: stoplist_set(&default_stoplist()),
        }
    }

    /// Enable the LLM tier
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    /// Stoplist for candidate discovery (matched case-insensitively)
    pub fn with_stoplist<S: AsRef<str>>(mut self, words: &[S]) -> Self {
        self.stoplist = stoplist_set(words);
        self
    }

    /// Cluster the text through the adapter, then resolve.
    ///
    /// Adapter errors and timeouts leave the cluster list empty, which
    /// routes every candidate to the LLM tier.
    pub async fn resolve_text(&self, text: &str) -> EntityGender {
        let clusters = match guarded(
            self.timeout,
            self.clusterer.name(),
            self.clusterer.cluster(text),
        )
        .await
        {
            Ok(clusters) => clusters,
            Err(e) => {
                tracing::warn!(
                    clusterer = self.clusterer.name(),
                    error = %e,
                    "Mention clustering failed, sending all candidates to LLM tier"
                );
                Vec::new()
            }
        };

        self.resolve(text, &clusters).await
    }

    /// Resolve genders from precomputed clusters
    pub async fn resolve(&self, text: &str, clusters: &[MentionCluster]) -> EntityGender {
        let PronounInference {
            mut genders,
            queued,
        } = self.infer_from_pronouns(text, clusters);

        if queued.is_empty() {
            return genders;
        }

        match &self.llm {
            Some(llm) => match self.ask_llm(llm.as_ref(), text, &queued).await {
                Ok(answers) => {
                    let classified = answers.iter().filter(|(_, g)| g.is_known()).count();
                    for (name, gender) in answers {
                        genders.assign(&name, gender);
                    }
                    tracing::debug!(
                        queued = queued.len(),
                        classified,
                        "LLM gender tier complete"
                    );
                }
                Err(e) => {
                    tracing::warn!(error = %e, queued = queued.len(), "LLM gender tier failed");
                }
            },
            None => {
                tracing::debug!(queued = queued.len(), "No LLM configured for gender backup");
            }
        }

        genders
    }

    /// Pronoun tier: assign cluster genders and collect the leftovers
    pub fn infer_from_pronouns(&self, text: &str, clusters: &[MentionCluster]) -> PronounInference {
        let mut verdicts: HashMap<String, (String, Verdict)> = HashMap::new();
        // (offset, surface form, key) of every candidate still undecided
        let mut pending: Vec<(usize, String, String)> = Vec::new();
        let mut clustered: HashSet<String> = HashSet::new();

        for cluster in clusters {
            let signal = ClusterSignal::of(cluster);
            if signal == ClusterSignal::Ambiguous {
                tracing::debug!(
                    cluster = %cluster.id(),
                    error = %KgtError::AmbiguousSignal(format!("cluster {}", cluster.id())),
                    "Cluster carries both masculine and feminine pronouns"
                );
            }

            for mention in cluster.mentions() {
                if is_pronoun(&mention.text) {
                    continue;
                }
                let key = normalize_name(&mention.text);
                if key.is_empty() {
                    continue;
                }
                clustered.insert(key.clone());

                let verdict = match signal {
                    ClusterSignal::Male | ClusterSignal::Female => {
                        Verdict::Decided(signal.gender().unwrap_or_default())
                    }
                    ClusterSignal::Ambiguous => Verdict::Unknown,
                    ClusterSignal::None => {
                        pending.push((mention.start, mention.text.trim().to_string(), key));
                        continue;
                    }
                };

                verdicts
                    .entry(key)
                    .and_modify(|(_, existing)| {
                        if *existing != verdict {
                            *existing = Verdict::Unknown;
                        }
                    })
                    .or_insert_with(|| (mention.text.trim().to_string(), verdict));
            }
        }

        for token in capitalized_tokens(text, &self.stoplist) {
            let key = normalize_name(token.text);
            if !key.is_empty() && !clustered.contains(&key) {
                pending.push((token.start, token.text.to_string(), key));
            }
        }

        let mut genders = EntityGender::new();
        for (name, verdict) in verdicts.values() {
            let gender = match verdict {
                Verdict::Decided(gender) => *gender,
                Verdict::Unknown => Gender::Unknown,
            };
            genders.assign(name, gender);
        }

        pending.sort_by_key(|(offset, _, _)| *offset);
        let mut seen = HashSet::new();
        let mut queued = Vec::new();
        for (_, name, key) in pending {
            if verdicts.contains_key(&key) || !seen.insert(key) {
                continue;
            }
            genders.ensure(&name);
            queued.push(name);
        }

        tracing::debug!(
            clusters = clusters.len(),
            decided = verdicts.len(),
            queued = queued.len(),
            "Pronoun gender tier complete"
        );

        PronounInference { genders, queued }
    }

    async fn ask_llm(
        &self,
        llm: &dyn LlmClient,
        text: &str,
        names: &[String],
    ) -> kgt_core::Result<Vec<(String, Gender)>> {
        let prompt = build_gender_prompt(text, names);
        let response = guarded(self.timeout, llm.name(), llm.generate(&prompt)).await?;
        Ok(parse_gender_response(&response, names))
    }
}

/// Batched classification prompt for the queued names
pub fn build_gender_prompt(text: &str, names: &[String]) -> String {
    let listed: Vec<String> = names.iter().map(|n| format!("- {n}")).collect();

    format!(
        r#"Determine the gender of each entity listed below, using the text for context.
Respond with a JSON object mapping each entity name to exactly one word: "male", "female", or "unknown".
For non-person entities, always respond with "unknown". If you are not confident, respond with "unknown".

Text:
{text}

Entities:
{}"#,
        listed.join("\n")
    )
}

/// Read the LLM answer, keeping only names that were asked about.
///
/// Accepts a JSON object (possibly wrapped in prose or code fences) or
/// `name: gender` lines.
pub fn parse_gender_response(response: &str, names: &[String]) -> Vec<(String, Gender)> {
    let asked: HashMap<String, &String> = names.iter().map(|n| (normalize_name(n), n)).collect();

    let pairs: Vec<(String, String)> = json_object_slice(response)
        .and_then(|json| serde_json::from_str::<serde_json::Map<String, serde_json::Value>>(json).ok())
        .map(|map| {
            map.into_iter()
                .filter_map(|(name, value)| value.as_str().map(|v| (name, v.to_string())))
                .collect()
        })
        .unwrap_or_else(|| {
            response
                .lines()
                .filter_map(|line| line.split_once(':'))
                .map(|(name, value)| {
                    (
                        name.trim_start_matches(['-', '*', ' ']).to_string(),
                        value.trim().to_string(),
                    )
                })
                .collect()
        });

    let mut seen = HashSet::new();
    pairs
        .into_iter()
        .filter_map(|(name, value)| {
            let key = normalize_name(&name);
            let original = asked.get(&key)?;
            seen.insert(key).then(|| ((*original).clone(), Gender::from_label(&value)))
        })
        .collect()
}
