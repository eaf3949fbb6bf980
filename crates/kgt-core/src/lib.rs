//! KGT Core - Domain models, traits, and shared types
//!
//! This crate defines the core abstractions used throughout the KGT system:
//! - Gender tags and the entity → gender mapping
//! - Mention clusters produced by coreference resolution
//! - Parsed text produced by NER/dependency backends
//! - Common error types
//! - Backend traits (LLM, coreference, syntactic parsing)
//! - Configuration management

pub mod config;

pub use config::{
    AppConfig, BackendConfig, CacheConfig, ConfigError, LlmConfig, LlmProvider, LoggingConfig,
    PipelineConfig,
};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Error Types
// ============================================================================

/// Core error types for KGT operations
#[derive(Error, Debug)]
pub enum KgtError {
    /// Backend unreachable, timed out, or rate limited
    #[error("Adapter unavailable: {0}")]
    AdapterUnavailable(String),

    /// Backend answered with output that could not be parsed
    #[error("Malformed response: {0}")]
    MalformedResponse(String),

    /// Conflicting evidence, e.g. male and female pronouns in one cluster
    #[error("Ambiguous signal: {0}")]
    AmbiguousSignal(String),

    /// The final translation call failed
    #[error("Translation failed: {0}")]
    TranslationFailed(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl KgtError {
    /// Whether a fallback chain may recover from this error locally
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::AdapterUnavailable(_) | Self::MalformedResponse(_) | Self::AmbiguousSignal(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, KgtError>;

// ============================================================================
// Entity Identity
// ============================================================================

/// Normalize an entity name into its lookup key.
///
/// Trims surrounding punctuation, drops a trailing possessive (`'s`, `’s`,
/// or a bare trailing apostrophe), collapses inner whitespace and
/// lowercases. Graph node identity and gender lookups both go through this.
pub fn normalize_name(name: &str) -> String {
    let trimmed = name.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'' && c != '’');

    let stripped = trimmed
        .strip_suffix("'s")
        .or_else(|| trimmed.strip_suffix("’s"))
        .or_else(|| trimmed.strip_suffix("'S"))
        .or_else(|| trimmed.strip_suffix('\''))
        .or_else(|| trimmed.strip_suffix('’'))
        .unwrap_or(trimmed);

    stripped
        .trim_matches(|c: char| !c.is_alphanumeric())
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ============================================================================
// Gender
// ============================================================================

/// Grammatical gender tag attached to an entity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    #[default]
    Unknown,
}

impl Gender {
    /// Get the string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Unknown => "unknown",
        }
    }

    /// Interpret a free-form label returned by a backend.
    ///
    /// Anything that is not clearly male or female is `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let cleaned: String = label
            .trim()
            .trim_matches(|c: char| !c.is_alphabetic())
            .to_lowercase();

        match cleaned.as_str() {
            "male" | "m" | "masculine" | "man" => Self::Male,
            "female" | "f" | "feminine" | "woman" => Self::Female,
            _ => Self::Unknown,
        }
    }

    /// Whether this is a concrete (non-unknown) gender
    pub fn is_known(&self) -> bool {
        !matches!(self, Self::Unknown)
    }
}

impl std::fmt::Display for Gender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A gender assignment for one canonical entity name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenderEntry {
    /// Entity name as first seen in the text
    pub name: String,
    /// Assigned gender
    pub gender: Gender,
}

/// Mapping from canonical entity name to gender.
///
/// Keys are normalized names, so every entity is present at most once.
/// Absent entities are never implied to be anything: callers that need a
/// complete mapping insert `Gender::Unknown` explicitly.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityGender {
    entries: BTreeMap<String, GenderEntry>,
}

impl EntityGender {
    /// Create an empty mapping
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the gender for a name, replacing any earlier assignment
    pub fn assign(&mut self, name: &str, gender: Gender) {
        let key = normalize_name(name);
        if key.is_empty() {
            return;
        }

        self.entries
            .entry(key)
            .and_modify(|e| e.gender = gender)
            .or_insert_with(|| GenderEntry {
                name: name.trim().to_string(),
                gender,
            });
    }

    /// Insert the name as `Unknown` unless it is already present
    pub fn ensure(&mut self, name: &str) {
        let key = normalize_name(name);
        if key.is_empty() || self.entries.contains_key(&key) {
            return;
        }
        self.entries.insert(
            key,
            GenderEntry {
                name: name.trim().to_string(),
                gender: Gender::Unknown,
            },
        );
    }

    /// Look up a name (any casing or possessive form)
    pub fn get(&self, name: &str) -> Option<Gender> {
        self.entries.get(&normalize_name(name)).map(|e| e.gender)
    }

    /// Look up by an already-normalized key
    pub fn get_normalized(&self, key: &str) -> Option<Gender> {
        self.entries.get(key).map(|e| e.gender)
    }

    /// Gender of a name, `Unknown` if absent
    pub fn gender_of(&self, name: &str) -> Gender {
        self.get(name).unwrap_or_default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&normalize_name(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in normalized-name order
    pub fn iter(&self) -> impl Iterator<Item = &GenderEntry> {
        self.entries.values()
    }

    /// Names still assigned `Unknown`
    pub fn unresolved(&self) -> Vec<String> {
        self.entries
            .values()
            .filter(|e| !e.gender.is_known())
            .map(|e| e.name.clone())
            .collect()
    }
}

// ============================================================================
// Coreference Models
// ============================================================================

/// A single text span inside a mention cluster
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mention {
    /// Surface text of the span
    pub text: String,
    /// Byte offset of the span in the source text
    pub start: usize,
}

impl Mention {
    /// Create a new mention
    pub fn new(text: impl Into<String>, start: usize) -> Self {
        Self {
            text: text.into(),
            start,
        }
    }

    /// Byte offset one past the end of the span
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// Spans believed to refer to the same real-world entity.
///
/// Built once per input text by a [`MentionClusterer`] and never modified
/// afterwards; mentions are kept in text order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MentionCluster {
    id: Uuid,
    mentions: Vec<Mention>,
}

impl MentionCluster {
    /// Create a cluster; mentions are ordered by offset
    pub fn new(mut mentions: Vec<Mention>) -> Self {
        mentions.sort_by_key(|m| m.start);
        Self {
            id: Uuid::new_v4(),
            mentions,
        }
    }

    /// Build a cluster from bare strings, locating each one in `text`.
    ///
    /// Each string is searched for after the previous match so repeated
    /// surface forms get distinct offsets. Strings not found in the text
    /// keep offset 0.
    pub fn from_texts(text: &str, spans: &[&str]) -> Self {
        let mut cursor = 0;
        let mentions = spans
            .iter()
            .map(|span| {
                let start = text
                    .get(cursor..)
                    .and_then(|rest| rest.find(span))
                    .map(|offset| cursor + offset)
                    .or_else(|| text.find(span))
                    .unwrap_or(0);
                cursor = start + span.len();
                Mention::new(*span, start)
            })
            .collect();

        Self::new(mentions)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn mentions(&self) -> &[Mention] {
        &self.mentions
    }

    pub fn is_empty(&self) -> bool {
        self.mentions.is_empty()
    }
}

// ============================================================================
// Syntactic Parse Models
// ============================================================================

/// Half-open byte range into the source text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TextSpan {
    pub start: usize,
    pub end: usize,
}

impl TextSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// Whether the two spans share at least one byte
    pub fn overlaps(&self, other: &TextSpan) -> bool {
        self.start < other.end && other.start < self.end
    }
}

/// Named entity reported by the NER backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedEntity {
    /// Surface text
    pub text: String,
    /// NER category (e.g. PERSON, ORG, GPE)
    pub label: String,
    /// Location in the source text
    pub span: TextSpan,
}

/// Syntactic relation reported by the dependency backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParsedRelation {
    pub source: TextSpan,
    pub target: TextSpan,
    /// Relation label (usually the connecting verb lemma)
    pub label: String,
}

/// Output of a [`SyntacticParser`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedText {
    #[serde(default)]
    pub entities: Vec<ParsedEntity>,
    #[serde(default)]
    pub relations: Vec<ParsedRelation>,
}

// ============================================================================
// Traits
// ============================================================================

/// Trait for LLM clients
#[async_trait::async_trait]
pub trait LlmClient: Send + Sync {
    /// Generate a completion for the prompt
    async fn generate(&self, prompt: &str) -> Result<String>;

    /// Backend name for logging
    fn name(&self) -> &str {
        "llm"
    }
}

/// Coreference model boundary
#[async_trait::async_trait]
pub trait MentionClusterer: Send + Sync {
    /// Cluster co-referring mentions in the text
    async fn cluster(&self, text: &str) -> Result<Vec<MentionCluster>>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// NER/dependency-parsing backend boundary
#[async_trait::async_trait]
pub trait SyntacticParser: Send + Sync {
    /// Extract named entities and syntactic relations
    async fn parse(&self, text: &str) -> Result<ParsedText>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// Stand-in for a backend that is not configured.
///
/// Every call reports [`KgtError::AdapterUnavailable`], which the fallback
/// chains treat like any other outage.
#[derive(Debug, Clone)]
pub struct UnavailableBackend {
    reason: String,
}

impl UnavailableBackend {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait::async_trait]
impl MentionClusterer for UnavailableBackend {
    async fn cluster(&self, _text: &str) -> Result<Vec<MentionCluster>> {
        Err(KgtError::AdapterUnavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

#[async_trait::async_trait]
impl SyntacticParser for UnavailableBackend {
    async fn parse(&self, _text: &str) -> Result<ParsedText> {
        Err(KgtError::AdapterUnavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

#[async_trait::async_trait]
impl LlmClient for UnavailableBackend {
    async fn generate(&self, _prompt: &str) -> Result<String> {
        Err(KgtError::AdapterUnavailable(self.reason.clone()))
    }

    fn name(&self) -> &str {
        "unavailable"
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_name() {
        assert_eq!(normalize_name("Kiran"), "kiran");
        assert_eq!(normalize_name("Kiran's"), "kiran");
        assert_eq!(normalize_name("  Kiran’s,"), "kiran");
        assert_eq!(normalize_name("New   York"), "new york");
        assert_eq!(normalize_name("\"Sita\""), "sita");
        assert_eq!(normalize_name("..."), "");
    }

    #[test]
    fn test_gender_from_label() {
        assert_eq!(Gender::from_label("male"), Gender::Male);
        assert_eq!(Gender::from_label(" Female. "), Gender::Female);
        assert_eq!(Gender::from_label("'male'"), Gender::Male);
        assert_eq!(Gender::from_label("probably male"), Gender::Unknown);
        assert_eq!(Gender::from_label(""), Gender::Unknown);
    }

    #[test]
    fn test_entity_gender_unique_by_normalized_name() {
        let mut genders = EntityGender::new();
        genders.assign("Kiran", Gender::Male);
        genders.assign("KIRAN's", Gender::Female);
        genders.ensure("kiran");

        assert_eq!(genders.len(), 1);
        assert_eq!(genders.get("Kiran"), Some(Gender::Female));
        assert_eq!(genders.iter().next().unwrap().name, "Kiran");
    }

    #[test]
    fn test_entity_gender_ensure_is_explicit_unknown() {
        let mut genders = EntityGender::new();
        genders.ensure("Sita");

        assert_eq!(genders.get("Sita"), Some(Gender::Unknown));
        assert_eq!(genders.get("Ravi"), None);
        assert_eq!(genders.gender_of("Ravi"), Gender::Unknown);
        assert_eq!(genders.unresolved(), vec!["Sita".to_string()]);
    }

    #[test]
    fn test_cluster_from_texts_orders_and_locates() {
        let text = "Kiran said he likes his school.";
        let cluster = MentionCluster::from_texts(text, &["his", "Kiran", "he"]);

        let starts: Vec<usize> = cluster.mentions().iter().map(|m| m.start).collect();
        assert_eq!(starts, vec![0, 11, 20]);
        assert_eq!(cluster.mentions()[0].text, "Kiran");
        assert_eq!(cluster.mentions()[0].end(), 5);
    }

    #[test]
    fn test_text_span_overlap() {
        let a = TextSpan::new(0, 5);
        assert!(a.overlaps(&TextSpan::new(4, 8)));
        assert!(!a.overlaps(&TextSpan::new(5, 8)));
    }

    #[test]
    fn test_error_recoverability() {
        assert!(KgtError::AdapterUnavailable("timeout".into()).is_recoverable());
        assert!(KgtError::MalformedResponse("bad json".into()).is_recoverable());
        assert!(!KgtError::TranslationFailed("down".into()).is_recoverable());
    }

    #[tokio::test]
    async fn test_unavailable_backend_reports_adapter_unavailable() {
        let backend = UnavailableBackend::new("COREF_URL not set");
        let err = MentionClusterer::cluster(&backend, "text").await.unwrap_err();
        assert!(matches!(err, KgtError::AdapterUnavailable(_)));
    }
}
