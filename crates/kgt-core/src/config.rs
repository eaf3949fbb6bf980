//! KGT Configuration Management
//!
//! Handles configuration from environment variables and TOML config
//! files with sensible defaults for development.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Coreference and NER service endpoints
    pub backends: BackendConfig,

    /// Enrichment pipeline configuration
    pub pipeline: PipelineConfig,

    /// Completion cache configuration
    pub cache: CacheConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut config = Self::default();

        // LLM
        if let Ok(provider) = std::env::var("LLM_PROVIDER") {
            config.llm.provider = provider.parse()?;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            config.llm.openai_api_key = Some(key);
        }
        if let Ok(key) = std::env::var("GROQ_API_KEY") {
            config.llm.groq_api_key = Some(key);
        }
        if let Ok(url) = std::env::var("OPENAI_BASE_URL") {
            config.llm.openai_base_url = Some(url);
        }
        if let Ok(url) = std::env::var("OLLAMA_URL") {
            config.llm.ollama_url = url;
        }
        if let Ok(model) = std::env::var("LLM_MODEL") {
            config.llm.model = model;
        }

        // NLP services
        if let Ok(url) = std::env::var("COREF_URL") {
            config.backends.coref_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Ok(url) = std::env::var("PARSER_URL") {
            config.backends.parser_url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Ok(secs) = std::env::var("BACKEND_TIMEOUT_SECS") {
            config.backends.timeout_secs = secs.parse().map_err(|_| ConfigError::InvalidValue {
                key: "BACKEND_TIMEOUT_SECS".to_string(),
                value: secs,
            })?;
        }

        // Pipeline
        if let Ok(language) = std::env::var("TARGET_LANGUAGE") {
            config.pipeline.target_language = language;
        }

        // Logging
        if let Ok(level) = std::env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        if let Ok(json) = std::env::var("LOG_JSON") {
            config.logging.json_format = matches!(json.to_lowercase().as_str(), "1" | "true");
        }

        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        let env_config = Self::from_env()?;
        let defaults = Self::default();

        // Only override if env values differ from defaults
        if env_config.llm.provider != defaults.llm.provider {
            self.llm.provider = env_config.llm.provider;
        }
        if env_config.llm.model != defaults.llm.model {
            self.llm.model = env_config.llm.model;
        }
        if env_config.llm.ollama_url != defaults.llm.ollama_url {
            self.llm.ollama_url = env_config.llm.ollama_url;
        }
        if env_config.backends.timeout_secs != defaults.backends.timeout_secs {
            self.backends.timeout_secs = env_config.backends.timeout_secs;
        }
        if env_config.pipeline.target_language != defaults.pipeline.target_language {
            self.pipeline.target_language = env_config.pipeline.target_language;
        }
        if env_config.logging.level != defaults.logging.level {
            self.logging.level = env_config.logging.level;
        }
        if env_config.logging.json_format {
            self.logging.json_format = true;
        }

        // Always use env for sensitive values and endpoints
        if env_config.llm.openai_api_key.is_some() {
            self.llm.openai_api_key = env_config.llm.openai_api_key;
        }
        if env_config.llm.groq_api_key.is_some() {
            self.llm.groq_api_key = env_config.llm.groq_api_key;
        }
        if env_config.llm.openai_base_url.is_some() {
            self.llm.openai_base_url = env_config.llm.openai_base_url;
        }
        if env_config.backends.coref_url.is_some() {
            self.backends.coref_url = env_config.backends.coref_url;
        }
        if env_config.backends.parser_url.is_some() {
            self.backends.parser_url = env_config.backends.parser_url;
        }

        Ok(self)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// LLM provider to use
    pub provider: LlmProvider,

    /// OpenAI API key
    pub openai_api_key: Option<String>,

    /// Groq API key
    pub groq_api_key: Option<String>,

    /// Base URL override for OpenAI-compatible APIs
    pub openai_base_url: Option<String>,

    /// Ollama server URL
    pub ollama_url: String,

    /// Model name to use
    pub model: String,

    /// Maximum tokens for completion
    pub max_tokens: u32,

    /// Temperature for generation
    pub temperature: f32,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::Groq,
            openai_api_key: None,
            groq_api_key: None,
            openai_base_url: None,
            ollama_url: "http://localhost:11434".to_string(),
            model: "llama-3.1-8b-instant".to_string(),
            max_tokens: 2048,
            temperature: 0.1,
            timeout_secs: 60,
        }
    }
}

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    OpenAI,
    Groq,
    Ollama,
    Azure,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "openai" => Ok(Self::OpenAI),
            "groq" => Ok(Self::Groq),
            "ollama" => Ok(Self::Ollama),
            "azure" => Ok(Self::Azure),
            _ => Err(ConfigError::InvalidValue {
                key: "LLM_PROVIDER".to_string(),
                value: s.to_string(),
            }),
        }
    }
}

/// Endpoints for the external NLP services
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BackendConfig {
    /// Coreference service URL (unset means unavailable)
    pub coref_url: Option<String>,

    /// NER/dependency parser service URL (unset means unavailable)
    pub parser_url: Option<String>,

    /// Per-call timeout for every backend call, in seconds
    pub timeout_secs: u64,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            coref_url: None,
            parser_url: None,
            timeout_secs: 20,
        }
    }
}

/// Enrichment pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Language to translate into
    pub target_language: String,

    /// Try LLM-structured graph extraction first
    pub llm_graph_extraction: bool,

    /// Try NER/dependency graph extraction second
    pub syntactic_graph_extraction: bool,

    /// Ask the LLM for genders the pronoun pass could not resolve
    pub llm_gender_backup: bool,

    /// Capitalized words never treated as entities by the heuristic pass
    pub heuristic_stoplist: Vec<String>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            target_language: "Hindi".to_string(),
            llm_graph_extraction: true,
            syntactic_graph_extraction: true,
            llm_gender_backup: true,
            heuristic_stoplist: default_stoplist(),
        }
    }
}

/// Common sentence-initial words that are capitalized but are not names
pub fn default_stoplist() -> Vec<String> {
    [
        "A", "An", "The", "This", "That", "These", "Those", "And", "But", "Or", "So", "If",
        "When", "While", "After", "Before", "Then", "There", "Here", "However", "Also", "Yes",
        "No", "Not", "My", "Our", "Your", "Their", "What", "Who", "Whom", "Which", "Where",
        "Why", "How", "In", "On", "At", "Of", "For", "From", "To", "With", "By", "As", "Is",
        "Are", "Was", "Were", "Be", "Do", "Does", "Did", "Has", "Have", "Had", "Every", "Some",
        "All", "Many", "Most", "Each", "One", "Once", "Later", "Today", "Yesterday", "Tomorrow",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

/// Completion cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache LLM completions keyed by prompt
    pub enabled: bool,

    /// Maximum number of cached completions
    pub max_capacity: u64,

    /// Time-to-live for cached completions (in seconds)
    pub ttl_seconds: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_capacity: 1_000,
            ttl_seconds: 3600,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}

impl From<ConfigError> for crate::KgtError {
    fn from(err: ConfigError) -> Self {
        crate::KgtError::ConfigError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.llm.provider, LlmProvider::Groq);
        assert_eq!(config.pipeline.target_language, "Hindi");
        assert!(config.backends.coref_url.is_none());
        assert!(config.pipeline.heuristic_stoplist.contains(&"The".to_string()));
    }

    #[test]
    fn test_llm_provider_parse() {
        assert_eq!("groq".parse::<LlmProvider>().unwrap(), LlmProvider::Groq);
        assert_eq!(
            "Ollama".parse::<LlmProvider>().unwrap(),
            LlmProvider::Ollama
        );
        assert!("invalid".parse::<LlmProvider>().is_err());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let toml_src = r#"
            [pipeline]
            target_language = "Spanish"

            [backends]
            coref_url = "http://localhost:9000/coref"
        "#;

        let config: AppConfig = toml::from_str(toml_src).unwrap();
        assert_eq!(config.pipeline.target_language, "Spanish");
        assert!(config.pipeline.llm_graph_extraction);
        assert_eq!(
            config.backends.coref_url.as_deref(),
            Some("http://localhost:9000/coref")
        );
        assert_eq!(config.backends.timeout_secs, 20);
        assert_eq!(config.llm.model, "llama-3.1-8b-instant");
    }

    #[test]
    fn test_missing_file_is_read_error() {
        let err = AppConfig::from_file("/nonexistent/kgt.toml").unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }
}
