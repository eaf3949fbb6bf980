//! LLM Client implementations
//!
//! OpenAI-compatible chat completions (OpenAI, Groq, Azure) and Ollama.
//! Every failure, including an empty completion, is reported as
//! `AdapterUnavailable` so callers can fall through.
//!
//! Author: hephaex@gmail.com

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use kgt_core::{ConfigError, KgtError, LlmClient, LlmConfig, LlmProvider, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

// ============================================================================
// OpenAI-compatible Client
// ============================================================================

/// Chat completions client for OpenAI and compatible APIs
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    max_tokens: u32,
    temperature: f32,
    label: String,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

impl OpenAiClient {
    /// Create a new OpenAI client
    pub fn new(
        api_key: impl Into<String>,
        model: impl Into<String>,
        max_tokens: u32,
        temperature: f32,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            model: model.into(),
            max_tokens,
            temperature,
            label: "openai".to_string(),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .openai_api_key
            .as_ref()
            .ok_or_else(|| missing_key("OPENAI_API_KEY"))?;

        let base_url = config
            .openai_base_url
            .clone()
            .unwrap_or_else(|| OPENAI_BASE_URL.to_string());

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key.clone(),
            base_url,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            label: "openai".to_string(),
        })
    }

    /// Groq speaks the OpenAI protocol under its own base URL and key
    pub fn groq_from_config(config: &LlmConfig) -> Result<Self> {
        let api_key = config
            .groq_api_key
            .as_ref()
            .ok_or_else(|| missing_key("GROQ_API_KEY"))?;

        Ok(Self {
            client: http_client(config.timeout_secs)?,
            api_key: api_key.clone(),
            base_url: config
                .openai_base_url
                .clone()
                .unwrap_or_else(|| GROQ_BASE_URL.to_string()),
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            label: "groq".to_string(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send()
            .await
            .map_err(|e| KgtError::AdapterUnavailable(format!("{} request failed: {e}", self.label)))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(KgtError::AdapterUnavailable(format!(
                "{} error ({status}): {error_text}",
                self.label
            )));
        }

        let result: ChatResponse = response.json().await.map_err(|e| {
            KgtError::MalformedResponse(format!("Failed to parse {} response: {e}", self.label))
        })?;

        result
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| KgtError::AdapterUnavailable(format!("{}: empty completion", self.label)))
    }

    fn name(&self) -> &str {
        &self.label
    }
}

// ============================================================================
// Ollama Client
// ============================================================================

/// Ollama API client
pub struct OllamaClient {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    prompt: String,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
        }
    }

    /// Create from config
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        Ok(Self {
            client: http_client(config.timeout_secs)?,
            base_url: config.ollama_url.clone(),
            model: config.model.clone(),
        })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let request = OllamaRequest {
            model: self.model.clone(),
            prompt: prompt.to_string(),
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .map_err(|e| KgtError::AdapterUnavailable(format!("Ollama request failed: {e}")))?;

        if !response.status().is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(KgtError::AdapterUnavailable(format!(
                "Ollama error: {error_text}"
            )));
        }

        let result: OllamaResponse = response.json().await.map_err(|e| {
            KgtError::MalformedResponse(format!("Failed to parse Ollama response: {e}"))
        })?;

        if result.response.trim().is_empty() {
            return Err(KgtError::AdapterUnavailable(
                "Ollama: empty completion".to_string(),
            ));
        }
        Ok(result.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

// ============================================================================
// Factory function
// ============================================================================

fn missing_key(variable: &str) -> KgtError {
    ConfigError::MissingRequired(variable.to_string()).into()
}

fn http_client(timeout_secs: u64) -> Result<Client> {
    Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| KgtError::ConfigError(format!("HTTP client: {e}")))
}

/// Create an LLM client from config
pub fn create_llm_client(config: &LlmConfig) -> Result<Arc<dyn LlmClient>> {
    match config.provider {
        LlmProvider::OpenAI | LlmProvider::Azure => Ok(Arc::new(OpenAiClient::from_config(config)?)),
        LlmProvider::Groq => Ok(Arc::new(OpenAiClient::groq_from_config(config)?)),
        LlmProvider::Ollama => Ok(Arc::new(OllamaClient::from_config(config)?)),
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openai_client_creation() {
        let client = OpenAiClient::new("test-key", "gpt-4o-mini", 2048, 0.1);
        assert_eq!(client.model(), "gpt-4o-mini");
        assert_eq!(client.name(), "openai");
    }

    #[test]
    fn test_groq_uses_own_base_url() {
        let config = LlmConfig {
            groq_api_key: Some("gsk-test".to_string()),
            ..LlmConfig::default()
        };

        let client = OpenAiClient::groq_from_config(&config).unwrap();
        assert_eq!(client.base_url(), GROQ_BASE_URL);
        assert_eq!(client.model(), "llama-3.1-8b-instant");
        assert_eq!(client.name(), "groq");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let config = LlmConfig::default();
        match create_llm_client(&config) {
            Err(KgtError::ConfigError(message)) => assert!(message.contains("GROQ_API_KEY")),
            other => panic!("expected config error, got {:?}", other.map(|c| c.name().to_string())),
        }

        let openai = LlmConfig {
            provider: LlmProvider::OpenAI,
            ..LlmConfig::default()
        };
        assert!(matches!(
            OpenAiClient::from_config(&openai),
            Err(KgtError::ConfigError(message)) if message.contains("OPENAI_API_KEY")
        ));
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let config = LlmConfig {
            provider: LlmProvider::Ollama,
            ..LlmConfig::default()
        };
        let client = create_llm_client(&config).unwrap();
        assert_eq!(client.name(), "ollama");
    }
}
