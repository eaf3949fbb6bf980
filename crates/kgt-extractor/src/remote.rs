//! HTTP adapters for the coreference and NER services
//!
//! Both services take `{"text": ...}` as a JSON POST body. Transport
//! failures and non-success statuses are reported as
//! `AdapterUnavailable`; bodies that do not decode are
//! `MalformedResponse`.

use std::time::Duration;

use async_trait::async_trait;
use kgt_core::{
    KgtError, Mention, MentionCluster, MentionClusterer, ParsedText, Result, SyntacticParser,
};
use reqwest::Client;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
struct TextRequest<'a> {
    text: &'a str,
}

// ============================================================================
// Coreference
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClusterResponse {
    clusters: Vec<Vec<RemoteMention>>,
}

/// A mention as the coreference service may report it
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RemoteMention {
    /// `{"text": "...", "start": 12}`
    Span { text: String, start: usize },
    /// `[start, end]` byte offsets
    Offsets([usize; 2]),
    /// Bare surface form, located in the text
    Text(String),
}

/// Mention clusterer backed by a remote coreference service
pub struct RemoteClusterer {
    client: Client,
    url: String,
}

impl RemoteClusterer {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }

    fn into_cluster(text: &str, mentions: Vec<RemoteMention>) -> Result<MentionCluster> {
        let mut spans = Vec::new();
        let mut bare = Vec::new();

        for mention in mentions {
            match mention {
                RemoteMention::Span { text: span, start } => spans.push(Mention::new(span, start)),
                RemoteMention::Offsets([start, end]) => {
                    let span = text.get(start..end).ok_or_else(|| {
                        KgtError::MalformedResponse(format!(
                            "mention offsets {start}..{end} outside text"
                        ))
                    })?;
                    spans.push(Mention::new(span, start));
                }
                RemoteMention::Text(span) => bare.push(span),
            }
        }

        if !bare.is_empty() {
            let refs: Vec<&str> = bare.iter().map(String::as_str).collect();
            spans.extend(MentionCluster::from_texts(text, &refs).mentions().iter().cloned());
        }

        Ok(MentionCluster::new(spans))
    }
}

#[async_trait]
impl MentionClusterer for RemoteClusterer {
    async fn cluster(&self, text: &str) -> Result<Vec<MentionCluster>> {
        let body = post_json(&self.client, &self.url, text).await?;

        let response: ClusterResponse = serde_json::from_str(&body)
            .map_err(|e| KgtError::MalformedResponse(format!("coreference response: {e}")))?;

        let clusters = response
            .clusters
            .into_iter()
            .map(|mentions| Self::into_cluster(text, mentions))
            .collect::<Result<Vec<_>>>()?;

        tracing::debug!(clusters = clusters.len(), "Coreference service returned clusters");
        Ok(clusters.into_iter().filter(|c| !c.is_empty()).collect())
    }

    fn name(&self) -> &str {
        "remote-coref"
    }
}

// ============================================================================
// NER / Dependency Parsing
// ============================================================================

/// Syntactic parser backed by a remote NER/dependency service
pub struct RemoteParser {
    client: Client,
    url: String,
}

impl RemoteParser {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            url: url.into(),
        })
    }
}

#[async_trait]
impl SyntacticParser for RemoteParser {
    async fn parse(&self, text: &str) -> Result<ParsedText> {
        let body = post_json(&self.client, &self.url, text).await?;

        serde_json::from_str(&body)
            .map_err(|e| KgtError::MalformedResponse(format!("parser response: {e}")))
    }

    fn name(&self) -> &str {
        "remote-parser"
    }
}

// ============================================================================
// Shared HTTP plumbing
// ============================================================================

fn http_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| KgtError::ConfigError(format!("HTTP client: {e}")))
}

async fn post_json(client: &Client, url: &str, text: &str) -> Result<String> {
    let response = client
        .post(url)
        .json(&TextRequest { text })
        .send()
        .await
        .map_err(|e| KgtError::AdapterUnavailable(format!("Request to {url} failed: {e}")))?;

    if !response.status().is_success() {
        let status = response.status();
        let error_text = response.text().await.unwrap_or_default();
        return Err(KgtError::AdapterUnavailable(format!(
            "{url} returned {status}: {error_text}"
        )));
    }

    response
        .text()
        .await
        .map_err(|e| KgtError::AdapterUnavailable(format!("Reading {url} response failed: {e}")))
}
