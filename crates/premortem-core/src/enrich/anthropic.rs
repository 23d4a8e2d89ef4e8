use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Enricher, EnrichmentOutcome, EnrichmentRequest};
use crate::config::LlmConfig;
use crate::report::EvidenceLine;

const DEFAULT_ENDPOINT: &str = "https://api.anthropic.com";
const DEFAULT_MODEL: &str = "claude-3-5-haiku-latest";
const MAX_OUTPUT_TOKENS: u32 = 400;
const API_KEY_ENV: &str = "PREMORTEM_API_KEY";
const ENDPOINT_ENV: &str = "PREMORTEM_ENDPOINT";

const SYSTEM_PROMPT: &str = "You are a design-review assistant. Given a heuristic finding about a gap \
in an engineering document, respond with strict JSON: {\"evidence\": [{\"line\": <1-based line \
number>, \"excerpt\": \"...\"}], \"recommendation\": \"...\"}. Line numbers must reference the \
provided excerpt's document. Sharpen the evidence and recommendation; do not invent new findings.";

/// Enrichment provider backed by the Anthropic messages API.
///
/// One attempt per call: retries, timeouts, and backoff are the
/// orchestrator's concern. Every expected failure (HTTP status, malformed
/// payload) comes back as `EnrichmentOutcome::Failed`.
#[derive(Debug, Clone)]
pub struct AnthropicEnricher {
    http: Client,
    url: String,
    api_key: String,
    model: String,
}

impl AnthropicEnricher {
    /// Build a client from the run configuration. The API key comes from
    /// `PREMORTEM_API_KEY`; the endpoint can be overridden with
    /// `PREMORTEM_ENDPOINT` for tests and proxies.
    pub fn new(config: &LlmConfig) -> Result<Self> {
        let api_key = std::env::var(API_KEY_ENV)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .with_context(|| format!("{API_KEY_ENV} must be set when enrichment is enabled"))?;
        let base = std::env::var(ENDPOINT_ENV)
            .ok()
            .filter(|endpoint| !endpoint.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());
        Self::with_endpoint(config, api_key, base)
    }

    pub fn with_endpoint(config: &LlmConfig, api_key: String, base: String) -> Result<Self> {
        if api_key.trim().is_empty() {
            bail!("Anthropic API key must not be empty");
        }
        let url = format!("{}/v1/messages", base.trim_end_matches('/'));
        let http = Client::builder()
            .user_agent("premortem/0.3")
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("failed to build Anthropic HTTP client")?;
        Ok(Self {
            http,
            url,
            api_key,
            model: config.model.clone().unwrap_or_else(|| DEFAULT_MODEL.to_string()),
        })
    }

    async fn request(&self, request: &EnrichmentRequest) -> Result<EnrichmentPayload> {
        let payload = MessagesRequest {
            model: self.model.clone(),
            system: SYSTEM_PROMPT.to_string(),
            messages: vec![Message {
                role: "user".to_string(),
                content: render_prompt(request),
            }],
            max_tokens: MAX_OUTPUT_TOKENS,
        };

        let response = self
            .http
            .post(&self.url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .json(&payload)
            .send()
            .await
            .context("failed to call Anthropic messages API")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            bail!("Anthropic API error ({status}): {body}");
        }

        let message: MessagesResponse = response
            .json()
            .await
            .context("failed to parse Anthropic response")?;
        let content = message
            .content
            .into_iter()
            .find_map(|part| part.text)
            .context("Anthropic response missing message content")?;

        parse_payload(&content)
    }
}

#[async_trait]
impl Enricher for AnthropicEnricher {
    async fn enrich(&self, request: &EnrichmentRequest) -> EnrichmentOutcome {
        match self.request(request).await {
            Ok(payload) => {
                debug!(rule_id = %request.rule_id, "enrichment response accepted");
                EnrichmentOutcome::Enriched {
                    evidence: payload.evidence,
                    recommendation: payload.recommendation,
                }
            }
            Err(err) => EnrichmentOutcome::Failed {
                reason: format!("{err:#}"),
            },
        }
    }

    fn label(&self) -> &str {
        "anthropic"
    }
}

fn render_prompt(request: &EnrichmentRequest) -> String {
    let evidence = request
        .evidence
        .iter()
        .map(|line| format!("  line {}: {}", line.line, line.excerpt))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Finding {id} ({severity}, {category}) in {file}: {title}\n\
         Impact: {impact}\n\
         Heuristic recommendation: {recommendation}\n\
         Heuristic evidence:\n{evidence}\n\n\
         Document excerpt:\n{excerpt}\n",
        id = request.rule_id,
        severity = request.severity.label(),
        category = request.category.as_str(),
        file = request.file,
        title = request.title,
        impact = request.impact,
        recommendation = request.recommendation,
        evidence = evidence,
        excerpt = request.excerpt,
    )
}

/// Models occasionally wrap JSON in fences or trailing prose; strip fences
/// and fall back to json5 before giving up.
fn parse_payload(content: &str) -> Result<EnrichmentPayload> {
    let trimmed = content
        .trim()
        .trim_start_matches("```json")
        .trim_start_matches("```")
        .trim_end_matches("```")
        .trim();
    if let Ok(payload) = serde_json::from_str::<EnrichmentPayload>(trimmed) {
        return Ok(payload);
    }
    json5::from_str::<EnrichmentPayload>(trimmed)
        .context("expected JSON enrichment payload from Anthropic response")
}

#[derive(Serialize)]
struct MessagesRequest {
    model: String,
    system: String,
    messages: Vec<Message>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentPart>,
}

#[derive(Deserialize)]
struct ContentPart {
    #[serde(rename = "type")]
    _type: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EnrichmentPayload {
    evidence: Vec<EvidenceLine>,
    recommendation: String,
}
