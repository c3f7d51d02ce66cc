//! OpenAI-compatible chat completions client
//!
//! Talks to any endpoint that implements `POST /chat/completions`
//! (Hugging Face router, OpenAI, Ollama, vLLM, LM Studio, ...).

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::config::LlmSettings;
use crate::crew::Persona;
use crate::error::{Error, GenerationFailureKind, Result};

use super::TextGenerationClient;

// ─────────────────────────────────────────────────────────────────
// OpenAI API types (request/response)
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ApiUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiUsage {
    total_tokens: u64,
}

// ─────────────────────────────────────────────────────────────────
// OpenAI Client
// ─────────────────────────────────────────────────────────────────

pub struct OpenAiClient {
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
    max_retries: u32,
    client: Client,
    total_tokens: RwLock<u64>,
}

impl OpenAiClient {
    /// Build a client from settings.
    ///
    /// Fails without touching the network when the endpoint or model is
    /// unusable, or when a required API key cannot be found.
    pub fn new(settings: &LlmSettings) -> Result<Self> {
        let base = url::Url::parse(&settings.base_url).map_err(|e| {
            Error::config_field_invalid("llm.base_url", format!("invalid base_url '{}': {}", settings.base_url, e))
        })?;
        if base.scheme() != "http" && base.scheme() != "https" {
            return Err(Error::config_field_invalid(
                "llm.base_url",
                "base_url must start with http:// or https://",
            ));
        }
        if settings.model.trim().is_empty() {
            return Err(Error::config_field_invalid("llm.model", "model cannot be empty"));
        }

        let api_key = settings.resolve_api_key();
        if api_key.is_none() && settings.require_api_key {
            return Err(Error::MissingCredentials {
                env_var: settings.api_key_env.clone(),
            });
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()
            .map_err(|e| Error::Internal(format!("Failed to create HTTP client: {}", e)))?;

        info!(
            base_url = %settings.base_url,
            model = %settings.model,
            authenticated = api_key.is_some(),
            "OpenAI-compatible client created"
        );

        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            model: settings.model.clone(),
            api_key,
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
            max_retries: settings.max_retries,
            client,
            total_tokens: RwLock::new(0),
        })
    }

    /// Build the authorization header value (if API key is set)
    fn auth_header(&self) -> Option<String> {
        self.api_key.as_ref().map(|key| format!("Bearer {}", key))
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    /// Tokens reported by the endpoint across all calls
    pub fn total_tokens(&self) -> u64 {
        *self.total_tokens.read()
    }

    /// One HTTP round trip, classified into a generation failure on error
    async fn send_once(&self, body: &ChatCompletionRequest<'_>) -> Result<String> {
        let mut req = self.client.post(self.endpoint()).json(body);
        if let Some(ref auth) = self.auth_header() {
            req = req.header("Authorization", auth);
        }

        let response = req.send().await.map_err(|e| {
            let kind = if e.is_timeout() || e.is_connect() {
                GenerationFailureKind::Network
            } else {
                GenerationFailureKind::Rejected
            };
            Error::generation(kind, format!("request to {} failed: {}", self.endpoint(), e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::generation(
                classify_status(status),
                format!("API error {}: {}", status, body.trim()),
            ));
        }

        let parsed: ChatCompletionResponse = response.json().await.map_err(|e| {
            Error::generation(
                GenerationFailureKind::MalformedResponse,
                format!("failed to parse API response: {}", e),
            )
        })?;

        if let Some(usage) = parsed.usage {
            *self.total_tokens.write() += usage.total_tokens;
        }

        extract_text(parsed.choices)
    }
}

/// Delay before retry number `attempt` (1-based): 500ms doubling each time
fn retry_backoff(attempt: u32) -> Duration {
    let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
    Duration::from_millis(500u64.saturating_mul(factor))
}

/// Map a non-success HTTP status to a failure kind
fn classify_status(status: StatusCode) -> GenerationFailureKind {
    match status.as_u16() {
        401 | 403 => GenerationFailureKind::Authentication,
        429 => GenerationFailureKind::RateLimited,
        500..=599 => GenerationFailureKind::ServerError,
        _ => GenerationFailureKind::Rejected,
    }
}

fn extract_text(choices: Vec<ChatChoice>) -> Result<String> {
    let choice = choices.into_iter().next().ok_or_else(|| {
        Error::generation(GenerationFailureKind::MalformedResponse, "no choices in API response")
    })?;

    match choice.message.content {
        Some(text) if !text.trim().is_empty() => Ok(text),
        _ => Err(Error::generation(
            GenerationFailureKind::MalformedResponse,
            "API response contained no text",
        )),
    }
}

#[async_trait]
impl TextGenerationClient for OpenAiClient {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn generate(&self, persona: &Persona, prompt: &str) -> Result<String> {
        let system_prompt = persona.system_prompt();
        let body = ChatCompletionRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            max_tokens: self.max_tokens,
            temperature: self.temperature,
        };

        let mut attempt = 0;
        loop {
            if attempt > 0 {
                let backoff = retry_backoff(attempt);
                debug!(attempt, ?backoff, "Retrying after error");
                tokio::time::sleep(backoff).await;
            }

            match self.send_once(&body).await {
                Ok(text) => return Ok(text),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    warn!(attempt, error = %e, "Retryable API error");
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
