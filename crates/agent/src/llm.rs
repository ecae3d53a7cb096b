use std::collections::VecDeque;
use std::time::Duration;

use async_trait::async_trait;
use leadbridge_core::config::LlmConfig;
use leadbridge_core::errors::{ClassifiedError, ErrorClass};
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Clone, Debug, PartialEq)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub max_tokens: u32,
    pub temperature: f32,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self { system: system.into(), user: user.into(), max_tokens: 1000, temperature: 0.1 }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Completion {
    pub text: String,
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub model: String,
}

impl Completion {
    pub fn tokens_used(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Clone, Debug, Error, PartialEq)]
pub enum CompletionError {
    #[error("language model is not configured (set LEADBRIDGE_LLM_API_KEY or ANTHROPIC_API_KEY)")]
    Unconfigured,
    #[error("completion request failed: {0}")]
    Http(String),
    #[error("completion endpoint answered HTTP {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(error: reqwest::Error) -> Self {
        Self::Http(error.to_string())
    }
}

impl ClassifiedError for CompletionError {
    fn class(&self) -> ErrorClass {
        ErrorClass::Completion
    }
}

#[async_trait]
pub trait LlmClient: Send + Sync {
    fn model(&self) -> &str;

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError>;
}

/// Anthropic Messages API client.
pub struct AnthropicClient {
    client: Client,
    api_key: SecretString,
    base_url: String,
    model: String,
}

impl AnthropicClient {
    pub fn new(config: &LlmConfig) -> Result<Self, CompletionError> {
        let api_key = config
            .api_key
            .clone()
            .filter(|key| !key.expose_secret().trim().is_empty())
            .ok_or(CompletionError::Unconfigured)?;
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

        Ok(Self {
            client,
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    system: &'a str,
    messages: [Message<'a>; 1],
}

#[derive(Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
    #[serde(default)]
    model: Option<String>,
    usage: Usage,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

#[async_trait]
impl LlmClient for AnthropicClient {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        let body = MessagesRequest {
            model: &self.model,
            max_tokens: request.max_tokens,
            temperature: request.temperature,
            system: &request.system,
            messages: [Message { role: "user", content: &request.user }],
        };

        let response = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", self.api_key.expose_secret())
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Api { status: status.as_u16(), body });
        }

        let payload: MessagesResponse = response
            .json()
            .await
            .map_err(|error| CompletionError::MalformedResponse(error.to_string()))?;
        let text = payload
            .content
            .into_iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text)
            .ok_or_else(|| CompletionError::MalformedResponse("no text block".to_string()))?;

        Ok(Completion {
            text,
            input_tokens: payload.usage.input_tokens,
            output_tokens: payload.usage.output_tokens,
            model: payload.model.unwrap_or_else(|| self.model.clone()),
        })
    }
}

/// Stands in when no API key is configured; every call fails.
pub struct UnconfiguredLlm {
    model: String,
}

impl UnconfiguredLlm {
    pub fn new(model: impl Into<String>) -> Self {
        Self { model: model.into() }
    }
}

#[async_trait]
impl LlmClient for UnconfiguredLlm {
    fn model(&self) -> &str {
        &self.model
    }

    async fn complete(&self, _request: &CompletionRequest) -> Result<Completion, CompletionError> {
        Err(CompletionError::Unconfigured)
    }
}

/// Replays queued replies in order and records every request.
///
/// Once the queue is drained the fallback reply, if any, repeats.
#[derive(Default)]
pub struct ScriptedLlmClient {
    replies: Mutex<VecDeque<Result<String, CompletionError>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<CompletionRequest>>,
}

impl ScriptedLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn repeating(reply: impl Into<String>) -> Self {
        Self { fallback: Some(reply.into()), ..Self::default() }
    }

    pub fn reply(mut self, text: impl Into<String>) -> Self {
        self.replies.get_mut().push_back(Ok(text.into()));
        self
    }

    pub fn fail(mut self, error: CompletionError) -> Self {
        self.replies.get_mut().push_back(Err(error));
        self
    }

    pub async fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().await.clone()
    }
}

#[async_trait]
impl LlmClient for ScriptedLlmClient {
    fn model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<Completion, CompletionError> {
        self.requests.lock().await.push(request.clone());
        let next = self.replies.lock().await.pop_front();
        let text = match (next, &self.fallback) {
            (Some(reply), _) => reply?,
            (None, Some(fallback)) => fallback.clone(),
            (None, None) => {
                return Err(CompletionError::MalformedResponse("no scripted reply left".to_string()))
            }
        };

        Ok(Completion {
            output_tokens: text.split_whitespace().count() as u32,
            input_tokens: request.user.split_whitespace().count() as u32,
            text,
            model: self.model().to_string(),
        })
    }
}
