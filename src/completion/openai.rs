// OpenAI chat-completions client

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::config::CompletionConfig;
use crate::error::{Result, RobertaError};
use super::{CompletionRequest, CompletionService};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatChoice {
    pub message: ChatMessage,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    pub message: String,
    #[serde(default)]
    pub code: Option<String>,
}

/// API key for the completion service
#[derive(Clone)]
pub struct ApiKey(String);

impl ApiKey {
    /// Read the key from the environment variable `var`
    pub fn from_env(var: &str) -> Result<Self> {
        Self::from_value(var, std::env::var(var).ok())
    }

    /// Build a key from the value found for `var`; blank counts as missing
    fn from_value(var: &str, value: Option<String>) -> Result<Self> {
        match value {
            Some(key) if !key.trim().is_empty() => Ok(Self(key.trim().to_string())),
            _ => Err(RobertaError::MissingCredential(var.to_string())),
        }
    }

    fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ApiKey(***)")
    }
}

pub struct OpenAiClient {
    client: Client,
    endpoint: String,
    api_key: ApiKey,
}

impl OpenAiClient {
    pub fn new(config: &CompletionConfig, api_key: ApiKey) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(concat!("roberta/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            endpoint: config.endpoint.trim_end_matches('/').to_string(),
            api_key,
        })
    }
}

#[async_trait]
impl CompletionService for OpenAiClient {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let url = format!("{}/chat/completions", self.endpoint);

        debug!("Sending completion request to: {} ({} chars)", url, request.user_content().len());

        let response = self.client
            .post(&url)
            .bearer_auth(self.api_key.expose())
            .json(request)
            .send()
            .await
            .map_err(|e| RobertaError::Completion(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(RobertaError::Completion(format!(
                "API error {}: {}", status, api_error_message(&error_text)
            )));
        }

        let body: ChatCompletionResponse = response.json().await
            .map_err(|e| RobertaError::Completion(format!("Failed to parse response: {}", e)))?;

        first_choice_content(body)
    }
}

/// Human-readable message of an API error body, or the raw body
pub fn api_error_message(body: &str) -> String {
    match serde_json::from_str::<ApiErrorBody>(body) {
        Ok(parsed) => match parsed.error.code {
            Some(code) => format!("{} ({})", parsed.error.message, code),
            None => parsed.error.message,
        },
        Err(_) => body.trim().to_string(),
    }
}

fn first_choice_content(body: ChatCompletionResponse) -> Result<String> {
    body.choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content.unwrap_or_default())
        .ok_or_else(|| RobertaError::Completion("Response contained no choices".to_string()))
}
