use std::time::Duration;

use reqwest::Client;

use crate::error::LlmError;
use crate::stream::ChatStream;
use crate::types::{ChatMessage, ChatOptions, ChatRequest, ChatResponse};
use crate::Result;

/// Environment variable holding the OpenRouter key.
pub const API_KEY_ENV: &str = "OPENROUTER_API_KEY";

const APP_TITLE: &str = "VibeCLI-Unified";
const APP_REFERER: &str = "https://github.com/vibecli/vibe";

/// Client for an OpenAI-compatible `/chat/completions` endpoint.
pub struct ChatClient {
    /// Pre-computed `"Bearer <key>"`.
    auth_header: String,
    base_url: String,
    options: ChatOptions,
    http: Client,
}

impl ChatClient {
    pub fn new(api_key: &str, base_url: &str, options: ChatOptions) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(LlmError::MissingApiKey);
        }
        let http = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .tcp_keepalive(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            auth_header: format!("Bearer {}", api_key.trim()),
            base_url: base_url.trim_end_matches('/').to_string(),
            options,
            http,
        })
    }

    /// Read the key from [`API_KEY_ENV`].
    pub fn from_env(base_url: &str, options: ChatOptions) -> Result<Self> {
        let key = std::env::var(API_KEY_ENV).map_err(|_| LlmError::MissingApiKey)?;
        Self::new(&key, base_url, options)
    }

    pub fn options(&self) -> &ChatOptions {
        &self.options
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }

    async fn send(&self, messages: &[ChatMessage], stream: bool) -> Result<reqwest::Response> {
        let body = ChatRequest {
            model: &self.options.model,
            messages,
            max_tokens: self.options.max_tokens,
            temperature: self.options.temperature,
            stream,
        };
        tracing::debug!(
            model = %self.options.model,
            messages = messages.len(),
            stream,
            "sending chat request"
        );
        let response = self
            .http
            .post(self.endpoint())
            .header("Authorization", &self.auth_header)
            .header("HTTP-Referer", APP_REFERER)
            .header("X-Title", APP_TITLE)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(status = status.as_u16(), "chat request failed");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// One non-streamed completion; returns the assistant text.
    pub async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let response = self.send(messages, false).await?;
        let body = response.text().await?;
        let parsed: ChatResponse =
            serde_json::from_str(&body).map_err(|source| LlmError::Parse { body, source })?;
        if let Some(usage) = parsed.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion usage"
            );
        }
        parsed
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyResponse)
    }

    /// Streamed completion as a [`ChatStream`] of text deltas.
    pub async fn stream(&self, messages: &[ChatMessage]) -> Result<ChatStream> {
        let response = self.send(messages, true).await?;
        Ok(ChatStream::spawn(response))
    }
}
