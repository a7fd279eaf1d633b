//! HTTP client for the upstream AI chat service (OpenAI-compatible API).

use std::time::Duration;

use backon::{ExponentialBuilder, Retryable};
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use super::config::ChatConfig;

#[derive(Debug, Clone, Error)]
pub enum ChatApiError {
    #[error("network error: {0}")]
    Transport(String),
    #[error("timeout")]
    Timeout,
    #[error("http {status}: {body}")]
    Http { status: u16, body: String },
    #[error("rate limited")]
    RateLimited,
    #[error("invalid api key")]
    InvalidApiKey,
    #[error("json error: {0}")]
    Serde(String),
    #[error("missing api key: CHAT_API_KEY not configured")]
    MissingApiKey,
}

impl ChatApiError {
    /// Returns true if the error is transient and should be retried.
    pub fn should_retry(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Timeout | Self::RateLimited => true,
            Self::Http { status, .. } => (500..=599).contains(status),
            _ => false,
        }
    }
}

/// A message in the conversation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    model: String,
    choices: Vec<ChatChoice>,
}

/// Text completion returned to callers
#[derive(Debug, Clone)]
pub struct ChatCompletion {
    pub model: String,
    pub content: String,
}

/// Client for the chat completions endpoint
#[derive(Debug, Clone)]
pub struct ChatApiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl ChatApiClient {
    const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

    pub fn from_config(config: &ChatConfig) -> Result<Self, ChatApiError> {
        let api_key = config.api_key.clone().ok_or(ChatApiError::MissingApiKey)?;

        let http = Client::builder()
            .timeout(Self::REQUEST_TIMEOUT)
            .user_agent(concat!("blog-server/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ChatApiError::Transport(e.to_string()))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    /// Send a completion request, retrying transient failures.
    pub async fn complete(
        &self,
        messages: Vec<ChatMessage>,
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<ChatCompletion, ChatApiError> {
        let request = ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            max_tokens,
            temperature,
        };

        (|| async { self.send_request(&request).await })
            .retry(
                &ExponentialBuilder::default()
                    .with_min_delay(Duration::from_secs(1))
                    .with_max_delay(Duration::from_secs(30))
                    .with_max_times(3)
                    .with_jitter(),
            )
            .when(|e: &ChatApiError| e.should_retry())
            .notify(|e, dur| {
                warn!(
                    "chat api call failed, retrying after {:.2}s: {}",
                    dur.as_secs_f64(),
                    e
                )
            })
            .await
    }

    async fn send_request(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion, ChatApiError> {
        let res = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        match res.status() {
            s if s.is_success() => {
                let body: ChatCompletionResponse = res
                    .json()
                    .await
                    .map_err(|e| ChatApiError::Serde(e.to_string()))?;
                let content = body
                    .choices
                    .into_iter()
                    .next()
                    .map(|c| c.message.content)
                    .ok_or_else(|| ChatApiError::Serde("no choices in response".to_string()))?;
                Ok(ChatCompletion {
                    model: body.model,
                    content,
                })
            }
            StatusCode::UNAUTHORIZED => Err(ChatApiError::InvalidApiKey),
            StatusCode::TOO_MANY_REQUESTS => Err(ChatApiError::RateLimited),
            s => {
                let status = s.as_u16();
                let body = res.text().await.unwrap_or_default();
                Err(ChatApiError::Http { status, body })
            }
        }
    }

    /// Send a single user prompt and return the text response.
    pub async fn ask(
        &self,
        prompt: &str,
        system: Option<String>,
        max_tokens: u32,
        temperature: Option<f32>,
    ) -> Result<ChatCompletion, ChatApiError> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::user(prompt));

        self.complete(messages, max_tokens, temperature).await
    }

    /// Send a prompt expecting JSON in the response.
    pub async fn ask_json<T: for<'de> Deserialize<'de>>(
        &self,
        prompt: &str,
        system: Option<String>,
        max_tokens: u32,
    ) -> Result<T, ChatApiError> {
        let completion = self.ask(prompt, system, max_tokens, None).await?;

        if completion.content.trim().is_empty() {
            return Err(ChatApiError::Serde("empty response from model".to_string()));
        }

        // The model may wrap JSON in markdown code fences
        let json_str = extract_json(&completion.content);

        serde_json::from_str(json_str).map_err(|e| {
            warn!(
                json_error = %e,
                preview = %json_str.chars().take(200).collect::<String>(),
                "failed to parse JSON chat response"
            );
            ChatApiError::Serde(e.to_string())
        })
    }
}

fn map_reqwest_error(e: reqwest::Error) -> ChatApiError {
    if e.is_timeout() {
        ChatApiError::Timeout
    } else {
        ChatApiError::Transport(e.to_string())
    }
}

/// Extract JSON from a string that might contain markdown code blocks
fn extract_json(text: &str) -> &str {
    let text = text.trim();

    if let Some(start) = text.find("```json") {
        let content_start = start + 7;
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    if let Some(start) = text.find("```") {
        let content_start = start + 3;
        // Skip past any language identifier on the same line
        let content_start = text[content_start..]
            .find('\n')
            .map(|i| content_start + i + 1)
            .unwrap_or(content_start);
        if let Some(end) = text[content_start..].find("```") {
            return text[content_start..content_start + end].trim();
        }
    }

    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extract_json_plain() {
        let input = r#"{"advice": "rest"}"#;
        assert_eq!(extract_json(input), r#"{"advice": "rest"}"#);
    }

    #[test]
    fn extract_json_fenced() {
        let input = "Here you go:\n```json\n{\"advice\": \"rest\"}\n```";
        assert_eq!(extract_json(input), r#"{"advice": "rest"}"#);
    }

    #[test]
    fn extract_json_generic_fence() {
        let input = "```\n{\"advice\": \"rest\"}\n```";
        assert_eq!(extract_json(input), r#"{"advice": "rest"}"#);
    }

    #[test]
    fn transient_errors_retry() {
        assert!(ChatApiError::Timeout.should_retry());
        assert!(ChatApiError::RateLimited.should_retry());
        assert!(
            ChatApiError::Http {
                status: 503,
                body: String::new()
            }
            .should_retry()
        );
        assert!(!ChatApiError::InvalidApiKey.should_retry());
        assert!(
            !ChatApiError::Http {
                status: 422,
                body: String::new()
            }
            .should_retry()
        );
    }
}
