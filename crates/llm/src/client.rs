//! Minimal chat-completions client for the verification call.
//!
//! Talks to any OpenAI-compatible endpoint. The request timeout is a hard
//! bound on the verification step; on expiry the caller falls back to the
//! deterministic result.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default verification timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Default model name when `LLM_MODEL` is unset.
const DEFAULT_MODEL: &str = "glm-4.5";

/// Default API base URL when `LLM_BASE_URL` is unset.
const DEFAULT_BASE_URL: &str = "https://api.z.ai/api/coding/paas/v4";

/// Errors from the verification transport.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    #[error("verification request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("verification response contained no content")]
    EmptyResponse,
}

/// Configuration for the verification client, loaded from the environment.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// API key. Verification is disabled entirely when unset.
    pub api_key: String,
    /// Base URL of the OpenAI-compatible API.
    pub base_url: String,
    /// Model name sent with each request.
    pub model: String,
    /// Hard cap on each verification call.
    pub timeout: Duration,
}

impl LlmConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var            | Default                              |
    /// |--------------------|--------------------------------------|
    /// | `LLM_API_KEY`      | -- (None disables)                   |
    /// | `LLM_BASE_URL`     | `https://api.z.ai/api/coding/paas/v4`|
    /// | `LLM_MODEL`        | `glm-4.5`                            |
    /// | `LLM_TIMEOUT_SECS` | `5`                                  |
    ///
    /// Returns `None` when no API key is configured -- the executor then
    /// skips verification and trusts the deterministic result alone.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty())?;

        let base_url = std::env::var("LLM_BASE_URL")
            .ok()
            .filter(|u| !u.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_URL.into());

        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.into());

        let timeout_secs: u64 = std::env::var("LLM_TIMEOUT_SECS")
            .unwrap_or_else(|_| DEFAULT_TIMEOUT_SECS.to_string())
            .parse()
            .expect("LLM_TIMEOUT_SECS must be a valid u64");

        Some(Self {
            api_key,
            base_url,
            model,
            timeout: Duration::from_secs(timeout_secs),
        })
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// A configured chat-completions client.
pub struct LlmClient {
    http: reqwest::Client,
    config: LlmConfig,
}

impl LlmClient {
    /// Build a client with the timeout baked into the underlying HTTP
    /// client.
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self { http, config })
    }

    /// Build a client from the environment, or `None` when verification is
    /// not configured.
    pub fn from_env() -> Result<Option<Self>, LlmError> {
        match LlmConfig::from_env() {
            Some(config) => Ok(Some(Self::new(config)?)),
            None => Ok(None),
        }
    }

    /// Send one chat prompt and return the raw response text.
    pub async fn chat(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!(
            "{}/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );

        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content:
                        "You are a calculator. Respond only with valid JSON containing the result.",
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            temperature: 0.0,
            max_tokens: 50,
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json::<ChatResponse>()
            .await?;

        response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(LlmError::EmptyResponse)
    }
}
