//! Hosted reasoning service over HTTP (Anthropic Messages API shape).

use std::time::Duration;

use async_trait::async_trait;
use dealer_core::config::ReasoningConfig;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::DecisionError;
use crate::source::{DecisionRequest, DecisionSource, DescriptionRequest};

pub const API_VERSION: &str = "2023-06-01";

/// Listing copy is short and a little warmer than decisions.
const DESCRIPTION_MAX_TOKENS: u32 = 500;
const DESCRIPTION_TEMPERATURE: f32 = 0.8;

/// Connection settings for [`AnthropicSource`].
#[derive(Debug, Clone)]
pub struct AnthropicConfig {
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub timeout: Duration,
}

impl AnthropicConfig {
    /// Build from the reasoning section of `dealer.yaml`, reading the key
    /// from the environment variable it names.
    pub fn from_reasoning(cfg: &ReasoningConfig) -> Result<Self, DecisionError> {
        let api_key = std::env::var(&cfg.api_key_env)
            .ok()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                DecisionError::Configuration(format!(
                    "{} is not set; export it or use `reasoning.provider: rule_based`",
                    cfg.api_key_env
                ))
            })?;
        Ok(Self::with_key(cfg, api_key))
    }

    pub fn with_key(cfg: &ReasoningConfig, api_key: impl Into<String>) -> Self {
        Self {
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: cfg.model.clone(),
            max_tokens: cfg.max_tokens,
            temperature: cfg.temperature,
            timeout: cfg.timeout(),
        }
    }
}

pub struct AnthropicSource {
    client: reqwest::Client,
    config: AnthropicConfig,
}

impl AnthropicSource {
    pub fn new(config: AnthropicConfig) -> Result<Self, DecisionError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| DecisionError::Configuration(e.to_string()))?;
        Ok(Self { client, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/messages", self.config.base_url)
    }

    fn headers(&self) -> Result<HeaderMap, DecisionError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key)
                .map_err(|e| DecisionError::Configuration(format!("bad API key: {e}")))?,
        );
        Ok(headers)
    }
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    messages: Vec<Message<'a>>,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

fn unavailable(e: reqwest::Error) -> DecisionError {
    if e.is_timeout() {
        DecisionError::UpstreamUnavailable(format!("request timed out: {e}"))
    } else {
        DecisionError::UpstreamUnavailable(e.to_string())
    }
}

impl AnthropicSource {
    /// One user turn in, the first text block out.
    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, DecisionError> {
        let body = MessagesRequest {
            model: &self.config.model,
            max_tokens,
            temperature,
            messages: vec![Message {
                role: "user",
                content: prompt,
            }],
        };
        debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "calling reasoning service"
        );

        let response = self
            .client
            .post(self.endpoint())
            .headers(self.headers()?)
            .json(&body)
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(DecisionError::UpstreamUnavailable(format!(
                "HTTP {status}: {}",
                text.chars().take(300).collect::<String>()
            )));
        }

        let parsed: MessagesResponse = response.json().await.map_err(unavailable)?;
        parsed
            .content
            .into_iter()
            .find(|b| b.kind == "text")
            .and_then(|b| b.text)
            .ok_or_else(|| {
                DecisionError::UpstreamUnavailable("response contained no text block".into())
            })
    }
}

#[async_trait]
impl DecisionSource for AnthropicSource {
    fn name(&self) -> &str {
        "anthropic"
    }

    async fn decide(&self, request: &DecisionRequest) -> Result<String, DecisionError> {
        self.complete(
            &request.prompt,
            self.config.max_tokens,
            self.config.temperature,
        )
        .await
    }

    async fn describe(&self, request: &DescriptionRequest) -> Result<String, DecisionError> {
        self.complete(
            &request.prompt,
            DESCRIPTION_MAX_TOKENS,
            DESCRIPTION_TEMPERATURE,
        )
        .await
    }
}
