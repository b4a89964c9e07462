//! Chat-completion client for answer generation.
//!
//! The [`Generator`] trait is the only seam between the retriever and the
//! remote language model. [`OpenAIChat`] implements it against the
//! OpenAI-compatible `POST {base_url}/chat/completions` endpoint.
//!
//! Like the embedding client, a failed call is never retried; transport
//! errors, non-2xx statuses and malformed payloads all become
//! [`RagError::Generation`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::config::GenerationConfig;
use crate::embedding::describe_transport_error;
use crate::error::{RagError, Result};

/// One system + user prompt pair sent to the model.
#[derive(Debug, Clone, Serialize)]
pub struct CompletionRequest {
    pub system: String,
    pub user: String,
    pub model: String,
    pub max_output_tokens: u32,
    pub temperature: f32,
}

/// The model's reply with the token usage it reported.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Completion {
    pub text: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
    pub total_tokens: u64,
}

#[async_trait]
pub trait Generator: Send + Sync {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion>;
}

pub struct OpenAIChat {
    client: reqwest::Client,
    endpoint: String,
    api_key: String,
}

impl OpenAIChat {
    /// Build from configuration, reading the API key from `api_key_env`.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RagError::InvalidConfig(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &GenerationConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::Generation(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Generator for OpenAIChat {
    async fn complete(&self, request: &CompletionRequest) -> Result<Completion> {
        let body = serde_json::json!({
            "model": request.model,
            "messages": [
                {"role": "system", "content": request.system},
                {"role": "user", "content": request.user}
            ],
            "max_tokens": request.max_output_tokens,
            "temperature": request.temperature,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::Generation(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::Generation(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::Generation(e.to_string()))?;
        let completion = parse_chat_response(&json)?;

        tracing::debug!(
            model = %request.model,
            prompt_tokens = completion.prompt_tokens,
            completion_tokens = completion.completion_tokens,
            "chat completion received"
        );
        Ok(completion)
    }
}

fn parse_chat_response(json: &serde_json::Value) -> Result<Completion> {
    let text = json
        .pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .ok_or_else(|| invalid_response("missing choices[0].message.content"))?;

    let usage = json
        .get("usage")
        .ok_or_else(|| invalid_response("missing usage"))?;
    let count = |field: &str| {
        usage
            .get(field)
            .and_then(|v| v.as_u64())
            .ok_or_else(|| invalid_response(&format!("missing usage.{}", field)))
    };

    Ok(Completion {
        text: text.to_string(),
        prompt_tokens: count("prompt_tokens")?,
        completion_tokens: count("completion_tokens")?,
        total_tokens: count("total_tokens")?,
    })
}

fn invalid_response(what: &str) -> RagError {
    RagError::Generation(format!("invalid OpenAI response: {}", what))
}
