//! Embedding generation through a remote embedding service.
//!
//! Defines the [`Embedder`] trait and the [`OpenAIEmbedder`] implementation,
//! plus the batching driver [`embed_batched`] used by the build pipeline and
//! the single-text [`embed_query`] used at query time.
//!
//! # Failure policy
//!
//! There is no retry. The first failed call aborts the whole operation with
//! [`RagError::EmbeddingService`]; vectors from batches that already
//! succeeded are discarded. The per-request timeout from `[embedding]` is the
//! only cancellation mechanism.
//!
//! The service and the index must use the same model. Nothing here can detect
//! a mismatch; the index rejects query vectors of the wrong dimension.

use async_trait::async_trait;
use std::time::Duration;

use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};
use crate::progress::{BuildProgressEvent, BuildProgressReporter};

/// A remote (or fake) text embedding backend.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Returns the model identifier (e.g. `"text-embedding-3-small"`).
    fn model_name(&self) -> &str;

    /// Embed a batch of texts in a single call. Returns one vector per input,
    /// in input order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}

/// Embed `texts` in `ceil(len / batch_size)` calls of at most `batch_size`
/// texts each.
///
/// The output is aligned with `texts`. An empty input makes no calls.
pub async fn embed_batched(
    embedder: &dyn Embedder,
    texts: &[String],
    batch_size: usize,
    progress: &dyn BuildProgressReporter,
) -> Result<Vec<Vec<f32>>> {
    if batch_size == 0 {
        return Err(RagError::InvalidConfig(
            "embedding batch size must be > 0".to_string(),
        ));
    }

    let total = texts.len();
    let mut vectors = Vec::with_capacity(total);

    for batch in texts.chunks(batch_size) {
        let batch_vectors = embedder.embed(batch).await?;
        if batch_vectors.len() != batch.len() {
            return Err(RagError::EmbeddingService(format!(
                "expected {} vectors, service returned {}",
                batch.len(),
                batch_vectors.len()
            )));
        }
        vectors.extend(batch_vectors);
        progress.report(BuildProgressEvent::Embedding {
            n: vectors.len() as u64,
            total: total as u64,
        });
    }

    Ok(vectors)
}

/// Embed a single query text (a batch of one).
pub async fn embed_query(embedder: &dyn Embedder, text: &str) -> Result<Vec<f32>> {
    embedder
        .embed(&[text.to_string()])
        .await?
        .into_iter()
        .next()
        .ok_or_else(|| RagError::EmbeddingService("empty embedding response".to_string()))
}

// ============ OpenAI ============

/// Embedder backed by the OpenAI-compatible `POST {base_url}/embeddings`
/// endpoint.
pub struct OpenAIEmbedder {
    client: reqwest::Client,
    model: String,
    endpoint: String,
    api_key: String,
}

impl OpenAIEmbedder {
    /// Build from configuration, reading the API key from the environment
    /// variable named by `api_key_env`.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env).map_err(|_| {
            RagError::InvalidConfig(format!(
                "{} environment variable not set",
                config.api_key_env
            ))
        })?;
        Self::with_api_key(config, api_key)
    }

    pub fn with_api_key(config: &EmbeddingConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| RagError::EmbeddingService(e.to_string()))?;

        Ok(Self {
            client,
            model: config.model.clone(),
            endpoint: format!("{}/embeddings", config.base_url.trim_end_matches('/')),
            api_key: api_key.into(),
        })
    }
}

#[async_trait]
impl Embedder for OpenAIEmbedder {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let body = serde_json::json!({
            "model": self.model,
            "input": texts,
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::EmbeddingService(describe_transport_error(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingService(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| RagError::EmbeddingService(e.to_string()))?;
        let vectors = parse_openai_response(&json)?;

        tracing::debug!(
            model = %self.model,
            texts = texts.len(),
            "embedding batch complete"
        );
        Ok(vectors)
    }
}

pub(crate) fn describe_transport_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        format!("request timed out: {}", e)
    } else if e.is_connect() {
        format!("connection failed: {}", e)
    } else {
        e.to_string()
    }
}

/// Extract `data[].embedding` arrays, ordered by their `index` field.
fn parse_openai_response(json: &serde_json::Value) -> Result<Vec<Vec<f32>>> {
    let data = json
        .get("data")
        .and_then(|d| d.as_array())
        .ok_or_else(|| invalid_response("missing data array"))?;

    let mut indexed = Vec::with_capacity(data.len());

    for (position, item) in data.iter().enumerate() {
        let embedding = item
            .get("embedding")
            .and_then(|e| e.as_array())
            .ok_or_else(|| invalid_response("missing embedding"))?;

        let vec = embedding
            .iter()
            .map(|v| v.as_f64().map(|f| f as f32))
            .collect::<Option<Vec<f32>>>()
            .ok_or_else(|| invalid_response("non-numeric embedding value"))?;

        let index = item
            .get("index")
            .and_then(|i| i.as_u64())
            .map(|i| i as usize)
            .unwrap_or(position);
        indexed.push((index, vec));
    }

    indexed.sort_by_key(|(index, _)| *index);
    if indexed.iter().enumerate().any(|(i, (index, _))| *index != i) {
        return Err(invalid_response("non-contiguous index"));
    }
    Ok(indexed.into_iter().map(|(_, vec)| vec).collect())
}

fn invalid_response(what: &str) -> RagError {
    RagError::EmbeddingService(format!("invalid OpenAI response: {}", what))
}
