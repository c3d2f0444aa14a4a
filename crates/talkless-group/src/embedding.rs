//! Sentence embedding client.
//!
//! The grouping contract only requires unit-length vectors compared by
//! cosine distance; which model serves them is deployment configuration.
//! The HTTP client speaks the common `/embeddings` shape (model + input
//! array in, `data[].embedding` out) used by hosted embedding services and
//! local model servers alike.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use talkless_core::{EmbeddingConfig, Result, TalklessError};

const BATCH_SIZE: usize = 64;
const BATCH_DELAY_MS: u64 = 200;

/// A capability that maps texts to unit-length vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a batch of texts, returning vectors in the same order.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Dimensionality of the returned vectors.
    fn dimensions(&self) -> usize;
}

#[derive(Serialize)]
struct EmbedRequest {
    model: String,
    input: Vec<String>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedDataItem>,
}

#[derive(Deserialize)]
struct EmbedDataItem {
    embedding: Vec<f32>,
}

/// HTTP embedding client.
#[derive(Debug)]
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
    model: String,
    dimensions: usize,
}

impl HttpEmbedder {
    /// Create a client from the grouping configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TalklessError::Config`] if no endpoint is configured or a
    /// declared API key variable is unset.
    pub fn with_config(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config.endpoint.clone().ok_or_else(|| {
            TalklessError::Config(
                "no embedding endpoint configured: set grouping.embedding.endpoint".into(),
            )
        })?;

        let api_key = match &config.api_key_env {
            None => None,
            Some(var) => Some(std::env::var(var).map_err(|_| {
                TalklessError::Config(format!("embedding API key env {var} is not set"))
            })?),
        };

        Ok(Self {
            client: reqwest::Client::new(),
            endpoint,
            api_key,
            model: config.model.clone(),
            dimensions: config.dimensions,
        })
    }

    async fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let request = EmbedRequest {
            model: self.model.clone(),
            input: texts.to_vec(),
        };

        let mut builder = self.client.post(&self.endpoint).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.header("Authorization", format!("Bearer {key}"));
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TalklessError::Embedding(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "unable to read response body".into());
            return Err(TalklessError::Embedding(format!(
                "embedding API returned {status}: {body}"
            )));
        }

        let parsed: EmbedResponse = response
            .json()
            .await
            .map_err(|e| TalklessError::Embedding(format!("failed to parse response: {e}")))?;

        Ok(parsed
            .data
            .into_iter()
            .map(|item| unit_normalize(item.embedding))
            .collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut all = Vec::with_capacity(texts.len());
        for (i, chunk) in texts.chunks(BATCH_SIZE).enumerate() {
            if i > 0 {
                tokio::time::sleep(tokio::time::Duration::from_millis(BATCH_DELAY_MS)).await;
            }
            all.extend(self.embed_chunk(chunk).await?);
        }
        Ok(all)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Scale a vector to unit length. Zero vectors pass through unchanged so a
/// degenerate model response cannot produce NaNs downstream.
///
/// # Examples
///
/// ```
/// use talkless_group::embedding::unit_normalize;
///
/// let v = unit_normalize(vec![3.0, 4.0]);
/// assert!((v[0] - 0.6).abs() < 1e-6);
/// assert!((v[1] - 0.8).abs() < 1e-6);
/// ```
pub fn unit_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let magnitude: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if magnitude > 0.0 {
        for x in &mut v {
            *x /= magnitude;
        }
    }
    v
}
