//! Embedding providers used to vectorize code chunks and queries
//!
//! `ollama` and `openai` talk HTTP; `mock` hashes text locally and needs no
//! service.

use crate::error::{Error, Result};
use crate::repo::EmbeddingConfig;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Turns text into fixed-length vectors
#[async_trait::async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// One vector per input, in input order
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| Error::Provider {
            service: "embedding",
            status: 200,
            body: "no embedding returned".to_string(),
        })
    }

    /// Length of every vector this provider returns
    fn dimension(&self) -> usize;
}

/// Build the provider named by `embedding.provider`
pub fn from_config(config: &EmbeddingConfig) -> Result<Arc<dyn EmbeddingProvider>> {
    let provider: Arc<dyn EmbeddingProvider> = match config.provider.as_str() {
        "ollama" => Arc::new(
            LocalEmbedding::new(&config.endpoint, &config.model).with_dimension(config.dimension),
        ),
        "openai" => Arc::new(
            OpenAIEmbedding::new(&config.endpoint, &config.model, config.resolved_api_key().as_deref())
                .with_dimension(config.dimension),
        ),
        "mock" => Arc::new(MockEmbedding::new(config.dimension)),
        other => {
            return Err(Error::Configuration(format!(
                "unknown embedding provider '{}' (expected 'ollama', 'openai' or 'mock')",
                other
            )))
        }
    };
    Ok(provider)
}

/// POST `body` as JSON and decode a JSON reply, mapping non-2xx to `Provider`
async fn post_json<B, R>(
    request: reqwest::RequestBuilder,
    service: &'static str,
    body: &B,
) -> Result<R>
where
    B: Serialize + ?Sized,
    R: DeserializeOwned,
{
    let response = request
        .json(body)
        .send()
        .await
        .map_err(|e| Error::transport("Failed to send embedding request", e))?;

    let status = response.status();
    if !status.is_success() {
        return Err(Error::Provider {
            service,
            status: status.as_u16(),
            body: response.text().await.unwrap_or_default(),
        });
    }

    response
        .json()
        .await
        .map_err(|e| Error::transport("Failed to parse embedding response", e))
}

/// Ollama `/api/embeddings`, one request per text
pub struct LocalEmbedding {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    dimension: usize,
}

impl LocalEmbedding {
    pub fn new(endpoint: &str, model: &str) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            client: reqwest::Client::new(),
            dimension: 384,
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
}

#[derive(Deserialize)]
struct OllamaResponse {
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for LocalEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let url = format!("{}/api/embeddings", self.endpoint);
        let mut vectors = Vec::with_capacity(texts.len());

        for prompt in texts {
            let body = OllamaRequest {
                model: &self.model,
                prompt,
            };
            let reply: OllamaResponse =
                post_json(self.client.post(&url), "Ollama embedding", &body).await?;
            vectors.push(reply.embedding);
        }

        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// OpenAI-style `/v1/embeddings`, one request per batch
pub struct OpenAIEmbedding {
    endpoint: String,
    model: String,
    api_key: Option<String>,
    client: reqwest::Client,
    dimension: usize,
}

impl OpenAIEmbedding {
    pub fn new(endpoint: &str, model: &str, api_key: Option<&str>) -> Self {
        Self {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: model.to_string(),
            api_key: api_key.map(str::to_string),
            client: reqwest::Client::new(),
            dimension: 1536,
        }
    }

    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }
}

#[derive(Serialize)]
struct OpenAIRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct OpenAIResponse {
    data: Vec<OpenAIVector>,
}

#[derive(Deserialize)]
struct OpenAIVector {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait::async_trait]
impl EmbeddingProvider for OpenAIEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut request = self
            .client
            .post(format!("{}/v1/embeddings", self.endpoint));
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let body = OpenAIRequest {
            model: &self.model,
            input: texts,
        };
        let mut reply: OpenAIResponse = post_json(request, "OpenAI embedding", &body).await?;

        // the API may return entries out of order
        reply.data.sort_by_key(|v| v.index);
        Ok(reply.data.into_iter().map(|v| v.embedding).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Deterministic offline provider
///
/// Each component comes from one byte of the text's SHA-256 digest, scaled
/// to [-1, 1]. Equal texts always get equal vectors.
pub struct MockEmbedding {
    dimension: usize,
}

impl MockEmbedding {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let digest = Sha256::digest(text.as_bytes());
        digest
            .iter()
            .cycle()
            .take(self.dimension)
            .map(|&b| f32::from(b) / 127.5 - 1.0)
            .collect()
    }
}

#[async_trait::async_trait]
impl EmbeddingProvider for MockEmbedding {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}
