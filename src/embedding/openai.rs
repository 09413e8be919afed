//! Semantic embeddings over an OpenAI-compatible `/embeddings` endpoint.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::{EmbedError, EmbeddingProvider};

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "text-embedding-3-small";
const DEFAULT_DIMENSION: usize = 1536;

/// Blocking client for an OpenAI-compatible embeddings API.
///
/// Vectors are deterministic per call but not stable across model versions.
pub struct OpenAiEmbedder {
    api_key: String,
    model: String,
    base_url: String,
    dimension: usize,
    client: reqwest::blocking::Client,
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Deserialize)]
struct EmbeddingItem {
    index: usize,
    embedding: Vec<f32>,
}

impl OpenAiEmbedder {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            dimension: DEFAULT_DIMENSION,
            client: reqwest::blocking::Client::new(),
        }
    }

    /// Build from `OPENAI_API_KEY`, honouring `OPENAI_BASE_URL` when set.
    pub fn from_env() -> Option<Self> {
        let key = std::env::var("OPENAI_API_KEY").ok()?;
        let embedder = Self::new(key);
        match std::env::var("OPENAI_BASE_URL") {
            Ok(url) => Some(embedder.with_base_url(url)),
            Err(_) => Some(embedder),
        }
    }

    /// Select a model and the dimension it produces.
    pub fn with_model(mut self, model: impl Into<String>, dimension: usize) -> Self {
        self.model = model.into();
        self.dimension = dimension;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Replace the HTTP client, e.g. to set a request timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self, EmbedError> {
        self.client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| EmbedError::Http(e.to_string()))?;
        Ok(self)
    }
}

impl EmbeddingProvider for OpenAiEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.embed_batch(&[text.to_string()])?
            .into_iter()
            .next()
            .ok_or(EmbedError::EmptyResponse)
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .client
            .post(format!("{}/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest { model: &self.model, input: texts })
            .send()
            .map_err(|e| EmbedError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().unwrap_or_default();
            return Err(EmbedError::Api { status: status.as_u16(), message });
        }

        let mut body: EmbeddingResponse = response
            .json()
            .map_err(|e| EmbedError::Http(e.to_string()))?;
        if body.data.len() != texts.len() {
            return Err(EmbedError::EmptyResponse);
        }
        body.data.sort_by_key(|item| item.index);

        let mut vectors = Vec::with_capacity(body.data.len());
        for item in body.data {
            if item.embedding.len() != self.dimension {
                return Err(EmbedError::DimensionMismatch {
                    expected: self.dimension,
                    got: item.embedding.len(),
                });
            }
            vectors.push(item.embedding);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_url_trailing_slash() {
        let e = OpenAiEmbedder::new("sk-test").with_base_url("http://localhost:8080/v1/");
        assert_eq!(e.base_url, "http://localhost:8080/v1");
    }

    #[test]
    fn test_empty_batch_skips_request() {
        let e = OpenAiEmbedder::new("sk-test").with_base_url("http://127.0.0.1:9");
        assert!(e.embed_batch(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_with_model_sets_dimension() {
        let e = OpenAiEmbedder::new("sk-test").with_model("text-embedding-3-large", 3072);
        assert_eq!(e.dimension(), 3072);
        assert_eq!(e.model_name(), "text-embedding-3-large");
    }
}
