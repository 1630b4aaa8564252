//! HTTP client for a local Text Embeddings Inference (TEI) sidecar.

use crate::{EmbeddingError, EmbeddingProvider};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct TeiProvider {
  client: reqwest::Client,
  base_url: String,
  model: String,
  dimensions: usize,
}

impl TeiProvider {
  pub fn new(port: u16, model: impl Into<String>, dimensions: usize) -> Self {
    Self {
      client: reqwest::Client::new(),
      base_url: format!("http://127.0.0.1:{port}"),
      model: model.into(),
      dimensions,
    }
  }

  fn embed_url(&self) -> String {
    format!("{}/embed", self.base_url)
  }

  fn health_url(&self) -> String {
    format!("{}/health", self.base_url)
  }
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
  inputs: &'a [&'a str],
}

#[async_trait]
impl EmbeddingProvider for TeiProvider {
  fn name(&self) -> &str {
    "tei"
  }

  fn model_id(&self) -> &str {
    &self.model
  }

  fn dimensions(&self) -> usize {
    self.dimensions
  }

  async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
    let mut vectors = self.embed_batch(&[text]).await?;
    Ok(vectors.remove(0))
  }

  async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    if texts.is_empty() {
      return Ok(Vec::new());
    }

    debug!(count = texts.len(), "embedding batch via sidecar");

    let request = EmbedRequest { inputs: texts };
    let response = self.client.post(self.embed_url()).json(&request).send().await?;

    if !response.status().is_success() {
      let status = response.status();
      let body = response.text().await.unwrap_or_default();
      warn!("sidecar embed failed: {} - {}", status, body);
      return Err(EmbeddingError::ProviderError(format!("sidecar returned {status}: {body}")));
    }

    let vectors: Vec<Vec<f32>> = response.json().await?;
    if vectors.len() != texts.len() {
      return Err(EmbeddingError::ProviderError(format!(
        "sidecar returned {} vectors for {} inputs",
        vectors.len(),
        texts.len()
      )));
    }
    Ok(vectors)
  }

  async fn is_available(&self) -> bool {
    matches!(self.client.get(self.health_url()).send().await, Ok(r) if r.status().is_success())
  }
}
