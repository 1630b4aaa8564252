//! Parses, splits, and embeds one work unit at a time.

use std::sync::Arc;

use embedding::EmbeddingProvider;
use ingest_core::document::{ChunkParams, split_document};
use ingest_core::{Chunk, ChunkBatch, Error, WorkUnit};
use index::FileParser;
use tracing::debug;

/// One embed-worker invocation: file parsing, token splitting, and batched
/// calls to the shared embedding sidecar. Stateless aside from its
/// dependencies, so the orchestrator can run any number of these concurrently
/// against the same sidecar — the sidecar itself is the serialization point.
pub struct EmbedWorker {
  parser: FileParser,
  chunk_params: ChunkParams,
  tei_batch_size: usize,
  provider: Arc<dyn EmbeddingProvider>,
}

impl EmbedWorker {
  pub fn new(provider: Arc<dyn EmbeddingProvider>, chunk_params: ChunkParams, tei_batch_size: usize) -> Self {
    Self {
      parser: FileParser::new(),
      chunk_params,
      tei_batch_size,
      provider,
    }
  }

  /// Parse, split, and embed one work unit. Chunk order follows node order,
  /// which follows document order within the unit (no cross-unit ordering is
  /// implied or required).
  pub async fn embed(&self, unit: &WorkUnit, worker_id: usize) -> Result<ChunkBatch, Error> {
    let documents = self.parser.parse(unit)?;
    let nodes: Vec<_> = documents.iter().flat_map(|doc| split_document(doc, &self.chunk_params)).collect();

    let mut chunks = Vec::with_capacity(nodes.len());
    for batch in nodes.chunks(self.tei_batch_size) {
      let texts: Vec<&str> = batch.iter().map(|n| n.text.as_str()).collect();
      let vectors = self.provider.embed_batch(&texts).await?;
      for (node, vector) in batch.iter().cloned().zip(vectors) {
        chunks.push(Chunk::from_node(node, vector));
      }
    }

    debug!(worker_id, nodes = chunks.len(), "embed worker finished work unit");
    Ok(ChunkBatch { worker_id, chunks })
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use async_trait::async_trait;
  use embedding::EmbeddingError;
  use std::path::PathBuf;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use tempfile::TempDir;

  struct FakeProvider {
    dimensions: usize,
    calls: AtomicUsize,
  }

  #[async_trait]
  impl EmbeddingProvider for FakeProvider {
    fn name(&self) -> &str {
      "fake"
    }
    fn model_id(&self) -> &str {
      "fake-model"
    }
    fn dimensions(&self) -> usize {
      self.dimensions
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
      let mut v = self.embed_batch(&[text]).await?;
      Ok(v.remove(0))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      Ok(texts.iter().map(|_| vec![1.0; self.dimensions]).collect())
    }

    async fn is_available(&self) -> bool {
      true
    }
  }

  fn provider() -> Arc<FakeProvider> {
    Arc::new(FakeProvider {
      dimensions: 4,
      calls: AtomicUsize::new(0),
    })
  }

  #[tokio::test]
  async fn embeds_loose_files_preserving_node_order() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, "alpha beta gamma").unwrap();

    let fake = provider();
    let worker = EmbedWorker::new(fake.clone(), ChunkParams::default(), 32);
    let unit = WorkUnit::LooseFiles { paths: vec![path] };

    let batch = worker.embed(&unit, 3).await.unwrap();
    assert_eq!(batch.worker_id, 3);
    assert_eq!(batch.chunks.len(), 1);
    assert_eq!(batch.chunks[0].text, "alpha beta gamma");
    assert_eq!(batch.chunks[0].vector, vec![1.0; 4]);
  }

  #[tokio::test]
  async fn splits_sidecar_calls_at_tei_batch_size() {
    let dir = TempDir::new().unwrap();
    let mut paths = Vec::new();
    for i in 0..5 {
      let p: PathBuf = dir.path().join(format!("f{i}.txt"));
      std::fs::write(&p, format!("document number {i}")).unwrap();
      paths.push(p);
    }

    let fake = provider();
    let worker = EmbedWorker::new(fake.clone(), ChunkParams::default(), 2);
    let unit = WorkUnit::LooseFiles { paths };

    let batch = worker.embed(&unit, 0).await.unwrap();
    assert_eq!(batch.chunks.len(), 5);
    // 5 nodes sliced into batches of 2 => 3 sidecar calls
    assert_eq!(fake.calls.load(Ordering::SeqCst), 3);
  }
}
