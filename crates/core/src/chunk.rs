use crate::document::{Node, SourceMeta};

/// One embeddable unit, ready for the store: a node plus its dense vector.
///
/// `chunk_id` is a stable, locally unique string; two chunks sharing an id
/// within one run must be byte-identical upserts. Every chunk persisted to the
/// store carries `source` and `fingerprint` so the store's metadata alone can
/// reconstruct the indexed-files map (see [`crate::Error`] and the store
/// crate's `indexed_files`).
#[derive(Debug, Clone)]
pub struct Chunk {
  pub chunk_id: String,
  pub vector: Vec<f32>,
  pub text: String,
  pub meta: SourceMeta,
}

impl Chunk {
  pub fn from_node(node: Node, vector: Vec<f32>) -> Self {
    Self {
      chunk_id: node.node_id,
      vector,
      text: node.text,
      meta: node.meta,
    }
  }
}

/// One worker's embedded output, tagged with the worker that produced it so
/// the orchestrator can log which work unit a batch came from.
#[derive(Debug, Clone)]
pub struct ChunkBatch {
  pub worker_id: usize,
  pub chunks: Vec<Chunk>,
}
