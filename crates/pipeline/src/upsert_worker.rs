//! Single-writer upsert discipline: one task owns the store handle, every
//! producer hands it chunk batches over a bounded channel.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use ingest_core::{ChunkBatch, Error};
use store::{Store, StoreResult, delete_stale_generation_predicate};
use tokio::sync::{Mutex, mpsc, oneshot};
use tracing::{debug, warn};

/// Bounded attempts for a single store RPC, beyond the first try.
const STORE_MAX_RETRIES: u32 = 2;
const STORE_INITIAL_BACKOFF: Duration = Duration::from_millis(100);

/// Retry a single store RPC with exponential backoff, surfacing the last
/// error once `STORE_MAX_RETRIES` is exhausted. Mirrors the embedding
/// crate's `ResilientProvider::with_retry`, but against `StoreError` rather
/// than `EmbeddingError`: every `StoreError` is treated as transient here,
/// since the store gives us no finer-grained signal than "the RPC failed".
async fn retry_store<T, F, Fut>(op: F) -> Result<T, Error>
where
  F: Fn() -> Fut,
  Fut: std::future::Future<Output = StoreResult<T>>,
{
  let mut last_error = None;

  for attempt in 0..=STORE_MAX_RETRIES {
    if attempt > 0 {
      let backoff = STORE_INITIAL_BACKOFF * 2u32.pow(attempt - 1);
      warn!(attempt, ?backoff, "retrying store call");
      tokio::time::sleep(backoff).await;
    }

    match op().await {
      Ok(v) => return Ok(v),
      Err(e) => last_error = Some(e),
    }
  }

  Err(last_error.expect("loop runs at least once").into())
}

struct UpsertRequest {
  batch: ChunkBatch,
  reply: oneshot::Sender<Result<usize, Error>>,
}

/// Handle side of the single-writer upsert task. Clone freely; every clone
/// shares the same queue and the same underlying writer.
#[derive(Clone)]
pub struct UpsertWorker {
  tx: mpsc::Sender<UpsertRequest>,
  indexed: Arc<Mutex<HashMap<String, String>>>,
}

impl UpsertWorker {
  /// Open `store`'s current indexed-files map and spawn the single writer
  /// task draining a bounded queue of `queue_capacity` pending batches.
  pub async fn spawn(store: Arc<Store>, upsert_batch: usize, queue_capacity: usize) -> Result<Self, Error> {
    let indexed_map = store.indexed_files().await.map_err(Into::<Error>::into)?;
    let indexed = Arc::new(Mutex::new(indexed_map));
    let (tx, rx) = mpsc::channel(queue_capacity);

    tokio::spawn(run_writer(store, upsert_batch, indexed.clone(), rx));

    Ok(Self { tx, indexed })
  }

  /// Snapshot of the indexed-files map as observed by the writer task. Used
  /// by the Scanner to decide which files need (re)indexing.
  pub async fn indexed_files(&self) -> HashMap<String, String> {
    self.indexed.lock().await.clone()
  }

  /// Enqueue one worker's chunk batch for upsert, applying the delete-first
  /// transactional rule for any source whose fingerprint generation changed.
  /// Returns the number of chunks written once the writer task processes it.
  pub async fn upsert(&self, batch: ChunkBatch) -> Result<usize, Error> {
    let (reply, recv) = oneshot::channel();
    self
      .tx
      .send(UpsertRequest { batch, reply })
      .await
      .map_err(|_| Error::Cancelled)?;
    recv.await.map_err(|_| Error::Cancelled)?
  }
}

async fn run_writer(
  store: Arc<Store>,
  upsert_batch: usize,
  indexed: Arc<Mutex<HashMap<String, String>>>,
  mut rx: mpsc::Receiver<UpsertRequest>,
) {
  while let Some(UpsertRequest { batch, reply }) = rx.recv().await {
    let result = apply_batch(&store, upsert_batch, &indexed, batch).await;
    if let Err(e) = &result {
      warn!(error = %e, "upsert batch failed");
    }
    let _ = reply.send(result);
  }
}

async fn apply_batch(
  store: &Store,
  upsert_batch: usize,
  indexed: &Mutex<HashMap<String, String>>,
  batch: ChunkBatch,
) -> Result<usize, Error> {
  let mut new_generation: HashMap<String, String> = HashMap::new();
  for chunk in &batch.chunks {
    new_generation
      .entry(chunk.meta.source.clone())
      .or_insert_with(|| chunk.meta.fingerprint.clone());
  }

  let mut indexed = indexed.lock().await;
  for (source, new_fp) in &new_generation {
    if let Some(old_fp) = indexed.get(source)
      && old_fp != new_fp
    {
      let predicate = delete_stale_generation_predicate(source, old_fp);
      retry_store(|| store.delete_where(&predicate)).await?;
    }
    indexed.insert(source.clone(), new_fp.clone());
  }
  drop(indexed);

  let mut written = 0;
  for sub in batch.chunks.chunks(upsert_batch) {
    retry_store(|| store.upsert(sub)).await?;
    written += sub.len();
  }

  debug!(worker_id = batch.worker_id, written, "upsert worker applied batch");
  Ok(written)
}

#[cfg(test)]
mod tests {
  use super::*;
  use ingest_core::Chunk;
  use ingest_core::document::SourceMeta;
  use tempfile::TempDir;

  fn chunk(id: &str, source: &str, fingerprint: &str) -> Chunk {
    Chunk {
      chunk_id: id.to_string(),
      vector: vec![0.1, 0.2, 0.3],
      text: "hello".to_string(),
      meta: SourceMeta {
        source: source.to_string(),
        fingerprint: fingerprint.to_string(),
        filename: None,
      },
    }
  }

  async fn store() -> (TempDir, Arc<Store>) {
    let temp = TempDir::new().unwrap();
    let store = Store::open(&temp.path().join("db"), "documents", 3).await.unwrap();
    (temp, Arc::new(store))
  }

  #[tokio::test]
  async fn upsert_writes_chunks_and_updates_indexed_map() {
    let (_t, store) = store().await;
    let worker = UpsertWorker::spawn(store.clone(), 5_000, 16).await.unwrap();

    let written = worker
      .upsert(ChunkBatch {
        worker_id: 0,
        chunks: vec![chunk("a", "f.txt", "1:1"), chunk("b", "f.txt", "1:1")],
      })
      .await
      .unwrap();

    assert_eq!(written, 2);
    assert_eq!(worker.indexed_files().await.get("f.txt").map(String::as_str), Some("1:1"));
    assert_eq!(store.count(None).await.unwrap(), 2);
  }

  #[tokio::test]
  async fn reindexing_a_source_deletes_the_stale_generation() {
    let (_t, store) = store().await;
    let worker = UpsertWorker::spawn(store.clone(), 5_000, 16).await.unwrap();

    worker
      .upsert(ChunkBatch {
        worker_id: 0,
        chunks: vec![chunk("a", "f.txt", "1:1")],
      })
      .await
      .unwrap();
    worker
      .upsert(ChunkBatch {
        worker_id: 1,
        chunks: vec![chunk("b", "f.txt", "2:2")],
      })
      .await
      .unwrap();

    assert_eq!(store.count(None).await.unwrap(), 1);
    let files = worker.indexed_files().await;
    assert_eq!(files.get("f.txt").map(String::as_str), Some("2:2"));
  }

  #[tokio::test]
  async fn concurrent_upserts_from_different_sources_both_land() {
    let (_t, store) = store().await;
    let worker = UpsertWorker::spawn(store.clone(), 5_000, 16).await.unwrap();

    let a = worker.upsert(ChunkBatch {
      worker_id: 0,
      chunks: vec![chunk("a", "f.txt", "1:1")],
    });
    let b = worker.upsert(ChunkBatch {
      worker_id: 1,
      chunks: vec![chunk("b", "g.txt", "1:1")],
    });
    let (ra, rb) = tokio::join!(a, b);
    ra.unwrap();
    rb.unwrap();

    assert_eq!(store.count(None).await.unwrap(), 2);
  }
}
