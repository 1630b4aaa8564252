//! Orchestrates one `index()` or `reset()` run across the scanner, batch
//! builder, embed workers, and the single upsert writer.

use std::sync::Arc;
use std::time::Duration;

use embedding::{EmbeddingProvider, ResilientProvider, RetryConfig, Sidecar};
use futures::stream::{FuturesUnordered, StreamExt};
use ingest_core::document::ChunkParams;
use ingest_core::{Error, IndexConfig, WorkUnit};
use index::{BatchBuilder, Scanner};
use store::Store;
use tokio::sync::Semaphore;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::embed_worker::EmbedWorker;
use crate::upsert_worker::UpsertWorker;

/// Per-request deadline for a single embed HTTP call (§5).
const EMBED_REQUEST_DEADLINE: Duration = Duration::from_secs(120);
/// Total deadline for one orchestrator run (§5).
const RUN_DEADLINE: Duration = Duration::from_secs(60 * 60);
/// How long to wait for the TEI sidecar to report ready on startup.
const SIDECAR_STARTUP_DEADLINE: Duration = Duration::from_secs(60);

pub struct IndexService {
  config: IndexConfig,
  store: Arc<Store>,
  embed_worker: Arc<EmbedWorker>,
  upsert_worker: UpsertWorker,
  embed_concurrency: usize,
  cancellation: CancellationToken,
}

impl IndexService {
  /// Open the store, spawn the TEI sidecar, and wrap it with the resilient
  /// retry client. This is the production entry point; tests should prefer
  /// [`IndexService::with_provider`] to avoid depending on a real sidecar
  /// binary being on `PATH`.
  pub async fn new(config: IndexConfig) -> Result<Self, Error> {
    config.validate()?;

    let store = Arc::new(
      Store::open(&config.store_dir, &config.store_collection, config.embedding_dim)
        .await
        .map_err(Into::<Error>::into)?,
    );

    let mut sidecar = Sidecar::new(
      "text-embeddings-router",
      config.tei_port,
      config.embedding_model.clone(),
      config.embedding_dim,
    );
    let raw_provider = sidecar.start(SIDECAR_STARTUP_DEADLINE).await?;
    let provider: Arc<dyn EmbeddingProvider> = Arc::new(ResilientProvider::with_config(raw_provider, RetryConfig::for_local()));

    Self::with_provider(config, store, provider).await
  }

  /// Build a service from an already-open store and embedding provider.
  pub async fn with_provider(
    config: IndexConfig,
    store: Arc<Store>,
    provider: Arc<dyn EmbeddingProvider>,
  ) -> Result<Self, Error> {
    config.validate()?;

    let chunk_params = ChunkParams {
      chunk_size: config.chunk_size,
      overlap: config.chunk_overlap,
    };
    let embed_worker = Arc::new(EmbedWorker::new(provider, chunk_params, config.tei_batch_size));
    let queue_capacity = (config.n_workers * config.workers_per_gpu).max(1);
    let upsert_worker = UpsertWorker::spawn(store.clone(), config.upsert_batch, queue_capacity).await?;

    Ok(Self {
      embed_concurrency: config.workers_per_gpu.max(1),
      config,
      store,
      embed_worker,
      upsert_worker,
      cancellation: CancellationToken::new(),
    })
  }

  /// A token that, when cancelled, stops accepting new work units and drains
  /// the upsert queue for batches already embedded (§5, §8.6).
  pub fn cancellation_token(&self) -> CancellationToken {
    self.cancellation.clone()
  }

  /// Scan for changed files, embed and upsert them, and return a one-line
  /// summary (§4.7).
  pub async fn index(&self) -> Result<String, Error> {
    let indexed = self.upsert_worker.indexed_files().await;
    let files = Scanner::new().scan(&self.config.docs_dir, &indexed).map_err(Into::<Error>::into)?;

    if files.is_empty() {
      return Ok("no changes".to_string());
    }

    let worker_count = self.config.n_workers * self.config.workers_per_gpu;
    let builder = BatchBuilder::new(worker_count)?;
    let units = builder.build(&files)?;

    match timeout(RUN_DEADLINE, self.run_units(units)).await {
      Ok(result) => result,
      Err(_) => {
        self.cancellation.cancel();
        Err(Error::Cancelled)
      }
    }
  }

  /// Drop and recreate the collection for a full reindex from empty (§4.7).
  pub async fn reset(&self) -> Result<(), Error> {
    self
      .store
      .delete_collection(&self.config.store_collection)
      .await
      .map_err(Into::<Error>::into)?;
    self
      .store
      .get_or_create_collection(&self.config.store_collection)
      .await
      .map_err(Into::<Error>::into)?;
    Ok(())
  }

  async fn run_units(&self, units: Vec<(WorkUnit, usize)>) -> Result<String, Error> {
    let semaphore = Arc::new(Semaphore::new(self.embed_concurrency));
    let mut in_flight = FuturesUnordered::new();

    for (unit, worker_id) in units {
      let embed_worker = self.embed_worker.clone();
      let cancel = self.cancellation.clone();
      let semaphore = semaphore.clone();

      in_flight.push(async move {
        let _permit = semaphore.acquire_owned().await.map_err(|_| Error::Cancelled)?;
        tokio::select! {
          biased;
          _ = cancel.cancelled() => Err(Error::Cancelled),
          outcome = timeout(EMBED_REQUEST_DEADLINE, embed_worker.embed(&unit, worker_id)) => {
            outcome.map_err(|_| Error::TransientIO("embed request timed out".to_string()))?
          }
        }
      });
    }

    let mut total = 0usize;
    while let Some(outcome) = in_flight.next().await {
      if self.cancellation.is_cancelled() {
        warn!("index run cancelled, draining remaining embedded batches");
      }

      match outcome {
        Ok(batch) => {
          total += self.upsert_worker.upsert(batch).await?;
        }
        Err(Error::Cancelled) => continue,
        Err(e) => return Err(e),
      }
    }

    if self.cancellation.is_cancelled() {
      return Err(Error::Cancelled);
    }

    info!(total, "index run complete");
    Ok(format!("Indexed {total} passages."))
  }
}
