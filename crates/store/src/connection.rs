use lancedb::{Connection, connect};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};

use crate::schema::chunks_schema;

#[derive(Error, Debug)]
pub enum StoreError {
  #[error("LanceDB error: {0}")]
  Lance(#[from] lancedb::Error),
  #[error("Arrow error: {0}")]
  Arrow(#[from] arrow::error::ArrowError),
  #[error("IO error: {0}")]
  Io(#[from] std::io::Error),
  #[error("not found: {0}")]
  NotFound(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

impl From<StoreError> for ingest_core::Error {
  fn from(e: StoreError) -> Self {
    match e {
      StoreError::Lance(e) => ingest_core::Error::StoreConflict(e.to_string()),
      StoreError::Arrow(e) => ingest_core::Error::StoreConflict(e.to_string()),
      StoreError::Io(e) => ingest_core::Error::Io(e),
      StoreError::NotFound(m) => ingest_core::Error::StoreConflict(m),
    }
  }
}

/// Vector store handle for one collection.
///
/// Owns the single `chunks` table used by the whole pipeline — unlike the
/// multi-table connection this is adapted from, ingestion has exactly one
/// table, so there is no per-table accessor sprawl.
pub struct Store {
  pub path: PathBuf,
  pub collection: String,
  pub vector_dim: usize,
  connection: Connection,
}

impl Store {
  /// Open (creating if absent) the store at `path`, ensuring `collection` exists.
  pub async fn open(path: &Path, collection: &str, vector_dim: usize) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    info!(path = %path.display(), "opening vector store");
    let connection = connect(path.to_string_lossy().as_ref()).execute().await?;

    let store = Self {
      path: path.to_path_buf(),
      collection: collection.to_string(),
      vector_dim,
      connection,
    };
    store.get_or_create_collection(collection).await?;
    Ok(store)
  }

  /// Create the named collection if it does not already exist.
  pub async fn get_or_create_collection(&self, name: &str) -> Result<()> {
    let names = self.connection.table_names().execute().await?;
    if !names.contains(&name.to_string()) {
      debug!(collection = name, "creating collection");
      self
        .connection
        .create_empty_table(name, chunks_schema(self.vector_dim))
        .execute()
        .await?;
    }
    Ok(())
  }

  /// Drop the named collection entirely. Used by `reset()` ahead of a full
  /// reindex from empty.
  pub async fn delete_collection(&self, name: &str) -> Result<()> {
    let names = self.connection.table_names().execute().await?;
    if names.contains(&name.to_string()) {
      self.connection.drop_table(name, &[]).await?;
    }
    Ok(())
  }

  pub(crate) async fn table(&self) -> Result<lancedb::Table> {
    Ok(self.connection.open_table(&self.collection).execute().await?)
  }
}
