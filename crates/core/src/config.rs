//! Layered configuration for the ingestion pipeline.
//!
//! Priority, highest first: environment variables > project-relative
//! (`./ingest.toml`) > user config (`~/.config/doc-ingest/config.toml`) >
//! built-in defaults. A missing config file at any layer is not an error —
//! every field has a documented default.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// All tunables named in the external-interfaces configuration table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct IndexConfig {
  /// Number of embed-worker processes.
  pub n_workers: usize,
  /// Concurrent embed calls per worker process.
  pub workers_per_gpu: usize,
  /// Token-splitter target node size.
  pub chunk_size: usize,
  /// Token-splitter overlap between nodes.
  pub chunk_overlap: usize,
  /// Texts per sidecar `/embed` request.
  pub tei_batch_size: usize,
  /// Rows per store upsert call.
  pub upsert_batch: usize,
  /// Directory the vector store persists to.
  pub store_dir: PathBuf,
  /// Collection name within the store.
  pub store_collection: String,
  /// Model identifier passed to the embedding sidecar.
  pub embedding_model: String,
  /// Dense vector width produced by `embedding_model`.
  pub embedding_dim: usize,
  /// Local port the sidecar listens on.
  pub tei_port: u16,
  /// Directory scanned for documents to index.
  pub docs_dir: PathBuf,
}

impl Default for IndexConfig {
  fn default() -> Self {
    Self {
      n_workers: 8,
      workers_per_gpu: 4,
      chunk_size: 1024,
      chunk_overlap: 128,
      tei_batch_size: 32,
      upsert_batch: 5_000,
      store_dir: PathBuf::from("./data/store"),
      store_collection: "documents".to_string(),
      embedding_model: "BAAI/bge-small-en-v1.5".to_string(),
      embedding_dim: 384,
      tei_port: 8881,
      docs_dir: PathBuf::from("./data/docs"),
    }
  }
}

impl IndexConfig {
  /// Validate the cross-field invariants that a malformed config file can
  /// violate; this is the `Configuration` error class from the error taxonomy.
  pub fn validate(&self) -> Result<(), crate::Error> {
    if self.n_workers == 0 {
      return Err(crate::Error::Configuration("n_workers must be > 0".to_string()));
    }
    if self.workers_per_gpu == 0 {
      return Err(crate::Error::Configuration("workers_per_gpu must be > 0".to_string()));
    }
    if self.chunk_size == 0 {
      return Err(crate::Error::Configuration("chunk_size must be > 0".to_string()));
    }
    if self.chunk_overlap >= self.chunk_size {
      return Err(crate::Error::Configuration(
        "chunk_overlap must be smaller than chunk_size".to_string(),
      ));
    }
    if self.tei_batch_size == 0 {
      return Err(crate::Error::Configuration("tei_batch_size must be > 0".to_string()));
    }
    if self.upsert_batch == 0 {
      return Err(crate::Error::Configuration("upsert_batch must be > 0".to_string()));
    }
    Ok(())
  }

  /// Load layered config for a docs-dir-owning project, applying environment
  /// overrides last.
  pub fn load(project_path: &Path) -> Result<Self, crate::Error> {
    let mut config = Self::default();

    if let Some(user_path) = Self::user_config_path()
      && user_path.exists()
      && let Ok(content) = std::fs::read_to_string(&user_path)
    {
      config = toml::from_str(&content).map_err(|e| crate::Error::Configuration(e.to_string()))?;
    }

    let project_config = Self::project_config_path(project_path);
    if project_config.exists() {
      let content = std::fs::read_to_string(&project_config)?;
      config = toml::from_str(&content).map_err(|e| crate::Error::Configuration(e.to_string()))?;
    }

    config.apply_env_overrides();
    config.validate()?;
    Ok(config)
  }

  fn apply_env_overrides(&mut self) {
    if let Ok(v) = std::env::var("N_WORKERS")
      && let Ok(v) = v.parse()
    {
      self.n_workers = v;
    }
    if let Ok(v) = std::env::var("WORKERS_PER_GPU")
      && let Ok(v) = v.parse()
    {
      self.workers_per_gpu = v;
    }
    if let Ok(v) = std::env::var("CHUNK_SIZE")
      && let Ok(v) = v.parse()
    {
      self.chunk_size = v;
    }
    if let Ok(v) = std::env::var("CHUNK_OVERLAP")
      && let Ok(v) = v.parse()
    {
      self.chunk_overlap = v;
    }
    if let Ok(v) = std::env::var("TEI_BATCH_SIZE")
      && let Ok(v) = v.parse()
    {
      self.tei_batch_size = v;
    }
    if let Ok(v) = std::env::var("UPSERT_BATCH")
      && let Ok(v) = v.parse()
    {
      self.upsert_batch = v;
    }
    if let Ok(v) = std::env::var("STORE_DIR") {
      self.store_dir = PathBuf::from(v);
    }
    if let Ok(v) = std::env::var("STORE_COLLECTION") {
      self.store_collection = v;
    }
    if let Ok(v) = std::env::var("EMBEDDING_MODEL") {
      self.embedding_model = v;
    }
    if let Ok(v) = std::env::var("EMBEDDING_DIM")
      && let Ok(v) = v.parse()
    {
      self.embedding_dim = v;
    }
    if let Ok(v) = std::env::var("TEI_PORT")
      && let Ok(v) = v.parse()
    {
      self.tei_port = v;
    }
    if let Ok(v) = std::env::var("DOCS_DIR") {
      self.docs_dir = PathBuf::from(v);
    }
  }

  pub fn user_config_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("CONFIG_DIR") {
      return Some(PathBuf::from(path).join("config.toml"));
    }
    if let Ok(path) = std::env::var("XDG_CONFIG_HOME") {
      return Some(PathBuf::from(path).join("doc-ingest").join("config.toml"));
    }
    dirs::config_dir().map(|p: PathBuf| p.join("doc-ingest").join("config.toml"))
  }

  pub fn project_config_path(project_path: &Path) -> PathBuf {
    project_path.join("ingest.toml")
  }

  pub fn generate_template() -> String {
    r#"# Document ingestion pipeline configuration

n_workers = 8
workers_per_gpu = 4
chunk_size = 1024
chunk_overlap = 128
tei_batch_size = 32
upsert_batch = 5000
store_dir = "./data/store"
store_collection = "documents"
embedding_model = "BAAI/bge-small-en-v1.5"
embedding_dim = 384
tei_port = 8881
docs_dir = "./data/docs"
"#
    .to_string()
  }
}
