use thiserror::Error;

/// Error taxonomy for the ingestion pipeline.
///
/// Each variant's doc comment states the recovery policy, since the policy lives
/// with the call site that owns it rather than in a separate table.
#[derive(Error, Debug)]
pub enum Error {
  /// Bounded-retry-then-surface: sidecar HTTP or store RPC hiccups.
  #[error("transient I/O: {0}")]
  TransientIO(String),

  /// Log-and-skip: a single file or archive entry failed to parse.
  #[error("parse error in {file}: {message}")]
  Parse { file: String, message: String },

  /// Fatal for the owning worker: sidecar never became ready, or died mid-run.
  #[error("sidecar unhealthy: {0}")]
  SidecarUnhealthy(String),

  /// Bounded-retry-with-backoff, then surfaced: store rejected an upsert or delete.
  #[error("store conflict: {0}")]
  StoreConflict(String),

  /// Run was cancelled; in-flight work was drained rather than applied partially.
  #[error("cancelled")]
  Cancelled,

  /// Fatal at startup: bad configuration value or missing directory.
  #[error("configuration: {0}")]
  Configuration(String),

  #[error("I/O: {0}")]
  Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
