//! Lifecycle driver for the local TEI embedding sidecar process.
//!
//! States: `Stopped -> Starting -> Ready -> Degraded -> Stopped`. There is no
//! automatic restart from `Stopped`; the owning `EmbedWorker` is expected to
//! be re-created instead.

use std::process::Stdio;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, warn};

use crate::EmbeddingProvider;
use crate::tei::TeiProvider;

/// Stderr lines containing any of these substrings are known-benign sidecar
/// chatter and are not forwarded as warnings.
const STDERR_DENYLIST: &[&str] = &["Adding `Cache-Control`", "Invalid Request", "metrics:"];

/// Consecutive request failures (while the process is still alive) before a
/// `Ready` sidecar is demoted to `Stopped`.
const MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarState {
  Stopped,
  Starting,
  Ready,
  Degraded,
}

#[derive(Debug, Error)]
pub enum SidecarError {
  #[error("failed to spawn sidecar: {0}")]
  Spawn(#[from] std::io::Error),
  #[error("sidecar did not become ready within {0:?}")]
  ReadinessTimeout(Duration),
  #[error("sidecar process exited before becoming ready")]
  ExitedEarly,
}

impl From<SidecarError> for ingest_core::Error {
  fn from(e: SidecarError) -> Self {
    ingest_core::Error::SidecarUnhealthy(e.to_string())
  }
}

/// Owns one TEI child process and its readiness/failure bookkeeping.
pub struct Sidecar {
  port: u16,
  model: String,
  dimensions: usize,
  binary: String,
  state: SidecarState,
  child: Option<Child>,
  consecutive_failures: u32,
}

impl Sidecar {
  pub fn new(binary: impl Into<String>, port: u16, model: impl Into<String>, dimensions: usize) -> Self {
    Self {
      port,
      model: model.into(),
      dimensions,
      binary: binary.into(),
      state: SidecarState::Stopped,
      child: None,
      consecutive_failures: 0,
    }
  }

  pub fn state(&self) -> SidecarState {
    self.state
  }

  /// Spawn the sidecar process and poll its readiness endpoint until it
  /// accepts requests, or `startup_timeout` elapses.
  pub async fn start(&mut self, startup_timeout: Duration) -> Result<TeiProvider, SidecarError> {
    self.state = SidecarState::Starting;

    let mut child = Command::new(&self.binary)
      .arg("--model-id")
      .arg(&self.model)
      .arg("--port")
      .arg(self.port.to_string())
      .stdout(Stdio::null())
      .stderr(Stdio::piped())
      .spawn()?;

    if let Some(stderr) = child.stderr.take() {
      tokio::spawn(forward_stderr(stderr));
    }

    let provider = TeiProvider::new(self.port, self.model.clone(), self.dimensions);
    let deadline = Instant::now() + startup_timeout;
    let poll_interval = Duration::from_millis(200);

    loop {
      if let Ok(Some(_status)) = child.try_wait() {
        self.state = SidecarState::Stopped;
        return Err(SidecarError::ExitedEarly);
      }

      if provider.is_available().await {
        self.child = Some(child);
        self.state = SidecarState::Ready;
        self.consecutive_failures = 0;
        return Ok(provider);
      }

      if Instant::now() >= deadline {
        let _ = child.kill().await;
        self.state = SidecarState::Stopped;
        return Err(SidecarError::ReadinessTimeout(startup_timeout));
      }

      sleep(poll_interval).await;
    }
  }

  /// Record the outcome of a request made against this sidecar's provider.
  /// A run of consecutive failures demotes `Ready` to `Degraded`, then
  /// `Stopped` once the threshold is exceeded.
  pub fn record_outcome(&mut self, succeeded: bool) {
    if self.state == SidecarState::Stopped {
      return;
    }

    if succeeded {
      self.consecutive_failures = 0;
      self.state = SidecarState::Ready;
      return;
    }

    self.consecutive_failures += 1;
    if self.consecutive_failures >= MAX_CONSECUTIVE_FAILURES {
      warn!(failures = self.consecutive_failures, "sidecar exceeded failure threshold, stopping");
      self.state = SidecarState::Stopped;
    } else {
      self.state = SidecarState::Degraded;
    }
  }

  pub async fn stop(&mut self) {
    if let Some(mut child) = self.child.take() {
      let _ = timeout(Duration::from_secs(5), child.kill()).await;
    }
    self.state = SidecarState::Stopped;
  }
}

async fn forward_stderr(stderr: tokio::process::ChildStderr) {
  let mut lines = BufReader::new(stderr).lines();
  loop {
    match lines.next_line().await {
      Ok(Some(line)) => {
        if STDERR_DENYLIST.iter().any(|noise| line.contains(noise)) {
          debug!(sidecar_stderr = %line, "sidecar noise suppressed");
        } else {
          error!(sidecar_stderr = %line, "sidecar stderr");
        }
      }
      Ok(None) => break,
      Err(e) => {
        debug!(error = %e, "sidecar stderr stream closed");
        break;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn new_sidecar_starts_stopped() {
    let sidecar = Sidecar::new("text-embeddings-router", 8881, "BAAI/bge-small-en-v1.5", 384);
    assert_eq!(sidecar.state(), SidecarState::Stopped);
  }

  #[test]
  fn record_outcome_demotes_after_threshold() {
    let mut sidecar = Sidecar::new("text-embeddings-router", 8881, "model", 384);
    sidecar.state = SidecarState::Ready;

    sidecar.record_outcome(false);
    assert_eq!(sidecar.state(), SidecarState::Degraded);
    sidecar.record_outcome(false);
    assert_eq!(sidecar.state(), SidecarState::Degraded);
    sidecar.record_outcome(false);
    assert_eq!(sidecar.state(), SidecarState::Stopped);
  }

  #[test]
  fn record_outcome_recovers_on_success() {
    let mut sidecar = Sidecar::new("text-embeddings-router", 8881, "model", 384);
    sidecar.state = SidecarState::Degraded;
    sidecar.consecutive_failures = 2;

    sidecar.record_outcome(true);
    assert_eq!(sidecar.state(), SidecarState::Ready);
    assert_eq!(sidecar.consecutive_failures, 0);
  }

  #[tokio::test]
  async fn start_with_missing_binary_spawn_fails() {
    let mut sidecar = Sidecar::new("definitely-not-a-real-binary-xyz", 8881, "model", 384);
    let result = sidecar.start(Duration::from_millis(200)).await;
    assert!(matches!(result, Err(SidecarError::Spawn(_))));
  }
}
