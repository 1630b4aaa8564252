use ingest_core::Fingerprint;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
  #[error("IO error reading docs directory: {0}")]
  Io(#[from] std::io::Error),
  #[error("fingerprint error: {0}")]
  Fingerprint(#[from] ingest_core::Error),
}

impl From<ScanError> for ingest_core::Error {
  fn from(e: ScanError) -> Self {
    match e {
      ScanError::Io(e) => ingest_core::Error::Io(e),
      ScanError::Fingerprint(e) => e,
    }
  }
}

/// Enumerates the docs directory non-recursively and diffs against the
/// store's indexed-files map to decide which files need (re)indexing.
pub struct Scanner;

impl Default for Scanner {
  fn default() -> Self {
    Self::new()
  }
}

impl Scanner {
  pub fn new() -> Self {
    Self
  }

  /// Returns paths to (re)index, in lexicographic order by file name.
  ///
  /// A file is included iff its current fingerprint differs from (or is
  /// absent from) `indexed`. Deletions — names present in `indexed` but
  /// absent on disk — are not reported; this pipeline is additive only.
  pub fn scan(&self, docs_dir: &Path, indexed: &HashMap<String, String>) -> Result<Vec<PathBuf>, ScanError> {
    let mut entries: Vec<(String, PathBuf)> = Vec::new();

    for entry in std::fs::read_dir(docs_dir)? {
      let entry = entry?;
      if !entry.file_type()?.is_file() {
        continue;
      }
      let path = entry.path();
      let name = path.file_name().unwrap().to_string_lossy().into_owned();
      entries.push((name, path));
    }

    entries.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = Vec::new();
    for (name, path) in entries {
      let fp = Fingerprint::of_path(&path)?;
      if indexed.get(&name).map(String::as_str) != Some(fp.as_ref()) {
        out.push(path);
      }
    }
    Ok(out)
  }
}
