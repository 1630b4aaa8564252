use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::error::{Error, Result};

/// Stable per-file identity: `mtime_ns:size`.
///
/// Unchanged while a file's content and modification time stay the same;
/// changes the instant either one does. This is the unit of change detection
/// for the scanner and the sole key used to decide whether a source needs
/// reindexing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Fingerprint(String);

impl Fingerprint {
  /// Compute the fingerprint of a file already on disk.
  pub fn of_path(path: &Path) -> Result<Self> {
    let metadata = fs::metadata(path)?;
    let mtime_ns = metadata
      .modified()
      .map_err(Error::Io)?
      .duration_since(UNIX_EPOCH)
      .map(|d| d.as_nanos())
      .unwrap_or(0);
    Ok(Self(format!("{}:{}", mtime_ns, metadata.len())))
  }

  /// Compute a fingerprint for archive-entry bytes, which have no filesystem
  /// mtime of their own: reuses the archive's own fingerprint, since entries
  /// inside one archive are reindexed as a unit (see BatchBuilder).
  pub fn of_archive(archive_fingerprint: &Fingerprint) -> Self {
    archive_fingerprint.clone()
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl std::fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.0)
  }
}

impl From<String> for Fingerprint {
  fn from(s: String) -> Self {
    Self(s)
  }
}

impl AsRef<str> for Fingerprint {
  fn as_ref(&self) -> &str {
    &self.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::TempDir;

  #[test]
  fn stable_across_repeated_reads() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, b"hello").unwrap();

    let a = Fingerprint::of_path(&path).unwrap();
    let b = Fingerprint::of_path(&path).unwrap();
    assert_eq!(a, b);
  }

  #[test]
  fn changes_when_size_changes() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, b"hello").unwrap();
    let a = Fingerprint::of_path(&path).unwrap();

    let mut f = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(b" world").unwrap();
    drop(f);

    let b = Fingerprint::of_path(&path).unwrap();
    assert_ne!(a, b);
  }

  #[test]
  fn format_is_mtime_colon_size() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, b"12345").unwrap();
    let fp = Fingerprint::of_path(&path).unwrap();
    let parts: Vec<&str> = fp.as_str().split(':').collect();
    assert_eq!(parts.len(), 2);
    assert_eq!(parts[1], "5");
  }
}
