use std::path::PathBuf;

/// One worker's share of the files to (re)index.
///
/// Each loose file appears in exactly one work unit; each archive entry
/// appears in exactly one work unit. Archive entries from the same archive
/// may be split across several work units, but an entry is never split.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkUnit {
  LooseFiles { paths: Vec<PathBuf> },
  ArchiveEntries { archive: PathBuf, entries: Vec<String> },
}

impl WorkUnit {
  pub fn is_empty(&self) -> bool {
    match self {
      WorkUnit::LooseFiles { paths } => paths.is_empty(),
      WorkUnit::ArchiveEntries { entries, .. } => entries.is_empty(),
    }
  }

  pub fn len(&self) -> usize {
    match self {
      WorkUnit::LooseFiles { paths } => paths.len(),
      WorkUnit::ArchiveEntries { entries, .. } => entries.len(),
    }
  }
}

/// Ceiling-division partition of `items` into up to `parts` near-equal slices.
///
/// `parts == 0` or `items.is_empty()` yields no slices. This is shared by the
/// loose-file and per-archive partitioning passes in the batch builder.
pub fn partition_ceiling<T: Clone>(items: &[T], parts: usize) -> Vec<Vec<T>> {
  if items.is_empty() || parts == 0 {
    return Vec::new();
  }
  let slice_len = items.len().div_ceil(parts);
  items.chunks(slice_len).map(|c| c.to_vec()).collect()
}
