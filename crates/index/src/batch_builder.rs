use ingest_core::work_unit::partition_ceiling;
use ingest_core::{Error, Fingerprint, WorkUnit};
use std::path::{Path, PathBuf};

/// Splits scanned loose files and archive entries into `W` balanced work
/// units, assigning dense worker ids starting at 0. Archives dominate entry
/// counts, so each archive's entries are partitioned on their own rather than
/// pooled with loose files — pooling would starve workers that got no
/// archive share.
pub struct BatchBuilder {
  workers: usize,
}

impl BatchBuilder {
  pub fn new(workers: usize) -> Result<Self, Error> {
    if workers == 0 {
      return Err(Error::Configuration("worker count must be greater than zero".into()));
    }
    Ok(Self { workers })
  }

  /// `files` is the scanner's output: a mix of loose files and zip archives,
  /// distinguished by extension.
  pub fn build(&self, files: &[PathBuf]) -> Result<Vec<(WorkUnit, usize)>, Error> {
    let mut loose = Vec::new();
    let mut archives = Vec::new();
    for f in files {
      if f.extension().and_then(|e| e.to_str()) == Some("zip") {
        archives.push(f.clone());
      } else {
        loose.push(f.clone());
      }
    }

    let mut units = Vec::new();
    let mut worker_id = 0;

    for part in partition_ceiling(&loose, self.workers) {
      units.push((WorkUnit::LooseFiles { paths: part }, worker_id));
      worker_id += 1;
    }

    for archive in archives {
      let entries = list_zip_entries(&archive)?;
      for part in partition_ceiling(&entries, self.workers) {
        units.push((
          WorkUnit::ArchiveEntries {
            archive: archive.clone(),
            entries: part,
          },
          worker_id,
        ));
        worker_id += 1;
      }
    }

    Ok(units)
  }
}

fn list_zip_entries(archive: &Path) -> Result<Vec<String>, Error> {
  let file = std::fs::File::open(archive)?;
  let mut zip = zip::ZipArchive::new(file).map_err(|e| Error::Parse {
    file: archive.display().to_string(),
    message: e.to_string(),
  })?;

  let mut names = Vec::with_capacity(zip.len());
  for i in 0..zip.len() {
    let entry = zip.by_index(i).map_err(|e| Error::Parse {
      file: archive.display().to_string(),
      message: e.to_string(),
    })?;
    if !entry.is_dir() {
      names.push(entry.name().to_string());
    }
  }
  Ok(names)
}

/// Compute the fingerprint for an archive-entry document: reuses the
/// archive's own fingerprint per [`ingest_core::Fingerprint::of_archive`].
pub fn archive_entry_fingerprint(archive: &Path) -> Result<Fingerprint, Error> {
  Fingerprint::of_path(archive)
}
