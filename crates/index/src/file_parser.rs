use ingest_core::document::SourceMeta;
use ingest_core::{Document, Error, Fingerprint, WorkUnit};
use std::io::Read;
use std::path::Path;
use tracing::warn;

/// Turns a work unit into a list of text documents tagged with source and
/// fingerprint metadata. Individual file/entry failures are recoverable:
/// logged and skipped, never aborting the enclosing batch.
pub struct FileParser;

impl Default for FileParser {
  fn default() -> Self {
    Self::new()
  }
}

impl FileParser {
  pub fn new() -> Self {
    Self
  }

  pub fn parse(&self, unit: &WorkUnit) -> Result<Vec<Document>, Error> {
    match unit {
      WorkUnit::LooseFiles { paths } => Ok(paths.iter().filter_map(|p| self.parse_loose_file(p)).collect()),
      WorkUnit::ArchiveEntries { archive, entries } => self.parse_archive_entries(archive, entries),
    }
  }

  fn parse_loose_file(&self, path: &Path) -> Option<Document> {
    let source = path.file_name()?.to_string_lossy().into_owned();
    let fingerprint = match Fingerprint::of_path(path) {
      Ok(fp) => fp,
      Err(e) => {
        warn!(file = %path.display(), error = %e, "failed to fingerprint loose file, skipping");
        return None;
      }
    };

    let text = match read_loose_file(path) {
      Ok(t) => t,
      Err(e) => {
        warn!(file = %path.display(), error = %e, "failed to read loose file, skipping");
        return None;
      }
    };

    if text.trim().is_empty() {
      return None;
    }

    Some(Document::new(text, source, &fingerprint, None))
  }

  fn parse_archive_entries(&self, archive: &Path, entries: &[String]) -> Result<Vec<Document>, Error> {
    let source = archive
      .file_name()
      .map(|n| n.to_string_lossy().into_owned())
      .unwrap_or_else(|| archive.display().to_string());
    let fingerprint = Fingerprint::of_path(archive)?;

    let file = std::fs::File::open(archive)?;
    let mut zip = zip::ZipArchive::new(file).map_err(|e| Error::Parse {
      file: source.clone(),
      message: e.to_string(),
    })?;

    let mut docs = Vec::new();
    for entry_name in entries {
      let mut entry = match zip.by_name(entry_name) {
        Ok(e) => e,
        Err(e) => {
          warn!(archive = %archive.display(), entry = %entry_name, error = %e, "failed to open archive entry, skipping");
          continue;
        }
      };

      let mut bytes = Vec::new();
      if let Err(e) = entry.read_to_end(&mut bytes) {
        warn!(archive = %archive.display(), entry = %entry_name, error = %e, "failed to read archive entry, skipping");
        continue;
      }
      drop(entry);

      let text = if entry_name.to_lowercase().ends_with(".pdf") {
        match pdf_extract::extract_text_from_mem(&bytes) {
          Ok(t) => t,
          Err(e) => {
            warn!(archive = %archive.display(), entry = %entry_name, error = %e, "failed to extract pdf entry, skipping");
            continue;
          }
        }
      } else {
        String::from_utf8_lossy(&bytes).into_owned()
      };

      if text.trim().is_empty() {
        continue;
      }

      docs.push(Document {
        text,
        meta: SourceMeta {
          source: source.clone(),
          fingerprint: fingerprint.to_string(),
          filename: Some(entry_name.clone()),
        },
      });
    }

    Ok(docs)
  }
}

/// Dispatches a loose file to its reader by extension: PDF (page-wise text),
/// DOCX (paragraph text), or UTF-8 with replacement for anything else.
fn read_loose_file(path: &Path) -> Result<String, Error> {
  let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("").to_lowercase();
  match ext.as_str() {
    "pdf" => pdf_extract::extract_text(path).map_err(|e| Error::Parse {
      file: path.display().to_string(),
      message: e.to_string(),
    }),
    "docx" => read_docx(path),
    _ => {
      let bytes = std::fs::read(path)?;
      Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
  }
}

fn read_docx(path: &Path) -> Result<String, Error> {
  let bytes = std::fs::read(path)?;
  let docx = docx_rs::read_docx(&bytes).map_err(|e| Error::Parse {
    file: path.display().to_string(),
    message: e.to_string(),
  })?;

  let mut paragraphs = Vec::new();
  for child in docx.document.children {
    if let docx_rs::DocumentChild::Paragraph(p) = child {
      let mut line = String::new();
      for run in p.children {
        if let docx_rs::ParagraphChild::Run(r) = run {
          for rc in r.children {
            if let docx_rs::RunChild::Text(t) = rc {
              line.push_str(&t.text);
            }
          }
        }
      }
      if !line.is_empty() {
        paragraphs.push(line);
      }
    }
  }
  Ok(paragraphs.join("\n"))
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::io::Write;
  use tempfile::TempDir;

  #[test]
  fn parses_plaintext_loose_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("a.txt");
    std::fs::write(&path, "hello world").unwrap();

    let docs = FileParser::new()
      .parse(&WorkUnit::LooseFiles { paths: vec![path] })
      .unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].text, "hello world");
    assert_eq!(docs[0].meta.source, "a.txt");
  }

  #[test]
  fn skips_empty_loose_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("empty.txt");
    std::fs::write(&path, "   \n").unwrap();

    let docs = FileParser::new()
      .parse(&WorkUnit::LooseFiles { paths: vec![path] })
      .unwrap();
    assert!(docs.is_empty());
  }

  #[test]
  fn skips_missing_loose_file_without_aborting() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.txt");
    let present = dir.path().join("present.txt");
    std::fs::write(&present, "content").unwrap();

    let docs = FileParser::new()
      .parse(&WorkUnit::LooseFiles {
        paths: vec![missing, present],
      })
      .unwrap();
    assert_eq!(docs.len(), 1);
  }

  #[test]
  fn parses_archive_entries_with_shared_source_and_fingerprint() {
    let dir = TempDir::new().unwrap();
    let zip_path = dir.path().join("docs.zip");
    let file = std::fs::File::create(&zip_path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("a.txt", options).unwrap();
    zip.write_all(b"first entry").unwrap();
    zip.start_file("b.txt", options).unwrap();
    zip.write_all(b"second entry").unwrap();
    zip.finish().unwrap();

    let unit = WorkUnit::ArchiveEntries {
      archive: zip_path,
      entries: vec!["a.txt".to_string(), "b.txt".to_string()],
    };
    let docs = FileParser::new().parse(&unit).unwrap();
    assert_eq!(docs.len(), 2);
    assert_eq!(docs[0].meta.source, "docs.zip");
    assert_eq!(docs[0].meta.source, docs[1].meta.source);
    assert_eq!(docs[0].meta.fingerprint, docs[1].meta.fingerprint);
  }

  #[test]
  fn skips_missing_archive_entry_without_aborting() {
    let dir = TempDir::new().unwrap();
    let zip_path = dir.path().join("docs.zip");
    let file = std::fs::File::create(&zip_path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    zip.start_file("a.txt", options).unwrap();
    zip.write_all(b"present").unwrap();
    zip.finish().unwrap();

    let unit = WorkUnit::ArchiveEntries {
      archive: zip_path,
      entries: vec!["missing.txt".to_string(), "a.txt".to_string()],
    };
    let docs = FileParser::new().parse(&unit).unwrap();
    assert_eq!(docs.len(), 1);
    assert_eq!(docs[0].meta.filename.as_deref(), Some("a.txt"));
  }
}
