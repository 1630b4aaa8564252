use arrow_array::{
  Array, FixedSizeListArray, Float32Array, RecordBatch, RecordBatchIterator, RecordBatchReader, StringArray,
};
use futures::TryStreamExt;
use ingest_core::Chunk;
use lancedb::query::{ExecutableQuery, QueryBase};
use std::collections::HashMap;
use std::sync::Arc;

use crate::connection::{Result, Store};
use crate::schema::chunks_schema;

impl Store {
  /// Insert-or-replace the given chunks by id. Chunk ids are not expected to
  /// collide with existing rows within a run (see the fresh-id policy in
  /// [`ingest_core::document::split_document`]), so this is a plain append;
  /// the "replace" half of upsert is the caller's delete-then-insert sequence
  /// (see [`Store::delete_where`] and the pipeline's re-index policy).
  pub async fn upsert(&self, chunks: &[Chunk]) -> Result<()> {
    if chunks.is_empty() {
      return Ok(());
    }

    let table = self.table().await?;
    let batch = chunks_to_batch(chunks, self.vector_dim)?;
    let batches = RecordBatchIterator::new(vec![Ok(batch)], chunks_schema(self.vector_dim));
    let boxed: Box<dyn RecordBatchReader + Send> = Box::new(batches);
    table.add(boxed).execute().await?;
    Ok(())
  }

  /// Delete rows matching a SQL-like predicate, e.g. `source = 'a.txt' and
  /// fingerprint = '123:45'`. Callers are responsible for quoting/escaping
  /// values built from untrusted strings.
  pub async fn delete_where(&self, predicate: &str) -> Result<()> {
    let table = self.table().await?;
    table.delete(predicate).await?;
    Ok(())
  }

  /// Number of rows currently in the collection, optionally filtered.
  pub async fn count(&self, filter: Option<&str>) -> Result<usize> {
    let table = self.table().await?;
    Ok(table.count_rows(filter.map(str::to_string)).await?)
  }

  /// Reconstruct the indexed-files map (`source -> fingerprint`) by scanning
  /// every row's metadata. This is the only place prior run state is
  /// observed; there is no separate manifest.
  pub async fn indexed_files(&self) -> Result<HashMap<String, String>> {
    let table = self.table().await?;
    let results: Vec<RecordBatch> = table
      .query()
      .select(lancedb::query::Select::Columns(vec![
        "source".to_string(),
        "fingerprint".to_string(),
      ]))
      .execute()
      .await?
      .try_collect()
      .await?;

    let mut map = HashMap::new();
    for batch in results {
      let sources = batch
        .column_by_name("source")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| crate::connection::StoreError::NotFound("column source".to_string()))?;
      let fingerprints = batch
        .column_by_name("fingerprint")
        .and_then(|c| c.as_any().downcast_ref::<StringArray>())
        .ok_or_else(|| crate::connection::StoreError::NotFound("column fingerprint".to_string()))?;

      for i in 0..batch.num_rows() {
        map.insert(sources.value(i).to_string(), fingerprints.value(i).to_string());
      }
    }
    Ok(map)
  }
}

fn escape_sql(value: &str) -> String {
  value.replace('\'', "''")
}

/// Build the `delete where source=F and fingerprint=old_fp` predicate used by
/// the delete-first transactional rule.
pub fn delete_stale_generation_predicate(source: &str, stale_fingerprint: &str) -> String {
  format!(
    "source = '{}' and fingerprint = '{}'",
    escape_sql(source),
    escape_sql(stale_fingerprint)
  )
}

fn chunks_to_batch(chunks: &[Chunk], vector_dim: usize) -> Result<RecordBatch> {
  let ids: Vec<String> = chunks.iter().map(|c| c.chunk_id.clone()).collect();
  let sources: Vec<String> = chunks.iter().map(|c| c.meta.source.clone()).collect();
  let fingerprints: Vec<String> = chunks.iter().map(|c| c.meta.fingerprint.clone()).collect();
  let filenames: Vec<Option<String>> = chunks.iter().map(|c| c.meta.filename.clone()).collect();
  let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();

  let mut flat = Vec::with_capacity(chunks.len() * vector_dim);
  for c in chunks {
    let mut v = c.vector.clone();
    v.resize(vector_dim, 0.0);
    flat.extend(v);
  }
  let field = Arc::new(arrow_schema::Field::new("item", arrow_schema::DataType::Float32, true));
  let vector_list = FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(Float32Array::from(flat)), None)?;

  let batch = RecordBatch::try_new(
    chunks_schema(vector_dim),
    vec![
      Arc::new(StringArray::from(ids)),
      Arc::new(StringArray::from(sources)),
      Arc::new(StringArray::from(fingerprints)),
      Arc::new(StringArray::from(filenames)),
      Arc::new(StringArray::from(texts)),
      Arc::new(vector_list),
    ],
  )?;

  Ok(batch)
}

#[cfg(test)]
mod tests {
  use super::*;
  use ingest_core::document::SourceMeta;
  use tempfile::TempDir;

  fn chunk(id: &str, source: &str, fingerprint: &str) -> Chunk {
    Chunk {
      chunk_id: id.to_string(),
      vector: vec![0.1, 0.2, 0.3],
      text: "hello world".to_string(),
      meta: SourceMeta {
        source: source.to_string(),
        fingerprint: fingerprint.to_string(),
        filename: None,
      },
    }
  }

  async fn store() -> (TempDir, Store) {
    let temp = TempDir::new().unwrap();
    let store = Store::open(&temp.path().join("db"), "documents", 3).await.unwrap();
    (temp, store)
  }

  #[tokio::test]
  async fn upsert_then_count() {
    let (_t, store) = store().await;
    store
      .upsert(&[chunk("a", "f.txt", "1:1"), chunk("b", "f.txt", "1:1")])
      .await
      .unwrap();
    assert_eq!(store.count(None).await.unwrap(), 2);
  }

  #[tokio::test]
  async fn indexed_files_reflects_metadata() {
    let (_t, store) = store().await;
    store
      .upsert(&[chunk("a", "f.txt", "1:1"), chunk("b", "g.txt", "2:2")])
      .await
      .unwrap();
    let files = store.indexed_files().await.unwrap();
    assert_eq!(files.get("f.txt").map(String::as_str), Some("1:1"));
    assert_eq!(files.get("g.txt").map(String::as_str), Some("2:2"));
  }

  #[tokio::test]
  async fn delete_where_removes_only_stale_generation() {
    let (_t, store) = store().await;
    store.upsert(&[chunk("a", "f.txt", "1:1")]).await.unwrap();
    store.upsert(&[chunk("b", "f.txt", "2:2")]).await.unwrap();

    store
      .delete_where(&delete_stale_generation_predicate("f.txt", "1:1"))
      .await
      .unwrap();

    let files = store.indexed_files().await.unwrap();
    assert_eq!(files.get("f.txt").map(String::as_str), Some("2:2"));
    assert_eq!(store.count(None).await.unwrap(), 1);
  }

  #[tokio::test]
  async fn delete_where_escapes_quotes_in_source() {
    let (_t, store) = store().await;
    store.upsert(&[chunk("a", "doc's file.txt", "1:1")]).await.unwrap();
    store
      .delete_where(&delete_stale_generation_predicate("doc's file.txt", "1:1"))
      .await
      .unwrap();
    assert_eq!(store.count(None).await.unwrap(), 0);
  }
}
