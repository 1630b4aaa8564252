use arrow_schema::{DataType, Field, Schema};
use std::sync::Arc;

/// Schema for the chunks table: one row per embedded node.
///
/// `source` and `fingerprint` together let the indexed-files map be
/// reconstructed purely from store metadata (see [`crate::chunks`]); there is
/// no separate manifest table.
pub fn chunks_schema(vector_dim: usize) -> Arc<Schema> {
  Arc::new(Schema::new(vec![
    Field::new("id", DataType::Utf8, false),
    Field::new("source", DataType::Utf8, false),
    Field::new("fingerprint", DataType::Utf8, false),
    Field::new("filename", DataType::Utf8, true),
    Field::new("text", DataType::Utf8, false),
    Field::new(
      "vector",
      DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), vector_dim as i32),
      true,
    ),
  ]))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn chunks_schema_has_expected_fields() {
    let schema = chunks_schema(384);
    assert!(schema.field_with_name("id").is_ok());
    assert!(schema.field_with_name("source").is_ok());
    assert!(schema.field_with_name("fingerprint").is_ok());
    assert!(schema.field_with_name("text").is_ok());
    assert!(schema.field_with_name("vector").is_ok());
  }
}
