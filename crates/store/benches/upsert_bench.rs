//! Benchmarks for chunk upsert throughput.
//!
//! Run with: cargo bench -p store --bench upsert_bench

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use ingest_core::Chunk;
use ingest_core::document::SourceMeta;
use store::Store;
use tempfile::TempDir;

fn make_chunks(n: usize) -> Vec<Chunk> {
  (0..n)
    .map(|i| Chunk {
      chunk_id: format!("chunk-{i}"),
      vector: (0..384).map(|j| ((i + j) as f32 * 0.001).sin()).collect(),
      text: format!("chunk body number {i}"),
      meta: SourceMeta {
        source: format!("file-{}.txt", i % 20),
        fingerprint: "100:10".to_string(),
        filename: None,
      },
    })
    .collect()
}

fn bench_upsert_batch(c: &mut Criterion) {
  let rt = tokio::runtime::Runtime::new().unwrap();

  let mut group = c.benchmark_group("upsert_batch");
  for size in [100, 1000, 5000].iter() {
    group.throughput(Throughput::Elements(*size as u64));
    group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, &size| {
      b.iter(|| {
        rt.block_on(async {
          let temp = TempDir::new().unwrap();
          let store = Store::open(&temp.path().join("db"), "documents", 384).await.unwrap();
          let chunks = make_chunks(size);
          store.upsert(black_box(&chunks)).await.unwrap();
        });
      });
    });
  }
  group.finish();
}

criterion_group!(benches, bench_upsert_batch);
criterion_main!(benches);
