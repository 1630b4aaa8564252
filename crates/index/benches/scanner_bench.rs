//! Benchmarks for docs-directory scanning and change detection.
//!
//! Run with: cargo bench -p index --bench scanner_bench

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use index::Scanner;
use std::collections::HashMap;
use std::fs;
use tempfile::TempDir;

fn create_docs_dir(file_count: usize) -> TempDir {
  let dir = TempDir::new().unwrap();
  for i in 0..file_count {
    fs::write(dir.path().join(format!("doc_{i}.txt")), "x".repeat(2048)).unwrap();
  }
  dir
}

fn bench_scan_cold(c: &mut Criterion) {
  let mut group = c.benchmark_group("scan_cold");
  for size in [20, 100, 500].iter() {
    let dir = create_docs_dir(*size);
    group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _| {
      b.iter(|| {
        Scanner::new().scan(black_box(dir.path()), &HashMap::new()).unwrap();
      });
    });
  }
  group.finish();
}

fn bench_scan_unchanged(c: &mut Criterion) {
  let mut group = c.benchmark_group("scan_unchanged");
  let dir = create_docs_dir(100);

  let mut indexed = HashMap::new();
  for entry in fs::read_dir(dir.path()).unwrap() {
    let entry = entry.unwrap();
    let name = entry.file_name().to_string_lossy().into_owned();
    let fp = ingest_core::Fingerprint::of_path(&entry.path()).unwrap();
    indexed.insert(name, fp.to_string());
  }

  group.bench_function("100_files_unchanged", |b| {
    b.iter(|| {
      Scanner::new().scan(black_box(dir.path()), black_box(&indexed)).unwrap();
    });
  });
  group.finish();
}

criterion_group!(benches, bench_scan_cold, bench_scan_unchanged);
criterion_main!(benches);
