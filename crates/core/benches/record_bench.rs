//! Benchmarks for record aggregation
//!
//! Run with: cargo bench -p pipeline-core

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use pipeline_core::record::{Record, sorted_field_columns};
use serde_json::Value;
use std::collections::BTreeMap;

/// Build `count` records, each with `fields_per_record` keys drawn from a
/// shared pool so the union is realistically smaller than the total field
/// count, the same shape a batch of parsed resumes produces.
fn generate_records(count: usize, fields_per_record: usize) -> Vec<Record> {
  let pool = [
    "name", "email", "phone", "location", "summary", "skills", "education", "experience", "certifications", "languages", "linkedin", "github",
  ];

  (0..count)
    .map(|i| {
      let mut fields = BTreeMap::new();
      for j in 0..fields_per_record {
        let key = pool[j % pool.len()];
        fields.insert(key.to_string(), Value::String(format!("value-{i}-{j}")));
      }
      Record::new(format!("resume-{i}.pdf"), fields)
    })
    .collect()
}

fn bench_sorted_field_columns(c: &mut Criterion) {
  let mut group = c.benchmark_group("sorted_field_columns");

  for &count in &[10usize, 100, 1_000] {
    let records = generate_records(count, 8);
    group.throughput(Throughput::Elements(count as u64));
    group.bench_with_input(BenchmarkId::from_parameter(count), &records, |b, records| {
      b.iter(|| sorted_field_columns(black_box(records)))
    });
  }

  group.finish();
}

fn bench_to_json_object(c: &mut Criterion) {
  let records = generate_records(1_000, 8);
  c.bench_function("record_to_json_object_1000", |b| {
    b.iter(|| {
      for record in &records {
        black_box(record.to_json_object());
      }
    })
  });
}

criterion_group!(benches, bench_sorted_field_columns, bench_to_json_object);
criterion_main!(benches);
