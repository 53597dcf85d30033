//! Registry benchmarks for worldmap2d-lib
//!
//! Run with: cargo bench --package worldmap2d-lib

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde_json::{Value, json};
use std::sync::Arc;
use worldmap2d_lib::{DataDescription, DatasetEvent, MapConfig, Record, RecordingSurface, Worldmap2d};

/// Records spread over a small area, cycling through a few `type_id`s
fn generate_records(count: usize, sources: usize) -> Vec<Record> {
    (0..count)
        .map(|i| {
            let t = i as f64 / count as f64;
            Record::new(
                format!("source{}", i % sources),
                i as i64,
                json!({
                    "latitude": 52.2 + t * 0.2 + (t * 40.0).sin() * 0.001,
                    "longitude": 8.8 + t * 0.2 + (t * 25.0).cos() * 0.001,
                    "name": format!("Sensor {i}"),
                    "type_id": i % 5,
                    "value": i % 100,
                }),
            )
        })
        .collect()
}

fn populated_map(records: &[Record]) -> Worldmap2d<RecordingSurface> {
    let mut map = Worldmap2d::new(MapConfig::default(), RecordingSurface::new(), None).unwrap();
    for record in records {
        map.handle_dataset(DatasetEvent::RecordAdded(record.clone())).unwrap();
    }
    map
}

struct Threshold(i64);

impl DataDescription for Threshold {
    fn value_color(&self, record: &Record) -> Option<String> {
        let value = record.get("value")?.as_i64()?;
        Some(if value >= self.0 { "#ff0000" } else { "808080" }.to_string())
    }
}

// ============================================================================
// Core Benchmarks
// ============================================================================

fn bench_bulk_upsert(c: &mut Criterion) {
    let mut group = c.benchmark_group("upsert");
    group.sample_size(20);

    for count in [1_000usize, 10_000] {
        let records = generate_records(count, 4);
        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(BenchmarkId::new("bulk", count), &records, |b, records| {
            b.iter(|| populated_map(records));
        });
    }

    // Re-sync: every record replaced in place
    let records = generate_records(10_000, 4);
    let mut map = populated_map(&records);
    group.throughput(Throughput::Elements(records.len() as u64));
    group.bench_function("resync_10k", |b| {
        b.iter(|| {
            for record in &records {
                map.handle_dataset(DatasetEvent::AttributeChanged(record.clone())).unwrap();
            }
        });
    });

    group.finish();
}

fn bench_filter(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter");

    let records = generate_records(10_000, 4);
    let mut map = populated_map(&records);
    let value = Value::from(3);

    group.bench_function("by_type_id_10k", |b| {
        b.iter(|| {
            map.filter_markers(Some(&value));
            map.filter_markers(None)
        });
    });

    group.finish();
}

fn bench_icon_refresh(c: &mut Criterion) {
    let mut group = c.benchmark_group("icons");

    let records = generate_records(10_000, 4);
    let mut map = populated_map(&records);
    let mut threshold = 0;

    group.bench_function("refresh_10k", |b| {
        b.iter(|| {
            threshold = (threshold + 10) % 100;
            map.set_data_description(Some(Arc::new(Threshold(threshold))))
        });
    });

    group.finish();
}

// ============================================================================
// Criterion Configuration
// ============================================================================

criterion_group!(benches, bench_bulk_upsert, bench_filter, bench_icon_refresh);

criterion_main!(benches);
