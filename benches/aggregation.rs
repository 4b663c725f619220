//! Benchmarks for reading aggregation
//!
//! Run with: cargo bench

use chrono::{Duration, TimeZone, Utc};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use station_monitor::aggregator::{merge_readings, to_csv, ExportColumn};
use station_monitor::history::RecentReadings;
use station_monitor::types::Reading;
use std::collections::HashMap;
use std::hint::black_box;

/// `per_sensor` readings for each of `sensors` sensors, one per minute.
/// Odd sensors are offset by 30 seconds so they land on separate rows.
fn generate(sensors: usize, per_sensor: usize) -> (HashMap<String, Vec<Reading>>, Vec<String>) {
    let start = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    let ids: Vec<String> = (0..sensors).map(|i| format!("S{}", i)).collect();
    let readings = ids
        .iter()
        .enumerate()
        .map(|(i, id)| {
            let offset = Duration::seconds(if i % 2 == 1 { 30 } else { 0 });
            let series = (0..per_sensor)
                .map(|n| {
                    let ts = start + Duration::minutes(n as i64) + offset;
                    Reading::new(id.clone(), ts, (n as f64 * 0.1).sin() * 10.0 + i as f64)
                })
                .collect();
            (id.clone(), series)
        })
        .collect();
    (readings, ids)
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge_readings");

    for size in [100, 1_000, 10_000].iter() {
        let (readings, ids) = generate(5, *size);
        group.throughput(Throughput::Elements((*size * ids.len()) as u64));
        group.bench_with_input(BenchmarkId::new("five_sensors", size), &readings, |b, readings| {
            b.iter(|| merge_readings(black_box(readings), black_box(&ids)))
        });
    }

    group.finish();
}

fn bench_csv_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("csv_export");

    for size in [1_000, 10_000].iter() {
        let (readings, ids) = generate(5, *size);
        let table = merge_readings(&readings, &ids);
        let columns: Vec<ExportColumn> = ids
            .iter()
            .map(|id| ExportColumn::new(id.clone(), format!("Sensor {}", id)))
            .collect();

        group.throughput(Throughput::Elements(table.len() as u64));
        group.bench_with_input(BenchmarkId::new("to_csv", size), &table, |b, table| {
            b.iter(|| to_csv(black_box(table), &columns, &Utc))
        });
    }

    group.finish();
}

fn bench_recent_readings(c: &mut Criterion) {
    let mut group = c.benchmark_group("recent_readings");
    let (readings, _) = generate(20, 50);
    let flat: Vec<Reading> = readings.into_values().flatten().collect();

    group.bench_function("group_by_sensor", |b| {
        b.iter(|| RecentReadings::from_readings(black_box(flat.clone())))
    });

    let recent = RecentReadings::from_readings(flat);
    group.bench_function("sparkline_values", |b| {
        b.iter(|| recent.recent_values(black_box("S3"), 30))
    });

    group.finish();
}

criterion_group!(benches, bench_merge, bench_csv_export, bench_recent_readings);
criterion_main!(benches);
