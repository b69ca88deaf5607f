//! Payload codec benchmarks.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use usagelog_bench::{fact_heavy, reference_heavy};
use usagelog_codec::{encoded_len, pack, unpack};

/// Benchmark packing snapshots of increasing size.
fn bench_pack(c: &mut Criterion) {
    let mut group = c.benchmark_group("pack");

    for facts in [10, 100, 1000, 10_000].iter() {
        let snapshot = fact_heavy(*facts);
        group.throughput(Throughput::Elements(snapshot.total_records() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(facts), &snapshot, |b, s| {
            b.iter(|| {
                let bytes = pack(black_box(s)).unwrap();
                black_box(bytes);
            });
        });
    }
    group.finish();
}

/// Benchmark unpacking payloads of increasing size.
fn bench_unpack(c: &mut Criterion) {
    let mut group = c.benchmark_group("unpack");

    for facts in [10, 100, 1000, 10_000].iter() {
        let bytes = pack(&fact_heavy(*facts)).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(facts), &bytes, |b, bytes| {
            b.iter(|| {
                let snapshot = unpack(black_box(bytes)).unwrap();
                black_box(snapshot);
            });
        });
    }
    group.finish();
}

/// Benchmark the size pass on its own.
fn bench_encoded_len(c: &mut Criterion) {
    let snapshot = reference_heavy(1000);
    c.bench_function("encoded_len/1000_references", |b| {
        b.iter(|| black_box(encoded_len(black_box(&snapshot)).unwrap()));
    });
}

criterion_group!(benches, bench_pack, bench_unpack, bench_encoded_len);
criterion_main!(benches);
