//! Replication run benchmarks.

use criterion::{
    black_box, criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput,
};
use usagelog_bench::{fact_heavy, reference_heavy};
use usagelog_codec::{pack, Ticks};
use usagelog_replication::{ReplicationConfig, Replicator};
use usagelog_testkit::TestServer;

const RUN_TIME: Ticks = Ticks(638_500_000_000_000_000);

/// Benchmark a first run into an empty server for different batch sizes.
fn bench_first_run(c: &mut Criterion) {
    let mut group = c.benchmark_group("first_run");
    let payload = pack(&fact_heavy(1000)).unwrap();
    group.throughput(Throughput::Elements(3000));

    for batch_size in [1, 64, 256, 1024].iter() {
        let replicator =
            Replicator::new(ReplicationConfig::new().with_batch_size(*batch_size)).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(batch_size),
            &payload,
            |b, payload| {
                b.iter_batched(
                    TestServer::memory,
                    |mut server| {
                        let store = &mut server.store;
                        let report = replicator
                            .replicate_run_at("bench", "1.0.0", store, payload, RUN_TIME)
                            .unwrap();
                        black_box(report);
                    },
                    BatchSize::SmallInput,
                );
            },
        );
    }
    group.finish();
}

/// Benchmark reference reconciliation when every name is new.
fn bench_new_references(c: &mut Criterion) {
    let mut group = c.benchmark_group("new_references");
    let replicator = Replicator::new(ReplicationConfig::new()).unwrap();

    for count in [10, 100, 1000].iter() {
        let payload = pack(&reference_heavy(*count)).unwrap();
        group.throughput(Throughput::Elements(*count as u64 * 2));
        group.bench_with_input(BenchmarkId::from_parameter(count), &payload, |b, payload| {
            b.iter_batched(
                TestServer::memory,
                |mut server| {
                    let report = replicator
                        .replicate_run_at("bench", "1.0.0", &mut server.store, payload, RUN_TIME)
                        .unwrap();
                    black_box(report);
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

/// Benchmark repeated runs where every reference already exists.
fn bench_repeat_run(c: &mut Criterion) {
    let replicator = Replicator::new(ReplicationConfig::new()).unwrap();
    let payload = pack(&reference_heavy(1000)).unwrap();
    let mut server = TestServer::memory();
    replicator
        .replicate_run_at("bench", "1.0.0", &mut server.store, &payload, RUN_TIME)
        .unwrap();

    c.bench_function("repeat_run/1000_references", |b| {
        b.iter(|| {
            let report = replicator
                .replicate_run_at("bench", "1.0.0", &mut server.store, &payload, RUN_TIME)
                .unwrap();
            black_box(report);
        });
    });
}

criterion_group!(
    benches,
    bench_first_run,
    bench_new_references,
    bench_repeat_run
);
criterion_main!(benches);
