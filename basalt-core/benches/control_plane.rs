/*!
Performance benchmarks for the basalt control plane hot paths: store
compare-and-set transitions and filter-engine application over large
listings.
*/

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};

use basalt_core::{
    MemoryStore, Snapshot, SnapshotFilter, SnapshotStatus, SnapshotStore,
};

fn seed_store(count: usize) -> (MemoryStore, Vec<String>) {
    let store = MemoryStore::new();
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let snapshot = Snapshot::new(format!("vol-{}", i % 8), "project-1", 10)
            .with_display_name(format!("backup{i}"));
        ids.push(snapshot.id.clone());
        store.insert(snapshot).unwrap();
    }
    (store, ids)
}

fn seed_records(count: usize) -> Vec<Snapshot> {
    (0..count)
        .map(|i| {
            let mut snapshot = Snapshot::new(format!("vol-{}", i % 8), "project-1", 10)
                .with_display_name(format!("backup{i}"));
            if i % 3 == 0 {
                snapshot.status = SnapshotStatus::Available;
            }
            snapshot
        })
        .collect()
}

fn bench_compare_and_set(c: &mut Criterion) {
    let mut group = c.benchmark_group("compare_and_set");

    for count in [100, 1_000] {
        let (store, ids) = seed_store(count);
        group.throughput(Throughput::Elements(ids.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(count), &ids, |b, ids| {
            b.iter(|| {
                for id in ids {
                    store
                        .compare_and_set_status(
                            black_box(id),
                            SnapshotStatus::Creating,
                            SnapshotStatus::Available,
                        )
                        .unwrap();
                    store
                        .compare_and_set_status(
                            black_box(id),
                            SnapshotStatus::Available,
                            SnapshotStatus::Creating,
                        )
                        .unwrap();
                }
            })
        });
    }

    group.finish();
}

fn bench_filter_apply(c: &mut Criterion) {
    let mut group = c.benchmark_group("filter_apply");

    for count in [1_000, 10_000] {
        let records = seed_records(count);
        let filter = SnapshotFilter::new()
            .with_status(SnapshotStatus::Available)
            .with_volume_id("vol-3")
            .with_limit(25)
            .with_offset(5);

        group.throughput(Throughput::Elements(count as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(count),
            &records,
            |b, records| b.iter(|| filter.apply(black_box(records.clone()))),
        );
    }

    group.finish();
}

criterion_group!(benches, bench_compare_and_set, bench_filter_apply);
criterion_main!(benches);
