//! Benchmarks for lazily built snapshot indices and the path finder.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use heapscope::snapshot::{
    HeapSnapshot, PathFinder, PathFinderOptions, PathSearch, RawSnapshot, SnapshotBuilder,
};

const NODE_COUNT: usize = 50_000;
const EDGES_PER_NODE: usize = 4;
const CLASSES: [&str; 8] = [
    "Array", "Object", "Map", "Set", "Closure", "Promise", "Buffer", "Node",
];

/// Deterministic synthetic heap: a spine from the root plus pseudo-random
/// cross references.
fn synthetic_snapshot() -> RawSnapshot {
    let mut b = SnapshotBuilder::new();
    let root = b.root();
    let mut state: u64 = 0x2545_F491_4F6C_DD1D;
    let mut next = move || {
        state ^= state << 13;
        state ^= state >> 7;
        state ^= state << 17;
        state
    };

    let mut handles = Vec::with_capacity(NODE_COUNT);
    for i in 0..NODE_COUNT {
        let class = CLASSES[i % CLASSES.len()];
        let self_size = 16 + (next() % 256) as u32;
        handles.push(b.node("object", class, (i as u32 + 1) * 2 + 1, self_size, self_size * 4));
    }
    for (i, &handle) in handles.iter().enumerate().take(64) {
        b.edge(root, "element", &i.to_string(), handle);
    }
    for (i, &from) in handles.iter().enumerate() {
        if i + 1 < handles.len() {
            b.edge(from, "property", "next", handles[i + 1]);
        }
        for k in 1..EDGES_PER_NODE {
            let to = handles[(next() % NODE_COUNT as u64) as usize];
            b.edge(from, "property", &format!("ref{}", k), to);
        }
    }
    b.build().expect("synthetic snapshot")
}

fn index_bench(c: &mut Criterion) {
    let raw = synthetic_snapshot();
    let mut group = c.benchmark_group("index");
    group.sample_size(20);
    group.throughput(Throughput::Elements(NODE_COUNT as u64));

    group.bench_function("node_index", |b| {
        b.iter_batched(
            || HeapSnapshot::new(raw.clone()).expect("load"),
            |snapshot| black_box(snapshot.node_index().len()),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("retainers", |b| {
        b.iter_batched(
            || HeapSnapshot::new(raw.clone()).expect("load"),
            |snapshot| black_box(snapshot.retainers_len()),
            BatchSize::LargeInput,
        );
    });

    group.bench_function("aggregates_with_indexes", |b| {
        b.iter_batched(
            || HeapSnapshot::new(raw.clone()).expect("load"),
            |snapshot| black_box(snapshot.aggregates(true).len()),
            BatchSize::LargeInput,
        );
    });

    group.finish();
}

fn path_bench(c: &mut Criterion) {
    let snapshot = HeapSnapshot::new(synthetic_snapshot()).expect("load");
    // Warm the retainer index outside the measurement.
    black_box(snapshot.retainers_len());
    let target = snapshot
        .node_by_id((NODE_COUNT as u32 / 2) * 2 + 1)
        .expect("target node");

    c.bench_function("path_finder/first_path", |b| {
        b.iter(|| {
            let mut finder = PathFinder::new(&snapshot, &target, PathFinderOptions::default());
            loop {
                match finder.find_next() {
                    PathSearch::Suspended => continue,
                    other => break black_box(other),
                }
            }
        });
    });
}

criterion_group!(benches, index_bench, path_bench);
criterion_main!(benches);
