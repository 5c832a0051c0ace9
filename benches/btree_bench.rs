//! Benchmarks for the B+ tree.
//!
//! - Bulk insert with sequential and scrambled keys
//! - Point lookups on a warm pool
//! - Range scans across the leaf chain
//! - Lookups from several threads at once

use std::sync::Arc;
use std::thread;

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion, Throughput};
use pagetree::{BPlusTree, BTreeConfig, BufferPoolManager, DiskManager, PageId, RecordId};
use tempfile::TempDir;

const BATCH_SIZE: u64 = 10_000;
const POOL_SIZE: usize = 1024;
const SAMPLE_SIZE: usize = 20;

fn new_tree() -> (TempDir, BPlusTree<u64>) {
    let tmpdir = tempfile::tempdir().expect("tmpdir");
    let dm = DiskManager::create(tmpdir.path().join("bench.db")).expect("disk manager");
    let bpm = Arc::new(BufferPoolManager::new(POOL_SIZE, dm));
    let tree = BPlusTree::new(bpm, BTreeConfig::default()).expect("tree");
    (tmpdir, tree)
}

fn rid(key: u64) -> RecordId {
    RecordId::new(PageId::new((key / 64) as u32), (key % 64) as u32)
}

/// Odd multiplier modulo a power of two: a full permutation, far from sorted.
fn scrambled(n: u64) -> Vec<u64> {
    let span = n.next_power_of_two();
    (0..span)
        .map(|i| i.wrapping_mul(0x9E37_79B9) % span)
        .filter(|&k| k < n)
        .collect()
}

fn filled_tree() -> (TempDir, BPlusTree<u64>) {
    let (tmpdir, tree) = new_tree();
    for k in 0..BATCH_SIZE {
        tree.insert(k, rid(k)).expect("insert");
    }
    (tmpdir, tree)
}

fn bench_insert(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree/insert");
    group.sample_size(SAMPLE_SIZE);
    group.throughput(Throughput::Elements(BATCH_SIZE));

    group.bench_function("sequential_keys", |b| {
        b.iter_batched(
            new_tree,
            |(tmpdir, tree)| {
                for k in 0..BATCH_SIZE {
                    tree.insert(k, rid(k)).expect("insert");
                }
                black_box(tree.root_page_id().expect("root"));
                drop(tree);
                drop(tmpdir);
            },
            BatchSize::SmallInput,
        );
    });

    let keys = scrambled(BATCH_SIZE);
    group.bench_function("scrambled_keys", |b| {
        b.iter_batched(
            new_tree,
            |(tmpdir, tree)| {
                for &k in &keys {
                    tree.insert(k, rid(k)).expect("insert");
                }
                black_box(tree.root_page_id().expect("root"));
                drop(tree);
                drop(tmpdir);
            },
            BatchSize::SmallInput,
        );
    });

    group.finish();
}

fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree/lookup");
    group.sample_size(SAMPLE_SIZE);
    group.throughput(Throughput::Elements(BATCH_SIZE));

    let (_tmpdir, tree) = filled_tree();
    let keys = scrambled(BATCH_SIZE);

    group.bench_function("point_get", |b| {
        b.iter(|| {
            for &k in &keys {
                black_box(tree.get(&k).expect("get"));
            }
        });
    });

    group.bench_function("range_scan_1000", |b| {
        b.iter(|| {
            let count = tree
                .range(4_000..5_000)
                .expect("range")
                .map(|entry| entry.expect("entry"))
                .count();
            black_box(count);
        });
    });

    group.bench_function("full_scan", |b| {
        b.iter(|| black_box(tree.iter().expect("iter").count()));
    });

    group.finish();
}

fn bench_concurrent_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("btree/concurrent");
    group.sample_size(SAMPLE_SIZE);

    let (_tmpdir, tree) = filled_tree();
    let threads = 4u64;
    group.throughput(Throughput::Elements(BATCH_SIZE));

    group.bench_function("get_4_threads", |b| {
        b.iter(|| {
            thread::scope(|s| {
                for t in 0..threads {
                    let tree = &tree;
                    s.spawn(move || {
                        for k in (t..BATCH_SIZE).step_by(threads as usize) {
                            black_box(tree.get(&k).expect("get"));
                        }
                    });
                }
            });
        });
    });

    group.finish();
}

criterion_group!(benches, bench_insert, bench_lookup, bench_concurrent_lookup);
criterion_main!(benches);
