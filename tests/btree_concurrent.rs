//! Multi-threaded B+ tree tests.

mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

use common::{create_tree, init_tracing, keys, rid};

const THREADS: u64 = 8;

#[test]
fn test_concurrent_disjoint_inserts() {
    init_tracing();
    let (tree, _dir) = create_tree(1024, 4, 4);
    let per_thread = 500;

    thread::scope(|s| {
        for t in 0..THREADS {
            let tree = &tree;
            s.spawn(move || {
                // Interleaved ownership so threads collide on the same leaves.
                for i in 0..per_thread {
                    let k = i * THREADS + t;
                    assert!(tree.insert(k, rid(k)).unwrap());
                }
            });
        }
    });

    let total = (per_thread * THREADS) as usize;
    assert_eq!(tree.verify().unwrap().entries, total);
    assert_eq!(keys(&tree), (0..total as u64).collect::<Vec<_>>());
    assert_eq!(tree.buffer_pool().pinned_frame_count(), 0);
}

#[test]
fn test_concurrent_insert_then_remove() {
    init_tracing();
    let (tree, _dir) = create_tree(1024, 4, 5);
    let per_thread = 400;

    thread::scope(|s| {
        for t in 0..THREADS {
            let tree = &tree;
            s.spawn(move || {
                let owned: Vec<u64> = (0..per_thread).map(|i| i * THREADS + t).collect();
                for &k in &owned {
                    tree.insert(k, rid(k)).unwrap();
                }
                for &k in owned.iter().filter(|&&k| k % 2 == 0) {
                    assert!(tree.remove(&k).unwrap());
                }
                for &k in &owned {
                    let expected = (k % 2 == 1).then(|| rid(k));
                    assert_eq!(tree.get(&k).unwrap(), expected);
                }
            });
        }
    });

    let expected: Vec<u64> = (0..per_thread * THREADS).filter(|k| k % 2 == 1).collect();
    assert_eq!(keys(&tree), expected);
    assert_eq!(tree.verify().unwrap().entries, expected.len());
    assert_eq!(tree.buffer_pool().pinned_frame_count(), 0);
}

#[test]
fn test_readers_see_stable_keys_during_writes() {
    init_tracing();
    let (tree, _dir) = create_tree(1024, 4, 4);

    // Multiples of 10 stay put; writers churn everything in between.
    for k in (0..2000).step_by(10) {
        tree.insert(k, rid(k)).unwrap();
    }
    let writers_done = AtomicBool::new(false);

    thread::scope(|s| {
        let mut writers = Vec::new();
        for t in 0..4u64 {
            let tree = &tree;
            writers.push(s.spawn(move || {
                for round in 0..3 {
                    let churn: Vec<u64> = (0..2000)
                        .filter(|k| k % 10 != 0 && k % 4 == t)
                        .collect();
                    for &k in &churn {
                        tree.insert(k, rid(k + round)).unwrap();
                    }
                    for &k in &churn {
                        assert!(tree.remove(&k).unwrap());
                    }
                }
            }));
        }

        for _ in 0..4 {
            let tree = &tree;
            let writers_done = &writers_done;
            s.spawn(move || {
                while !writers_done.load(Ordering::Acquire) {
                    for k in (0..2000).step_by(10) {
                        assert_eq!(tree.get(&k).unwrap(), Some(rid(k)), "stable key {k}");
                    }
                }
            });
        }

        for writer in writers {
            writer.join().unwrap();
        }
        writers_done.store(true, Ordering::Release);
    });

    assert_eq!(keys(&tree), (0..2000).step_by(10).collect::<Vec<_>>());
    tree.verify().unwrap();
}

#[test]
fn test_scans_alongside_inserts() {
    let (tree, _dir) = create_tree(1024, 4, 4);
    for k in (0..1000).step_by(2) {
        tree.insert(k, rid(k)).unwrap();
    }

    thread::scope(|s| {
        let tree = &tree;
        s.spawn(move || {
            for k in (1..1000).step_by(2) {
                tree.insert(k, rid(k)).unwrap();
            }
        });
        for _ in 0..2 {
            s.spawn(move || {
                for _ in 0..20 {
                    // Concurrent splits may shift entries, but a scan always
                    // yields strictly ascending keys and ends cleanly.
                    let mut last = None;
                    for entry in tree.iter().unwrap() {
                        let (k, _) = entry.unwrap();
                        assert!(last.map_or(true, |prev| prev < k));
                        last = Some(k);
                    }
                }
            });
        }
    });

    assert_eq!(keys(&tree), (0..1000).collect::<Vec<_>>());
    tree.verify().unwrap();
}
