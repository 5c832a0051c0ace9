//! Shared helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use pagetree::{BPlusTree, BTreeConfig, BufferPoolManager, DiskManager, PageId, RecordId};
use tempfile::TempDir;

/// Install a log subscriber once; `RUST_LOG=pagetree=debug` shows tree events.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn create_bpm(pool_size: usize) -> (Arc<BufferPoolManager>, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let dm = DiskManager::create(dir.path().join("test.db")).unwrap();
    (Arc::new(BufferPoolManager::new(pool_size, dm)), dir)
}

/// A `u64` tree with the given leaf and internal capacities.
pub fn create_tree(
    pool_size: usize,
    leaf_max: usize,
    internal_max: usize,
) -> (BPlusTree<u64>, TempDir) {
    init_tracing();
    let (bpm, dir) = create_bpm(pool_size);
    let config = BTreeConfig::default()
        .with_leaf_max_size(leaf_max)
        .with_internal_max_size(internal_max);
    (BPlusTree::new(bpm, config).unwrap(), dir)
}

/// Record id derived from the key, so lookups can be checked exactly.
pub fn rid(key: u64) -> RecordId {
    RecordId::new(PageId::new((key >> 32) as u32), key as u32)
}

pub fn keys(tree: &BPlusTree<u64>) -> Vec<u64> {
    tree.iter().unwrap().map(|entry| entry.unwrap().0).collect()
}
