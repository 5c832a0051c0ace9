//! Index structures built on the buffer pool.

pub mod btree;

pub use btree::{BPlusTree, BTreeConfig, TreeIter, TreeStats};
