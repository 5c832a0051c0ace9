//! pagetree - a concurrent, disk-oriented B+ tree index.
//!
//! # Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                            pagetree                             │
//! ├─────────────────────────────────────────────────────────────────┤
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Index Layer (index/btree)                   │   │
//! │  │   BPlusTree + TreeIter (latch crabbing)                  │   │
//! │  │   LeafNode / InternalNode / HeaderPage page views        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Buffer Pool (buffer/)                       │   │
//! │  │   BufferPoolManager + Frame + PageRead/WriteGuard        │   │
//! │  │   Eviction Policies: LRU | FIFO                          │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │                              ↓                                  │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │              Storage Layer (storage/)                    │   │
//! │  │   DiskManager + Page + PageHeader                        │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Modules
//! - [`common`] - Shared primitives (PageId, RecordId, Error, config)
//! - [`storage`] - Disk I/O and page formats
//! - [`buffer`] - Buffer pool management and eviction policies
//! - [`index`] - The B+ tree
//!
//! # Quick Start
//! ```no_run
//! use std::sync::Arc;
//! use pagetree::{BPlusTree, BTreeConfig, BufferPoolManager, DiskManager, PageId, RecordId};
//!
//! let dm = DiskManager::create("my_index.db").unwrap();
//! let bpm = Arc::new(BufferPoolManager::new(256, dm));
//! let tree = BPlusTree::<u64>::new(Arc::clone(&bpm), BTreeConfig::default()).unwrap();
//!
//! tree.insert(1, RecordId::new(PageId::new(10), 0)).unwrap();
//! for entry in tree.iter().unwrap() {
//!     let (key, rid) = entry.unwrap();
//!     println!("{key} -> {rid}");
//! }
//! bpm.flush_all_pages().unwrap();
//! ```

pub mod buffer;
pub mod common;
pub mod index;
pub mod storage;

// Re-export commonly used items at crate root for convenience
pub use common::config::PAGE_SIZE;
pub use common::{Error, PageId, RecordId, Result};

pub use buffer::{BufferPoolManager, BufferPoolStats, EvictionPolicy, Frame, FrameId, StatsSnapshot};
pub use index::btree::{BPlusTree, BTreeConfig, IndexKey, KeyComparator, TreeIter, TreeStats};
pub use storage::page::{Page, PageHeader, PageType};
pub use storage::DiskManager;
