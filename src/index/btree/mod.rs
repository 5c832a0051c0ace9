//! Concurrent B+ tree index over the buffer pool.
//!
//! # Layout
//! ```text
//!                 ┌──────────────┐
//!                 │ header page  │  root id, capacities, key width
//!                 └──────┬───────┘
//!                        ▼
//!                 ┌──────────────┐
//!                 │   internal   │  key[0] unused, child[i] >= key[i]
//!                 └──┬────────┬──┘
//!                    ▼        ▼
//!              ┌────────┐  ┌────────┐
//!              │  leaf  │─▶│  leaf  │─▶ INVALID
//!              └────────┘  └────────┘
//! ```
//!
//! # Components
//! - [`BPlusTree`] - search, insert, delete and structural repair
//! - [`TreeIter`] - forward cursor over the leaf chain
//! - [`LeafNode`] / [`InternalNode`] / [`HeaderPage`] - typed page views
//! - [`BTreeConfig`] - node capacities
//! - [`TreeStats`] - result of [`BPlusTree::verify`]

mod config;
mod context;
mod header_page;
mod internal_page;
mod iterator;
mod key;
mod leaf_page;
mod node;
mod tree;
mod verify;

pub use config::{BTreeConfig, MIN_INTERNAL_MAX_SIZE, MIN_LEAF_MAX_SIZE};
pub use header_page::{HeaderPage, HeaderPageMut, HeaderPageRef};
pub use internal_page::{InternalMut, InternalNode, InternalRef};
pub use iterator::TreeIter;
pub use key::{FnComparator, IndexKey, KeyComparator, NaturalOrder};
pub use leaf_page::{LeafMut, LeafNode, LeafRef};
pub use node::{internal_slots, leaf_slots, min_size, NodeKind};
pub use tree::BPlusTree;
pub use verify::TreeStats;
