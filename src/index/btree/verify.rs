//! Structural integrity check for a quiescent tree.

use crate::common::{Error, PageId, Result};

use super::internal_page::InternalRef;
use super::key::{IndexKey, KeyComparator};
use super::leaf_page::LeafRef;
use super::node::NodeKind;
use super::tree::BPlusTree;

/// Shape of a tree as measured by [`BPlusTree::verify`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TreeStats {
    /// Levels from root to leaves; 0 for an empty tree.
    pub height: usize,
    pub internal_pages: usize,
    pub leaf_pages: usize,
    pub entries: usize,
}

struct Walk<K> {
    stats: TreeStats,
    leaf_depth: Option<usize>,
    /// Leaves in key order with their sibling links.
    leaves: Vec<(PageId, PageId)>,
    last_key: Option<K>,
}

impl<K: IndexKey, C: KeyComparator<K>> BPlusTree<K, C> {
    /// Walk the whole tree and check its invariants: key order, separator
    /// bounds, node fill, equal leaf depth and the leaf sibling chain.
    ///
    /// Takes shared latches one page at a time, so the result is only
    /// meaningful while no writer is active.
    ///
    /// # Errors
    /// `Error::Corrupted` naming the first violated invariant.
    pub fn verify(&self) -> Result<TreeStats> {
        let root = self.root_page_id()?;
        if !root.is_valid() {
            return Ok(TreeStats::default());
        }

        let mut walk = Walk {
            stats: TreeStats::default(),
            leaf_depth: None,
            leaves: Vec::new(),
            last_key: None,
        };
        self.verify_node(root, None, None, 1, true, &mut walk)?;

        for pair in walk.leaves.windows(2) {
            let ((page_id, next), (following, _)) = (pair[0], pair[1]);
            if next != following {
                return Err(corrupted(format!(
                    "leaf {page_id} links to {next}, expected {following}"
                )));
            }
        }
        if let Some(&(page_id, next)) = walk.leaves.last() {
            if next.is_valid() {
                return Err(corrupted(format!("last leaf {page_id} links to {next}")));
            }
        }

        walk.stats.height = walk.leaf_depth.unwrap_or(0);
        Ok(walk.stats)
    }

    fn verify_node(
        &self,
        page_id: PageId,
        lower: Option<K>,
        upper: Option<K>,
        depth: usize,
        is_root: bool,
        walk: &mut Walk<K>,
    ) -> Result<()> {
        let guard = self.bpm.fetch_page_read(page_id)?;

        match NodeKind::of(&guard, page_id)? {
            NodeKind::Leaf => {
                let leaf: LeafRef<'_, K> = guard.view();
                let size = leaf.size();
                self.check_fill(page_id, size, leaf.max_size(), leaf.min_size(), is_root, 1)?;

                for i in 0..size {
                    let key = leaf.key_at(i);
                    self.check_bounds(page_id, &key, lower.as_ref(), upper.as_ref())?;
                    if let Some(prev) = &walk.last_key {
                        if !self.comparator.compare(prev, &key).is_lt() {
                            return Err(corrupted(format!(
                                "leaf {page_id}: key {key:?} not after {prev:?}"
                            )));
                        }
                    }
                    walk.last_key = Some(key);
                }

                match walk.leaf_depth {
                    None => walk.leaf_depth = Some(depth),
                    Some(expected) if expected != depth => {
                        return Err(corrupted(format!(
                            "leaf {page_id} at depth {depth}, other leaves at {expected}"
                        )));
                    }
                    Some(_) => {}
                }

                walk.leaves.push((page_id, leaf.next_page_id()));
                walk.stats.leaf_pages += 1;
                walk.stats.entries += size;
                Ok(())
            }
            NodeKind::Internal => {
                let (keys, children) = {
                    let node: InternalRef<'_, K> = guard.view();
                    let size = node.size();
                    self.check_fill(page_id, size, node.max_size(), node.min_size(), is_root, 2)?;

                    let keys: Vec<K> = (1..size).map(|i| node.key_at(i)).collect();
                    let children: Vec<PageId> = (0..size).map(|i| node.child_at(i)).collect();
                    (keys, children)
                };
                // Children are checked without holding this page.
                guard.release();

                for window in keys.windows(2) {
                    if !self.comparator.compare(&window[0], &window[1]).is_lt() {
                        return Err(corrupted(format!(
                            "internal {page_id}: separators {:?} and {:?} out of order",
                            window[0], window[1]
                        )));
                    }
                }
                for key in &keys {
                    self.check_bounds(page_id, key, lower.as_ref(), upper.as_ref())?;
                }

                walk.stats.internal_pages += 1;
                for (i, &child) in children.iter().enumerate() {
                    let child_lower = if i == 0 { lower } else { Some(keys[i - 1]) };
                    let child_upper = keys.get(i).copied().or(upper);
                    self.verify_node(child, child_lower, child_upper, depth + 1, false, walk)?;
                }
                Ok(())
            }
        }
    }

    fn check_fill(
        &self,
        page_id: PageId,
        size: usize,
        max_size: usize,
        min_size: usize,
        is_root: bool,
        root_min: usize,
    ) -> Result<()> {
        let min = if is_root { root_min } else { min_size };
        if size < min || size > max_size {
            return Err(corrupted(format!(
                "page {page_id} holds {size} entries, allowed {min}..={max_size}"
            )));
        }
        Ok(())
    }

    fn check_bounds(&self, page_id: PageId, key: &K, lower: Option<&K>, upper: Option<&K>) -> Result<()> {
        let below = lower.is_some_and(|lo| self.comparator.compare(key, lo).is_lt());
        let above = upper.is_some_and(|hi| !self.comparator.compare(key, hi).is_lt());
        if below || above {
            return Err(corrupted(format!(
                "page {page_id}: key {key:?} outside its parent's range"
            )));
        }
        Ok(())
    }
}

fn corrupted(message: String) -> Error {
    Error::Corrupted(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::common::RecordId;
    use crate::index::btree::BTreeConfig;
    use crate::storage::DiskManager;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn small_tree() -> (BPlusTree<u64>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("verify.db")).unwrap();
        let bpm = Arc::new(BufferPoolManager::new(64, dm));
        let config = BTreeConfig::default()
            .with_leaf_max_size(4)
            .with_internal_max_size(4);
        (BPlusTree::new(bpm, config).unwrap(), dir)
    }

    #[test]
    fn test_empty_tree_stats() {
        let (tree, _dir) = small_tree();
        assert_eq!(tree.verify().unwrap(), TreeStats::default());
    }

    #[test]
    fn test_stats_after_inserts() {
        let (tree, _dir) = small_tree();
        for k in 0..100u64 {
            tree.insert(k, RecordId::new(PageId::new(0), k as u32)).unwrap();
        }

        let stats = tree.verify().unwrap();
        assert_eq!(stats.entries, 100);
        assert!(stats.height >= 3);
        assert!(stats.leaf_pages >= 25);
        assert!(stats.internal_pages >= 1);
    }

    #[test]
    fn test_detects_broken_sibling_link() {
        use crate::index::btree::leaf_page::LeafMut;

        let (tree, _dir) = small_tree();
        for k in 0..10u64 {
            tree.insert(k, RecordId::new(PageId::new(0), k as u32)).unwrap();
        }

        // Ten sequential keys give a two-level tree; cut the first leaf's link.
        let leftmost = {
            let root = tree.root_page_id().unwrap();
            let guard = tree.bpm.fetch_page_read(root).unwrap();
            let node: InternalRef<'_, u64> = guard.view();
            node.child_at(0)
        };
        {
            let mut guard = tree.bpm.fetch_page_write(leftmost).unwrap();
            let mut leaf: LeafMut<'_, u64> = guard.view_mut();
            leaf.set_next_page_id(PageId::INVALID);
        }

        assert!(matches!(tree.verify(), Err(Error::Corrupted(_))));
    }
}
