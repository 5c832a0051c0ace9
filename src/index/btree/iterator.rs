//! Forward range iteration over the leaf chain.

use std::ops::{Bound, RangeBounds};

use crate::buffer::PageReadGuard;
use crate::common::{Error, PageId, RecordId, Result};

use super::key::{IndexKey, KeyComparator};
use super::leaf_page::LeafRef;
use super::node::NodeKind;
use super::tree::{expect_kind, BPlusTree, LeafTarget};

/// A cursor over `(key, RecordId)` pairs in key order.
///
/// The cursor holds a shared latch on its current leaf. Moving to the next
/// leaf releases the current one first, so a cursor never holds two leaf
/// latches at once. Results are unspecified if the tree is restructured
/// while a cursor is open.
pub struct TreeIter<'a, K, C> {
    tree: &'a BPlusTree<K, C>,
    guard: Option<PageReadGuard<'a>>,
    index: usize,
    upper: Bound<K>,
    error: Option<Error>,
}

impl<'a, K: IndexKey, C: KeyComparator<K>> TreeIter<'a, K, C> {
    fn new(
        tree: &'a BPlusTree<K, C>,
        guard: Option<PageReadGuard<'a>>,
        index: usize,
        upper: Bound<K>,
    ) -> Result<Self> {
        let mut iter = Self {
            tree,
            guard,
            index,
            upper,
            error: None,
        };
        iter.settle()?;
        Ok(iter)
    }

    /// True once the cursor has run past the last entry (or the upper bound).
    pub fn is_end(&self) -> bool {
        self.guard.is_none()
    }

    /// The entry under the cursor, `None` at the end.
    pub fn current(&self) -> Option<(K, RecordId)> {
        let guard = self.guard.as_ref()?;
        let leaf: LeafRef<'_, K> = guard.view();
        Some((leaf.key_at(self.index), leaf.rid_at(self.index)))
    }

    /// Step to the next entry, following the sibling link at the end of a leaf.
    pub fn advance(&mut self) -> Result<()> {
        if self.guard.is_none() {
            return Ok(());
        }
        self.index += 1;
        self.settle()
    }

    /// Move forward until the cursor sits on an entry, then apply the
    /// upper bound.
    fn settle(&mut self) -> Result<()> {
        loop {
            let Some(guard) = self.guard.as_ref() else {
                return Ok(());
            };
            let leaf: LeafRef<'_, K> = guard.view();
            if self.index < leaf.size() {
                if !self.within_upper(&leaf.key_at(self.index)) {
                    self.guard = None;
                }
                return Ok(());
            }

            let next = leaf.next_page_id();
            // Let go of this leaf before latching the next one.
            self.guard = None;
            self.index = 0;
            if next.is_valid() {
                self.guard = Some(self.fetch_leaf(next)?);
            }
        }
    }

    fn fetch_leaf(&self, page_id: PageId) -> Result<PageReadGuard<'a>> {
        let guard = self.tree.bpm.fetch_page_read(page_id)?;
        expect_kind(&guard, page_id, NodeKind::Leaf)?;
        Ok(guard)
    }

    fn within_upper(&self, key: &K) -> bool {
        let comparator = &self.tree.comparator;
        match &self.upper {
            Bound::Unbounded => true,
            Bound::Included(end) => comparator.compare(key, end).is_le(),
            Bound::Excluded(end) => comparator.compare(key, end).is_lt(),
        }
    }
}

impl<K: IndexKey, C: KeyComparator<K>> Iterator for TreeIter<'_, K, C> {
    type Item = Result<(K, RecordId)>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.error.take() {
            return Some(Err(err));
        }

        let item = self.current()?;
        if let Err(err) = self.advance() {
            self.guard = None;
            self.error = Some(err);
        }
        Some(Ok(item))
    }
}

impl<K: IndexKey, C: KeyComparator<K>> BPlusTree<K, C> {
    /// Cursor at the smallest key.
    pub fn iter(&self) -> Result<TreeIter<'_, K, C>> {
        let guard = self.find_leaf_read(LeafTarget::Leftmost)?;
        TreeIter::new(self, guard, 0, Bound::Unbounded)
    }

    /// Cursor at the first key not less than `key`.
    pub fn iter_from(&self, key: &K) -> Result<TreeIter<'_, K, C>> {
        self.seek(key, Bound::Unbounded)
    }

    /// Cursor over the keys inside `range`.
    ///
    /// # Example
    /// ```
    /// # use std::sync::Arc;
    /// # use pagetree::index::btree::{BPlusTree, BTreeConfig};
    /// # use pagetree::{BufferPoolManager, DiskManager, PageId, RecordId};
    /// # let dir = tempfile::tempdir().unwrap();
    /// # let dm = DiskManager::create(dir.path().join("range.db")).unwrap();
    /// # let bpm = Arc::new(BufferPoolManager::new(64, dm));
    /// let tree = BPlusTree::<u64>::new(bpm, BTreeConfig::default()).unwrap();
    /// for k in 0..10u64 {
    ///     tree.insert(k, RecordId::new(PageId::new(0), k as u32)).unwrap();
    /// }
    /// let keys: Vec<u64> = tree
    ///     .range(3..6)
    ///     .unwrap()
    ///     .map(|entry| entry.unwrap().0)
    ///     .collect();
    /// assert_eq!(keys, vec![3, 4, 5]);
    /// ```
    pub fn range<R: RangeBounds<K>>(&self, range: R) -> Result<TreeIter<'_, K, C>> {
        let upper = range.end_bound().cloned();
        match range.start_bound() {
            Bound::Unbounded => {
                let guard = self.find_leaf_read(LeafTarget::Leftmost)?;
                TreeIter::new(self, guard, 0, upper)
            }
            Bound::Included(start) => self.seek(start, upper),
            Bound::Excluded(start) => {
                let mut iter = self.seek(start, upper)?;
                if let Some((key, _)) = iter.current() {
                    if self.comparator.compare(&key, start).is_eq() {
                        iter.advance()?;
                    }
                }
                Ok(iter)
            }
        }
    }

    fn seek(&self, key: &K, upper: Bound<K>) -> Result<TreeIter<'_, K, C>> {
        let guard = self.find_leaf_read(LeafTarget::Key(key))?;
        let index = match &guard {
            Some(guard) => {
                let leaf: LeafRef<'_, K> = guard.view();
                leaf.lower_bound(key, &self.comparator)
            }
            None => 0,
        };
        TreeIter::new(self, guard, index, upper)
    }
}
