//! Internal node view: `size` keys and `size` child page ids.
//!
//! Entry `i` is `(key[i], child[i])`. `key[0]` is a placeholder that is
//! never compared: `child[0]` covers keys below `key[1]`, `child[i]` covers
//! `key[i] <= k < key[i+1]` and the last child covers everything from the
//! last key up.

use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::common::PageId;
use crate::storage::page::{PageType, PageView, PageViewMut};

use super::key::{IndexKey, KeyComparator};
use super::node::{self, read_u32, write_u32, ENTRIES_OFFSET, OFFSET_MAX_SIZE, OFFSET_SIZE};

/// An internal node over any byte buffer.
pub struct InternalNode<B, K> {
    data: B,
    _key: PhantomData<K>,
}

pub type InternalRef<'a, K> = InternalNode<&'a [u8], K>;
pub type InternalMut<'a, K> = InternalNode<&'a mut [u8], K>;

impl<'a, K: IndexKey> PageView<'a> for InternalRef<'a, K> {
    fn from_bytes(data: &'a [u8]) -> Self {
        InternalNode {
            data,
            _key: PhantomData,
        }
    }
}

impl<'a, K: IndexKey> PageViewMut<'a> for InternalMut<'a, K> {
    fn from_bytes_mut(data: &'a mut [u8]) -> Self {
        InternalNode {
            data,
            _key: PhantomData,
        }
    }
}

impl<B: AsRef<[u8]>, K: IndexKey> InternalNode<B, K> {
    const ENTRY_SIZE: usize = K::ENCODED_LEN + PageId::SIZE;

    #[inline]
    fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    #[inline]
    fn entry_offset(index: usize) -> usize {
        ENTRIES_OFFSET + index * Self::ENTRY_SIZE
    }

    #[inline]
    pub fn size(&self) -> usize {
        read_u32(self.bytes(), OFFSET_SIZE) as usize
    }

    #[inline]
    pub fn max_size(&self) -> usize {
        read_u32(self.bytes(), OFFSET_MAX_SIZE) as usize
    }

    #[inline]
    pub fn min_size(&self) -> usize {
        node::min_size(self.max_size())
    }

    pub fn key_at(&self, index: usize) -> K {
        let offset = Self::entry_offset(index);
        K::decode_from(&self.bytes()[offset..offset + K::ENCODED_LEN])
    }

    pub fn child_at(&self, index: usize) -> PageId {
        PageId::new(read_u32(
            self.bytes(),
            Self::entry_offset(index) + K::ENCODED_LEN,
        ))
    }

    /// Index of the child whose range contains `key`.
    pub fn child_index<C: KeyComparator<K>>(&self, key: &K, comparator: &C) -> usize {
        let size = self.size();
        if size <= 1 {
            return 0;
        }

        // First key in 1..size that is greater than `key`; the child before it wins.
        let (mut lo, mut hi) = (1, size);
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if comparator.compare(&self.key_at(mid), key) == Ordering::Greater {
                hi = mid;
            } else {
                lo = mid + 1;
            }
        }
        lo - 1
    }

    /// Page id of the child whose range contains `key`.
    pub fn lookup_child<C: KeyComparator<K>>(&self, key: &K, comparator: &C) -> PageId {
        self.child_at(self.child_index(key, comparator))
    }

    /// Position of `child` among this node's children.
    pub fn value_index(&self, child: PageId) -> Option<usize> {
        (0..self.size()).find(|&i| self.child_at(i) == child)
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, K: IndexKey> InternalNode<B, K> {
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Format the page as an empty internal node.
    pub fn init(&mut self, max_size: usize) {
        node::init_node(self.bytes_mut(), PageType::BTreeInternal, max_size);
    }

    #[inline]
    fn set_size(&mut self, size: usize) {
        write_u32(self.bytes_mut(), OFFSET_SIZE, size as u32);
    }

    pub fn set_key_at(&mut self, index: usize, key: &K) {
        let offset = Self::entry_offset(index);
        key.encode_into(&mut self.bytes_mut()[offset..offset + K::ENCODED_LEN]);
    }

    pub fn set_child_at(&mut self, index: usize, child: PageId) {
        let offset = Self::entry_offset(index) + K::ENCODED_LEN;
        write_u32(self.bytes_mut(), offset, child.0);
    }

    /// Make this node a fresh root over two children.
    pub fn populate_new_root(&mut self, left: PageId, key: &K, right: PageId) {
        self.set_key_at(0, key);
        self.set_child_at(0, left);
        self.set_key_at(1, key);
        self.set_child_at(1, right);
        self.set_size(2);
    }

    /// Insert at `index`, shifting later entries right.
    pub fn insert_at(&mut self, index: usize, key: &K, child: PageId) {
        let size = self.size();
        debug_assert!(index <= size, "internal insert past end");
        debug_assert!(size < self.max_size(), "internal node is full");

        let start = Self::entry_offset(index);
        let end = Self::entry_offset(size);
        self.bytes_mut()
            .copy_within(start..end, start + Self::ENTRY_SIZE);
        self.set_key_at(index, key);
        self.set_child_at(index, child);
        self.set_size(size + 1);
    }

    /// Append after the last entry.
    pub fn push(&mut self, key: &K, child: PageId) {
        let size = self.size();
        self.set_key_at(size, key);
        self.set_child_at(size, child);
        self.set_size(size + 1);
    }

    /// Remove the entry at `index`, shifting later entries left.
    pub fn remove_at(&mut self, index: usize) -> (K, PageId) {
        let size = self.size();
        debug_assert!(index < size, "internal remove past end");

        let removed = (self.key_at(index), self.child_at(index));
        let start = Self::entry_offset(index + 1);
        let end = Self::entry_offset(size);
        self.bytes_mut()
            .copy_within(start..end, start - Self::ENTRY_SIZE);
        self.set_size(size - 1);
        removed
    }

    /// Move entries `at..size` into the empty node `recipient`.
    ///
    /// Returns `key[at]`, which becomes the recipient's placeholder key and
    /// the separator between the two halves.
    pub fn split_into<R>(&mut self, recipient: &mut InternalNode<R, K>, at: usize) -> K
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let src = Self::entry_offset(at)..Self::entry_offset(size);
        let dst = Self::entry_offset(0);
        let moved = src.len();
        recipient.bytes_mut()[dst..dst + moved].copy_from_slice(&self.bytes()[src]);
        recipient.set_size(size - at);
        self.set_size(at);
        recipient.key_at(0)
    }

    /// Split a full node while adding `(key, child)` at position `index`.
    ///
    /// After the call this node holds `ceil((max + 1) / 2)` children and
    /// `recipient` the rest. Returns the separator for the parent.
    pub fn split_insert_into<R>(
        &mut self,
        recipient: &mut InternalNode<R, K>,
        index: usize,
        key: &K,
        child: PageId,
    ) -> K
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let left_len = (self.size() + 1).div_ceil(2);

        match index.cmp(&left_len) {
            Ordering::Less => {
                let separator = self.split_into(recipient, left_len - 1);
                self.insert_at(index, key, child);
                separator
            }
            Ordering::Equal => {
                // The new child heads the right half; its key is the separator.
                self.split_into(recipient, left_len);
                recipient.insert_at(0, key, child);
                *key
            }
            Ordering::Greater => {
                let separator = self.split_into(recipient, left_len);
                recipient.insert_at(index - left_len, key, child);
                separator
            }
        }
    }

    /// Append every entry to `recipient`, the left sibling, pulling the
    /// parent's `middle_key` down as the separator for the first moved child.
    pub fn merge_all_into<R>(&mut self, recipient: &mut InternalNode<R, K>, middle_key: &K)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        self.set_key_at(0, middle_key);

        let size = self.size();
        let base = recipient.size();
        let src = Self::entry_offset(0)..Self::entry_offset(size);
        let dst = Self::entry_offset(base);
        let moved = src.len();
        recipient.bytes_mut()[dst..dst + moved].copy_from_slice(&self.bytes()[src]);
        recipient.set_size(base + size);
        self.set_size(0);
    }

    /// Move this node's first child to the end of `recipient`, its left
    /// sibling. `middle_key` is the parent separator between the two; the
    /// returned key replaces it.
    pub fn move_first_to_end_of<R>(&mut self, recipient: &mut InternalNode<R, K>, middle_key: &K) -> K
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let first_child = self.child_at(0);
        recipient.push(middle_key, first_child);
        self.remove_at(0);
        self.key_at(0)
    }

    /// Move this node's last child to the front of `recipient`, its right
    /// sibling. `middle_key` is the parent separator between the two; the
    /// returned key replaces it.
    pub fn move_last_to_front_of<R>(&mut self, recipient: &mut InternalNode<R, K>, middle_key: &K) -> K
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let (last_key, last_child) = self.remove_at(self.size() - 1);
        recipient.set_key_at(0, middle_key);
        recipient.insert_at(0, &last_key, last_child);
        last_key
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::btree::key::NaturalOrder;
    use crate::storage::page::Page;

    /// Node with children `c0..` and separators `keys` (placeholder key 0).
    fn internal_with(page: &mut Page, max_size: usize, keys: &[u64], first_child: u32) {
        let mut node: InternalMut<'_, u64> = page.view_mut();
        node.init(max_size);
        node.push(&0, PageId::new(first_child));
        for (i, &k) in keys.iter().enumerate() {
            node.push(&k, PageId::new(first_child + 1 + i as u32));
        }
    }

    fn separators(page: &Page) -> Vec<u64> {
        let node: InternalRef<'_, u64> = page.view();
        (1..node.size()).map(|i| node.key_at(i)).collect()
    }

    fn children(page: &Page) -> Vec<u32> {
        let node: InternalRef<'_, u64> = page.view();
        (0..node.size()).map(|i| node.child_at(i).0).collect()
    }

    #[test]
    fn test_lookup_child() {
        let mut page = Page::new();
        internal_with(&mut page, 4, &[10, 20, 30], 100);
        let node: InternalRef<'_, u64> = page.view();

        assert_eq!(node.lookup_child(&5, &NaturalOrder), PageId::new(100));
        assert_eq!(node.lookup_child(&10, &NaturalOrder), PageId::new(101));
        assert_eq!(node.lookup_child(&19, &NaturalOrder), PageId::new(101));
        assert_eq!(node.lookup_child(&30, &NaturalOrder), PageId::new(103));
        assert_eq!(node.lookup_child(&999, &NaturalOrder), PageId::new(103));
        assert_eq!(node.value_index(PageId::new(102)), Some(2));
        assert_eq!(node.value_index(PageId::new(7)), None);
    }

    #[test]
    fn test_single_child_short_circuits() {
        let mut page = Page::new();
        internal_with(&mut page, 4, &[], 100);
        let node: InternalRef<'_, u64> = page.view();
        assert_eq!(node.lookup_child(&42, &NaturalOrder), PageId::new(100));
    }

    #[test]
    fn test_new_root() {
        let mut page = Page::new();
        {
            let mut node: InternalMut<'_, u64> = page.view_mut();
            node.init(4);
            node.populate_new_root(PageId::new(1), &30, PageId::new(2));
        }
        assert_eq!(page.page_type(), PageType::BTreeInternal);
        assert_eq!(separators(&page), vec![30]);
        assert_eq!(children(&page), vec![1, 2]);
    }

    #[test]
    fn test_split_insert_left_half() {
        let mut left = Page::new();
        let mut right = Page::new();
        internal_with(&mut left, 4, &[10, 20, 30], 100);
        let separator = {
            let mut node: InternalMut<'_, u64> = left.view_mut();
            let mut sibling: InternalMut<'_, u64> = right.view_mut();
            sibling.init(4);
            node.split_insert_into(&mut sibling, 1, &5, PageId::new(200))
        };
        assert_eq!(separator, 20);
        assert_eq!(children(&left), vec![100, 200, 101]);
        assert_eq!(separators(&left), vec![5, 10]);
        assert_eq!(children(&right), vec![102, 103]);
        assert_eq!(separators(&right), vec![30]);
    }

    #[test]
    fn test_split_insert_new_key_moves_up() {
        let mut left = Page::new();
        let mut right = Page::new();
        internal_with(&mut left, 4, &[10, 20, 30], 100);
        let separator = {
            let mut node: InternalMut<'_, u64> = left.view_mut();
            let mut sibling: InternalMut<'_, u64> = right.view_mut();
            sibling.init(4);
            node.split_insert_into(&mut sibling, 3, &25, PageId::new(200))
        };
        assert_eq!(separator, 25);
        assert_eq!(children(&left), vec![100, 101, 102]);
        assert_eq!(children(&right), vec![200, 103]);
        assert_eq!(separators(&right), vec![30]);
    }

    #[test]
    fn test_split_insert_right_half() {
        let mut left = Page::new();
        let mut right = Page::new();
        internal_with(&mut left, 4, &[10, 20, 30], 100);
        let separator = {
            let mut node: InternalMut<'_, u64> = left.view_mut();
            let mut sibling: InternalMut<'_, u64> = right.view_mut();
            sibling.init(4);
            node.split_insert_into(&mut sibling, 4, &40, PageId::new(200))
        };
        assert_eq!(separator, 30);
        assert_eq!(children(&left), vec![100, 101, 102]);
        assert_eq!(children(&right), vec![103, 200]);
        assert_eq!(separators(&right), vec![40]);
    }

    #[test]
    fn test_merge_pulls_separator_down() {
        let mut left = Page::new();
        let mut right = Page::new();
        internal_with(&mut left, 4, &[10], 100);
        internal_with(&mut right, 4, &[40], 102);
        {
            let mut l: InternalMut<'_, u64> = left.view_mut();
            let mut r: InternalMut<'_, u64> = right.view_mut();
            r.merge_all_into(&mut l, &30);
            assert_eq!(r.size(), 0);
        }
        assert_eq!(separators(&left), vec![10, 30, 40]);
        assert_eq!(children(&left), vec![100, 101, 102, 103]);
    }

    #[test]
    fn test_rotate_through_parent() {
        let mut left = Page::new();
        let mut right = Page::new();
        internal_with(&mut left, 4, &[10, 20], 100);
        internal_with(&mut right, 4, &[40], 103);

        // Parent separator between the two is 30.
        let new_separator = {
            let mut l: InternalMut<'_, u64> = left.view_mut();
            let mut r: InternalMut<'_, u64> = right.view_mut();
            l.move_last_to_front_of(&mut r, &30)
        };
        assert_eq!(new_separator, 20);
        assert_eq!(children(&left), vec![100, 101]);
        assert_eq!(children(&right), vec![102, 103, 104]);
        assert_eq!(separators(&right), vec![30, 40]);

        let back = {
            let mut l: InternalMut<'_, u64> = left.view_mut();
            let mut r: InternalMut<'_, u64> = right.view_mut();
            r.move_first_to_end_of(&mut l, &20)
        };
        assert_eq!(back, 30);
        assert_eq!(children(&left), vec![100, 101, 102]);
        assert_eq!(separators(&left), vec![10, 20]);
        assert_eq!(children(&right), vec![103, 104]);
        assert_eq!(separators(&right), vec![40]);
    }
}
