//! Leaf node view: sorted `(key, RecordId)` pairs plus a right-sibling link.
//!
//! Entry `i` lives at `ENTRIES_OFFSET + i * (K::ENCODED_LEN + RecordId::SIZE)`.
//! A leaf page has room for one entry beyond `max_size`, which holds the
//! overflow entry until the leaf is split.

use std::cmp::Ordering;
use std::marker::PhantomData;

use crate::common::{PageId, RecordId};
use crate::storage::page::{PageType, PageView, PageViewMut};

use super::key::{IndexKey, KeyComparator};
use super::node::{
    self, read_u32, write_u32, ENTRIES_OFFSET, OFFSET_MAX_SIZE, OFFSET_NEXT_PAGE_ID, OFFSET_SIZE,
};

/// A leaf node over any byte buffer.
pub struct LeafNode<B, K> {
    data: B,
    _key: PhantomData<K>,
}

pub type LeafRef<'a, K> = LeafNode<&'a [u8], K>;
pub type LeafMut<'a, K> = LeafNode<&'a mut [u8], K>;

impl<'a, K: IndexKey> PageView<'a> for LeafRef<'a, K> {
    fn from_bytes(data: &'a [u8]) -> Self {
        LeafNode {
            data,
            _key: PhantomData,
        }
    }
}

impl<'a, K: IndexKey> PageViewMut<'a> for LeafMut<'a, K> {
    fn from_bytes_mut(data: &'a mut [u8]) -> Self {
        LeafNode {
            data,
            _key: PhantomData,
        }
    }
}

impl<B: AsRef<[u8]>, K: IndexKey> LeafNode<B, K> {
    const ENTRY_SIZE: usize = K::ENCODED_LEN + RecordId::SIZE;

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

    #[inline]
    pub fn next_page_id(&self) -> PageId {
        PageId::new(read_u32(self.bytes(), OFFSET_NEXT_PAGE_ID))
    }

    pub fn key_at(&self, index: usize) -> K {
        let offset = Self::entry_offset(index);
        K::decode_from(&self.bytes()[offset..offset + K::ENCODED_LEN])
    }

    pub fn rid_at(&self, index: usize) -> RecordId {
        let offset = Self::entry_offset(index) + K::ENCODED_LEN;
        let mut bytes = [0u8; RecordId::SIZE];
        bytes.copy_from_slice(&self.bytes()[offset..offset + RecordId::SIZE]);
        RecordId::from_le_bytes(bytes)
    }

    /// Index of the first entry whose key is not less than `key`
    /// (`size()` if every key is smaller).
    pub fn lower_bound<C: KeyComparator<K>>(&self, key: &K, comparator: &C) -> usize {
        let (mut lo, mut hi) = (0, self.size());
        while lo < hi {
            let mid = lo + (hi - lo) / 2;
            if comparator.compare(&self.key_at(mid), key) == Ordering::Less {
                lo = mid + 1;
            } else {
                hi = mid;
            }
        }
        lo
    }

    /// Record id stored under `key`, if present.
    pub fn lookup<C: KeyComparator<K>>(&self, key: &K, comparator: &C) -> Option<RecordId> {
        let index = self.lower_bound(key, comparator);
        (index < self.size() && comparator.compare(&self.key_at(index), key) == Ordering::Equal)
            .then(|| self.rid_at(index))
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>, K: IndexKey> LeafNode<B, K> {
    #[inline]
    fn bytes_mut(&mut self) -> &mut [u8] {
        self.data.as_mut()
    }

    /// Format the page as an empty leaf.
    pub fn init(&mut self, max_size: usize) {
        node::init_node(self.bytes_mut(), PageType::BTreeLeaf, max_size);
    }

    #[inline]
    fn set_size(&mut self, size: usize) {
        write_u32(self.bytes_mut(), OFFSET_SIZE, size as u32);
    }

    #[inline]
    pub fn set_next_page_id(&mut self, page_id: PageId) {
        write_u32(self.bytes_mut(), OFFSET_NEXT_PAGE_ID, page_id.0);
    }

    fn set_entry(&mut self, index: usize, key: &K, rid: RecordId) {
        let offset = Self::entry_offset(index);
        let data = self.bytes_mut();
        key.encode_into(&mut data[offset..offset + K::ENCODED_LEN]);
        data[offset + K::ENCODED_LEN..offset + Self::ENTRY_SIZE]
            .copy_from_slice(&rid.to_le_bytes());
    }

    /// Insert at `index`, shifting later entries right.
    pub fn insert_at(&mut self, index: usize, key: K, rid: RecordId) {
        let size = self.size();
        debug_assert!(index <= size, "leaf insert past end");
        debug_assert!(size <= self.max_size(), "leaf overflow slot already used");

        let start = Self::entry_offset(index);
        let end = Self::entry_offset(size);
        self.bytes_mut()
            .copy_within(start..end, start + Self::ENTRY_SIZE);
        self.set_entry(index, &key, rid);
        self.set_size(size + 1);
    }

    /// Append after the last entry.
    pub fn push(&mut self, key: K, rid: RecordId) {
        let size = self.size();
        self.set_entry(size, &key, rid);
        self.set_size(size + 1);
    }

    /// Remove the entry at `index`, shifting later entries left.
    pub fn remove_at(&mut self, index: usize) -> (K, RecordId) {
        let size = self.size();
        debug_assert!(index < size, "leaf remove past end");

        let removed = (self.key_at(index), self.rid_at(index));
        let start = Self::entry_offset(index + 1);
        let end = Self::entry_offset(size);
        self.bytes_mut()
            .copy_within(start..end, start - Self::ENTRY_SIZE);
        self.set_size(size - 1);
        removed
    }

    /// Move the upper half into the empty leaf `recipient` (page
    /// `recipient_id`) and link it in as this leaf's right sibling.
    ///
    /// This leaf keeps `ceil(n/2)` entries. Returns the recipient's first
    /// key, the separator for the parent.
    pub fn split_half_into<R>(&mut self, recipient: &mut LeafNode<R, K>, recipient_id: PageId) -> K
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let keep = size.div_ceil(2);

        let src = Self::entry_offset(keep)..Self::entry_offset(size);
        let dst = Self::entry_offset(0);
        let moved = src.len();
        recipient.bytes_mut()[dst..dst + moved].copy_from_slice(&self.bytes()[src]);
        recipient.set_size(size - keep);
        self.set_size(keep);

        recipient.set_next_page_id(self.next_page_id());
        self.set_next_page_id(recipient_id);
        recipient.key_at(0)
    }

    /// Append every entry to `recipient`, the left sibling, and pass this
    /// leaf's sibling link to it. This leaf is left empty.
    pub fn merge_all_into<R>(&mut self, recipient: &mut LeafNode<R, K>)
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let size = self.size();
        let base = recipient.size();

        let src = Self::entry_offset(0)..Self::entry_offset(size);
        let dst = Self::entry_offset(base);
        let moved = src.len();
        recipient.bytes_mut()[dst..dst + moved].copy_from_slice(&self.bytes()[src]);
        recipient.set_size(base + size);
        recipient.set_next_page_id(self.next_page_id());
        self.set_size(0);
    }

    /// Move this leaf's first entry to the end of `recipient`, its left
    /// sibling. Returns this leaf's new first key.
    pub fn move_first_to_end_of<R>(&mut self, recipient: &mut LeafNode<R, K>) -> K
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let (key, rid) = self.remove_at(0);
        recipient.push(key, rid);
        self.key_at(0)
    }

    /// Move this leaf's last entry to the front of `recipient`, its right
    /// sibling. Returns the moved key.
    pub fn move_last_to_front_of<R>(&mut self, recipient: &mut LeafNode<R, K>) -> K
    where
        R: AsRef<[u8]> + AsMut<[u8]>,
    {
        let (key, rid) = self.remove_at(self.size() - 1);
        recipient.insert_at(0, key, rid);
        key
    }
}
