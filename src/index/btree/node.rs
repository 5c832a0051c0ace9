//! Layout shared by leaf and internal nodes.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       13    PageHeader (type, checksum, lsn)
//! 13      4     size          (entry count)
//! 17      4     max_size
//! 21      4     next_page_id  (leaf only, INVALID for internal)
//! 25      7     reserved
//! 32      ...   entries
//! ```

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, RecordId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

use super::key::IndexKey;

pub(crate) const OFFSET_SIZE: usize = PageHeader::SIZE;
pub(crate) const OFFSET_MAX_SIZE: usize = OFFSET_SIZE + 4;
pub(crate) const OFFSET_NEXT_PAGE_ID: usize = OFFSET_MAX_SIZE + 4;

/// First byte of the entry array.
pub(crate) const ENTRIES_OFFSET: usize = 32;

/// The two kinds of tree node, told apart by the page type byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Internal,
    Leaf,
}

impl NodeKind {
    /// Classify a latched page.
    ///
    /// # Errors
    /// `Error::UnexpectedPageType` if the page is not a tree node.
    pub fn of(page: &Page, page_id: PageId) -> Result<Self> {
        match page.page_type() {
            PageType::BTreeLeaf => Ok(NodeKind::Leaf),
            PageType::BTreeInternal => Ok(NodeKind::Internal),
            _ => Err(Error::UnexpectedPageType {
                page_id: page_id.0,
                expected: "b+tree node",
            }),
        }
    }
}

/// Smallest entry count a non-root node may hold.
#[inline]
pub fn min_size(max_size: usize) -> usize {
    max_size.div_ceil(2)
}

/// Entry slots that fit on a leaf page for keys of type `K`.
pub fn leaf_slots<K: IndexKey>() -> usize {
    (PAGE_SIZE - ENTRIES_OFFSET) / (K::ENCODED_LEN + RecordId::SIZE)
}

/// Entry slots that fit on an internal page for keys of type `K`.
pub fn internal_slots<K: IndexKey>() -> usize {
    (PAGE_SIZE - ENTRIES_OFFSET) / (K::ENCODED_LEN + PageId::SIZE)
}

#[inline]
pub(crate) fn read_u32(data: &[u8], offset: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&data[offset..offset + 4]);
    u32::from_le_bytes(bytes)
}

#[inline]
pub(crate) fn write_u32(data: &mut [u8], offset: usize, value: u32) {
    data[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}

/// Stamp a fresh node header: page type, zero entries, capacity, no sibling.
pub(crate) fn init_node(data: &mut [u8], page_type: PageType, max_size: usize) {
    PageHeader::new(page_type).write_to(data);
    write_u32(data, OFFSET_SIZE, 0);
    write_u32(data, OFFSET_MAX_SIZE, max_size as u32);
    write_u32(data, OFFSET_NEXT_PAGE_ID, PageId::INVALID.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_min_size_rounds_up() {
        assert_eq!(min_size(4), 2);
        assert_eq!(min_size(5), 3);
        assert_eq!(min_size(3), 2);
    }

    #[test]
    fn test_slot_counts() {
        // 4064 bytes of entries: 16-byte leaf entries, 12-byte internal entries.
        assert_eq!(leaf_slots::<u64>(), 254);
        assert_eq!(internal_slots::<u64>(), 338);
        assert_eq!(leaf_slots::<u32>(), 338);
    }

    #[test]
    fn test_node_kind_from_page_type() {
        let mut page = Page::new();
        assert!(matches!(
            NodeKind::of(&page, PageId::new(3)),
            Err(Error::UnexpectedPageType { page_id: 3, .. })
        ));

        init_node(page.as_mut_slice(), PageType::BTreeLeaf, 4);
        assert_eq!(NodeKind::of(&page, PageId::new(3)).unwrap(), NodeKind::Leaf);
        assert_eq!(read_u32(page.as_slice(), OFFSET_MAX_SIZE), 4);
        assert_eq!(
            read_u32(page.as_slice(), OFFSET_NEXT_PAGE_ID),
            PageId::INVALID.0
        );
    }
}
