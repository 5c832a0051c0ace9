//! Header page: the tree's root pointer and the parameters it was built with.
//!
//! # Layout
//! ```text
//! Offset  Size  Field
//! ------  ----  -----
//! 0       13    PageHeader
//! 13      4     root_page_id (INVALID when the tree is empty)
//! 17      4     leaf_max_size
//! 21      4     internal_max_size
//! 25      4     key_len
//! ```

use crate::common::PageId;
use crate::storage::page::{PageHeader, PageType, PageView, PageViewMut};

use super::node::{read_u32, write_u32};

const OFFSET_ROOT_PAGE_ID: usize = PageHeader::SIZE;
const OFFSET_LEAF_MAX_SIZE: usize = OFFSET_ROOT_PAGE_ID + 4;
const OFFSET_INTERNAL_MAX_SIZE: usize = OFFSET_LEAF_MAX_SIZE + 4;
const OFFSET_KEY_LEN: usize = OFFSET_INTERNAL_MAX_SIZE + 4;

pub struct HeaderPage<B> {
    data: B,
}

pub type HeaderPageRef<'a> = HeaderPage<&'a [u8]>;
pub type HeaderPageMut<'a> = HeaderPage<&'a mut [u8]>;

impl<'a> PageView<'a> for HeaderPageRef<'a> {
    fn from_bytes(data: &'a [u8]) -> Self {
        HeaderPage { data }
    }
}

impl<'a> PageViewMut<'a> for HeaderPageMut<'a> {
    fn from_bytes_mut(data: &'a mut [u8]) -> Self {
        HeaderPage { data }
    }
}

impl<B: AsRef<[u8]>> HeaderPage<B> {
    pub fn root_page_id(&self) -> PageId {
        PageId::new(read_u32(self.data.as_ref(), OFFSET_ROOT_PAGE_ID))
    }

    pub fn leaf_max_size(&self) -> usize {
        read_u32(self.data.as_ref(), OFFSET_LEAF_MAX_SIZE) as usize
    }

    pub fn internal_max_size(&self) -> usize {
        read_u32(self.data.as_ref(), OFFSET_INTERNAL_MAX_SIZE) as usize
    }

    pub fn key_len(&self) -> usize {
        read_u32(self.data.as_ref(), OFFSET_KEY_LEN) as usize
    }
}

impl<B: AsRef<[u8]> + AsMut<[u8]>> HeaderPage<B> {
    /// Format the page as the header of an empty tree.
    pub fn init(&mut self, leaf_max_size: usize, internal_max_size: usize, key_len: usize) {
        let data = self.data.as_mut();
        PageHeader::new(PageType::BTreeHeader).write_to(data);
        write_u32(data, OFFSET_ROOT_PAGE_ID, PageId::INVALID.0);
        write_u32(data, OFFSET_LEAF_MAX_SIZE, leaf_max_size as u32);
        write_u32(data, OFFSET_INTERNAL_MAX_SIZE, internal_max_size as u32);
        write_u32(data, OFFSET_KEY_LEN, key_len as u32);
    }

    pub fn set_root_page_id(&mut self, page_id: PageId) {
        write_u32(self.data.as_mut(), OFFSET_ROOT_PAGE_ID, page_id.0);
    }
}
