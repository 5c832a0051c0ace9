//! Page - the fundamental 4KB unit of storage.
//!
//! A [`Page`] is a raw 4KB byte array that serves as the unit of I/O
//! between disk and memory. Pages are stored in frames within the buffer
//! pool and reinterpreted by the index through typed views.

use crate::common::config::PAGE_SIZE;

use super::page_header::{PageHeader, PageType};
use super::view::{PageView, PageViewMut};

/// A page of data (4KB, 4KB-aligned).
///
/// `Page` does not implement `Clone` outside tests: copying 4KB should be
/// explicit.
///
/// # Example
/// ```
/// use pagetree::storage::page::Page;
///
/// let mut page = Page::new();
/// page.as_mut_slice()[100] = 0xFF;
/// assert_eq!(page.as_slice()[100], 0xFF);
/// ```
#[repr(align(4096))]
pub struct Page {
    data: [u8; PAGE_SIZE],
}

impl Page {
    /// Create a new zeroed page.
    #[inline]
    pub fn new() -> Self {
        Self {
            data: [0u8; PAGE_SIZE],
        }
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Zero out the entire page.
    pub fn reset(&mut self) {
        self.data.fill(0);
    }

    #[inline]
    pub const fn size() -> usize {
        PAGE_SIZE
    }

    /// Read the page header.
    pub fn header(&self) -> PageHeader {
        PageHeader::from_bytes(&self.data)
    }

    /// Write a page header.
    pub fn set_header(&mut self, header: &PageHeader) {
        header.write_to(&mut self.data);
    }

    /// The page type byte, without decoding the rest of the header.
    #[inline]
    pub fn page_type(&self) -> PageType {
        PageType::from_u8(self.data[PageHeader::OFFSET_PAGE_TYPE])
    }

    /// Reinterpret the page bytes as `T`.
    #[inline]
    pub fn view<'a, T: PageView<'a>>(&'a self) -> T {
        T::from_bytes(&self.data)
    }

    /// Reinterpret the page bytes as a mutable `T`.
    #[inline]
    pub fn view_mut<'a, T: PageViewMut<'a>>(&'a mut self) -> T {
        T::from_bytes_mut(&mut self.data)
    }

    /// Verify the page checksum. Untyped pages always pass.
    pub fn verify_checksum(&self) -> bool {
        let header = self.header();
        !header.page_type.is_checksummed() || header.verify_checksum(&self.data)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new()
    }
}

// Clone only available in tests - forces explicit copying in production
#[cfg(test)]
impl Clone for Page {
    fn clone(&self) -> Self {
        let mut new_page = Page::new();
        new_page.data.copy_from_slice(&self.data);
        new_page
    }
}
