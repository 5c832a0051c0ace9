//! Disk Manager - low-level file I/O for database pages.
//!
//! The [`DiskManager`] handles all direct file operations:
//! - Reading and writing pages (with checksum stamping and verification)
//! - Allocating new pages and recycling deallocated ones
//! - Managing the database file

use std::collections::BTreeSet;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;

use tracing::debug;

use crate::common::config::PAGE_SIZE;
use crate::common::{Error, PageId, Result};
use crate::storage::page::{Page, PageHeader, PageType};

/// Manages disk I/O for a single database file.
///
/// # File Layout
/// ```text
/// ┌─────────┬─────────┬─────────┬─────────┬─────────┐
/// │ Page 0  │ Page 1  │ Page 2  │  ...    │ Page N  │
/// │ (4KB)   │ (4KB)   │ (4KB)   │         │ (4KB)   │
/// └─────────┴─────────┴─────────┴─────────┴─────────┘
/// Offset:  0      4096     8192    ...    N×4096
/// ```
///
/// # Free pages
/// A deallocated page is overwritten with a `PageType::Free` page and kept
/// in an in-memory free set. `allocate_page` reuses the lowest free page
/// before growing the file, and `open` rebuilds the free set by scanning page
/// types, so the free list survives a restart without a separate structure.
///
/// # Thread Safety
/// `DiskManager` is single-threaded. The `BufferPoolManager` serializes
/// access to it.
pub struct DiskManager {
    file: File,
    /// Number of pages in the file.
    page_count: u32,
    /// Deallocated pages available for reuse.
    free_pages: BTreeSet<PageId>,
    /// Upper bound on `page_count`, if any.
    page_limit: Option<u32>,
}

impl DiskManager {
    /// Create a new database file.
    ///
    /// # Errors
    /// Returns an error if the file already exists or cannot be created.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(path)?;

        Ok(Self {
            file,
            page_count: 0,
            free_pages: BTreeSet::new(),
            page_limit: None,
        })
    }

    /// Open an existing database file.
    ///
    /// # Errors
    /// Returns an error if the file doesn't exist or cannot be opened.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(&path)?;
        let page_count = (file.metadata()?.len() / PAGE_SIZE as u64) as u32;

        let mut dm = Self {
            file,
            page_count,
            free_pages: BTreeSet::new(),
            page_limit: None,
        };
        dm.scan_free_pages()?;

        debug!(
            pages = dm.page_count,
            free = dm.free_pages.len(),
            "disk.open"
        );
        Ok(dm)
    }

    /// Open an existing database file, or create if it doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        if path.as_ref().exists() {
            Self::open(path)
        } else {
            Self::create(path)
        }
    }

    /// Cap the file at `limit` pages. Allocations beyond it fail with
    /// `Error::StorageExhausted`; recycled pages are always available.
    pub fn with_page_limit(mut self, limit: u32) -> Self {
        self.page_limit = Some(limit);
        self
    }

    /// Read a page from disk, verifying its checksum.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist
    /// - `Error::ChecksumMismatch` if a typed page fails verification
    pub fn read_page(&mut self, page_id: PageId) -> Result<Page> {
        self.check_bounds(page_id)?;

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        let mut page = Page::new();
        self.file.read_exact(page.as_mut_slice())?;

        if !page.verify_checksum() {
            return Err(Error::ChecksumMismatch(page_id.0));
        }
        Ok(page)
    }

    /// Write a page to disk.
    ///
    /// Typed pages get their checksum stamped into the written bytes; the
    /// in-memory page is left untouched.
    ///
    /// # Errors
    /// Returns `Error::PageNotFound` if the page hasn't been allocated.
    pub fn write_page(&mut self, page_id: PageId, page: &Page) -> Result<()> {
        self.check_bounds(page_id)?;

        let mut buf = [0u8; PAGE_SIZE];
        buf.copy_from_slice(page.as_slice());
        if page.page_type().is_checksummed() {
            PageHeader::stamp_checksum(&mut buf);
        }

        self.file.seek(SeekFrom::Start(Self::offset(page_id)))?;
        self.file.write_all(&buf)?;
        Ok(())
    }

    /// Allocate a page, reusing a deallocated one when possible.
    ///
    /// # Errors
    /// `Error::StorageExhausted` when the file is at its page limit and no
    /// deallocated page is available.
    pub fn allocate_page(&mut self) -> Result<PageId> {
        if let Some(page_id) = self.free_pages.pop_first() {
            return Ok(page_id);
        }

        if let Some(limit) = self.page_limit {
            if self.page_count >= limit {
                return Err(Error::StorageExhausted(limit));
            }
        }
        if self.page_count as u64 >= crate::common::config::MAX_PAGES {
            return Err(Error::StorageExhausted(self.page_count));
        }

        let page_id = PageId::new(self.page_count);
        self.file
            .set_len((self.page_count as u64 + 1) * PAGE_SIZE as u64)?;
        self.page_count += 1;
        Ok(page_id)
    }

    /// Return a page to the free set.
    ///
    /// Deallocating an already-free page is a no-op.
    pub fn deallocate_page(&mut self, page_id: PageId) -> Result<()> {
        self.check_bounds(page_id)?;
        if self.free_pages.contains(&page_id) {
            return Ok(());
        }

        let mut page = Page::new();
        page.set_header(&PageHeader::new(PageType::Free));
        self.write_page(page_id, &page)?;
        self.free_pages.insert(page_id);
        Ok(())
    }

    /// Force written pages to stable storage.
    pub fn sync(&mut self) -> Result<()> {
        self.file.sync_all()?;
        Ok(())
    }

    /// Number of pages in the database file, free pages included.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.page_count
    }

    /// Number of deallocated pages waiting for reuse.
    #[inline]
    pub fn free_page_count(&self) -> usize {
        self.free_pages.len()
    }

    /// Get the total size of the database file in bytes.
    #[inline]
    pub fn file_size(&self) -> u64 {
        (self.page_count as u64) * (PAGE_SIZE as u64)
    }

    fn check_bounds(&self, page_id: PageId) -> Result<()> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }
        if page_id.0 >= self.page_count {
            return Err(Error::PageNotFound(page_id.0));
        }
        Ok(())
    }

    fn offset(page_id: PageId) -> u64 {
        (page_id.0 as u64) * (PAGE_SIZE as u64)
    }

    fn scan_free_pages(&mut self) -> Result<()> {
        let mut type_byte = [0u8; 1];
        for id in 0..self.page_count {
            let page_id = PageId::new(id);
            self.file.seek(SeekFrom::Start(
                Self::offset(page_id) + PageHeader::OFFSET_PAGE_TYPE as u64,
            ))?;
            self.file.read_exact(&mut type_byte)?;
            if PageType::from_u8(type_byte[0]) == PageType::Free {
                self.free_pages.insert(page_id);
            }
        }
        Ok(())
    }
}
