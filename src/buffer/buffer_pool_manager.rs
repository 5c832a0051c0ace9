//! Buffer Pool Manager - the page caching layer the index runs on.
//!
//! The [`BufferPoolManager`] provides:
//! - Page caching between disk and memory
//! - Pin-based reference counting through RAII guards
//! - Per-page shared/exclusive latches
//! - Page allocation and deallocation
//! - Pluggable eviction policies

use std::collections::HashMap;
use std::sync::atomic::Ordering;

use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::buffer::replacer::{EvictionPolicy, Replacer};
use crate::buffer::{BufferPoolStats, Frame, FrameId, PageReadGuard, PageWriteGuard};
use crate::common::{Error, PageId, Result};
use crate::storage::DiskManager;

/// Bookkeeping that must change atomically: which page lives in which frame,
/// which frames are free and what the replacer thinks is evictable.
struct PoolState {
    page_table: HashMap<PageId, FrameId>,
    free_list: Vec<FrameId>,
    replacer: Box<dyn Replacer>,
}

/// Manages a pool of buffer frames for caching disk pages.
///
/// # Architecture
/// ```text
/// ┌─────────────────────────────────────────────────────────────┐
/// │                    BufferPoolManager                        │
/// │  ┌──────────────────────────┐  ┌─────────────────────────┐  │
/// │  │ state: Mutex<PoolState>  │  │   frames: Vec<Frame>    │  │
/// │  │  page_table PageId → Fid │─▶│ [F0] [F1] [F2] ...      │  │
/// │  │  free_list, replacer     │  │ each: RwLock<Page> latch│  │
/// │  └──────────────────────────┘  └─────────────────────────┘  │
/// │  ┌──────────────────────────┐  ┌─────────────────────────┐  │
/// │  │ disk_manager: Mutex      │  │ stats: atomics          │  │
/// │  └──────────────────────────┘  └─────────────────────────┘  │
/// └─────────────────────────────────────────────────────────────┘
/// ```
///
/// # Thread Safety
/// - Pinning, unpinning and evictability changes all happen under `state`,
///   so a frame is never chosen as a victim while it is pinned.
/// - A page latch is never awaited while `state` is held, except on a frame
///   whose pin count is zero; such a latch is either free or about to be
///   released by a guard that has already unpinned.
/// - Lock order is `state` → `disk_manager`.
pub struct BufferPoolManager {
    frames: Vec<Frame>,
    state: Mutex<PoolState>,
    disk_manager: Mutex<DiskManager>,
    stats: BufferPoolStats,
    pool_size: usize,
}

impl BufferPoolManager {
    /// Create a buffer pool with the default (LRU) eviction policy.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn new(pool_size: usize, disk_manager: DiskManager) -> Self {
        Self::with_policy(pool_size, disk_manager, EvictionPolicy::default())
    }

    /// Create a buffer pool with an explicit eviction policy.
    ///
    /// # Panics
    /// Panics if `pool_size` is 0.
    pub fn with_policy(
        pool_size: usize,
        disk_manager: DiskManager,
        policy: EvictionPolicy,
    ) -> Self {
        assert!(pool_size > 0, "pool_size must be > 0");

        let frames: Vec<Frame> = (0..pool_size).map(|_| Frame::new()).collect();
        // Reversed so that pops hand out frame 0 first.
        let free_list: Vec<FrameId> = (0..pool_size).rev().map(FrameId::new).collect();

        Self {
            frames,
            state: Mutex::new(PoolState {
                page_table: HashMap::new(),
                free_list,
                replacer: policy.build(),
            }),
            disk_manager: Mutex::new(disk_manager),
            stats: BufferPoolStats::new(),
            pool_size,
        }
    }

    // ========================================================================
    // Public API: Fetch pages
    // ========================================================================

    /// Fetch a page and acquire its latch in shared mode.
    ///
    /// Blocks while another thread holds the page's exclusive latch.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_read(&self, page_id: PageId) -> Result<PageReadGuard<'_>> {
        let frame_id = self.pin_page(page_id)?;
        let lock = self.frames[frame_id.0].page();

        Ok(PageReadGuard::new(self, frame_id, page_id, lock))
    }

    /// Fetch a page and acquire its latch in exclusive mode.
    ///
    /// The page is marked dirty when the guard drops.
    ///
    /// # Errors
    /// - `Error::PageNotFound` if the page doesn't exist on disk
    /// - `Error::NoFreeFrames` if all frames are pinned
    pub fn fetch_page_write(&self, page_id: PageId) -> Result<PageWriteGuard<'_>> {
        let frame_id = self.pin_page(page_id)?;
        let lock = self.frames[frame_id.0].page_mut();

        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    // ========================================================================
    // Public API: Create and delete pages
    // ========================================================================

    /// Allocate a page and return it zeroed, pinned and exclusively latched.
    ///
    /// Nobody else knows the new page id yet, so the latch is uncontended.
    ///
    /// # Errors
    /// - `Error::NoFreeFrames` if all frames are pinned
    /// - `Error::StorageExhausted` if the disk manager is at its page limit
    pub fn new_page(&self) -> Result<PageWriteGuard<'_>> {
        let (frame_id, page_id) = {
            let mut state = self.state.lock();
            let frame_id = self.acquire_frame(&mut state)?;

            let allocated = self.disk_manager.lock().allocate_page();
            let page_id = match allocated {
                Ok(page_id) => page_id,
                Err(err) => {
                    state.free_list.push(frame_id);
                    return Err(err);
                }
            };

            let frame = &self.frames[frame_id.0];
            frame.page_mut().reset();
            frame.set_page_id(Some(page_id));
            frame.pin();
            // A new page has no on-disk image worth keeping.
            frame.mark_dirty();

            state.page_table.insert(page_id, frame_id);
            state.replacer.record_access(frame_id);
            state.replacer.set_evictable(frame_id, false);

            (frame_id, page_id)
        };

        self.stats.pages_allocated.fetch_add(1, Ordering::Relaxed);
        trace!(page_id = page_id.0, frame_id = frame_id.0, "bpm.new_page");

        let lock = self.frames[frame_id.0].page_mut();
        Ok(PageWriteGuard::new(self, frame_id, page_id, lock))
    }

    /// Deallocate a page: drop it from the pool and return it to the disk
    /// manager's free set for reuse.
    ///
    /// # Errors
    /// - `Error::PagePinned` if a guard still references the page
    pub fn delete_page(&self, page_id: PageId) -> Result<()> {
        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            let frame = &self.frames[frame_id.0];
            if frame.is_pinned() {
                return Err(Error::PagePinned(page_id.0));
            }

            state.page_table.remove(&page_id);
            state.replacer.remove(frame_id);
            frame.reset();
            state.free_list.push(frame_id);
        }

        self.disk_manager.lock().deallocate_page(page_id)?;
        self.stats.pages_deallocated.fetch_add(1, Ordering::Relaxed);
        trace!(page_id = page_id.0, "bpm.delete_page");
        Ok(())
    }

    // ========================================================================
    // Public API: Flush pages
    // ========================================================================

    /// Write a page back to disk if it's dirty.
    ///
    /// Waits for the page's shared latch, so an in-progress writer finishes first.
    pub fn flush_page(&self, page_id: PageId) -> Result<()> {
        let frame_id = {
            let mut state = self.state.lock();
            match state.page_table.get(&page_id).copied() {
                Some(fid) => {
                    // Pinned so the frame cannot be recycled while we wait on its latch.
                    self.frames[fid.0].pin();
                    state.replacer.set_evictable(fid, false);
                    fid
                }
                None => return Ok(()),
            }
        };

        let result = self.write_back(frame_id, page_id);
        self.unpin_page_internal(frame_id, false);
        result
    }

    /// Flush all dirty pages and sync the file.
    pub fn flush_all_pages(&self) -> Result<()> {
        let pages: Vec<PageId> = {
            let state = self.state.lock();
            state.page_table.keys().copied().collect()
        };

        for page_id in pages {
            self.flush_page(page_id)?;
        }

        self.disk_manager.lock().sync()?;
        debug!("bpm.flush_all_pages");
        Ok(())
    }

    // ========================================================================
    // Public API: Stats and info
    // ========================================================================

    pub fn stats(&self) -> &BufferPoolStats {
        &self.stats
    }

    pub fn pool_size(&self) -> usize {
        self.pool_size
    }

    pub fn free_frame_count(&self) -> usize {
        self.state.lock().free_list.len()
    }

    /// Number of pages currently resident in the pool.
    pub fn page_count(&self) -> usize {
        self.state.lock().page_table.len()
    }

    /// Pin count of a resident page, or `None` if it is not in the pool.
    pub fn get_pin_count(&self, page_id: PageId) -> Option<u32> {
        let state = self.state.lock();
        state
            .page_table
            .get(&page_id)
            .map(|fid| self.frames[fid.0].pin_count())
    }

    /// Number of frames currently pinned by at least one guard.
    pub fn pinned_frame_count(&self) -> usize {
        let _state = self.state.lock();
        self.frames.iter().filter(|f| f.is_pinned()).count()
    }

    /// Number of deallocated pages the disk manager can hand out again.
    pub fn free_page_count(&self) -> usize {
        self.disk_manager.lock().free_page_count()
    }

    // ========================================================================
    // Internal: Called by guards on drop
    // ========================================================================

    /// Unpin a frame; the last unpin makes it evictable.
    pub(crate) fn unpin_page_internal(&self, frame_id: FrameId, is_dirty: bool) {
        let frame = &self.frames[frame_id.0];
        if is_dirty {
            frame.mark_dirty();
        }

        let mut state = self.state.lock();
        if frame.unpin() == 0 {
            state.replacer.set_evictable(frame_id, true);
        }
    }

    // ========================================================================
    // Internal: Core fetch logic
    // ========================================================================

    /// Make `page_id` resident and pin it, returning its frame.
    fn pin_page(&self, page_id: PageId) -> Result<FrameId> {
        if !page_id.is_valid() {
            return Err(Error::InvalidPageId(page_id.0));
        }

        let mut state = self.state.lock();

        if let Some(&frame_id) = state.page_table.get(&page_id) {
            self.frames[frame_id.0].pin();
            state.replacer.record_access(frame_id);
            state.replacer.set_evictable(frame_id, false);
            self.stats.cache_hits.fetch_add(1, Ordering::Relaxed);
            return Ok(frame_id);
        }

        self.stats.cache_misses.fetch_add(1, Ordering::Relaxed);
        let frame_id = self.acquire_frame(&mut state)?;

        let loaded = self.disk_manager.lock().read_page(page_id);
        let page_data = match loaded {
            Ok(page) => page,
            Err(err) => {
                state.free_list.push(frame_id);
                return Err(err);
            }
        };
        self.stats.pages_read.fetch_add(1, Ordering::Relaxed);

        let frame = &self.frames[frame_id.0];
        frame
            .page_mut()
            .as_mut_slice()
            .copy_from_slice(page_data.as_slice());
        frame.set_page_id(Some(page_id));
        frame.pin();

        state.page_table.insert(page_id, frame_id);
        state.replacer.record_access(frame_id);
        state.replacer.set_evictable(frame_id, false);

        Ok(frame_id)
    }

    // ========================================================================
    // Internal: Frame allocation and eviction
    // ========================================================================

    /// Take a free frame, evicting a victim if necessary. The returned frame
    /// is empty, unpinned and absent from the page table.
    fn acquire_frame(&self, state: &mut PoolState) -> Result<FrameId> {
        if let Some(frame_id) = state.free_list.pop() {
            return Ok(frame_id);
        }

        let frame_id = state.replacer.evict().ok_or(Error::NoFreeFrames)?;
        let frame = &self.frames[frame_id.0];
        debug_assert!(!frame.is_pinned(), "replacer chose a pinned frame");

        if let Some(old_page_id) = frame.page_id() {
            if frame.is_dirty() {
                let page = frame.page();
                let written = self.disk_manager.lock().write_page(old_page_id, &page);
                drop(page);
                if let Err(err) = written {
                    // Put the victim back so it stays reachable for eviction.
                    state.replacer.record_access(frame_id);
                    state.replacer.set_evictable(frame_id, true);
                    return Err(err);
                }
                self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
            }
            state.page_table.remove(&old_page_id);
            trace!(
                page_id = old_page_id.0,
                frame_id = frame_id.0,
                "bpm.evict"
            );
        }

        frame.clear_dirty();
        frame.set_page_id(None);
        self.stats.evictions.fetch_add(1, Ordering::Relaxed);
        Ok(frame_id)
    }

    /// Write a pinned frame's page to disk if dirty.
    fn write_back(&self, frame_id: FrameId, page_id: PageId) -> Result<()> {
        let frame = &self.frames[frame_id.0];
        let page = frame.page();

        if frame.is_dirty() {
            self.disk_manager.lock().write_page(page_id, &page)?;
            // Cleared under the latch: a writer can only dirty the page
            // again after we let go of it.
            frame.clear_dirty();
            self.stats.pages_written.fetch_add(1, Ordering::Relaxed);
        }

        Ok(())
    }
}
