//! Traversal context for write operations.
//!
//! Holds the exclusive latches a writer has not yet proven it can drop: the
//! header page (while the root pointer may still change) and the chain of
//! nodes from the highest unsafe ancestor down to the current node.

use std::ops::{Index, IndexMut};

use crate::buffer::PageWriteGuard;
use crate::common::{Error, PageId, Result};

use super::header_page::HeaderPageMut;

pub(crate) struct Context<'a> {
    /// Header page latch; `None` once the root is known not to change.
    pub(crate) header: Option<PageWriteGuard<'a>>,
    /// Root page id as read under the header latch.
    pub(crate) root_page_id: PageId,
    /// Latched nodes, highest ancestor first.
    pub(crate) write_set: Vec<PageWriteGuard<'a>>,
    /// Pages emptied by the operation, deallocated after every latch is gone.
    pub(crate) pending_frees: Vec<PageId>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(header: PageWriteGuard<'a>, root_page_id: PageId) -> Self {
        Self {
            header: Some(header),
            root_page_id,
            write_set: Vec::new(),
            pending_frees: Vec::new(),
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.write_set.len()
    }

    pub(crate) fn push(&mut self, guard: PageWriteGuard<'a>) {
        self.write_set.push(guard);
    }

    /// True if the guard at `index` latches the current root.
    pub(crate) fn is_root(&self, index: usize) -> bool {
        self.write_set
            .get(index)
            .is_some_and(|guard| guard.page_id() == self.root_page_id)
    }

    /// Drop every held latch, header included.
    pub(crate) fn release_ancestors(&mut self) {
        self.header = None;
        self.write_set.clear();
    }

    /// Point the header page at a new root.
    ///
    /// # Errors
    /// `Error::Corrupted` if the header latch was already released, which
    /// means the root was judged safe and cannot be changing.
    pub(crate) fn set_root(&mut self, page_id: PageId) -> Result<()> {
        let header = self
            .header
            .as_mut()
            .ok_or_else(|| Error::Corrupted("root changed without the header latch".into()))?;
        let mut view: HeaderPageMut<'_> = header.view_mut();
        view.set_root_page_id(page_id);
        self.root_page_id = page_id;
        Ok(())
    }
}

impl<'a> Index<usize> for Context<'a> {
    type Output = PageWriteGuard<'a>;

    fn index(&self, index: usize) -> &Self::Output {
        &self.write_set[index]
    }
}

impl<'a> IndexMut<usize> for Context<'a> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.write_set[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPoolManager;
    use crate::index::btree::header_page::HeaderPageRef;
    use crate::storage::DiskManager;
    use tempfile::tempdir;

    fn create_test_bpm() -> (BufferPoolManager, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let dm = DiskManager::create(dir.path().join("ctx.db")).unwrap();
        (BufferPoolManager::new(8, dm), dir)
    }

    #[test]
    fn test_release_ancestors_unpins_everything() {
        let (bpm, _dir) = create_test_bpm();

        let header = bpm.new_page().unwrap();
        let mut ctx = Context::new(header, PageId::INVALID);
        ctx.push(bpm.new_page().unwrap());
        ctx.push(bpm.new_page().unwrap());
        assert_eq!(ctx.len(), 2);
        assert_eq!(bpm.pinned_frame_count(), 3);

        ctx.release_ancestors();
        assert_eq!(ctx.len(), 0);
        assert!(ctx.header.is_none());
        assert_eq!(bpm.pinned_frame_count(), 0);
    }

    #[test]
    fn test_set_root_writes_header() {
        let (bpm, _dir) = create_test_bpm();

        let mut header = bpm.new_page().unwrap();
        let header_id = header.page_id();
        {
            let mut view: HeaderPageMut<'_> = header.view_mut();
            view.init(4, 4, 8);
        }

        let mut ctx = Context::new(header, PageId::INVALID);
        let node = bpm.new_page().unwrap();
        let node_id = node.page_id();
        ctx.push(node);

        ctx.set_root(node_id).unwrap();
        assert!(ctx.is_root(0));
        drop(ctx);

        let guard = bpm.fetch_page_read(header_id).unwrap();
        let view: HeaderPageRef<'_> = guard.view();
        assert_eq!(view.root_page_id(), node_id);
    }

    #[test]
    fn test_set_root_requires_header() {
        let (bpm, _dir) = create_test_bpm();

        let mut ctx = Context::new(bpm.new_page().unwrap(), PageId::INVALID);
        ctx.release_ancestors();
        assert!(matches!(
            ctx.set_root(PageId::new(1)),
            Err(Error::Corrupted(_))
        ));
    }
}
