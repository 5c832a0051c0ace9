//! The B+ tree orchestrator: search, insert, delete and structural repair.
//!
//! # Concurrency
//! Every operation starts at the header page and couples latches downward:
//! a child is latched before its parent is released. Readers release each
//! parent as soon as the child is latched. Writers keep exclusive latches on
//! the path in a [`Context`] and drop all of them (header included) whenever
//! they latch a node that cannot split or underflow from this operation.
//! Whatever is still held when the leaf is reached is exactly the set of
//! nodes the operation may restructure.

use std::marker::PhantomData;
use std::sync::Arc;

use tracing::{debug, trace, warn};

use crate::buffer::{BufferPoolManager, PageReadGuard, PageWriteGuard};
use crate::common::{Error, PageId, RecordId, Result};

use super::config::BTreeConfig;
use super::context::Context;
use super::header_page::{HeaderPageMut, HeaderPageRef};
use super::internal_page::{InternalMut, InternalRef};
use super::key::{IndexKey, KeyComparator, NaturalOrder};
use super::leaf_page::{LeafMut, LeafRef};
use super::node::NodeKind;
use crate::storage::page::{Page, PageType};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteOp {
    Insert,
    Remove,
}

/// Which side of its node a latched sibling sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

/// A sibling latched for underflow repair before the removal happens.
struct Sibling<'a> {
    guard: PageWriteGuard<'a>,
    side: Side,
}

/// Which leaf a read descent should stop at.
#[derive(Clone, Copy)]
pub(super) enum LeafTarget<'k, K> {
    Leftmost,
    Key(&'k K),
}

/// A concurrent B+ tree mapping unique keys to record ids.
///
/// The tree owns no page memory: it holds the id of its header page and
/// reaches every node through the buffer pool.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use pagetree::index::btree::{BPlusTree, BTreeConfig};
/// use pagetree::{BufferPoolManager, DiskManager, PageId, RecordId};
///
/// let dir = tempfile::tempdir().unwrap();
/// let dm = DiskManager::create(dir.path().join("index.db")).unwrap();
/// let bpm = Arc::new(BufferPoolManager::new(64, dm));
///
/// let tree = BPlusTree::<u64>::new(bpm, BTreeConfig::default()).unwrap();
/// let rid = RecordId::new(PageId::new(7), 3);
/// assert!(tree.insert(42, rid).unwrap());
/// assert_eq!(tree.get(&42).unwrap(), Some(rid));
/// ```
pub struct BPlusTree<K, C = NaturalOrder> {
    pub(super) bpm: Arc<BufferPoolManager>,
    pub(super) header_page_id: PageId,
    pub(super) leaf_max_size: usize,
    pub(super) internal_max_size: usize,
    pub(super) comparator: C,
    _key: PhantomData<fn() -> K>,
}

impl<K: IndexKey + Ord> BPlusTree<K, NaturalOrder> {
    /// Create an empty tree ordered by `K: Ord`.
    pub fn new(bpm: Arc<BufferPoolManager>, config: BTreeConfig) -> Result<Self> {
        Self::create(bpm, config, NaturalOrder)
    }
}

impl<K: IndexKey, C: KeyComparator<K>> BPlusTree<K, C> {
    /// Create an empty tree with its own header page.
    ///
    /// # Errors
    /// `Error::InvalidConfig` for capacities that do not fit the key type,
    /// or any error from allocating the header page.
    pub fn create(bpm: Arc<BufferPoolManager>, config: BTreeConfig, comparator: C) -> Result<Self> {
        let (leaf_max_size, internal_max_size) = config.resolve::<K>()?;

        let header_page_id = {
            let mut guard = bpm.new_page()?;
            let mut header: HeaderPageMut<'_> = guard.view_mut();
            header.init(leaf_max_size, internal_max_size, K::ENCODED_LEN);
            guard.page_id()
        };

        debug!(
            header_page_id = header_page_id.0,
            leaf_max_size, internal_max_size, "btree.create"
        );

        Ok(Self {
            bpm,
            header_page_id,
            leaf_max_size,
            internal_max_size,
            comparator,
            _key: PhantomData,
        })
    }

    /// Reattach to a tree created earlier, reading its capacities from the
    /// header page.
    ///
    /// # Errors
    /// - `Error::UnexpectedPageType` if the page is not a tree header
    /// - `Error::InvalidConfig` if the tree was built for another key width
    pub fn open(bpm: Arc<BufferPoolManager>, header_page_id: PageId, comparator: C) -> Result<Self> {
        let (leaf_max_size, internal_max_size) = {
            let guard = bpm.fetch_page_read(header_page_id)?;
            if guard.page_type() != PageType::BTreeHeader {
                return Err(Error::UnexpectedPageType {
                    page_id: header_page_id.0,
                    expected: "b+tree header",
                });
            }

            let header: HeaderPageRef<'_> = guard.view();
            if header.key_len() != K::ENCODED_LEN {
                return Err(Error::InvalidConfig(format!(
                    "tree stores {}-byte keys, opened with {}-byte keys",
                    header.key_len(),
                    K::ENCODED_LEN
                )));
            }

            BTreeConfig::default()
                .with_leaf_max_size(header.leaf_max_size())
                .with_internal_max_size(header.internal_max_size())
                .resolve::<K>()?
        };

        debug!(header_page_id = header_page_id.0, "btree.open");

        Ok(Self {
            bpm,
            header_page_id,
            leaf_max_size,
            internal_max_size,
            comparator,
            _key: PhantomData,
        })
    }

    pub fn header_page_id(&self) -> PageId {
        self.header_page_id
    }

    pub fn leaf_max_size(&self) -> usize {
        self.leaf_max_size
    }

    pub fn internal_max_size(&self) -> usize {
        self.internal_max_size
    }

    pub fn buffer_pool(&self) -> &Arc<BufferPoolManager> {
        &self.bpm
    }

    /// Current root page id, `PageId::INVALID` when the tree is empty.
    pub fn root_page_id(&self) -> Result<PageId> {
        let guard = self.bpm.fetch_page_read(self.header_page_id)?;
        let header: HeaderPageRef<'_> = guard.view();
        Ok(header.root_page_id())
    }

    pub fn is_empty(&self) -> Result<bool> {
        Ok(!self.root_page_id()?.is_valid())
    }

    // ========================================================================
    // Search
    // ========================================================================

    /// Look up the record id stored under `key`.
    pub fn get(&self, key: &K) -> Result<Option<RecordId>> {
        let Some(guard) = self.find_leaf_read(LeafTarget::Key(key))? else {
            return Ok(None);
        };
        let leaf: LeafRef<'_, K> = guard.view();
        Ok(leaf.lookup(key, &self.comparator))
    }

    /// Descend with shared latches to a leaf, releasing each parent once the
    /// child is latched. `None` for an empty tree.
    pub(super) fn find_leaf_read(&self, target: LeafTarget<'_, K>) -> Result<Option<PageReadGuard<'_>>> {
        let header = self.bpm.fetch_page_read(self.header_page_id)?;
        let root_page_id = {
            let view: HeaderPageRef<'_> = header.view();
            view.root_page_id()
        };
        if !root_page_id.is_valid() {
            return Ok(None);
        }

        let mut guard = self.bpm.fetch_page_read(root_page_id)?;
        header.release();

        loop {
            let child = match NodeKind::of(&guard, guard.page_id())? {
                NodeKind::Leaf => return Ok(Some(guard)),
                NodeKind::Internal => {
                    let node: InternalRef<'_, K> = guard.view();
                    match target {
                        LeafTarget::Leftmost => node.child_at(0),
                        LeafTarget::Key(key) => node.lookup_child(key, &self.comparator),
                    }
                }
            };
            trace!(from = guard.page_id().0, to = child.0, "btree.descend.read");
            // Assigning drops the parent only after the child is latched.
            guard = self.bpm.fetch_page_read(child)?;
        }
    }

    // ========================================================================
    // Insert
    // ========================================================================

    /// Insert a unique key.
    ///
    /// Returns `Ok(false)` without changing anything if the key is already
    /// present.
    ///
    /// # Errors
    /// A resource-exhaustion error (`NoFreeFrames`, `StorageExhausted`) if
    /// the pages a split needs cannot be allocated; the tree is unchanged.
    pub fn insert(&self, key: K, rid: RecordId) -> Result<bool> {
        let mut header = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_page_id = {
            let view: HeaderPageRef<'_> = header.view();
            view.root_page_id()
        };

        if !root_page_id.is_valid() {
            self.start_new_tree(&mut header, key, rid)?;
            return Ok(true);
        }

        let mut ctx = Context::new(header, root_page_id);
        self.descend_for_write(&mut ctx, &key, WriteOp::Insert)?;

        let leaf_index = ctx.len() - 1;
        let position = {
            let leaf: LeafRef<'_, K> = ctx[leaf_index].view();
            let position = leaf.lower_bound(&key, &self.comparator);
            if position < leaf.size() && self.comparator.compare(&leaf.key_at(position), &key).is_eq() {
                return Ok(false);
            }
            if leaf.size() < leaf.max_size() {
                None
            } else {
                Some(position)
            }
        };

        match position {
            None => {
                let mut leaf: LeafMut<'_, K> = ctx[leaf_index].view_mut();
                let position = leaf.lower_bound(&key, &self.comparator);
                leaf.insert_at(position, key, rid);
                Ok(true)
            }
            Some(position) => {
                self.insert_with_split(&mut ctx, position, key, rid)?;
                Ok(true)
            }
        }
    }

    fn start_new_tree(&self, header: &mut PageWriteGuard<'_>, key: K, rid: RecordId) -> Result<()> {
        let mut root = self.bpm.new_page()?;
        let root_page_id = root.page_id();
        {
            let mut leaf: LeafMut<'_, K> = root.view_mut();
            leaf.init(self.leaf_max_size);
            leaf.push(key, rid);
        }
        root.release();

        let mut view: HeaderPageMut<'_> = header.view_mut();
        view.set_root_page_id(root_page_id);
        debug!(root_page_id = root_page_id.0, "btree.root.new_leaf");
        Ok(())
    }

    /// Insert into a full leaf and carry splits upward.
    ///
    /// Every page the splits need is allocated first, so a failed
    /// allocation leaves the tree untouched.
    fn insert_with_split(&self, ctx: &mut Context<'_>, position: usize, key: K, rid: RecordId) -> Result<()> {
        let needed = Self::pages_needed_for_split(ctx)?;
        let mut fresh = self.allocate_pages(needed)?.into_iter();
        let mut next_page = move || {
            fresh
                .next()
                .ok_or_else(|| Error::Corrupted("split needed more pages than reserved".into()))
        };

        let mut index = ctx.len() - 1;
        let mut left_id = ctx[index].page_id();

        let (mut separator, mut right_id) = {
            let mut sibling_guard = next_page()?;
            let sibling_id = sibling_guard.page_id();
            let mut leaf: LeafMut<'_, K> = ctx[index].view_mut();
            leaf.insert_at(position, key, rid);

            let mut sibling: LeafMut<'_, K> = sibling_guard.view_mut();
            sibling.init(leaf.max_size());
            let separator = leaf.split_half_into(&mut sibling, sibling_id);
            debug!(
                page_id = left_id.0,
                sibling_id = sibling_id.0,
                left = leaf.size(),
                right = sibling.size(),
                "btree.split.leaf"
            );
            (separator, sibling_id)
        };

        loop {
            if index == 0 {
                if !ctx.is_root(0) {
                    return Err(Error::Corrupted(format!(
                        "page {} split without its parent latched",
                        left_id.0
                    )));
                }
                let mut root_guard = next_page()?;
                let root_id = root_guard.page_id();
                {
                    let mut root: InternalMut<'_, K> = root_guard.view_mut();
                    root.init(self.internal_max_size);
                    root.populate_new_root(left_id, &separator, right_id);
                }
                root_guard.release();
                ctx.set_root(root_id)?;
                debug!(root_page_id = root_id.0, "btree.root.grow");
                return Ok(());
            }

            let parent_id = ctx[index - 1].page_id();
            let mut parent: InternalMut<'_, K> = ctx[index - 1].view_mut();
            let child_index = parent.value_index(left_id).ok_or_else(|| {
                Error::Corrupted(format!("page {} missing from parent {}", left_id.0, parent_id.0))
            })?;

            if parent.size() < parent.max_size() {
                parent.insert_at(child_index + 1, &separator, right_id);
                return Ok(());
            }

            let mut sibling_guard = next_page()?;
            let sibling_id = sibling_guard.page_id();
            let mut sibling: InternalMut<'_, K> = sibling_guard.view_mut();
            sibling.init(parent.max_size());
            separator = parent.split_insert_into(&mut sibling, child_index + 1, &separator, right_id);
            debug!(
                page_id = parent_id.0,
                sibling_id = sibling_id.0,
                left = parent.size(),
                right = sibling.size(),
                "btree.split.internal"
            );

            left_id = parent_id;
            right_id = sibling_id;
            index -= 1;
        }
    }

    /// Pages a split starting at the leaf will allocate: one per splitting
    /// node, plus a new root if the split reaches the root.
    fn pages_needed_for_split(ctx: &Context<'_>) -> Result<usize> {
        let mut needed = 1;
        let mut index = ctx.len() - 1;

        loop {
            if index == 0 {
                if ctx.is_root(0) {
                    needed += 1;
                }
                return Ok(needed);
            }
            let parent = &ctx[index - 1];
            expect_kind(parent, parent.page_id(), NodeKind::Internal)?;
            let node: InternalRef<'_, K> = parent.view();
            if node.size() < node.max_size() {
                return Ok(needed);
            }
            needed += 1;
            index -= 1;
        }
    }

    fn allocate_pages(&self, count: usize) -> Result<Vec<PageWriteGuard<'_>>> {
        let mut pages = Vec::with_capacity(count);
        for _ in 0..count {
            match self.bpm.new_page() {
                Ok(guard) => pages.push(guard),
                Err(err) => {
                    warn!(
                        requested = count,
                        allocated = pages.len(),
                        error = %err,
                        "btree.split.allocation_failed"
                    );
                    let ids: Vec<PageId> = pages.iter().map(|guard| guard.page_id()).collect();
                    drop(pages);
                    for page_id in ids {
                        if let Err(cleanup) = self.free_page(page_id) {
                            warn!(page_id = page_id.0, error = %cleanup, "btree.split.rollback_failed");
                        }
                    }
                    return Err(err);
                }
            }
        }
        Ok(pages)
    }

    // ========================================================================
    // Delete
    // ========================================================================

    /// Remove `key`. Returns `Ok(false)` if it was not present.
    ///
    /// # Errors
    /// A resource-exhaustion error if a sibling needed to repair underflow
    /// cannot be latched. Siblings are latched before the leaf changes, so
    /// the key is still present after such a failure.
    pub fn remove(&self, key: &K) -> Result<bool> {
        let header = self.bpm.fetch_page_write(self.header_page_id)?;
        let root_page_id = {
            let view: HeaderPageRef<'_> = header.view();
            view.root_page_id()
        };
        if !root_page_id.is_valid() {
            return Ok(false);
        }

        let mut ctx = Context::new(header, root_page_id);
        self.descend_for_write(&mut ctx, key, WriteOp::Remove)?;

        let leaf_index = ctx.len() - 1;
        let position = {
            let leaf: LeafRef<'_, K> = ctx[leaf_index].view();
            let position = leaf.lower_bound(key, &self.comparator);
            if position >= leaf.size() || !self.comparator.compare(&leaf.key_at(position), key).is_eq() {
                return Ok(false);
            }
            position
        };

        let mut siblings = self.latch_siblings(&ctx)?;
        {
            let mut leaf: LeafMut<'_, K> = ctx[leaf_index].view_mut();
            leaf.remove_at(position);
        }

        let repaired = self.rebalance(&mut ctx, leaf_index, &mut siblings);

        let frees = std::mem::take(&mut ctx.pending_frees);
        drop(siblings);
        drop(ctx);
        for page_id in frees {
            self.free_page(page_id)?;
        }

        repaired.map(|()| true)
    }

    /// Latch one sibling for every held non-root node that underflows if it
    /// loses an entry. Slot `i` belongs to `ctx[i]`.
    fn latch_siblings<'a>(&'a self, ctx: &Context<'a>) -> Result<Vec<Option<Sibling<'a>>>> {
        let mut siblings = Vec::with_capacity(ctx.len());
        siblings.push(None);

        for index in 1..ctx.len() {
            let node = &ctx[index];
            let node_id = node.page_id();
            let at_minimum = match NodeKind::of(node, node_id)? {
                NodeKind::Leaf => {
                    let leaf: LeafRef<'_, K> = node.view();
                    leaf.size() <= leaf.min_size()
                }
                NodeKind::Internal => {
                    let internal: InternalRef<'_, K> = node.view();
                    internal.size() <= internal.min_size()
                }
            };
            if !at_minimum {
                siblings.push(None);
                continue;
            }

            let parent_guard = &ctx[index - 1];
            expect_kind(parent_guard, parent_guard.page_id(), NodeKind::Internal)?;
            let parent: InternalRef<'_, K> = parent_guard.view();
            let position = parent.value_index(node_id).ok_or_else(|| {
                Error::Corrupted(format!(
                    "page {} missing from parent {}",
                    node_id.0,
                    parent_guard.page_id().0
                ))
            })?;

            let (sibling_id, side) = if position > 0 {
                (parent.child_at(position - 1), Side::Left)
            } else if position + 1 < parent.size() {
                (parent.child_at(position + 1), Side::Right)
            } else {
                return Err(Error::Corrupted(format!(
                    "non-root page {} has no siblings",
                    node_id.0
                )));
            };

            let guard = self.bpm.fetch_page_write(sibling_id)?;
            siblings.push(Some(Sibling { guard, side }));
        }
        Ok(siblings)
    }

    /// Repair underflow from the node at `index` upward.
    fn rebalance<'a>(
        &self,
        ctx: &mut Context<'a>,
        mut index: usize,
        siblings: &mut [Option<Sibling<'a>>],
    ) -> Result<()> {
        loop {
            if ctx.is_root(index) {
                return self.adjust_root(ctx, index);
            }

            let node_id = ctx[index].page_id();
            let (size, min_size) = match NodeKind::of(&ctx[index], node_id)? {
                NodeKind::Leaf => {
                    let leaf: LeafRef<'_, K> = ctx[index].view();
                    (leaf.size(), leaf.min_size())
                }
                NodeKind::Internal => {
                    let node: InternalRef<'_, K> = ctx[index].view();
                    (node.size(), node.min_size())
                }
            };
            if size >= min_size {
                return Ok(());
            }
            if index == 0 {
                return Err(Error::Corrupted(format!(
                    "page {} underflowed without its parent latched",
                    node_id.0
                )));
            }
            let sibling = siblings
                .get_mut(index)
                .and_then(Option::take)
                .ok_or_else(|| {
                    Error::Corrupted(format!("page {} underflowed without a latched sibling", node_id.0))
                })?;

            let (ancestors, rest) = ctx.write_set.split_at_mut(index);
            let parent = &mut ancestors[index - 1];
            let node = &mut rest[0];
            if !self.repair_underflow(parent, node, sibling, &mut ctx.pending_frees)? {
                return Ok(());
            }
            index -= 1;
        }
    }

    /// Fix an underfull node by borrowing from or merging with its latched
    /// sibling. Returns true if the parent lost an entry.
    fn repair_underflow(
        &self,
        parent_guard: &mut PageWriteGuard<'_>,
        node_guard: &mut PageWriteGuard<'_>,
        sibling: Sibling<'_>,
        pending_frees: &mut Vec<PageId>,
    ) -> Result<bool> {
        let node_id = node_guard.page_id();
        let parent_id = parent_guard.page_id();
        let sibling_id = sibling.guard.page_id();
        let kind = NodeKind::of(node_guard, node_id)?;
        expect_kind(parent_guard, parent_id, NodeKind::Internal)?;

        let mut parent: InternalMut<'_, K> = parent_guard.view_mut();
        let position = parent.value_index(node_id).ok_or_else(|| {
            Error::Corrupted(format!("page {} missing from parent {}", node_id.0, parent_id.0))
        })?;
        let sibling_position = match sibling.side {
            Side::Left => position.checked_sub(1),
            Side::Right => Some(position + 1).filter(|&p| p < parent.size()),
        };
        if sibling_position.map(|p| parent.child_at(p)) != Some(sibling_id) {
            return Err(Error::Corrupted(format!(
                "page {} is not next to {} in parent {}",
                sibling_id.0, node_id.0, parent_id.0
            )));
        }

        if sibling.side == Side::Left {
            let left_id = sibling_id;
            let mut left_guard = sibling.guard;
            let middle_key = parent.key_at(position);

            let merged = match kind {
                NodeKind::Leaf => {
                    let mut left: LeafMut<'_, K> = left_guard.view_mut();
                    let mut node: LeafMut<'_, K> = node_guard.view_mut();
                    if left.size() > left.min_size() {
                        let moved = left.move_last_to_front_of(&mut node);
                        parent.set_key_at(position, &moved);
                        false
                    } else {
                        node.merge_all_into(&mut left);
                        true
                    }
                }
                NodeKind::Internal => {
                    let mut left: InternalMut<'_, K> = left_guard.view_mut();
                    let mut node: InternalMut<'_, K> = node_guard.view_mut();
                    if left.size() > left.min_size() {
                        let moved = left.move_last_to_front_of(&mut node, &middle_key);
                        parent.set_key_at(position, &moved);
                        false
                    } else {
                        node.merge_all_into(&mut left, &middle_key);
                        true
                    }
                }
            };

            if merged {
                parent.remove_at(position);
                pending_frees.push(node_id);
                debug!(page_id = node_id.0, into = left_id.0, ?kind, "btree.merge");
            } else {
                debug!(page_id = node_id.0, from = left_id.0, ?kind, "btree.redistribute");
            }
            return Ok(merged);
        }

        let right_id = sibling_id;
        let mut right_guard = sibling.guard;
        let middle_key = parent.key_at(position + 1);

        let merged = match kind {
            NodeKind::Leaf => {
                let mut right: LeafMut<'_, K> = right_guard.view_mut();
                let mut node: LeafMut<'_, K> = node_guard.view_mut();
                if right.size() > right.min_size() {
                    let separator = right.move_first_to_end_of(&mut node);
                    parent.set_key_at(position + 1, &separator);
                    false
                } else {
                    right.merge_all_into(&mut node);
                    true
                }
            }
            NodeKind::Internal => {
                let mut right: InternalMut<'_, K> = right_guard.view_mut();
                let mut node: InternalMut<'_, K> = node_guard.view_mut();
                if right.size() > right.min_size() {
                    let separator = right.move_first_to_end_of(&mut node, &middle_key);
                    parent.set_key_at(position + 1, &separator);
                    false
                } else {
                    right.merge_all_into(&mut node, &middle_key);
                    true
                }
            }
        };

        if merged {
            parent.remove_at(position + 1);
            pending_frees.push(right_id);
            debug!(page_id = right_id.0, into = node_id.0, ?kind, "btree.merge");
        } else {
            debug!(page_id = node_id.0, from = right_id.0, ?kind, "btree.redistribute");
        }
        Ok(merged)
    }

    /// Shrink the tree when the root empties (leaf) or is left with a
    /// single child (internal).
    fn adjust_root(&self, ctx: &mut Context<'_>, index: usize) -> Result<()> {
        let root = &ctx[index];
        let root_id = root.page_id();

        let new_root = match NodeKind::of(root, root_id)? {
            NodeKind::Leaf => {
                let leaf: LeafRef<'_, K> = root.view();
                if leaf.size() > 0 {
                    return Ok(());
                }
                PageId::INVALID
            }
            NodeKind::Internal => {
                let node: InternalRef<'_, K> = root.view();
                if node.size() > 1 {
                    return Ok(());
                }
                node.child_at(0)
            }
        };

        ctx.set_root(new_root)?;
        ctx.pending_frees.push(root_id);
        debug!(old_root = root_id.0, new_root = new_root.0, "btree.root.shrink");
        Ok(())
    }

    // ========================================================================
    // Shared helpers
    // ========================================================================

    /// Descend with exclusive latches, releasing everything above each node
    /// that is safe for `op`. The leaf ends up last in the context.
    fn descend_for_write<'a>(&'a self, ctx: &mut Context<'a>, key: &K, op: WriteOp) -> Result<()> {
        let mut page_id = ctx.root_page_id;

        loop {
            let guard = self.bpm.fetch_page_write(page_id)?;
            let is_root = page_id == ctx.root_page_id;

            let (safe, child) = match NodeKind::of(&guard, page_id)? {
                NodeKind::Leaf => {
                    let leaf: LeafRef<'_, K> = guard.view();
                    (is_safe(op, NodeKind::Leaf, is_root, leaf.size(), leaf.max_size()), None)
                }
                NodeKind::Internal => {
                    let node: InternalRef<'_, K> = guard.view();
                    (
                        is_safe(op, NodeKind::Internal, is_root, node.size(), node.max_size()),
                        Some(node.lookup_child(key, &self.comparator)),
                    )
                }
            };

            if safe {
                ctx.release_ancestors();
            }
            ctx.push(guard);
            trace!(page_id = page_id.0, safe, held = ctx.len(), "btree.descend.write");

            match child {
                Some(child) => page_id = child,
                None => return Ok(()),
            }
        }
    }

    /// Return a page emptied by a merge or root change to the buffer pool.
    fn free_page(&self, page_id: PageId) -> Result<()> {
        match self.bpm.delete_page(page_id) {
            Ok(()) => Ok(()),
            Err(Error::PagePinned(_)) => {
                warn!(page_id = page_id.0, "btree.free.pinned");
                Ok(())
            }
            Err(err) => Err(err),
        }
    }
}

/// Whether `op` on a node of this size can leave the node's parent untouched.
fn is_safe(op: WriteOp, kind: NodeKind, is_root: bool, size: usize, max_size: usize) -> bool {
    match op {
        WriteOp::Insert => size < max_size,
        WriteOp::Remove if is_root => match kind {
            NodeKind::Leaf => size > 1,
            NodeKind::Internal => size > 2,
        },
        WriteOp::Remove => size > super::node::min_size(max_size),
    }
}

/// Page type check used where a caller expects a specific node kind.
pub(super) fn expect_kind(page: &Page, page_id: PageId, expected: NodeKind) -> Result<()> {
    if NodeKind::of(page, page_id)? == expected {
        Ok(())
    } else {
        Err(Error::UnexpectedPageType {
            page_id: page_id.0,
            expected: match expected {
                NodeKind::Leaf => "b+tree leaf",
                NodeKind::Internal => "b+tree internal",
            },
        })
    }
}
