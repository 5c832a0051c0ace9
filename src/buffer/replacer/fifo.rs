//! FIFO (First-In-First-Out) replacement policy.

use std::collections::{HashSet, VecDeque};

use super::Replacer;
use crate::buffer::FrameId;

/// Evicts pages in the order they were loaded into the pool.
///
/// Re-accessing a frame does not move it. Pinned frames are skipped during
/// eviction and keep their place in the queue.
#[derive(Debug, Default)]
pub struct FifoReplacer {
    /// Queue of frame IDs in load order (front = oldest).
    queue: VecDeque<FrameId>,
    /// Frames present in `queue`.
    in_queue: HashSet<FrameId>,
    /// Frames that are currently evictable (pin_count == 0).
    evictable: HashSet<FrameId>,
}

impl FifoReplacer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Replacer for FifoReplacer {
    fn record_access(&mut self, frame_id: FrameId) {
        if self.in_queue.insert(frame_id) {
            self.queue.push_back(frame_id);
        }
    }

    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool) {
        if evictable {
            self.evictable.insert(frame_id);
        } else {
            self.evictable.remove(&frame_id);
        }
    }

    fn evict(&mut self) -> Option<FrameId> {
        let pos = self
            .queue
            .iter()
            .position(|fid| self.evictable.contains(fid))?;
        let frame_id = self.queue.remove(pos)?;
        self.in_queue.remove(&frame_id);
        self.evictable.remove(&frame_id);
        Some(frame_id)
    }

    fn remove(&mut self, frame_id: FrameId) {
        if self.in_queue.remove(&frame_id) {
            self.queue.retain(|fid| *fid != frame_id);
        }
        self.evictable.remove(&frame_id);
    }

    fn size(&self) -> usize {
        self.evictable.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fifo_evicts_in_load_order() {
        let mut replacer = FifoReplacer::new();
        for i in 0..3 {
            replacer.record_access(FrameId::new(i));
            replacer.set_evictable(FrameId::new(i), true);
        }
        // Re-access does not reorder.
        replacer.record_access(FrameId::new(0));

        assert_eq!(replacer.size(), 3);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), Some(FrameId::new(2)));
        assert_eq!(replacer.evict(), None);
    }

    #[test]
    fn test_fifo_pinned_frame_keeps_its_place() {
        let mut replacer = FifoReplacer::new();
        for i in 0..3 {
            replacer.record_access(FrameId::new(i));
        }
        replacer.set_evictable(FrameId::new(1), true);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));

        // Frame 0 was pinned during the first eviction; it is still oldest.
        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(2), true);
        assert_eq!(replacer.evict(), Some(FrameId::new(0)));
    }

    #[test]
    fn test_fifo_remove() {
        let mut replacer = FifoReplacer::new();
        replacer.record_access(FrameId::new(0));
        replacer.record_access(FrameId::new(1));
        replacer.set_evictable(FrameId::new(0), true);
        replacer.set_evictable(FrameId::new(1), true);

        replacer.remove(FrameId::new(0));

        assert_eq!(replacer.size(), 1);
        assert_eq!(replacer.evict(), Some(FrameId::new(1)));
        assert_eq!(replacer.evict(), None);
    }
}
