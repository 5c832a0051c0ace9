//! Eviction policy implementations (replacers).
//!
//! - [`FifoReplacer`] - Evicts in load order
//! - [`LruReplacer`] - Evicts the least recently accessed frame
//!
//! The buffer pool only talks to the [`Replacer`] trait, so the policy is
//! chosen once per pool through [`EvictionPolicy`].

mod fifo;
mod lru;

pub use fifo::FifoReplacer;
pub use lru::LruReplacer;

use crate::buffer::FrameId;

/// Frame bookkeeping shared by all eviction policies.
///
/// The buffer pool calls these under its state mutex, so implementations
/// need no internal synchronization.
pub trait Replacer: Send {
    /// Record that a frame was accessed (loaded or hit).
    fn record_access(&mut self, frame_id: FrameId);

    /// Mark a frame as evictable (pin count 0) or not.
    fn set_evictable(&mut self, frame_id: FrameId, evictable: bool);

    /// Select and forget a victim frame, or `None` if nothing is evictable.
    fn evict(&mut self) -> Option<FrameId>;

    /// Forget a frame entirely (its page was deleted).
    fn remove(&mut self, frame_id: FrameId);

    /// Number of evictable frames.
    fn size(&self) -> usize;
}

/// Which replacer a buffer pool is built with.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum EvictionPolicy {
    Fifo,
    #[default]
    Lru,
}

impl EvictionPolicy {
    pub(crate) fn build(self) -> Box<dyn Replacer> {
        match self {
            EvictionPolicy::Fifo => Box::new(FifoReplacer::new()),
            EvictionPolicy::Lru => Box::new(LruReplacer::new()),
        }
    }
}
