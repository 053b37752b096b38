//! Deferred free queue for cross-thread pool frees.
//!
//! A task body running on a worker may finish with a pool slot it was
//! handed. It cannot touch the pool directly, so the free is queued and
//! applied by the owning thread on its next allocation.

use std::sync::Arc;

use crossbeam_queue::SegQueue;

use crate::allocators::pool::PoolSlot;

/// Lock-free queue of pending frees, owned by one pool.
pub(crate) struct RemoteFreeQueue {
    queue: Arc<SegQueue<PoolSlot>>,
}

impl RemoteFreeQueue {
    /// Create a new deferred free queue.
    pub fn new() -> Self {
        Self {
            queue: Arc::new(SegQueue::new()),
        }
    }

    /// Create a handle that pushes onto this queue.
    pub fn handle(&self) -> RemoteFree {
        RemoteFree {
            queue: Arc::clone(&self.queue),
        }
    }

    /// Pop the oldest pending free.
    pub fn pop(&self) -> Option<PoolSlot> {
        self.queue.pop()
    }
}

/// Sendable handle for freeing pool slots from another thread.
///
/// Frees are queued and applied by the owning `PoolAllocator` on its next
/// `alloc` (or `drain_remote`). Stale handles are rejected at that point.
#[derive(Clone)]
pub struct RemoteFree {
    queue: Arc<SegQueue<PoolSlot>>,
}

impl RemoteFree {
    /// Queue a slot to be freed by the owning pool.
    pub fn free(&self, slot: PoolSlot) {
        self.queue.push(slot);
    }

    /// Approximate number of frees not yet applied.
    pub fn pending(&self) -> usize {
        self.queue.len()
    }
}

impl std::fmt::Debug for RemoteFree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFree")
            .field("pending", &self.pending())
            .finish()
    }
}
