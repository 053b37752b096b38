//! Fixed-size pool allocator for long-lived, uniformly sized objects.
//!
//! Slots live in blocks of `items_per_block` items that are zeroed when the
//! block is created. Free slots are threaded into a single freelist by index,
//! so reuse is LIFO. Blocks are allocated lazily and only released when the
//! allocator is dropped.

use std::alloc::{alloc_zeroed, dealloc, handle_alloc_error, Layout};
use std::cell::Cell;
use std::fmt;
use std::marker::PhantomData;
use std::ptr::NonNull;

use crate::allocators::deferred::{RemoteFree, RemoteFreeQueue};
use crate::api::stats::PoolStats;
use crate::ft_emit;
use crate::util::layout::{granule, ALLOC_ALIGN};

/// Freelist terminator.
const NIL: u32 = u32::MAX;

/// Handle to one slot of a [`PoolAllocator`].
///
/// The generation changes every time the slot is freed, so a handle that
/// outlives its slot no longer resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolSlot {
    index: u32,
    generation: u32,
}

impl PoolSlot {
    /// Slot index within the pool (for debugging).
    pub fn raw_index(&self) -> u32 {
        self.index
    }

    /// Slot generation (for debugging).
    pub fn raw_generation(&self) -> u32 {
        self.generation
    }
}

/// One block of zeroed slot memory.
struct PoolBlock {
    base: NonNull<u8>,
    layout: Layout,
}

impl PoolBlock {
    fn new(bytes: usize) -> Self {
        let layout = match Layout::from_size_align(bytes, ALLOC_ALIGN) {
            Ok(layout) => layout,
            Err(_) => panic!("pool block of {} bytes is too large", bytes),
        };

        // SAFETY: bytes is non-zero (item size >= 16, at least one item)
        let ptr = unsafe { alloc_zeroed(layout) };
        let base = match NonNull::new(ptr) {
            Some(base) => base,
            None => handle_alloc_error(layout),
        };

        Self { base, layout }
    }
}

impl Drop for PoolBlock {
    fn drop(&mut self) {
        // SAFETY: We allocated this memory in `new()` with the same layout
        unsafe {
            dealloc(self.base.as_ptr(), self.layout);
        }
    }
}

/// A fixed-block-size freelist allocator.
///
/// Every slot is `item_size` bytes rounded up to 16, and 16-byte aligned.
/// `alloc` pops the freelist head, creating a new zeroed block when the list
/// is empty; `free` pushes the slot back on the head. A freed slot keeps its
/// old contents, only fresh blocks are zeroed.
///
/// Handles are checked: freeing a slot twice, or freeing an index this pool
/// never issued, is rejected with `FT301` instead of corrupting the freelist.
///
/// The allocator is single-threaded. Worker threads can hand slots back
/// through a [`RemoteFree`] obtained from [`remote`](Self::remote).
///
/// # Example
///
/// ```rust
/// use frametask::PoolAllocator;
///
/// let mut pool = PoolAllocator::new(64, 24);
/// let slot = pool.alloc();
/// pool.bytes_mut(slot).unwrap()[0] = 0xAB;
///
/// let addr = pool.ptr(slot).unwrap();
/// assert!(pool.free(slot));
/// let again = pool.alloc();
/// assert_eq!(pool.ptr(again), Some(addr));
/// ```
pub struct PoolAllocator {
    items_per_block: usize,
    item_size: usize,

    blocks: Vec<PoolBlock>,

    /// Next free slot for every slot; only meaningful while the slot is free
    links: Vec<u32>,
    generations: Vec<u32>,
    live: Vec<bool>,

    free_head: u32,
    live_count: usize,

    remote: RemoteFreeQueue,

    /// Not Sync
    _not_sync: PhantomData<Cell<()>>,
}

// SAFETY: The allocator exclusively owns its blocks; moving it to another
// thread moves that ownership.
unsafe impl Send for PoolAllocator {}

impl PoolAllocator {
    /// Create a pool of `item_size`-byte slots, `items_per_block` per block.
    ///
    /// No memory is allocated until the first `alloc`.
    ///
    /// # Panics
    ///
    /// Panics if `items_per_block` is zero or `item_size` rounds past
    /// `usize::MAX`.
    pub fn new(items_per_block: usize, item_size: usize) -> Self {
        assert!(items_per_block > 0, "pool needs at least one item per block");

        // At least one granule, so every slot has its own address
        let item_size = match granule(item_size.max(1)) {
            Some(size) => size,
            None => panic!("invalid pool item size {}", item_size),
        };

        Self {
            items_per_block,
            item_size,
            blocks: Vec::new(),
            links: Vec::new(),
            generations: Vec::new(),
            live: Vec::new(),
            free_head: NIL,
            live_count: 0,
            remote: RemoteFreeQueue::new(),
            _not_sync: PhantomData,
        }
    }

    /// Slot size after rounding.
    pub fn item_size(&self) -> usize {
        self.item_size
    }

    /// Slots per block.
    pub fn items_per_block(&self) -> usize {
        self.items_per_block
    }

    /// Take a slot from the freelist, growing the pool if it is empty.
    pub fn alloc(&mut self) -> PoolSlot {
        self.drain_remote();

        if self.free_head == NIL {
            self.grow();
        }

        let index = self.free_head;
        let i = index as usize;
        self.free_head = self.links[i];
        self.live[i] = true;
        self.live_count += 1;

        PoolSlot {
            index,
            generation: self.generations[i],
        }
    }

    /// Return a slot to the freelist.
    ///
    /// Returns false (and emits `FT301`) if the handle is stale or out of
    /// range for this pool.
    pub fn free(&mut self, slot: PoolSlot) -> bool {
        if !self.is_live(slot) {
            ft_emit!(
                FT301,
                "slot {} generation {}",
                slot.index,
                slot.generation
            );
            return false;
        }

        let i = slot.index as usize;
        self.generations[i] = self.generations[i].wrapping_add(1);
        self.live[i] = false;
        self.links[i] = self.free_head;
        self.free_head = slot.index;
        self.live_count -= 1;
        true
    }

    /// Check whether a handle refers to a live slot of this pool.
    pub fn is_live(&self, slot: PoolSlot) -> bool {
        let i = slot.index as usize;
        i < self.live.len() && self.live[i] && self.generations[i] == slot.generation
    }

    /// Address of a live slot.
    pub fn ptr(&self, slot: PoolSlot) -> Option<NonNull<u8>> {
        if self.is_live(slot) {
            Some(self.slot_ptr(slot.index))
        } else {
            None
        }
    }

    /// Contents of a live slot.
    pub fn bytes(&self, slot: PoolSlot) -> Option<&[u8]> {
        let ptr = self.ptr(slot)?;
        // SAFETY: the slot spans item_size bytes inside its block
        Some(unsafe { std::slice::from_raw_parts(ptr.as_ptr(), self.item_size) })
    }

    /// Mutable contents of a live slot.
    pub fn bytes_mut(&mut self, slot: PoolSlot) -> Option<&mut [u8]> {
        let ptr = self.ptr(slot)?;
        // SAFETY: as above, and &mut self guarantees exclusive access
        Some(unsafe { std::slice::from_raw_parts_mut(ptr.as_ptr(), self.item_size) })
    }

    /// Handle through which other threads can free slots of this pool.
    pub fn remote(&self) -> RemoteFree {
        self.remote.handle()
    }

    /// Apply frees queued through [`RemoteFree`] handles.
    ///
    /// Runs automatically at the start of every `alloc`. Returns the number
    /// of slots returned to the freelist.
    pub fn drain_remote(&mut self) -> usize {
        let mut freed = 0;
        while let Some(slot) = self.remote.pop() {
            if self.free(slot) {
                freed += 1;
            }
        }
        freed
    }

    /// Snapshot of the pool's statistics.
    pub fn stats(&self) -> PoolStats {
        PoolStats {
            blocks: self.blocks.len(),
            capacity: self.live.len(),
            live: self.live_count,
            item_size: self.item_size,
        }
    }

    /// Number of slots currently handed out.
    pub fn live_count(&self) -> usize {
        self.live_count
    }

    /// Address of a slot by index, live or not.
    pub(crate) fn slot_ptr(&self, index: u32) -> NonNull<u8> {
        let i = index as usize;
        let block = &self.blocks[i / self.items_per_block];
        let offset = (i % self.items_per_block) * self.item_size;

        // SAFETY: offset + item_size <= block size by construction
        unsafe { NonNull::new_unchecked(block.base.as_ptr().add(offset)) }
    }

    /// Live slots, by index.
    pub(crate) fn live_indices(&self) -> impl Iterator<Item = u32> + '_ {
        self.live
            .iter()
            .enumerate()
            .filter(|(_, live)| **live)
            .map(|(i, _)| i as u32)
    }

    /// Allocate a block and thread its slots onto the (empty) freelist.
    fn grow(&mut self) {
        let first = self.live.len();
        let end = first + self.items_per_block;
        if end >= NIL as usize {
            panic!("pool allocator exceeded {} slots", NIL);
        }

        let bytes = match self.items_per_block.checked_mul(self.item_size) {
            Some(bytes) => bytes,
            None => panic!("pool block size overflows usize"),
        };
        self.blocks.push(PoolBlock::new(bytes));

        for i in first..end {
            let next = if i + 1 < end { (i + 1) as u32 } else { self.free_head };
            self.links.push(next);
            self.generations.push(0);
            self.live.push(false);
        }
        self.free_head = first as u32;
    }
}

impl fmt::Debug for PoolAllocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolAllocator")
            .field("item_size", &self.item_size)
            .field("items_per_block", &self.items_per_block)
            .field("blocks", &self.blocks.len())
            .field("live", &self.live_count)
            .finish()
    }
}
