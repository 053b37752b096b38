//! Frame arena - bump allocator for frame-temporary allocations.
//!
//! Memory comes from a chain of fixed-size blocks that only ever grows.
//! `clear()` rewinds every block once per frame; nothing is returned to the
//! system until the arena itself is dropped.

use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::ptr::NonNull;

use crate::api::config::ArenaConfig;
use crate::api::stats::ArenaStats;
use crate::ft_emit;
use crate::util::layout::{granule, ALLOC_ALIGN};

/// Errors reported by the fallible frame arena entry points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArenaError {
    /// The (rounded) request is larger than a single block.
    Oversized {
        /// Requested size after rounding to 16 bytes
        requested: usize,
        /// Capacity of one block
        capacity: usize,
    },
    /// The type needs more than the 16-byte alignment blocks provide.
    Alignment {
        /// Requested alignment
        align: usize,
    },
}

impl fmt::Display for ArenaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArenaError::Oversized { requested, capacity } => write!(
                f,
                "frame alloc of {} bytes can never be satisfied (block capacity {})",
                requested, capacity
            ),
            ArenaError::Alignment { align } => write!(
                f,
                "frame alloc with alignment {} exceeds the {}-byte block alignment",
                align, ALLOC_ALIGN
            ),
        }
    }
}

impl std::error::Error for ArenaError {}

/// One fixed-capacity block in the chain.
struct Block {
    base: NonNull<u8>,
    size: usize,
    used: usize,
}

impl Block {
    fn new(size: usize) -> Self {
        let layout = Self::layout(size);

        // SAFETY: with_config only creates blocks of a non-zero size and the
        // alignment is a power of two
        let ptr = unsafe { alloc(layout) };
        let base = match NonNull::new(ptr) {
            Some(base) => base,
            None => handle_alloc_error(layout),
        };

        Self { base, size, used: 0 }
    }

    fn layout(size: usize) -> Layout {
        // Arena construction guarantees a non-zero, 16-byte multiple size.
        Layout::from_size_align(size, ALLOC_ALIGN).expect("Invalid arena block layout")
    }

    fn remaining(&self) -> usize {
        self.size - self.used
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        // SAFETY: We allocated this memory in `new()` with the same layout
        unsafe {
            dealloc(self.base.as_ptr(), Self::layout(self.size));
        }
    }
}

/// A bump allocator for frame-temporary allocations.
///
/// Allocations are a pointer bump inside the current block. When a block is
/// full the arena moves to the next block in the chain, appending a new one
/// if needed. A single allocation never straddles two blocks, so no request
/// may exceed the block size.
///
/// References returned by the typed helpers borrow the arena, and
/// [`clear`](Self::clear) takes `&mut self`: the borrow checker rejects any
/// frame data that would outlive the frame. Values placed in the arena are
/// never dropped.
///
/// The arena is single-threaded (`!Sync`).
///
/// # Example
///
/// ```rust
/// use frametask::FrameArena;
///
/// let mut arena = FrameArena::new(64 * 1024);
///
/// for _frame in 0..3 {
///     arena.clear();
///     let ids = arena.alloc_slice_copy(&[1u32, 2, 3]);
///     ids[0] = 7;
/// }
/// assert_eq!(arena.block_count(), 1);
/// ```
pub struct FrameArena {
    /// Block chain; only ever grows
    blocks: RefCell<Vec<Block>>,

    /// Index of the block allocations are served from
    current: Cell<usize>,

    /// Capacity of every block
    block_size: usize,

    /// Bytes handed out since the last clear
    allocated: Cell<usize>,

    high_water: Cell<usize>,
    block_allocations: Cell<u64>,
    clears: u64,
}

// SAFETY: The arena exclusively owns its blocks; moving it to another thread
// moves that ownership. It is not Sync (Cell/RefCell).
unsafe impl Send for FrameArena {}

impl FrameArena {
    /// Create an arena whose blocks hold `block_size` bytes each.
    ///
    /// The size is rounded up to a multiple of 16.
    ///
    /// # Panics
    ///
    /// Panics if `block_size` is zero or rounds past `usize::MAX`.
    pub fn new(block_size: usize) -> Self {
        Self::with_config(&ArenaConfig::default().with_block_size(block_size))
    }

    /// Create an arena from a configuration.
    ///
    /// # Panics
    ///
    /// Panics if the block size is zero or rounds past `usize::MAX`.
    pub fn with_config(config: &ArenaConfig) -> Self {
        let block_size = match granule(config.block_size) {
            Some(size) if size > 0 => size,
            _ => panic!("invalid frame arena block size {}", config.block_size),
        };
        let initial = config.initial_blocks.max(1);
        let blocks = (0..initial).map(|_| Block::new(block_size)).collect();

        Self {
            blocks: RefCell::new(blocks),
            current: Cell::new(0),
            block_size,
            allocated: Cell::new(0),
            high_water: Cell::new(0),
            block_allocations: Cell::new(initial as u64),
            clears: 0,
        }
    }

    /// Allocate `size` bytes, 16-byte aligned, valid until the next `clear()`.
    ///
    /// # Panics
    ///
    /// A request larger than one block can never be satisfied; it emits
    /// `FT001` and panics. Use [`try_alloc_bytes`](Self::try_alloc_bytes) to
    /// handle that case instead.
    pub fn alloc_bytes(&self, size: usize) -> NonNull<u8> {
        match self.try_alloc_bytes(size) {
            Ok(ptr) => ptr,
            Err(err) => Self::fail(err),
        }
    }

    /// Allocate `size` bytes, reporting oversized requests as an error.
    pub fn try_alloc_bytes(&self, size: usize) -> Result<NonNull<u8>, ArenaError> {
        let size = granule(size).unwrap_or(usize::MAX);
        if size > self.block_size {
            return Err(ArenaError::Oversized {
                requested: size,
                capacity: self.block_size,
            });
        }

        let mut blocks = self.blocks.borrow_mut();
        let mut index = self.current.get();

        loop {
            if index == blocks.len() {
                blocks.push(Block::new(self.block_size));
                self.block_allocations.set(self.block_allocations.get() + 1);
            }

            let block = &mut blocks[index];
            if block.remaining() >= size {
                // SAFETY: used + size <= block.size, so the result is in bounds
                let ptr = unsafe { NonNull::new_unchecked(block.base.as_ptr().add(block.used)) };
                block.used += size;

                self.current.set(index);
                let allocated = self.allocated.get() + size;
                self.allocated.set(allocated);
                if allocated > self.high_water.get() {
                    self.high_water.set(allocated);
                }
                return Ok(ptr);
            }

            index += 1;
        }
    }

    /// Allocate memory for `layout`, rejecting alignments above 16.
    pub fn try_alloc_layout(&self, layout: Layout) -> Result<NonNull<u8>, ArenaError> {
        if layout.align() > ALLOC_ALIGN {
            return Err(ArenaError::Alignment {
                align: layout.align(),
            });
        }
        self.try_alloc_bytes(layout.size())
    }

    fn alloc_layout(&self, layout: Layout) -> NonNull<u8> {
        match self.try_alloc_layout(layout) {
            Ok(ptr) => ptr,
            Err(err) => Self::fail(err),
        }
    }

    fn array_layout<T>(len: usize) -> Layout {
        match Layout::array::<T>(len) {
            Ok(layout) => layout,
            Err(_) => Self::fail(ArenaError::Oversized {
                requested: usize::MAX,
                capacity: 0,
            }),
        }
    }

    #[cold]
    fn fail(err: ArenaError) -> ! {
        match err {
            ArenaError::Oversized { .. } => ft_emit!(FT001, "{}", err),
            ArenaError::Alignment { .. } => ft_emit!(FT002, "{}", err),
        }
        panic!("{}", err);
    }

    /// Reserve uninitialized room for `len` values of `T`.
    pub(crate) fn alloc_array_uninit<T>(&self, len: usize) -> NonNull<T> {
        self.alloc_layout(Self::array_layout::<T>(len)).cast::<T>()
    }

    /// Move `value` into the arena.
    ///
    /// The value is never dropped.
    pub fn alloc<T>(&self, value: T) -> &mut T {
        let ptr = self.alloc_layout(Layout::new::<T>()).cast::<T>();

        // SAFETY: ptr is fresh, suitably aligned and sized for T, and no other
        // reference to this memory exists until the next clear
        unsafe {
            ptr.as_ptr().write(value);
            &mut *ptr.as_ptr()
        }
    }

    /// Copy a slice into the arena.
    pub fn alloc_slice_copy<T: Copy>(&self, src: &[T]) -> &mut [T] {
        let ptr = self.alloc_array_uninit::<T>(src.len());

        // SAFETY: the destination holds src.len() elements and cannot overlap src
        unsafe {
            std::ptr::copy_nonoverlapping(src.as_ptr(), ptr.as_ptr(), src.len());
            std::slice::from_raw_parts_mut(ptr.as_ptr(), src.len())
        }
    }

    /// Allocate a slice of `len` elements produced by `f(index)`.
    pub fn alloc_slice_fill_with<T, F>(&self, len: usize, mut f: F) -> &mut [T]
    where
        F: FnMut(usize) -> T,
    {
        let ptr = self.alloc_array_uninit::<T>(len);

        // SAFETY: every element is written before the slice is created
        unsafe {
            for i in 0..len {
                ptr.as_ptr().add(i).write(f(i));
            }
            std::slice::from_raw_parts_mut(ptr.as_ptr(), len)
        }
    }

    /// Invalidate every allocation and rewind to the first block.
    ///
    /// Call once per frame before any allocation for that frame. Block
    /// memory is neither freed nor overwritten.
    pub fn clear(&mut self) {
        for block in self.blocks.get_mut().iter_mut() {
            block.used = 0;
        }
        self.current.set(0);
        self.allocated.set(0);
        self.clears += 1;
    }

    /// Capacity of each block in bytes.
    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of blocks in the chain.
    pub fn block_count(&self) -> usize {
        self.blocks.borrow().len()
    }

    /// Bytes handed out since the last clear.
    pub fn allocated_bytes(&self) -> usize {
        self.allocated.get()
    }

    /// Snapshot of the arena's statistics.
    pub fn stats(&self) -> ArenaStats {
        ArenaStats {
            blocks: self.block_count(),
            block_size: self.block_size,
            allocated: self.allocated.get(),
            high_water: self.high_water.get(),
            block_allocations: self.block_allocations.get(),
            clears: self.clears,
        }
    }
}

impl Default for FrameArena {
    fn default() -> Self {
        Self::with_config(&ArenaConfig::default())
    }
}

impl fmt::Debug for FrameArena {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameArena")
            .field("block_size", &self.block_size)
            .field("blocks", &self.block_count())
            .field("allocated", &self.allocated.get())
            .finish()
    }
}
