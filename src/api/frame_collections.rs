//! Frame-local collections backed by a [`FrameArena`].
//!
//! These borrow the arena, so they cannot outlive the frame they were built
//! in: `FrameArena::clear` needs `&mut` access and is rejected while any
//! collection is alive.

use std::fmt;
use std::ops::{Deref, DerefMut, Index, IndexMut};
use std::ptr::NonNull;
use std::slice;

use crate::allocators::frame::FrameArena;

/// Capacity of a `FrameVec` after its first push.
pub const FRAME_VEC_INITIAL_CAPACITY: usize = 4096;

/// Slots added each time a full `FrameVec` grows.
pub const FRAME_VEC_GROWTH: usize = 1024;

/// A growable array living in frame memory.
///
/// Growing allocates a larger array in the arena and copies the elements
/// over; the old array is simply abandoned until the next clear. Capacity
/// starts at 4096 on first push and then grows by 1024 slots at a time,
/// which suits per-frame lists of visible tiles or draw items.
///
/// Elements are `Copy` and are never dropped.
///
/// # Example
///
/// ```rust
/// use frametask::{FrameArena, FrameVec};
///
/// let arena = FrameArena::new(256 * 1024);
/// let mut visible = FrameVec::new_in(&arena);
/// for tile in 0..10u32 {
///     visible.push(tile);
/// }
/// assert_eq!(visible.len(), 10);
/// assert_eq!(visible[3], 3);
/// ```
pub struct FrameVec<'a, T: Copy> {
    arena: &'a FrameArena,
    ptr: NonNull<T>,
    len: usize,
    capacity: usize,
}

impl<'a, T: Copy> FrameVec<'a, T> {
    /// Create an empty vector; nothing is allocated until the first push.
    pub fn new_in(arena: &'a FrameArena) -> Self {
        Self {
            arena,
            ptr: NonNull::dangling(),
            len: 0,
            capacity: 0,
        }
    }

    /// Create an empty vector with room for `capacity` elements.
    pub fn with_capacity_in(capacity: usize, arena: &'a FrameArena) -> Self {
        let mut vec = Self::new_in(arena);
        if capacity > 0 {
            vec.grow_to(capacity);
        }
        vec
    }

    /// Returns the number of elements in the vector.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Returns true if the vector contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the current capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append an element, growing inside the arena when full.
    ///
    /// # Panics
    ///
    /// Panics if the grown array no longer fits in one arena block.
    pub fn push(&mut self, value: T) {
        if self.len == self.capacity {
            let next = if self.capacity > 0 {
                self.capacity + FRAME_VEC_GROWTH
            } else {
                FRAME_VEC_INITIAL_CAPACITY
            };
            self.grow_to(next);
        }

        // SAFETY: len < capacity after growing
        unsafe {
            self.ptr.as_ptr().add(self.len).write(value);
        }
        self.len += 1;
    }

    /// Remove and return the last element.
    pub fn pop(&mut self) -> Option<T> {
        if self.len == 0 {
            return None;
        }
        self.len -= 1;
        // SAFETY: the element at len was initialized by push
        unsafe { Some(self.ptr.as_ptr().add(self.len).read()) }
    }

    /// Remove all elements, keeping the capacity.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    fn grow_to(&mut self, capacity: usize) {
        let fresh = self.arena.alloc_array_uninit::<T>(capacity);

        // SAFETY: the first len elements of the old array are initialized and
        // the fresh array is a distinct allocation with room for them
        unsafe {
            std::ptr::copy_nonoverlapping(self.ptr.as_ptr(), fresh.as_ptr(), self.len);
        }
        self.ptr = fresh;
        self.capacity = capacity;
    }

    /// View the elements as a slice.
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: ptr is valid for len initialized elements (dangling when len is 0)
        unsafe { slice::from_raw_parts(self.ptr.as_ptr(), self.len) }
    }

    /// View the elements as a mutable slice.
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        // SAFETY: as above, and we hold the only reference
        unsafe { slice::from_raw_parts_mut(self.ptr.as_ptr(), self.len) }
    }

    /// Iterate over the elements.
    pub fn iter(&self) -> slice::Iter<'_, T> {
        self.as_slice().iter()
    }
}

impl<'a, T: Copy> Deref for FrameVec<'a, T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<'a, T: Copy> DerefMut for FrameVec<'a, T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<'a, T: Copy> Index<usize> for FrameVec<'a, T> {
    type Output = T;

    fn index(&self, index: usize) -> &Self::Output {
        &self.as_slice()[index]
    }
}

impl<'a, T: Copy> IndexMut<usize> for FrameVec<'a, T> {
    fn index_mut(&mut self, index: usize) -> &mut Self::Output {
        &mut self.as_mut_slice()[index]
    }
}

impl<'a, 'b, T: Copy> IntoIterator for &'b FrameVec<'a, T> {
    type Item = &'b T;
    type IntoIter = slice::Iter<'b, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<'a, T: Copy> Extend<T> for FrameVec<'a, T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for value in iter {
            self.push(value);
        }
    }
}

impl<'a, T: Copy + fmt::Debug> fmt::Debug for FrameVec<'a, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}
