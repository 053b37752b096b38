//! Typed object pool built on [`PoolAllocator`].

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use crate::allocators::pool::{PoolAllocator, PoolSlot};
use crate::api::stats::PoolStats;
use crate::util::layout::ALLOC_ALIGN;

/// Key to a value stored in a [`Pool`].
pub struct PoolKey<T> {
    slot: PoolSlot,
    _marker: PhantomData<fn() -> T>,
}

// Manual implementations to avoid T: Copy/Clone bounds
impl<T> Copy for PoolKey<T> {}

impl<T> Clone for PoolKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> PartialEq for PoolKey<T> {
    fn eq(&self, other: &Self) -> bool {
        self.slot == other.slot
    }
}

impl<T> Eq for PoolKey<T> {}

impl<T> Hash for PoolKey<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.slot.hash(state);
    }
}

impl<T> fmt::Debug for PoolKey<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolKey")
            .field("index", &self.slot.raw_index())
            .field("generation", &self.slot.raw_generation())
            .finish()
    }
}

/// A pool of `T` values with stable addresses.
///
/// Values are placed in [`PoolAllocator`] slots sized for `T`. Removing a
/// value hands its slot to the next insert; keys to removed values stop
/// resolving. Remaining values are dropped with the pool.
///
/// # Example
///
/// ```rust
/// use frametask::Pool;
///
/// let mut nodes: Pool<[f32; 3]> = Pool::new(256);
/// let key = nodes.insert([0.0, 1.0, 2.0]);
/// nodes.get_mut(key).unwrap()[0] = 5.0;
/// assert_eq!(nodes.remove(key), Some([5.0, 1.0, 2.0]));
/// assert!(nodes.get(key).is_none());
/// ```
pub struct Pool<T> {
    raw: PoolAllocator,
    _marker: PhantomData<T>,
}

impl<T> Pool<T> {
    /// Create a pool holding `items_per_block` values per block.
    ///
    /// # Panics
    ///
    /// Panics if `T` needs more than 16-byte alignment.
    pub fn new(items_per_block: usize) -> Self {
        assert!(
            std::mem::align_of::<T>() <= ALLOC_ALIGN,
            "pool values must not need more than {}-byte alignment",
            ALLOC_ALIGN
        );

        Self {
            raw: PoolAllocator::new(items_per_block, std::mem::size_of::<T>()),
            _marker: PhantomData,
        }
    }

    /// Store a value and return its key.
    pub fn insert(&mut self, value: T) -> PoolKey<T> {
        let slot = self.raw.alloc();
        let ptr = self.raw.slot_ptr(slot.raw_index()).cast::<T>();

        // SAFETY: the slot is live, sized and aligned for T, and unoccupied
        unsafe {
            ptr.as_ptr().write(value);
        }

        PoolKey {
            slot,
            _marker: PhantomData,
        }
    }

    /// Shared access to a stored value.
    pub fn get(&self, key: PoolKey<T>) -> Option<&T> {
        let ptr = self.raw.ptr(key.slot)?.cast::<T>();
        // SAFETY: live slots always hold an initialized T
        Some(unsafe { &*ptr.as_ptr() })
    }

    /// Exclusive access to a stored value.
    pub fn get_mut(&mut self, key: PoolKey<T>) -> Option<&mut T> {
        let ptr = self.raw.ptr(key.slot)?.cast::<T>();
        // SAFETY: as above, and &mut self guarantees exclusivity
        Some(unsafe { &mut *ptr.as_ptr() })
    }

    /// Move a value out of the pool, freeing its slot.
    pub fn remove(&mut self, key: PoolKey<T>) -> Option<T> {
        let ptr = self.raw.ptr(key.slot)?.cast::<T>();

        // SAFETY: the slot holds an initialized T that is read exactly once
        let value = unsafe { ptr.as_ptr().read() };
        self.raw.free(key.slot);
        Some(value)
    }

    /// Check whether a key still resolves.
    pub fn contains(&self, key: PoolKey<T>) -> bool {
        self.raw.is_live(key.slot)
    }

    /// Number of stored values.
    pub fn len(&self) -> usize {
        self.raw.live_count()
    }

    /// Returns true if the pool holds no values.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Statistics of the underlying allocator.
    pub fn stats(&self) -> PoolStats {
        self.raw.stats()
    }
}

impl<T> Drop for Pool<T> {
    fn drop(&mut self) {
        if !std::mem::needs_drop::<T>() {
            return;
        }
        let live: Vec<u32> = self.raw.live_indices().collect();
        for index in live {
            let ptr = self.raw.slot_ptr(index).cast::<T>();
            // SAFETY: live slots hold an initialized T that nobody else drops
            unsafe {
                std::ptr::drop_in_place(ptr.as_ptr());
            }
        }
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("len", &self.len())
            .field("raw", &self.raw)
            .finish()
    }
}
