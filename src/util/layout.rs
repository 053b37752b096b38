//! Layout utilities.

/// Alignment every arena and pool allocation is rounded to.
pub const ALLOC_ALIGN: usize = 16;

/// Align a size up to the given power-of-two alignment.
///
/// Returns `None` if the rounded size does not fit in `usize`.
#[inline]
pub const fn align_up(size: usize, align: usize) -> Option<usize> {
    match size.checked_add(align - 1) {
        Some(padded) => Some(padded & !(align - 1)),
        None => None,
    }
}

/// Round a size up to the allocator granule (16 bytes).
#[inline]
pub const fn granule(size: usize) -> Option<usize> {
    align_up(size, ALLOC_ALIGN)
}
