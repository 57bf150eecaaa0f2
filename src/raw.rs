//! Thin wrapper over the process's raw OS allocator.
//!
//! Arenas and the oversize bypass path both go through here rather than
//! calling `alloc`/`dealloc` directly, so `SlabAllocator` has one seam to
//! account for §6's `resident_bytes` metric (it sums arena footprints and
//! oversize block sizes itself; this module just performs the OS calls).

use core::alloc::Layout;
use core::ptr::NonNull;

extern crate alloc as rust_alloc;

/// Acquire a block directly from the OS allocator. Returns `None` on
/// allocation failure rather than aborting, so callers can implement
/// §4.2's "oversize / OS exhaustion" fallback behavior.
pub fn os_acquire(layout: Layout) -> Option<NonNull<u8>> {
    if layout.size() == 0 {
        return NonNull::new(layout.align() as *mut u8);
    }
    // SAFETY: `layout` has non-zero size, checked above.
    let ptr = unsafe { rust_alloc::alloc::alloc(layout) };
    NonNull::new(ptr)
}

/// Release a block previously returned by [`os_acquire`] with the same
/// `layout`.
///
/// # Safety
/// `ptr` must have been returned by `os_acquire(layout)` and not already
/// released.
pub unsafe fn os_release(ptr: NonNull<u8>, layout: Layout) {
    if layout.size() == 0 {
        return;
    }
    // SAFETY: forwarded from the caller's precondition.
    unsafe { rust_alloc::alloc::dealloc(ptr.as_ptr(), layout) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_and_release_round_trip() {
        let layout = Layout::from_size_align(4096, 16).unwrap();
        let ptr = os_acquire(layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize % 16, 0);
        // SAFETY: ptr/layout match the acquisition above.
        unsafe { os_release(ptr, layout) };
    }

    #[test]
    fn zero_size_layout_does_not_touch_allocator() {
        let layout = Layout::from_size_align(0, 8).unwrap();
        let ptr = os_acquire(layout).unwrap();
        assert_eq!(ptr.as_ptr() as usize, 8);
        // SAFETY: zero-size layout, os_release is a no-op.
        unsafe { os_release(ptr, layout) };
    }
}
