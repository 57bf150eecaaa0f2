//! [`SlabAllocHandle`]: an [`allocator_api2::alloc::Allocator`] and
//! [`core::alloc::GlobalAlloc`] adapter over a [`SlabAllocator`], modeled
//! on the teacher's `GcAllocator<'gc>` wrapper.
//!
//! limitations, same as the teacher's handle:
//! - single-threaded only; `RefCell` panics on reentrant/aliased access
//! - both traits require `&self`, so the `RefCell` borrow is the only
//!   thing standing between this and `unsafe impl Sync`, which we do not
//!   provide

use core::alloc::GlobalAlloc;
use core::cell::RefCell;
use core::ptr::NonNull;

use allocator_api2::alloc::{AllocError as ApiAllocError, Allocator, Layout as ApiLayout};

use crate::allocator::SlabAllocator;

/// Single-threaded handle suitable for `#[global_allocator]` or for
/// passing to `allocator_api2`-aware collections (`Vec::new_in`, etc).
pub struct SlabAllocHandle(RefCell<SlabAllocator>);

impl SlabAllocHandle {
    pub fn new(inner: SlabAllocator) -> Self {
        Self(RefCell::new(inner))
    }

    pub fn occupied_bytes(&self) -> usize {
        self.0.borrow().occupied_bytes()
    }

    pub fn resident_bytes(&self) -> usize {
        self.0.borrow().resident_bytes()
    }
}

impl Default for SlabAllocHandle {
    fn default() -> Self {
        Self::new(SlabAllocator::new())
    }
}

// SAFETY: `allocate` returns valid, correctly aligned, non-overlapping
// memory (`SlabAllocator::allocate` upholds both), and `RefCell` rejects
// reentrant/aliased access at runtime rather than letting it through
// unsoundly. `SlabAllocHandle` is not `Sync`, so concurrent calls from
// multiple threads cannot occur.
unsafe impl Allocator for SlabAllocHandle {
    fn allocate(&self, layout: ApiLayout) -> Result<NonNull<[u8]>, ApiAllocError> {
        let size = layout.size();
        let ptr = self
            .0
            .borrow_mut()
            .try_allocate(size, layout.align())
            .map_err(|_| ApiAllocError)?;
        Ok(NonNull::slice_from_raw_parts(ptr, size))
    }

    fn allocate_zeroed(&self, layout: ApiLayout) -> Result<NonNull<[u8]>, ApiAllocError> {
        let block = self.allocate(layout)?;
        if layout.size() > 0 {
            // SAFETY: `allocate` succeeded, so `block` is valid for
            // `layout.size()` writable bytes.
            unsafe { core::ptr::write_bytes(block.as_ptr() as *mut u8, 0, layout.size()) };
        }
        Ok(block)
    }

    unsafe fn deallocate(&self, ptr: NonNull<u8>, _layout: ApiLayout) {
        // SAFETY: forwarded from the caller's precondition that `ptr` was
        // produced by this handle's `allocate`/`allocate_zeroed`/`grow`/
        // `shrink` and not already freed.
        unsafe { self.0.borrow_mut().deallocate(ptr) };
    }

    unsafe fn grow(
        &self,
        ptr: NonNull<u8>,
        old_layout: ApiLayout,
        new_layout: ApiLayout,
    ) -> Result<NonNull<[u8]>, ApiAllocError> {
        debug_assert!(new_layout.size() >= old_layout.size());

        let new_block = self.allocate(new_layout)?;

        // SAFETY: `ptr` is valid for `old_layout.size()` readable bytes
        // (caller's precondition), `new_block` for at least that many
        // writable bytes (just allocated with `new_layout.size() >=
        // old_layout.size()`), and the two regions don't overlap since
        // they came from independent allocations.
        if old_layout.size() > 0 {
            unsafe {
                core::ptr::copy_nonoverlapping(
                    ptr.as_ptr(),
                    new_block.as_ptr() as *mut u8,
                    old_layout.size(),
                );
            }
        }
        // SAFETY: `ptr` was allocated by this handle with `old_layout`.
        unsafe { self.deallocate(ptr, old_layout) };

        Ok(new_block)
    }

    unsafe fn grow_zeroed(
        &self,
        ptr: NonNull<u8>,
        old_layout: ApiLayout,
        new_layout: ApiLayout,
    ) -> Result<NonNull<[u8]>, ApiAllocError> {
        // SAFETY: forwards this call's preconditions to `grow`.
        let new_block = unsafe { self.grow(ptr, old_layout, new_layout)? };

        let tail = new_layout.size() - old_layout.size();
        if tail > 0 {
            // SAFETY: `new_block` holds `new_layout.size()` writable
            // bytes; `old_layout.size()..new_layout.size()` is the
            // uninitialized tail `grow` copied nothing into.
            unsafe {
                let tail_ptr = (new_block.as_ptr() as *mut u8).add(old_layout.size());
                core::ptr::write_bytes(tail_ptr, 0, tail);
            }
        }

        Ok(new_block)
    }

    unsafe fn shrink(
        &self,
        ptr: NonNull<u8>,
        old_layout: ApiLayout,
        new_layout: ApiLayout,
    ) -> Result<NonNull<[u8]>, ApiAllocError> {
        debug_assert!(new_layout.size() <= old_layout.size());

        if new_layout.size() == 0 {
            // SAFETY: `ptr` was allocated by this handle with `old_layout`.
            unsafe { self.deallocate(ptr, old_layout) };
            // SAFETY: `new_layout.align()` is always >= 1.
            let dangling = unsafe { NonNull::new_unchecked(new_layout.align() as *mut u8) };
            return Ok(NonNull::slice_from_raw_parts(dangling, 0));
        }

        let new_block = self.allocate(new_layout)?;

        // SAFETY: `ptr` is valid for at least `new_layout.size()` bytes
        // (since `new_layout.size() <= old_layout.size()`), `new_block`
        // was just allocated with exactly that capacity.
        unsafe {
            core::ptr::copy_nonoverlapping(
                ptr.as_ptr(),
                new_block.as_ptr() as *mut u8,
                new_layout.size(),
            );
            self.deallocate(ptr, old_layout);
        }

        Ok(new_block)
    }
}

// SAFETY: `alloc`/`dealloc` forward directly to the `Allocator` impl
// above, which already upholds `GlobalAlloc`'s contract (valid,
// correctly-aligned, non-overlapping memory; `dealloc` only ever called
// with a pointer+layout this handle produced).
unsafe impl GlobalAlloc for SlabAllocHandle {
    unsafe fn alloc(&self, layout: core::alloc::Layout) -> *mut u8 {
        self.0
            .borrow_mut()
            .allocate(layout.size(), layout.align())
            .map(|p| p.as_ptr())
            .unwrap_or(core::ptr::null_mut())
    }
    // `SlabAllocator::allocate` already returns `Option`, so this stays a
    // plain `map`/`unwrap_or` without needing `try_allocate`.

    unsafe fn dealloc(&self, ptr: *mut u8, _layout: core::alloc::Layout) {
        if let Some(ptr) = NonNull::new(ptr) {
            // SAFETY: forwarded from the caller's `GlobalAlloc` contract.
            unsafe { self.0.borrow_mut().deallocate(ptr) };
        }
    }

    unsafe fn alloc_zeroed(&self, layout: core::alloc::Layout) -> *mut u8 {
        // SAFETY: forwards this call's preconditions.
        let ptr = unsafe { self.alloc(layout) };
        if !ptr.is_null() && layout.size() > 0 {
            // SAFETY: `alloc` succeeded, so `ptr` is valid for `layout.size()`
            // writable bytes.
            unsafe { core::ptr::write_bytes(ptr, 0, layout.size()) };
        }
        ptr
    }
}
