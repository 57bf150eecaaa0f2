//! §4 The allocator dispatch layer: routes each request to either a
//! size-class pool or straight to the OS, and recovers ownership on
//! `deallocate` via the pointer lookup.

use core::ptr::NonNull;

use rust_alloc::vec::Vec;
use rustc_hash::FxHashMap;

use crate::header::ArenaId;
use crate::lookup::PointerLookup;
use crate::pool::Pool;
use crate::raw;
use crate::size_class::{self, Padded, POOL_MAX_ALIGN};

/// Default ceiling above which a padded request bypasses the pools
/// entirely and goes straight to the OS allocator (§4.1's "oversize"
/// path), even if its alignment would otherwise fit.
pub const DEFAULT_OVERSIZE_THRESHOLD: usize = 128 * 1024 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocError {
    /// The request could not be padded/rounded (e.g. would overflow
    /// `usize`).
    InvalidLayout,
    /// Neither the owning pool nor a direct OS allocation could satisfy
    /// the request.
    OutOfMemory,
}

impl core::fmt::Display for AllocError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AllocError::InvalidLayout => write!(f, "invalid allocation layout"),
            AllocError::OutOfMemory => write!(f, "allocator out of memory"),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for AllocError {}

/// Builder-configured, general-purpose allocator: size-class pools over
/// OS-acquired arenas, with a direct OS path for oversize or
/// over-aligned requests (§4.1/§4.2).
pub struct SlabAllocator {
    pools: Vec<Pool>,
    lookup: PointerLookup,
    /// layout (for release) and the literal requested size (for
    /// `occupied_bytes`), keyed by address.
    oversized: FxHashMap<usize, (core::alloc::Layout, usize)>,
    initial_arena_slots: usize,
    max_arena_slots: Option<usize>,
    oversize_threshold: usize,
    /// Running sum of live, literal (unpadded) requested sizes across
    /// both pool-served and direct allocations — §6's `occupied_bytes`.
    /// Kept incremental rather than recomputed by walking every arena on
    /// each query, since `occupied_bytes` is allowed on the hot path.
    occupied: usize,
}

impl Default for SlabAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SlabAllocator {
    pub fn new() -> Self {
        Self {
            pools: Vec::new(),
            lookup: PointerLookup::new(),
            oversized: FxHashMap::default(),
            initial_arena_slots: 64,
            max_arena_slots: None,
            oversize_threshold: DEFAULT_OVERSIZE_THRESHOLD,
            occupied: 0,
        }
    }

    /// Minimum slot count a freshly grown arena is given.
    pub fn with_initial_arena_slots(mut self, slots: usize) -> Self {
        self.initial_arena_slots = slots.max(1);
        self
    }

    /// Hard cap on slots per arena; `None` leaves pools unbounded (save
    /// for whatever the OS itself refuses).
    pub fn with_max_arena_slots(mut self, slots: usize) -> Self {
        self.max_arena_slots = Some(slots);
        self
    }

    /// Padded requests above this size go straight to the OS rather than
    /// through a pool, regardless of alignment.
    pub fn with_oversize_threshold(mut self, bytes: usize) -> Self {
        self.oversize_threshold = bytes;
        self
    }

    fn pool_mut_of(
        pools: &mut Vec<Pool>,
        class_idx: u32,
        initial_slots: usize,
        max_slots: Option<usize>,
    ) -> &mut Pool {
        while pools.len() <= class_idx as usize {
            let idx = pools.len() as u32;
            pools.push(Pool::new(idx, initial_slots, max_slots));
        }
        &mut pools[class_idx as usize]
    }

    fn goes_direct(&self, padded: &Padded) -> bool {
        padded.alignment > POOL_MAX_ALIGN || padded.size > self.oversize_threshold
    }

    fn allocate_direct(
        &mut self,
        padded_size: usize,
        alignment: usize,
        requested_size: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let layout = core::alloc::Layout::from_size_align(padded_size, alignment)
            .map_err(|_| AllocError::InvalidLayout)?;
        let ptr = raw::os_acquire(layout).ok_or(AllocError::OutOfMemory)?;
        self.oversized.insert(ptr.as_ptr() as usize, (layout, requested_size));
        self.occupied += requested_size;
        Ok(ptr)
    }

    /// Allocate `size` bytes aligned to `alignment` (0 meaning "natural
    /// word alignment", per §4.1). Returns `None` when the OS denies
    /// further memory; never blocks, never panics on OS refusal.
    pub fn allocate(&mut self, size: usize, alignment: usize) -> Option<NonNull<u8>> {
        self.try_allocate(size, alignment).ok()
    }

    /// Internal counterpart of [`Self::allocate`] that distinguishes *why*
    /// a request failed. Surfaced across the crate boundary only by the
    /// `allocator_api2::Allocator` adapter, which itself returns a
    /// `Result`; the rest of the public surface stays §4.1-literal
    /// (`Option`, never `Result`).
    pub(crate) fn try_allocate(
        &mut self,
        size: usize,
        alignment: usize,
    ) -> Result<NonNull<u8>, AllocError> {
        let padded = size_class::pad(size, alignment);

        if self.goes_direct(&padded) {
            return self.allocate_direct(padded.size, padded.alignment, size);
        }

        let class_idx = size_class::class_index_for(padded.size);
        let requested = u32::try_from(size).unwrap_or(u32::MAX);

        let lookup = &mut self.lookup;
        let pool = Self::pool_mut_of(
            &mut self.pools,
            class_idx,
            self.initial_arena_slots,
            self.max_arena_slots,
        );
        match pool.allocate(requested, |id, region| lookup.register(id, region)) {
            Some((ptr, _id)) => {
                self.occupied += size;
                Ok(ptr)
            }
            None => {
                // pool growth failed (OS exhaustion): the spec allows
                // falling back to a direct OS allocation rather than
                // failing outright, as long as the pointer can still be
                // routed back on free.
                self.allocate_direct(padded.size, padded.alignment, size)
            }
        }
    }

    fn find_owner(&self, ptr: NonNull<u8>) -> Option<ArenaId> {
        let addr = ptr.as_ptr() as usize;
        for candidate in self.lookup.candidates(addr) {
            if let Some(id) = candidate {
                let pool = &self.pools[id.class_idx as usize];
                if pool.owns(id, ptr) {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Release a previously allocated block.
    ///
    /// # Safety
    /// `ptr` must have been returned by this allocator's `allocate` and
    /// not already freed.
    pub unsafe fn deallocate(&mut self, ptr: NonNull<u8>) {
        if let Some(id) = self.find_owner(ptr) {
            let pool = &mut self.pools[id.class_idx as usize];
            let (requested, released_region) = pool.deallocate(id, ptr);
            self.occupied = self.occupied.saturating_sub(requested as usize);
            if let Some(region) = released_region {
                self.lookup.unregister(id, region);
            }
            return;
        }

        let addr = ptr.as_ptr() as usize;
        if let Some((layout, size)) = self.oversized.remove(&addr) {
            self.occupied = self.occupied.saturating_sub(size);
            // SAFETY: `layout` matches the layout used in `allocate_direct`
            // for this address, forwarded from the caller's precondition.
            unsafe { raw::os_release(ptr, layout) };
            return;
        }

        debug_assert!(false, "deallocate called with a pointer this allocator never produced");
    }

    /// Sum of bytes currently held live across every pool-served and
    /// direct allocation (the literal, unpadded sizes passed to
    /// `allocate`), per §6.
    pub fn occupied_bytes(&self) -> usize {
        self.occupied
    }

    /// Total bytes currently held from the OS (arena footprints plus
    /// direct allocations), per §6's `resident_bytes`.
    pub fn resident_bytes(&self) -> usize {
        let pooled: usize = self.pools.iter().map(Pool::resident_bytes).sum();
        let direct: usize = self.oversized.values().map(|(layout, _)| layout.size()).sum();
        pooled + direct
    }
}
