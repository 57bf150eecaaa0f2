//! The fixed-size slot header prefixing every pool-served allocation.
//!
//! Per §3 "Slot layout", each slot's header carries a back-reference to its
//! owning pool and arena plus enough information to locate its free-list
//! cell in O(1). We follow §9's "prefer index handles" note: the header
//! stores an [`ArenaId`] (two `u32`s) rather than raw `*mut Pool`/`*mut
//! Arena` pointers, so there is no cyclic pointer graph between slot, arena
//! and pool to keep consistent by hand.

use core::mem::size_of;

/// Identifies an arena by its size class and its slot in that class's
/// pool (tombstone-stable: see `pool.rs`'s arena table).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArenaId {
    pub class_idx: u32,
    pub arena_slot: u32,
}

/// 16-byte header prefixing every slot. Aligned to 16 so that, combined
/// with a 16-byte-aligned arena buffer and slot strides that are always a
/// multiple of 16 (see `arena.rs`), the user pointer immediately following
/// the header is automatically aligned for every alignment the pools
/// accept (`POOL_MAX_ALIGN`, see `size_class.rs`).
#[repr(C, align(16))]
#[derive(Debug, Clone, Copy)]
pub struct SlotHeader {
    pub arena: ArenaId,
    /// The literal `size` argument passed to `allocate`, used only to keep
    /// `occupied_bytes()` exact; not needed for routing `deallocate`.
    pub requested_size: u32,
    _reserved: u32,
}

impl SlotHeader {
    pub const SIZE: usize = size_of::<Self>();

    pub fn new(arena: ArenaId) -> Self {
        Self { arena, requested_size: 0, _reserved: 0 }
    }
}

const _: () = assert!(SlotHeader::SIZE == 16, "slot header must be exactly 16 bytes");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_is_sixteen_bytes_and_aligned() {
        assert_eq!(core::mem::size_of::<SlotHeader>(), 16);
        assert_eq!(core::mem::align_of::<SlotHeader>(), 16);
    }
}
