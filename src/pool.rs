//! §4.2 Pool: the per-size-class collection of arenas.
//!
//! Arenas live in a tombstone-stable table (`Vec<Option<Arena>>` plus a
//! reuse stack of freed slots) rather than a `Vec<Arena>` that shuffles on
//! removal. A `SlotHeader` and the pointer lookup both hold an
//! `ArenaId { class_idx, arena_slot }`, so an arena's slot index must
//! never be reassigned while any of its slots could still be referenced
//! by a stale lookup entry; tombstoning (never shifting, only reusing a
//! slot after its arena has been fully torn down and unregistered) gives
//! that guarantee directly, resolving §9's exactly-once-destruction open
//! question without reintroducing raw pointers between slot and arena.
//!
//! Physical slab layout (bitmap + free-list + bump) is `Arena`'s job,
//! following the teacher's `arena3::alloc::Arena`; `Pool` only decides
//! *which* arena a request lands in and when to grow or shrink the set.

use crate::arena::{Arena, ArenaInitError};
use crate::header::{ArenaId, SlotHeader};
use crate::lookup::MIN_ARENA_FOOTPRINT;
use core::ptr::NonNull;
use rust_alloc::vec::Vec;

/// Arenas above this footprint (bytes) are always released to the OS the
/// moment they go empty, even if they're the pool's only arena (§4.2).
pub const RELEASE_FOOTPRINT_THRESHOLD: usize = 1 << 20;

pub struct Pool {
    class_idx: u32,
    payload_size: usize,
    initial_slots: usize,
    max_slots: Option<usize>,
    arenas: Vec<Option<Arena>>,
    free_arena_slots: Vec<u32>,
    live_arena_count: usize,
    /// Set only when an arena-growth attempt fails (OS exhaustion); any
    /// subsequent `deallocate` on this pool clears it unconditionally,
    /// per the glossary's "sticky full" definition.
    sticky_full: bool,
}

impl Pool {
    pub fn new(class_idx: u32, initial_slots: usize, max_slots: Option<usize>) -> Self {
        Self {
            class_idx,
            payload_size: crate::size_class::class_payload_size(class_idx),
            initial_slots: initial_slots.max(1),
            max_slots,
            arenas: Vec::new(),
            free_arena_slots: Vec::new(),
            live_arena_count: 0,
            sticky_full: false,
        }
    }

    pub fn is_sticky_full(&self) -> bool {
        self.sticky_full
    }

    fn slots_for_arena(&self) -> usize {
        // larger classes get proportionally fewer slots per arena so a
        // single arena's footprint stays in a similar ballpark across
        // classes, the way the teacher sizes `arena3` arenas off
        // `ARENA_BYTE_BUDGET / slot_size`.
        const ARENA_BYTE_BUDGET: usize = 256 * 1024;
        let slot_stride = SlotHeader::SIZE + self.payload_size;
        let budgeted = (ARENA_BYTE_BUDGET / self.payload_size.max(1)).max(self.initial_slots);
        let capped = match self.max_slots {
            Some(cap) => budgeted.min(cap).max(1),
            None => budgeted,
        };

        // the pointer lookup's two-candidate-per-page scheme (§4.5) only
        // holds if a page is at least one arena's worth of address
        // space; a caller-supplied `max_slots` cap must not be allowed
        // to shrink an arena below that, or three-plus tiny arenas could
        // land on one page and overflow the lookup's per-page slots.
        capped.max(MIN_ARENA_FOOTPRINT.div_ceil(slot_stride))
    }

    pub fn owns(&self, id: ArenaId, ptr: NonNull<u8>) -> bool {
        self.arenas
            .get(id.arena_slot as usize)
            .and_then(Option::as_ref)
            .is_some_and(|arena| arena.owns(ptr))
    }

    fn grow(&mut self) -> Option<ArenaId> {
        let slot_count = self.slots_for_arena();
        let arena_slot = match self.free_arena_slots.pop() {
            Some(slot) => slot,
            None => {
                let slot = self.arenas.len() as u32;
                self.arenas.push(None);
                slot
            }
        };
        let id = ArenaId { class_idx: self.class_idx, arena_slot };
        match Arena::try_init(id, self.payload_size, slot_count) {
            Ok(arena) => {
                self.arenas[arena_slot as usize] = Some(arena);
                self.live_arena_count += 1;
                Some(id)
            }
            Err(ArenaInitError::OutOfMemory | ArenaInitError::LayoutError) => {
                self.free_arena_slots.push(arena_slot);
                self.sticky_full = true;
                None
            }
        }
    }

    fn arena(&self, id: ArenaId) -> &Arena {
        self.arenas[id.arena_slot as usize]
            .as_ref()
            .expect("ArenaId refers to a live arena while any of its slots may be referenced")
    }

    /// Allocate a slot for `requested_size` (the literal, unpadded size
    /// argument, kept only for `occupied_bytes()`). Returns the new
    /// pointer and its owning arena's id, so the caller can register it
    /// in the pointer lookup.
    ///
    /// `on_arena_registered` is invoked with a freshly grown arena's id
    /// and user-region range *before* any slot is handed out from it, so
    /// the lookup can be populated ahead of the first allocation from a
    /// brand-new arena.
    pub fn allocate(
        &mut self,
        requested_size: u32,
        mut on_arena_registered: impl FnMut(ArenaId, core::ops::Range<usize>),
    ) -> Option<(NonNull<u8>, ArenaId)> {
        for (slot, arena) in self.arenas.iter().enumerate() {
            if let Some(arena) = arena {
                if arena.free_count() > 0 {
                    let id = ArenaId { class_idx: self.class_idx, arena_slot: slot as u32 };
                    let ptr = arena.alloc_slot(requested_size)?;
                    return Some((ptr, id));
                }
            }
        }

        // a pool that's already sticky-full from a prior failed growth
        // stays null until a `deallocate` clears the flag, rather than
        // retrying the OS on every call (§4.2 "Failure semantics").
        if self.sticky_full {
            return None;
        }

        let id = self.grow()?;
        on_arena_registered(id, self.arena(id).user_region());
        let ptr = self.arena(id).alloc_slot(requested_size)?;
        Some((ptr, id))
    }

    /// Release the slot at `ptr` belonging to arena `id`. Returns the
    /// `requested_size` that had been stored in its header and, if the
    /// arena was released back to the OS as a result, the address range
    /// that must be invalidated from the pointer lookup.
    pub fn deallocate(
        &mut self,
        id: ArenaId,
        ptr: NonNull<u8>,
    ) -> (u32, Option<core::ops::Range<usize>>) {
        self.sticky_full = false;

        let arena_slot = id.arena_slot as usize;
        let requested = self.arenas[arena_slot]
            .as_ref()
            .expect("ArenaId refers to a live arena")
            .free_slot(ptr);

        let arena_ref = self.arenas[arena_slot].as_ref().unwrap();
        let should_release = arena_ref.is_empty()
            && (self.live_arena_count > 1 || arena_ref.footprint() > RELEASE_FOOTPRINT_THRESHOLD);

        if should_release {
            let region = arena_ref.user_region();
            self.arenas[arena_slot] = None;
            self.live_arena_count -= 1;
            self.free_arena_slots.push(arena_slot as u32);
            (requested, Some(region))
        } else {
            (requested, None)
        }
    }

    pub fn live_arena_count(&self) -> usize {
        self.live_arena_count
    }

    pub fn resident_bytes(&self) -> usize {
        self.arenas.iter().flatten().map(Arena::footprint).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_grows_pool_on_demand() {
        let mut pool = Pool::new(0, 64, None);
        assert_eq!(pool.live_arena_count(), 0);
        let (_ptr, id) = pool.allocate(8, |_, _| {}).unwrap();
        assert_eq!(id.class_idx, 0);
        assert_eq!(pool.live_arena_count(), 1);
    }

    #[test]
    fn single_arena_released_when_large_enough() {
        let mut pool = Pool::new(10, 64, None); // large payload -> few slots, small arena over threshold check
        let (ptr, id) = pool.allocate(4, |_, _| {}).unwrap();
        let (_size, released) = pool.deallocate(id, ptr);
        // whether released depends on footprint vs RELEASE_FOOTPRINT_THRESHOLD;
        // either way the arena must not be double-released on the next allocate.
        let _ = released;
        assert!(pool.allocate(4, |_, _| {}).is_some());
    }

    #[test]
    fn deallocate_clears_sticky_full() {
        let mut pool = Pool::new(0, 64, None);
        let (ptr, id) = pool.allocate(1, |_, _| {}).unwrap();
        // simulate a later growth attempt failing (OS exhaustion) while
        // this slot is still live; the pool should stay sticky-full
        // until the next deallocate, regardless of how it got set.
        pool.sticky_full = true;
        pool.deallocate(id, ptr);
        assert!(!pool.is_sticky_full());
    }

    #[test]
    fn tombstoned_arena_slot_is_reused_not_shifted() {
        let mut pool = Pool::new(0, 64, None);
        let (ptr_a, id_a) = pool.allocate(1, |_, _| {}).unwrap();
        pool.deallocate(id_a, ptr_a);
        let (_ptr_b, id_b) = pool.allocate(1, |_, _| {}).unwrap();
        assert_eq!(id_a.arena_slot, id_b.arena_slot, "freed arena slot should be recycled");
    }
}
