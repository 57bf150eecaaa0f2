//! §4.5 Pointer → owner lookup.
//!
//! `deallocate` is only given a raw pointer; it must recover which arena
//! (and therefore which pool/size class) produced it in roughly O(1) so
//! the dispatch layer doesn't have to ask every pool "is this yours?".
//! We do it by rounding each pointer down to its containing page
//! (`MIN_SHIFT`-bit granularity) and remembering, per page, which arenas
//! have live slots on it. A single pool-served arena's user region
//! starts near but not necessarily exactly on a page boundary, and one
//! page can straddle the boundary between two arenas (the tail of one
//! and the head of the next), which is why each page entry holds up to
//! two candidate arena ids rather than one.
//!
//! The table itself is a flat growable window (`Vec<[Option<ArenaId>; 2]>`)
//! over a contiguous range of page indices, recentering (rebasing its
//! `base_page`) only when a registration falls outside the current
//! window, rather than a full hash map — address space used by this
//! allocator's own arenas tends to be clustered, so a small window
//! covers it without the per-entry overhead of an `FxHashMap<usize, _>`.

use crate::header::ArenaId;
use core::ops::Range;
use rust_alloc::vec;
use rust_alloc::vec::Vec;

/// Page granularity for the lookup table: coarser than this wastes
/// resolution (more slots sharing one entry), finer wastes table rows.
const MIN_SHIFT: u32 = 12; // 4096-byte pages

/// The minimum arena footprint (bytes) that keeps the lookup's two-
/// candidate-per-page invariant (§4.5: "a page is at least the minimum
/// arena size") from being violated. `Pool` clamps every arena it grows
/// to at least this many bytes so three or more arenas can never share
/// one page; exposed here rather than duplicated as a literal in
/// `pool.rs` since this module is the one whose invariant it protects.
pub const MIN_ARENA_FOOTPRINT: usize = 1 << MIN_SHIFT;

#[derive(Default)]
pub struct PointerLookup {
    base_page: usize,
    entries: Vec<[Option<ArenaId>; 2]>,
}

impl PointerLookup {
    pub fn new() -> Self {
        Self { base_page: 0, entries: Vec::new() }
    }

    #[inline]
    fn page_of(addr: usize) -> usize {
        addr >> MIN_SHIFT
    }

    fn ensure_window(&mut self, page: usize) -> usize {
        if self.entries.is_empty() {
            self.base_page = page;
            self.entries.push([None, None]);
            return 0;
        }

        if page < self.base_page {
            let shift = self.base_page - page;
            let mut grown = vec![[None, None]; shift];
            grown.extend(core::mem::take(&mut self.entries));
            self.entries = grown;
            self.base_page = page;
            return 0;
        }

        let idx = page - self.base_page;
        if idx >= self.entries.len() {
            self.entries.resize(idx + 1, [None, None]);
        }
        idx
    }

    fn index_of(&self, page: usize) -> Option<usize> {
        if page < self.base_page {
            return None;
        }
        let idx = page - self.base_page;
        (idx < self.entries.len()).then_some(idx)
    }

    /// Register every page touched by `region` as potentially owned by
    /// `id`, for an arena that was just grown.
    pub fn register(&mut self, id: ArenaId, region: Range<usize>) {
        if region.start == region.end {
            return;
        }
        let first = Self::page_of(region.start);
        let last = Self::page_of(region.end - 1);
        for page in first..=last {
            let idx = self.ensure_window(page);
            let slot = &mut self.entries[idx];
            if slot[0].is_none() || slot[0] == Some(id) {
                slot[0] = Some(id);
            } else if slot[1].is_none() || slot[1] == Some(id) {
                slot[1] = Some(id);
            } else {
                debug_assert!(
                    false,
                    "page {page} already shared by two other arenas; widen lookup slot count"
                );
            }
        }
    }

    /// Remove `id` from every page touched by `region`, called when an
    /// arena is released back to the OS.
    pub fn unregister(&mut self, id: ArenaId, region: Range<usize>) {
        if region.start == region.end {
            return;
        }
        let first = Self::page_of(region.start);
        let last = Self::page_of(region.end - 1);
        for page in first..=last {
            if let Some(idx) = self.index_of(page) {
                let slot = &mut self.entries[idx];
                if slot[0] == Some(id) {
                    slot[0] = None;
                }
                if slot[1] == Some(id) {
                    slot[1] = None;
                }
            }
        }
    }

    /// Candidate arena ids for the page containing `addr`. The caller
    /// (the dispatch layer) disambiguates between the (at most two)
    /// candidates by checking `Arena::owns`.
    pub fn candidates(&self, addr: usize) -> [Option<ArenaId>; 2] {
        match self.index_of(Self::page_of(addr)) {
            Some(idx) => self.entries[idx],
            None => [None, None],
        }
    }
}
