//! A general-purpose dynamic memory allocator: size-class pools of
//! slab-style arenas over OS-acquired memory, with a direct path for
//! oversize or over-aligned requests.
//!
//! The dispatch layer is [`SlabAllocator`]; most callers want the
//! [`allocator_api2::alloc::Allocator`]/[`core::alloc::GlobalAlloc`]
//! adapter in [`SlabAllocHandle`] instead of driving it directly.

#![no_std]

extern crate alloc as rust_alloc;
extern crate std;

mod arena;
mod header;
mod lookup;
mod pool;
mod raw;
mod size_class;

pub mod allocator;
pub mod handle;

pub use allocator::{AllocError, SlabAllocator};
pub use handle::SlabAllocHandle;
pub use size_class::{MIN_BLOCK_SIZE, POOL_MAX_ALIGN};
