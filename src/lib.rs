//! # brkalloc - A First-Fit Heap Allocator on the Program Break
//!
//! This crate provides a general purpose heap allocator that manages one
//! contiguous arena grown and shrunk with the `sbrk` system call. It offers
//! the four classic entry points (allocate, zero-allocate, resize, release)
//! and can replace the process allocator either as a Rust
//! `#[global_allocator]` or, through the `malloc-override` feature, as the C
//! `malloc` family.
//!
//! ## Overview
//!
//! Every allocation is a block: a fixed-size header followed by a payload
//! whose size is a multiple of 16. Blocks sit back to back in address order
//! and form a singly linked list:
//!
//! ```text
//!   Arena:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                              ARENA                                   │
//!   │                                                                      │
//!   │   ┌────┬───────┬────┬─────────────┬────┬──────┬────┬────────────┐    │
//!   │   │ H  │ used  │ H  │    free     │ H  │ used │ H  │   used     │    │
//!   │   └────┴───────┴────┴─────────────┴────┴──────┴────┴────────────┘    │
//!   │   ▲                                                             ▲    │
//!   │   │                                                             │    │
//!   │  Base                                                       Program  │
//!   │                                                              Break   │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! - **Allocate** walks the list and takes the first free block that fits.
//!   If the block is much larger than needed, the rest is split off as a new
//!   free block. If nothing fits, the program break is moved up and a new
//!   block is appended.
//! - **Release** marks the block free, merges it with every free neighbour,
//!   and moves the program break back down if the block ends the arena.
//! - **Resize** shrinks in place, grows into a free successor when it can,
//!   and otherwise moves the data to a new block.
//! - **Zero-allocate** checks `count * size` for overflow and zeroes the
//!   payload.
//!
//! ## Crate Structure
//!
//! ```text
//!   brkalloc
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── block      - Block header and block views (internal)
//!   ├── grower     - Grower trait, Sbrk and BufferGrower
//!   ├── arena      - Growth and shrink of the arena (internal)
//!   ├── registry   - Address-ordered block list (internal)
//!   ├── first_fit  - FirstFitAllocator implementation
//!   ├── trace      - TraceSink and the stderr/log sinks
//!   ├── global     - BrkAlloc, the process allocator
//!   └── ffi        - C ABI exports (feature = "malloc-override")
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use brkalloc::{BufferGrower, FirstFitAllocator};
//!
//! let mut allocator = FirstFitAllocator::new(BufferGrower::with_capacity(4096));
//!
//! let ptr = allocator.allocate(64).unwrap().unwrap();
//! assert_eq!(0, ptr.as_ptr() as usize % 16);
//!
//! unsafe {
//!     ptr.as_ptr().write(42);
//!     let ptr = allocator.resize(Some(ptr), 256).unwrap();
//!     allocator.release(ptr);
//! }
//!
//! assert_eq!(0, allocator.arena_len());
//! ```
//!
//! Replacing the process allocator:
//!
//! ```rust,ignore
//! use brkalloc::BrkAlloc;
//!
//! #[global_allocator]
//! static HEAP: BrkAlloc = BrkAlloc::new();
//! ```
//!
//! ## Diagnostics
//!
//! Set `DEBUG_MALLOC` in the environment and `BrkAlloc` writes one line per
//! call to stderr:
//!
//! ```text
//!   MALLOC: malloc(4096) => (ptr=0x5583c2a4e030, size=4096)
//!   MALLOC: free(0x5583c2a4e030)
//! ```
//!
//! ## Limitations
//!
//! - **Single arena**: no size classes, no `mmap` for large blocks
//! - **Linear search**: allocation and release walk the block list
//! - **Exclusive break**: nothing else may call `sbrk` while `BrkAlloc`
//!   holds memory
//! - **Unix-only**: requires `libc` and `sbrk` (POSIX systems)
//!
//! ## Safety
//!
//! Release and resize take pointers back from the caller and are `unsafe`.
//! Pointers this allocator does not own are ignored, and releasing a block
//! twice is a no-op.

pub mod align;
mod arena;
mod block;
mod error;
#[cfg(feature = "malloc-override")]
mod ffi;
mod first_fit;
mod global;
mod grower;
mod registry;
pub mod trace;

pub use block::{BlockInfo, HEADER_SIZE};
pub use error::{AllocError, Result};
pub use first_fit::FirstFitAllocator;
pub use global::BrkAlloc;
pub use grower::{BufferGrower, Grower, Sbrk};
pub use trace::{LogTrace, NoTrace, StderrTrace, TraceEvent, TraceSink};
