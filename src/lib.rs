//! # tagheap - A Fixed-Region Boundary-Tag Heap
//!
//! This crate provides a **first-fit heap allocator** that carves variably
//! sized allocations out of one fixed, contiguous region and reclaims them,
//! keeping all of its bookkeeping inside the region itself.
//!
//! ## Overview
//!
//! ```text
//!   Region Layout:
//!
//!   ┌──────────────────────────────────────────────────────────────────────┐
//!   │                            REGION                                    │
//!   │                                                                      │
//!   │   ┌──────┬─────┬──────┬─────┬─────┬───────────────────────────────┐  │
//!   │   │ sent │ A1  │ free │ A3  │ A4  │          Untouched            │  │
//!   │   └──────┴─────┴──────┴─────┴─────┴───────────────────────────────┘  │
//!   │      │           ▲                ▲                               ▲  │
//!   │      └───────────┘             Frontier                         End  │
//!   │     free list                                                        │
//!   └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every block starts with a header and ends with a footer, both holding the
//! block size with the in-use flag in bit 0. Free blocks also hold the links of
//! an address-ordered, circular free list anchored by a sentinel at the start of
//! the region.
//!
//! - **Allocation** scans the free list for the first block that fits, splits
//!   off the unused tail when it is big enough to stand on its own, and falls
//!   back to carving a new block at the frontier.
//! - **Deallocation** links the block back into the free list and immediately
//!   merges it with a free neighbour after it, then with one before it.
//!
//! ## Crate Structure
//!
//! ```text
//!   tagheap
//!   ├── align      - Alignment macros (align!, align_to!)
//!   ├── block      - Boundary tags and block geometry
//!   ├── region     - The mapped backing region
//!   ├── free_list  - Address-ordered free list, first-fit and splitting
//!   ├── heap       - TagHeap: allocate, deallocate, coalescing
//!   └── walk       - Heap walks, stats and consistency checks
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use tagheap::{OnFailure, TagHeap};
//!
//! let mut heap = TagHeap::new(64 * 1024).unwrap();
//!
//! let ptr = heap
//!   .allocate(std::mem::size_of::<u64>(), OnFailure::Error)
//!   .unwrap()
//!   .unwrap()
//!   .cast::<u64>();
//!
//! unsafe {
//!   ptr.write(42);
//!   assert_eq!(ptr.read(), 42);
//!   heap.deallocate(ptr.as_ptr().cast());
//! }
//!
//! assert_eq!(heap.free_list_len(), 1);
//! ```
//!
//! ## Limitations
//!
//! - **Single-threaded only**: No synchronization primitives
//! - **Fixed size**: The region never grows, and memory is never returned to
//!   the OS before the heap is dropped
//! - **Unchecked frees**: Freeing a foreign pointer or freeing twice is
//!   undefined behavior (caught by assertions in debug builds only)
//! - **Unix-only**: Requires `libc` and `mmap` (POSIX systems)

pub mod align;
mod block;
mod error;
mod free_list;
mod heap;
mod region;
mod walk;

pub use block::{Block, MIN_BLOCK_SIZE, SPLIT_THRESHOLD, TAG_SIZE};
pub use error::{HeapError, HeapResult};
pub use heap::{OnFailure, TagHeap};
pub use region::{DEFAULT_CAPACITY, MIN_CAPACITY};
pub use walk::{Blocks, HeapStats};
