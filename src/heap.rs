use std::{fmt, mem, ptr::NonNull};

use log::{debug, trace};

use crate::block::{self, Tag, read_header, read_preceding_footer, write_tags};
use crate::error::{HeapError, HeapResult};
use crate::free_list::FIRST_BLOCK;
use crate::region::{DEFAULT_CAPACITY, Region};

/// Extra room `for_elements` reserves on top of the elements themselves.
const ELEMENT_SLACK: usize = 64 * 1024;

/// What `allocate` does when nothing fits.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OnFailure {
  /// Return `Err(HeapError::OutOfMemory)`.
  #[default]
  Error,
  /// Return `Ok(None)`.
  Null,
}

/// A first-fit heap over one fixed region, bookkept with boundary tags.
///
/// ```text
///   Allocated block:
///   ┌────────┬──────────────────────────────────────┬────────┐
///   │ size|1 │            payload ...               │ size|1 │
///   └────────┴──────────────────────────────────────┴────────┘
///            ▲
///            └── pointer returned to the caller
/// ```
///
/// Not thread safe: wrap it in a lock or keep one heap per thread.
pub struct TagHeap {
  pub(crate) region: Region,
}

impl TagHeap {
  /// Creates a heap over a fresh region of at least `capacity` bytes.
  ///
  /// Capacities below [`MIN_CAPACITY`](crate::MIN_CAPACITY) are raised to it.
  pub fn new(capacity: usize) -> HeapResult<Self> {
    let region = Region::reserve(capacity)?;
    let mut heap = Self { region };
    heap.init_free_list();

    Ok(heap)
  }

  /// Sizes a heap for a container expected to hold `count` values of `T`.
  pub fn for_elements<T>(count: usize) -> HeapResult<Self> {
    let capacity = count
      .checked_mul(mem::size_of::<T>())
      .and_then(|bytes| bytes.checked_add(ELEMENT_SLACK))
      .ok_or_else(|| HeapError::ConstructionFailure {
        capacity: usize::MAX,
        reason: format!("{} elements of {} bytes overflow", count, mem::size_of::<T>()),
      })?;

    Self::new(capacity)
  }

  /// Allocates at least `size` bytes, aligned to [`ALIGNMENT`](crate::align::ALIGNMENT).
  ///
  /// A zero `size` yields `Ok(None)` without touching the heap. When nothing
  /// fits, `on_failure` decides between `Err(OutOfMemory)` and `Ok(None)`; the
  /// heap is left unchanged either way.
  pub fn allocate(
    &mut self,
    size: usize,
    on_failure: OnFailure,
  ) -> HeapResult<Option<NonNull<u8>>> {
    if size == 0 {
      return Ok(None);
    }

    let found = block::block_size_for(size).and_then(|requested| {
      self
        .take_first_fit(requested)
        .or_else(|| self.carve_frontier(requested))
    });

    let Some(block) = found else {
      let error = HeapError::OutOfMemory {
        requested: size,
        available: self.region.untouched(),
      };
      debug!("{}", error);

      return match on_failure {
        OnFailure::Error => Err(error),
        OnFailure::Null => Ok(None),
      };
    };

    let block_size = read_header(&self.region, block).size();
    write_tags(&mut self.region, block, Tag::new(block_size, true));

    trace!(
      "allocated {} bytes in block at {} ({} bytes)",
      size, block, block_size
    );

    Ok(Some(self.region.ptr_at(block::payload(block))))
  }

  /// Returns an allocation to the heap and merges it with free neighbours.
  ///
  /// A null `ptr` is ignored.
  ///
  /// # Safety
  ///
  /// `ptr` must be null or a pointer returned by [`allocate`](Self::allocate) on
  /// this heap that has not been deallocated since. Nothing checks this outside
  /// debug builds; violating it corrupts the heap.
  pub unsafe fn deallocate(
    &mut self,
    ptr: *mut u8,
  ) {
    if ptr.is_null() {
      return;
    }

    let payload = self.region.offset_of(ptr);
    debug_assert!(payload.is_some(), "pointer {:p} is not inside this heap", ptr);
    let Some(payload) = payload else {
      return;
    };

    let block = block::block_of(payload);
    debug_assert!(
      block >= FIRST_BLOCK && block < self.region.frontier(),
      "pointer {:p} was never handed out by this heap",
      ptr
    );
    debug_assert!(
      !self.free_list_contains(block),
      "double free of block at offset {}",
      block
    );

    let size = read_header(&self.region, block).size();
    write_tags(&mut self.region, block, Tag::new(size, false));
    trace!("deallocated block at {} ({} bytes)", block, size);

    self.insert_free(block);
    self.coalesce(block);
  }

  /// Releases the region. Every pointer handed out becomes dangling.
  pub fn destroy(mut self) {
    self.region.release();
  }

  /// Total bytes in the region, bookkeeping included.
  pub fn capacity(&self) -> usize {
    self.region.len()
  }

  /// Offset of the first byte never carved into a block.
  pub fn frontier(&self) -> usize {
    self.region.frontier()
  }

  fn carve_frontier(
    &mut self,
    requested: usize,
  ) -> Option<usize> {
    let block = self.region.frontier();
    let frontier = block.checked_add(requested)?;

    if frontier >= self.region.len() {
      return None;
    }

    block::write_header(&mut self.region, block, Tag::new(requested, false));
    self.region.set_frontier(frontier);
    trace!("carved block at {} ({} bytes) from the frontier", block, requested);

    Some(block)
  }

  /// Merges a freshly freed list member with its free memory neighbours:
  /// the following block first, then the preceding one.
  fn coalesce(
    &mut self,
    block: usize,
  ) {
    let mut size = read_header(&self.region, block).size();

    let next = block + size;
    if next < self.region.frontier() {
      let next_tag = read_header(&self.region, next);

      if !next_tag.in_use() {
        // Address order makes the neighbour our list successor.
        debug_assert_eq!(self.next_free(block), next);

        let after = self.next_free(next);
        self.set_next_free(block, after);
        self.set_prev_free(after, block);

        size += next_tag.size();
        write_tags(&mut self.region, block, Tag::new(size, false));
        trace!("merged block at {} into {} ({} bytes)", next, block, size);
      }
    }

    let prev_tag = read_preceding_footer(&self.region, block);
    if !prev_tag.in_use() {
      let prev = block - prev_tag.size();
      debug_assert_eq!(self.prev_free(block), prev);

      self.unlink_free(block);

      let merged = prev_tag.size() + size;
      write_tags(&mut self.region, prev, Tag::new(merged, false));
      trace!("merged block at {} into {} ({} bytes)", block, prev, merged);
    }
  }
}

impl Default for TagHeap {
  /// A heap of [`DEFAULT_CAPACITY`](crate::DEFAULT_CAPACITY) bytes.
  ///
  /// # Panics
  ///
  /// Panics if the region cannot be mapped.
  fn default() -> Self {
    match Self::new(DEFAULT_CAPACITY) {
      Ok(heap) => heap,
      Err(error) => panic!("cannot create default heap: {}", error),
    }
  }
}

impl fmt::Debug for TagHeap {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "tag_heap={{frontier={}, capacity={}, free_blocks={}}}",
      self.frontier(),
      self.capacity(),
      self.free_list_len()
    )
  }
}
