use std::{fmt, io, ptr, ptr::NonNull};

use libc::{MAP_ANONYMOUS, MAP_FAILED, MAP_PRIVATE, PROT_READ, PROT_WRITE, c_void, mmap, munmap};
use log::{debug, warn};

use crate::align::{self, ALIGNMENT};
use crate::block::TAG_SIZE;
use crate::error::{HeapError, HeapResult};

/// Requests below this many bytes are raised to it.
pub const MIN_CAPACITY: usize = 4 * 1024;

/// Capacity used by `TagHeap::default()`.
pub const DEFAULT_CAPACITY: usize = 4 * 1024 * 1024;

/// One contiguous, zero-filled mapping owned for the whole life of a heap.
///
/// Everything inside is addressed by byte offsets from the start of the mapping.
/// `frontier` is the first offset never carved into a block; the region never
/// grows or shrinks.
///
/// ```text
///   0                     frontier                    len
///   ├─────────────────────────┼──────────────────────────┤
///   │  sentinel │ blocks ...  │        untouched         │
///   └─────────────────────────┴──────────────────────────┘
/// ```
pub(crate) struct Region {
  base: *mut u8,
  len: usize,
  frontier: usize,
}

impl Region {
  /// Maps a region of at least `capacity` bytes.
  pub(crate) fn reserve(capacity: usize) -> HeapResult<Self> {
    let floored = if capacity < MIN_CAPACITY {
      warn!(
        "requested capacity of {} bytes is below the minimum, using {} bytes",
        capacity, MIN_CAPACITY
      );
      MIN_CAPACITY
    } else {
      capacity
    };

    let len = align::checked_align(floored).ok_or_else(|| HeapError::ConstructionFailure {
      capacity,
      reason: "capacity overflows the address space".to_string(),
    })?;

    // Anonymous private mappings come back zero-filled and page aligned.
    let address = unsafe {
      mmap(
        ptr::null_mut(),
        len,
        PROT_READ | PROT_WRITE,
        MAP_PRIVATE | MAP_ANONYMOUS,
        -1,
        0,
      )
    };

    if address == MAP_FAILED {
      let reason = io::Error::last_os_error().to_string();
      debug!("mmap of {} bytes failed: {}", len, reason);
      return Err(HeapError::ConstructionFailure { capacity, reason });
    }

    debug!("reserved region of {} bytes at {:?}", len, address);

    Ok(Self {
      base: address as *mut u8,
      len,
      frontier: 0,
    })
  }

  /// Unmaps the region. Calling it again is a no-op.
  pub(crate) fn release(&mut self) {
    if self.base.is_null() {
      return;
    }

    let result = unsafe { munmap(self.base as *mut c_void, self.len) };
    if result != 0 {
      warn!(
        "munmap of region at {:?} failed: {}",
        self.base,
        io::Error::last_os_error()
      );
    } else {
      debug!("released region of {} bytes at {:?}", self.len, self.base);
    }

    self.base = ptr::null_mut();
    self.len = 0;
    self.frontier = 0;
  }

  pub(crate) fn is_released(&self) -> bool {
    self.base.is_null()
  }

  pub(crate) fn len(&self) -> usize {
    self.len
  }

  pub(crate) fn frontier(&self) -> usize {
    self.frontier
  }

  pub(crate) fn set_frontier(
    &mut self,
    frontier: usize,
  ) {
    assert!(frontier <= self.len, "frontier {} past end {}", frontier, self.len);
    self.frontier = frontier;
  }

  /// Bytes past the frontier that have never been carved into a block.
  pub(crate) fn untouched(&self) -> usize {
    self.len - self.frontier
  }

  /// Reads the word stored at `offset`.
  pub(crate) fn read(
    &self,
    offset: usize,
  ) -> usize {
    self.check_word(offset);
    // SAFETY: `check_word` keeps the word inside the mapping and word aligned.
    unsafe { self.base.add(offset).cast::<usize>().read() }
  }

  pub(crate) fn write(
    &mut self,
    offset: usize,
    value: usize,
  ) {
    self.check_word(offset);
    // SAFETY: see `read`.
    unsafe { self.base.add(offset).cast::<usize>().write(value) }
  }

  /// Pointer to the byte at `offset`.
  pub(crate) fn ptr_at(
    &self,
    offset: usize,
  ) -> NonNull<u8> {
    assert!(offset < self.len, "offset {} outside region of {} bytes", offset, self.len);
    // SAFETY: `len > 0` implies a live, non-null mapping and `offset` is inside it.
    unsafe { NonNull::new_unchecked(self.base.add(offset)) }
  }

  /// Offset of `ptr` from the start of the region, if it points inside it.
  pub(crate) fn offset_of(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    let offset = (ptr as usize).checked_sub(self.base as usize)?;
    (offset < self.len).then_some(offset)
  }

  fn check_word(
    &self,
    offset: usize,
  ) {
    assert!(
      offset <= self.len.saturating_sub(TAG_SIZE) && !self.is_released(),
      "word at offset {} outside region of {} bytes",
      offset,
      self.len
    );
    debug_assert_eq!(offset % ALIGNMENT, 0, "unaligned word offset {}", offset);
  }
}

impl Drop for Region {
  fn drop(&mut self) {
    self.release();
  }
}

impl fmt::Debug for Region {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    write!(
      f,
      "region={{base={:?}, frontier={}, len={}}}",
      self.base, self.frontier, self.len
    )
  }
}
