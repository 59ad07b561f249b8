use std::mem;

use crate::align::{self, ALIGNMENT};
use crate::region::Region;

/// Size of one boundary tag (header or footer) and of one free-list link.
pub const TAG_SIZE: usize = mem::size_of::<usize>();

/// Smallest block the heap ever creates.
///
/// A released block must be able to hold a free-list node: header, `next`,
/// `prev` and footer.
pub const MIN_BLOCK_SIZE: usize = 4 * TAG_SIZE;

/// A free block is split only when the leftover would be larger than this.
pub const SPLIT_THRESHOLD: usize = MIN_BLOCK_SIZE + 16;

const IN_USE: usize = 1;

/// Boundary tag: the block size with the in-use flag packed in bit 0.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Tag(usize);

impl Tag {
  pub(crate) const fn new(
    size: usize,
    in_use: bool,
  ) -> Self {
    debug_assert!(align::is_aligned(size));
    Self(size | in_use as usize)
  }

  pub(crate) const fn from_raw(raw: usize) -> Self {
    Self(raw)
  }

  pub(crate) const fn raw(self) -> usize {
    self.0
  }

  pub(crate) const fn size(self) -> usize {
    self.0 & !IN_USE
  }

  pub(crate) const fn in_use(self) -> bool {
    self.0 & IN_USE != 0
  }
}

/// A block as seen by a heap walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Block {
  /// Offset of the block header from the start of the region.
  pub offset: usize,
  /// Total span, header and footer included.
  pub size: usize,
  pub is_free: bool,
}

impl Block {
  pub fn new(
    offset: usize,
    size: usize,
    is_free: bool,
  ) -> Self {
    Self {
      offset,
      size,
      is_free,
    }
  }

  /// Offset of the first usable byte.
  pub fn payload(&self) -> usize {
    payload(self.offset)
  }

  pub fn end(&self) -> usize {
    self.offset + self.size
  }
}

/// Total block size needed to serve `user_size` payload bytes, or `None` on
/// arithmetic overflow.
pub(crate) fn block_size_for(user_size: usize) -> Option<usize> {
  let with_tags = user_size.checked_add(2 * TAG_SIZE)?;
  let size = align::checked_align(with_tags)?;

  Some(size.max(MIN_BLOCK_SIZE))
}

pub(crate) const fn payload(block: usize) -> usize {
  block + TAG_SIZE
}

pub(crate) const fn block_of(payload: usize) -> usize {
  payload - TAG_SIZE
}

pub(crate) const fn next_link(block: usize) -> usize {
  block + TAG_SIZE
}

pub(crate) const fn prev_link(block: usize) -> usize {
  block + 2 * TAG_SIZE
}

pub(crate) fn read_header(
  region: &Region,
  block: usize,
) -> Tag {
  Tag::from_raw(region.read(block))
}

pub(crate) fn read_footer(
  region: &Region,
  block: usize,
  size: usize,
) -> Tag {
  Tag::from_raw(region.read(block + size - TAG_SIZE))
}

/// Reads the footer of whatever block ends right where `block` starts.
pub(crate) fn read_preceding_footer(
  region: &Region,
  block: usize,
) -> Tag {
  Tag::from_raw(region.read(block - TAG_SIZE))
}

pub(crate) fn write_header(
  region: &mut Region,
  block: usize,
  tag: Tag,
) {
  region.write(block, tag.raw());
}

/// Writes `tag` to both ends of the block it describes.
pub(crate) fn write_tags(
  region: &mut Region,
  block: usize,
  tag: Tag,
) {
  debug_assert!(tag.size() >= MIN_BLOCK_SIZE);

  region.write(block, tag.raw());
  region.write(block + tag.size() - TAG_SIZE, tag.raw());
}

const _: () = assert!(ALIGNMENT.is_power_of_two() && ALIGNMENT >= 2);
const _: () = assert!(SPLIT_THRESHOLD >= MIN_BLOCK_SIZE);

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_tag_packs_flag_in_low_bit() {
    let tag = Tag::new(64, true);
    assert_eq!(tag.raw(), 65);
    assert_eq!(tag.size(), 64);
    assert!(tag.in_use());

    let tag = Tag::new(64, false);
    assert_eq!(tag.raw(), 64);
    assert!(!tag.in_use());
  }

  #[test]
  fn test_block_size_for_small_requests_uses_minimum() {
    assert_eq!(block_size_for(1), Some(MIN_BLOCK_SIZE));
    assert_eq!(block_size_for(TAG_SIZE), Some(MIN_BLOCK_SIZE));
  }

  #[test]
  fn test_block_size_for_adds_both_tags() {
    let size = block_size_for(100).unwrap();
    assert!(size >= 100 + 2 * TAG_SIZE);
    assert_eq!(size % ALIGNMENT, 0);
    assert!(size - (100 + 2 * TAG_SIZE) < ALIGNMENT);
  }

  #[test]
  fn test_block_size_for_overflow() {
    assert_eq!(block_size_for(usize::MAX), None);
    assert_eq!(block_size_for(usize::MAX - TAG_SIZE), None);
  }

  #[test]
  fn test_payload_round_trip() {
    let block = 5 * ALIGNMENT;
    assert_eq!(block_of(payload(block)), block);

    let walked = Block::new(block, 48, false);
    assert_eq!(walked.payload(), block + TAG_SIZE);
    assert_eq!(walked.end(), block + 48);
  }
}
