//! Address-ordered, circular, doubly linked list of free blocks.
//!
//! The list lives inside the free blocks themselves: a free block extends its
//! header with the offsets of its list neighbours.
//!
//! ```text
//!   Free block:
//!   ┌────────┬────────┬────────┬───────────────────┬────────┐
//!   │ size|0 │  next  │  prev  │      unused       │ size|0 │
//!   └────────┴────────┴────────┴───────────────────┴────────┘
//!    header                                          footer
//! ```
//!
//! A sentinel node sits at offset 0 and anchors the ring; an empty list is the
//! sentinel pointing at itself. The word right after the sentinel's links is a
//! permanently in-use footer, so backward coalescing stops at the first block.

use log::trace;

use crate::block::{
  self, MIN_BLOCK_SIZE, SPLIT_THRESHOLD, TAG_SIZE, Tag, next_link, prev_link, read_header,
};
use crate::heap::TagHeap;
use crate::region::Region;

pub(crate) const SENTINEL: usize = 0;

/// Offset of the first block ever carved from the region.
pub(crate) const FIRST_BLOCK: usize = MIN_BLOCK_SIZE;

impl TagHeap {
  /// Writes the sentinel and places the frontier right after it.
  pub(crate) fn init_free_list(&mut self) {
    self.region.write(SENTINEL, 0);
    self.set_next_free(SENTINEL, SENTINEL);
    self.set_prev_free(SENTINEL, SENTINEL);
    self.region.write(FIRST_BLOCK - TAG_SIZE, Tag::new(0, true).raw());
    self.region.set_frontier(FIRST_BLOCK);
  }

  /// Links `block` in front of the first node with a higher offset.
  pub(crate) fn insert_free(
    &mut self,
    block: usize,
  ) {
    let mut spot = self.next_free(SENTINEL);
    while spot != SENTINEL && spot < block {
      spot = self.next_free(spot);
    }

    let before = self.prev_free(spot);
    self.set_next_free(block, spot);
    self.set_prev_free(block, before);
    self.set_next_free(before, block);
    self.set_prev_free(spot, block);
  }

  /// Unlinks a block that is currently a list member.
  pub(crate) fn unlink_free(
    &mut self,
    block: usize,
  ) {
    debug_assert!(block != SENTINEL);

    let next = self.next_free(block);
    let prev = self.prev_free(block);
    self.set_next_free(prev, next);
    self.set_prev_free(next, prev);
  }

  /// First-fit search in address order.
  ///
  /// The returned block is off the list and its header carries its final size,
  /// but its in-use flag is still clear. Oversized blocks are split and the
  /// remainder takes over their slot in the list.
  pub(crate) fn take_first_fit(
    &mut self,
    requested: usize,
  ) -> Option<usize> {
    let mut node = self.next_free(SENTINEL);

    while node != SENTINEL {
      let size = read_header(&self.region, node).size();

      if size >= requested {
        if size - requested > SPLIT_THRESHOLD {
          self.split(node, size, requested);
        } else {
          self.unlink_free(node);
        }
        return Some(node);
      }

      node = self.next_free(node);
    }

    None
  }

  fn split(
    &mut self,
    block: usize,
    size: usize,
    requested: usize,
  ) {
    let rest = block + requested;
    let next = self.next_free(block);
    let prev = self.prev_free(block);

    block::write_tags(&mut self.region, rest, Tag::new(size - requested, false));
    self.set_next_free(rest, next);
    self.set_prev_free(rest, prev);
    self.set_next_free(prev, rest);
    self.set_prev_free(next, rest);

    block::write_header(&mut self.region, block, Tag::new(requested, false));

    trace!(
      "split block at {} ({} bytes) leaving {} bytes at {}",
      block,
      size,
      size - requested,
      rest
    );
  }

  /// Number of blocks on the free list.
  ///
  /// Meant for assertions about coalescing, not for allocation decisions.
  pub fn free_list_len(&self) -> usize {
    self.free_nodes().count()
  }

  /// Whether the allocation behind `ptr` is currently on the free list.
  ///
  /// Linear scan; use it for diagnostics only.
  pub fn is_free_listed(
    &self,
    ptr: *const u8,
  ) -> bool {
    self
      .region
      .offset_of(ptr)
      .filter(|payload| *payload >= block::payload(FIRST_BLOCK))
      .is_some_and(|payload| self.free_list_contains(block::block_of(payload)))
  }

  pub(crate) fn free_list_contains(
    &self,
    block: usize,
  ) -> bool {
    self.free_nodes().any(|node| node == block)
  }

  /// Offsets of the free blocks in list order.
  pub(crate) fn free_nodes(&self) -> FreeNodes<'_> {
    FreeNodes {
      region: &self.region,
      cursor: self.next_free(SENTINEL),
    }
  }

  pub(crate) fn next_free(
    &self,
    node: usize,
  ) -> usize {
    self.region.read(next_link(node))
  }

  pub(crate) fn prev_free(
    &self,
    node: usize,
  ) -> usize {
    self.region.read(prev_link(node))
  }

  pub(crate) fn set_next_free(
    &mut self,
    node: usize,
    next: usize,
  ) {
    self.region.write(next_link(node), next);
  }

  pub(crate) fn set_prev_free(
    &mut self,
    node: usize,
    prev: usize,
  ) {
    self.region.write(prev_link(node), prev);
  }
}

pub(crate) struct FreeNodes<'a> {
  region: &'a Region,
  cursor: usize,
}

impl Iterator for FreeNodes<'_> {
  type Item = usize;

  fn next(&mut self) -> Option<usize> {
    if self.cursor == SENTINEL {
      return None;
    }

    let node = self.cursor;
    self.cursor = self.region.read(next_link(node));
    Some(node)
  }
}

#[cfg(test)]
mod tests {
  use crate::{OnFailure, TagHeap};

  use super::*;

  fn allocate(
    heap: &mut TagHeap,
    size: usize,
  ) -> *mut u8 {
    heap.allocate(size, OnFailure::Error).unwrap().unwrap().as_ptr()
  }

  #[test]
  fn test_empty_list_is_sentinel_ring() {
    let heap = TagHeap::new(0).unwrap();

    assert_eq!(heap.next_free(SENTINEL), SENTINEL);
    assert_eq!(heap.prev_free(SENTINEL), SENTINEL);
    assert_eq!(heap.free_list_len(), 0);
    assert_eq!(heap.region.frontier(), FIRST_BLOCK);
  }

  #[test]
  fn test_insert_keeps_address_order() {
    let mut heap = TagHeap::new(0).unwrap();

    // Keep an allocation between each pair so nothing coalesces.
    let ptrs: Vec<*mut u8> = (0..8).map(|_| allocate(&mut heap, 40)).collect();

    unsafe {
      heap.deallocate(ptrs[6]);
      heap.deallocate(ptrs[0]);
      heap.deallocate(ptrs[4]);
      heap.deallocate(ptrs[2]);
    }

    let nodes: Vec<usize> = heap.free_nodes().collect();
    let mut sorted = nodes.clone();
    sorted.sort_unstable();

    assert_eq!(nodes.len(), 4);
    assert_eq!(nodes, sorted);

    // The ring is consistent in both directions.
    for pair in nodes.windows(2) {
      assert_eq!(heap.next_free(pair[0]), pair[1]);
      assert_eq!(heap.prev_free(pair[1]), pair[0]);
    }
    assert_eq!(heap.prev_free(SENTINEL), nodes[3]);
  }

  #[test]
  fn test_first_fit_takes_lowest_address() {
    let mut heap = TagHeap::new(0).unwrap();

    let low = allocate(&mut heap, 64);
    let _guard = allocate(&mut heap, 8);
    let high = allocate(&mut heap, 64);
    let _guard = allocate(&mut heap, 8);

    unsafe {
      heap.deallocate(high);
      heap.deallocate(low);
    }

    assert_eq!(allocate(&mut heap, 64), low);
    assert_eq!(allocate(&mut heap, 64), high);
  }

  #[test]
  fn test_split_remainder_keeps_list_position() {
    let mut heap = TagHeap::new(0).unwrap();

    let first = allocate(&mut heap, 40);
    let _guard = allocate(&mut heap, 8);
    let big = allocate(&mut heap, 512);
    let _guard = allocate(&mut heap, 8);
    let last = allocate(&mut heap, 40);
    let _guard = allocate(&mut heap, 8);

    unsafe {
      heap.deallocate(first);
      heap.deallocate(big);
      heap.deallocate(last);
    }
    let before: Vec<usize> = heap.free_nodes().collect();

    let requested = block::block_size_for(100).unwrap();
    let carved = heap.take_first_fit(requested).unwrap();
    assert_eq!(carved, before[1]);

    let after: Vec<usize> = heap.free_nodes().collect();
    assert_eq!(after, vec![before[0], carved + requested, before[2]]);
  }

  #[test]
  fn test_small_leftover_is_not_split() {
    let mut heap = TagHeap::new(0).unwrap();

    let ptr = allocate(&mut heap, 100);
    let _guard = allocate(&mut heap, 8);
    unsafe { heap.deallocate(ptr) };

    let whole = read_header(&heap.region, FIRST_BLOCK).size();
    let requested = whole - SPLIT_THRESHOLD;
    let carved = heap.take_first_fit(requested).unwrap();

    assert_eq!(carved, FIRST_BLOCK);
    assert_eq!(read_header(&heap.region, carved).size(), whole);
    assert_eq!(heap.free_list_len(), 0);
  }
}
