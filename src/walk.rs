//! Heap walks and invariant checks, for tests and debugging.

use crate::align;
use crate::block::{Block, MIN_BLOCK_SIZE, read_footer, read_header};
use crate::error::{HeapError, HeapResult};
use crate::free_list::FIRST_BLOCK;
use crate::heap::TagHeap;
use crate::region::Region;

/// Aggregate view of a heap at one point in time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HeapStats {
  pub capacity: usize,
  pub frontier: usize,
  pub used_blocks: usize,
  pub used_bytes: usize,
  pub free_blocks: usize,
  pub free_bytes: usize,
  /// Bytes past the frontier, never carved into a block.
  pub untouched_bytes: usize,
}

/// Iterator over every block between the sentinel and the frontier, in address
/// order.
pub struct Blocks<'a> {
  region: &'a Region,
  cursor: usize,
}

impl Iterator for Blocks<'_> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    if self.cursor >= self.region.frontier() {
      return None;
    }

    let tag = read_header(self.region, self.cursor);
    let block = Block::new(self.cursor, tag.size(), !tag.in_use());

    // A zero size never advances; end the walk there.
    self.cursor = if tag.size() == 0 {
      self.region.frontier()
    } else {
      self.cursor + tag.size()
    };

    Some(block)
  }
}

impl TagHeap {
  /// Walks all carved blocks in address order.
  pub fn blocks(&self) -> Blocks<'_> {
    Blocks {
      region: &self.region,
      cursor: FIRST_BLOCK,
    }
  }

  pub fn stats(&self) -> HeapStats {
    let mut stats = HeapStats {
      capacity: self.capacity(),
      frontier: self.frontier(),
      untouched_bytes: self.region.untouched(),
      ..HeapStats::default()
    };

    for block in self.blocks() {
      if block.is_free {
        stats.free_blocks += 1;
        stats.free_bytes += block.size;
      } else {
        stats.used_blocks += 1;
        stats.used_bytes += block.size;
      }
    }

    stats
  }

  /// Verifies the heap layout and the free list against each other.
  ///
  /// Checks that blocks tile the carved range exactly, that every header
  /// matches its footer, that no two neighbours are both free, and that the
  /// free list holds exactly the free blocks in ascending address order.
  pub fn check_consistency(&self) -> HeapResult<()> {
    let corrupted = |offset, reason| Err(HeapError::Corrupted { offset, reason });

    let frontier = self.region.frontier();
    let mut offset = FIRST_BLOCK;
    let mut previous_free = false;
    let mut free_blocks = Vec::new();

    while offset < frontier {
      let header = read_header(&self.region, offset);
      let size = header.size();

      if size < MIN_BLOCK_SIZE || !align::is_aligned(size) {
        return corrupted(offset, "invalid block size");
      }
      if offset + size > frontier {
        return corrupted(offset, "block runs past the frontier");
      }
      if read_footer(&self.region, offset, size) != header {
        return corrupted(offset, "header and footer disagree");
      }

      let is_free = !header.in_use();
      if is_free && previous_free {
        return corrupted(offset, "adjacent free blocks were not coalesced");
      }
      if is_free {
        free_blocks.push(offset);
      }

      previous_free = is_free;
      offset += size;
    }

    if offset != frontier {
      return corrupted(offset, "blocks do not end at the frontier");
    }

    let mut listed = Vec::with_capacity(free_blocks.len());
    for node in self.free_nodes() {
      if listed.len() > free_blocks.len() {
        return corrupted(node, "free list is longer than the number of free blocks");
      }
      if listed.last().is_some_and(|last| *last >= node) {
        return corrupted(node, "free list is not in address order");
      }
      if self.prev_free(self.next_free(node)) != node {
        return corrupted(node, "free list links are not symmetric");
      }
      listed.push(node);
    }

    if listed != free_blocks {
      let offset = listed
        .iter()
        .zip(&free_blocks)
        .find(|(listed, walked)| listed != walked)
        .map_or(frontier, |(listed, _)| *listed);
      return corrupted(offset, "free list does not match the free blocks");
    }

    Ok(())
  }
}
