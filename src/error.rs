use thiserror::Error;

/// Failures surfaced by the heap.
///
/// Misuse of [`TagHeap::deallocate`](crate::TagHeap::deallocate) (foreign
/// pointers, double frees) is not represented here: it is undefined behavior and
/// is never checked outside debug builds.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeapError {
  #[error("out of memory: no block fits {requested} bytes and only {available} untouched bytes remain")]
  OutOfMemory { requested: usize, available: usize },

  #[error("cannot reserve a region of {capacity} bytes: {reason}")]
  ConstructionFailure { capacity: usize, reason: String },

  #[error("heap corrupted at offset {offset}: {reason}")]
  Corrupted { offset: usize, reason: &'static str },
}

pub type HeapResult<T> = Result<T, HeapError>;
