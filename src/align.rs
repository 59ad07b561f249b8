use std::mem;

/// The fixed alignment unit of the heap: one machine word.
///
/// Every block size and every block boundary is a multiple of this value, which
/// leaves the low bit of a stored size free to carry the in-use flag.
pub const ALIGNMENT: usize = mem::size_of::<usize>();

/// Rounds the given size up to the heap's alignment unit (one machine word).
///
/// # Examples
///
/// ```rust
/// use std::mem;
/// use tagheap::align;
///
/// match mem::size_of::<usize>() {
///     8 => assert_eq!(align!(13), 16), // 64 bit machine.
///     4 => assert_eq!(align!(11), 12), // 32 bit machine.
///     _ => {},
/// };
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::align::ALIGNMENT)
  };
}

/// Rounds `$value` up to a multiple of `$alignment`, which must be a power of two.
///
/// ```rust
/// use tagheap::align_to;
///
/// assert_eq!(align_to!(17, 16), 32);
/// assert_eq!(align_to!(4096, 4096), 4096);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $alignment:expr) => {
    (($value) + ($alignment) - 1) & !(($alignment) - 1)
  };
}

/// Same as [`align!`] but returns `None` instead of wrapping around.
pub const fn checked_align(value: usize) -> Option<usize> {
  match value.checked_add(ALIGNMENT - 1) {
    Some(bumped) => Some(bumped & !(ALIGNMENT - 1)),
    None => None,
  }
}

pub const fn is_aligned(value: usize) -> bool {
  value & (ALIGNMENT - 1) == 0
}
