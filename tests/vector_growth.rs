//! A growable array that sources its storage from a `TagHeap` through
//! `allocate`/`deallocate` only, the way a container adapter would.

use std::{mem, ptr};

use rand::{Rng, SeedableRng, rngs::StdRng};
use tagheap::{OnFailure, TagHeap};

struct HeapVec<'h, T: Copy> {
  heap: &'h mut TagHeap,
  data: *mut T,
  len: usize,
  capacity: usize,
}

impl<'h, T: Copy> HeapVec<'h, T> {
  fn new(heap: &'h mut TagHeap) -> Self {
    Self {
      heap,
      data: ptr::null_mut(),
      len: 0,
      capacity: 0,
    }
  }

  fn reserve(
    &mut self,
    capacity: usize,
  ) {
    if capacity <= self.capacity {
      return;
    }

    let fresh = self
      .heap
      .allocate(capacity * mem::size_of::<T>(), OnFailure::Error)
      .expect("heap should hold the vector")
      .expect("non-empty request")
      .as_ptr()
      .cast::<T>();

    unsafe {
      if !self.data.is_null() {
        ptr::copy_nonoverlapping(self.data, fresh, self.len);
      }
      self.heap.deallocate(self.data.cast());
    }

    self.data = fresh;
    self.capacity = capacity;
  }

  fn push(
    &mut self,
    value: T,
  ) {
    if self.len == self.capacity {
      self.reserve((self.capacity * 2).max(1));
    }
    unsafe { self.data.add(self.len).write(value) };
    self.len += 1;
  }

  fn get(
    &self,
    index: usize,
  ) -> T {
    assert!(index < self.len);
    unsafe { self.data.add(index).read() }
  }

  fn set(
    &mut self,
    index: usize,
    value: T,
  ) {
    assert!(index < self.len);
    unsafe { self.data.add(index).write(value) };
  }
}

impl<T: Copy> Drop for HeapVec<'_, T> {
  fn drop(&mut self) {
    unsafe { self.heap.deallocate(self.data.cast()) };
  }
}

#[test_log::test]
fn vector_grows_through_the_heap() {
  let mut heap = TagHeap::new(4 * 1024 * 1024).unwrap();

  {
    let mut values = HeapVec::new(&mut heap);
    for i in 0..100_000 {
      values.push(i);
    }
    for i in 0..100_000 {
      assert_eq!(values.get(i as usize), i);
    }
  }

  assert_eq!(heap.free_list_len(), 1);
  assert_eq!(heap.check_consistency(), Ok(()));
}

#[test_log::test]
fn reserved_vector_tracks_random_writes() {
  let mut heap = TagHeap::for_elements::<i32>(1000).unwrap();
  let mut values = HeapVec::new(&mut heap);
  values.reserve(1000);

  let mut expected = [0i32; 500];
  for i in 0..500 {
    values.push(i as i32);
    expected[i] = i as i32;
  }

  let mut rng = StdRng::seed_from_u64(0x2545_f491);
  for _ in 0..50_000 {
    let position = rng.gen_range(0..500);
    let value = rng.gen_range(0..1000);

    values.set(position, value);
    expected[position] = value;
  }

  for (i, value) in expected.iter().enumerate() {
    assert_eq!(values.get(i), *value);
  }
}
