use std::{io::Read, ptr};

use tagheap::{OnFailure, TagHeap};

/// Waits until the user presses ENTER.
fn block_until_enter_pressed() {
  println!("\n>>> Press ENTER to continue...");
  let _ = std::io::stdin().bytes().next();
}

/// Prints every block between the sentinel and the frontier.
fn print_heap(
  label: &str,
  heap: &TagHeap,
) {
  println!("[{}] {:?}", label, heap);
  for block in heap.blocks() {
    println!(
      "    {:>6} .. {:>6}  {:>5} bytes  {}",
      block.offset,
      block.end(),
      block.size,
      if block.is_free { "free" } else { "used" }
    );
  }
}

fn allocate(
  heap: &mut TagHeap,
  size: usize,
) -> *mut u8 {
  match heap.allocate(size, OnFailure::Error) {
    Ok(Some(ptr)) => ptr.as_ptr(),
    Ok(None) => ptr::null_mut(),
    Err(error) => {
      eprintln!("allocation of {} bytes failed: {}", size, error);
      std::process::exit(1);
    }
  }
}

fn main() {
  // Run with RUST_LOG=trace to see every split and merge.
  env_logger::init();

  let mut heap = match TagHeap::new(16 * 1024) {
    Ok(heap) => heap,
    Err(error) => {
      eprintln!("{}", error);
      std::process::exit(1);
    }
  };

  print_heap("start", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 1) Carve three blocks from the frontier.
  // --------------------------------------------------------------------
  let first = allocate(&mut heap, 4);
  let second = allocate(&mut heap, 12);
  let third = allocate(&mut heap, 64);

  unsafe {
    first.cast::<u32>().write(0xDEADBEEF);
    ptr::write_bytes(second, 0xAB, 12);
    println!("\n[1] first = {:p} holds 0x{:X}", first, first.cast::<u32>().read());
  }
  println!("[1] second = {:p}, third = {:p}", second, third);
  print_heap("1", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 2) Free the middle block: it goes on the free list on its own.
  // --------------------------------------------------------------------
  unsafe { heap.deallocate(second) };
  println!("\n[2] freed second, free list length = {}", heap.free_list_len());
  print_heap("2", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 3) Free the first block: it absorbs the free block after it.
  // --------------------------------------------------------------------
  unsafe { heap.deallocate(first) };
  println!("\n[3] freed first, free list length = {}", heap.free_list_len());
  print_heap("3", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 4) A small request reuses the merged block instead of growing.
  // --------------------------------------------------------------------
  let frontier = heap.frontier();
  let fourth = allocate(&mut heap, 2);
  println!(
    "\n[4] fourth == first? {}, frontier moved? {}",
    fourth == first,
    heap.frontier() != frontier
  );
  print_heap("4", &heap);
  block_until_enter_pressed();

  // --------------------------------------------------------------------
  // 5) Ask for more than the region holds, both ways.
  // --------------------------------------------------------------------
  match heap.allocate(64 * 1024, OnFailure::Error) {
    Err(error) => println!("\n[5] Error mode: {}", error),
    Ok(ptr) => println!("\n[5] Error mode unexpectedly returned {:?}", ptr),
  }
  println!(
    "[5] Null mode: {:?}",
    heap.allocate(64 * 1024, OnFailure::Null)
  );

  unsafe {
    heap.deallocate(third);
    heap.deallocate(fourth);
  }
  print_heap("end", &heap);
  println!("\n{:?}", heap.stats());

  heap.destroy();
}
