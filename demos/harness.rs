use std::ptr::{self, NonNull};

use brkalloc::BrkAlloc;
use libc::sbrk;

// Every allocation in this process, println! buffers included, goes through
// the same arena as the explicit calls below.
#[global_allocator]
static HEAP: BrkAlloc = BrkAlloc::new();

/// Reads the current program break using `sbrk(0)`.
/// The program break is the upper boundary of the heap managed via brk/sbrk.
fn program_break() -> *mut libc::c_void {
  unsafe { sbrk(0) }
}

fn fail(what: &str) -> ! {
  eprintln!("{what} failed: {}", std::io::Error::last_os_error());
  std::process::exit(1);
}

fn main() {
  // Warm up stdout so its buffer is not the block under test.
  println!("PID = {}", std::process::id());

  unsafe {
    // --------------------------------------------------------------------
    // 1) Allocate one page and hand it straight back.
    //    The block is the tail of the arena, so releasing it must move the
    //    program break back to where it was.
    // --------------------------------------------------------------------
    let size = 4096;
    let start_break = program_break();
    println!("Initial program break: {start_break:?}");

    let Ok(Some(page)) = HEAP.allocate(size) else {
      fail("allocate(4096)");
    };
    println!("allocate({size}) returned: {page:?}");
    println!("Program break after allocate: {:?}", program_break());

    let mem = page.as_ptr();
    for i in 0..10 {
      mem.add(i).write(b'A' + i as u8);
    }
    println!(
      "First bytes: {} {} {}",
      *mem as char,
      *mem.add(1) as char,
      *mem.add(2) as char
    );

    let before_release = program_break();
    println!("Program break before release: {before_release:?}");

    HEAP.release(Some(page));

    let after_release = program_break();
    println!("Program break after release: {after_release:?}");
    println!("Break restored? {}", after_release == start_break);

    // --------------------------------------------------------------------
    // 2) Resize: grow then shrink, checking the content survives.
    // --------------------------------------------------------------------
    println!("\n--- Testing resize ---");

    let message = b"Hello custom realloc!\0";
    let Ok(Some(text)) = HEAP.allocate(32) else {
      fail("allocate(32)");
    };
    ptr::copy_nonoverlapping(message.as_ptr(), text.as_ptr(), message.len());
    println!("Before resize: {text:?} content: {}", as_str(text, message.len() - 1));

    let Ok(Some(text)) = HEAP.resize(Some(text), 128) else {
      fail("resize(128)");
    };
    println!("After resize (grow): {text:?} content: {}", as_str(text, message.len() - 1));

    let Ok(Some(text)) = HEAP.resize(Some(text), 16) else {
      fail("resize(16)");
    };
    println!("After resize (shrink): {text:?} content prefix: {}", as_str(text, 5));

    HEAP.release(Some(text));

    // --------------------------------------------------------------------
    // 3) Zero-allocate an array of i32.
    // --------------------------------------------------------------------
    println!("\n--- Testing zero_allocate ---");

    let Ok(Some(array)) = HEAP.zero_allocate(10, size_of::<i32>()) else {
      fail("zero_allocate(10, 4)");
    };
    let arr = array.as_ptr() as *mut i32;

    let all_zero = (0..10).all(|i| *arr.add(i) == 0);
    println!(
      "zero_allocate returned: {array:?} - all_zero: {}",
      if all_zero { "YES" } else { "NO" }
    );

    *arr = 42;
    *arr.add(9) = 99;
    println!("Modified arr[0]={} arr[9]={}", *arr, *arr.add(9));

    HEAP.release(Some(array));

    // --------------------------------------------------------------------
    // 4) Misuse is swallowed.
    // --------------------------------------------------------------------
    println!("\n--- Testing release edge cases ---");

    let before = program_break();
    HEAP.release(None);
    HEAP.release(Some(array));
    println!("release(None) and double release left the break alone? {}", before == program_break());

    println!("allocate aligned? {}", page.as_ptr() as usize % 16 == 0);
    println!("resize aligned? {}", text.as_ptr() as usize % 16 == 0);
    println!("zero_allocate aligned? {}", array.as_ptr() as usize % 16 == 0);

    println!("\nProgram break after all tests: {:?}", program_break());
  }
}

unsafe fn as_str(
  ptr: NonNull<u8>,
  len: usize,
) -> &'static str {
  let bytes = unsafe { std::slice::from_raw_parts(ptr.as_ptr(), len) };
  std::str::from_utf8(bytes).unwrap_or("<invalid utf-8>")
}
