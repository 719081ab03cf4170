//! `malloc`, `calloc`, `realloc` and `free` with the C ABI.
//!
//! Built with the `malloc-override` feature, the crate's `cdylib` replaces
//! the platform allocator of any program linked against it (or started with
//! it in `LD_PRELOAD`). All four share one [`BrkAlloc`].

use std::ptr::{self, NonNull};

use libc::{c_int, c_void, size_t};

use crate::{BrkAlloc, error::Result};

static HEAP: BrkAlloc = BrkAlloc::new();

fn set_errno(value: c_int) {
  #[cfg(any(target_os = "linux", target_os = "emscripten"))]
  unsafe {
    *libc::__errno_location() = value;
  }
  #[cfg(any(target_os = "macos", target_os = "ios", target_os = "freebsd"))]
  unsafe {
    *libc::__error() = value;
  }
  #[cfg(target_os = "android")]
  unsafe {
    *libc::__errno() = value;
  }
}

fn into_c(result: Result<Option<NonNull<u8>>>) -> *mut c_void {
  match result {
    Ok(Some(ptr)) => ptr.as_ptr() as *mut c_void,
    Ok(None) => ptr::null_mut(),
    Err(error) => {
      set_errno(error.errno());
      ptr::null_mut()
    }
  }
}

#[unsafe(no_mangle)]
pub extern "C" fn malloc(size: size_t) -> *mut c_void {
  into_c(HEAP.allocate(size))
}

#[unsafe(no_mangle)]
pub extern "C" fn calloc(
  count: size_t,
  size: size_t,
) -> *mut c_void {
  into_c(HEAP.zero_allocate(count, size))
}

/// # Safety
///
/// `ptr` must be null or come from this allocator, and must not be used
/// after a successful move.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn realloc(
  ptr: *mut c_void,
  size: size_t,
) -> *mut c_void {
  into_c(unsafe { HEAP.resize(NonNull::new(ptr as *mut u8), size) })
}

/// # Safety
///
/// `ptr` must be null or come from this allocator, and must not be used
/// afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn free(ptr: *mut c_void) {
  unsafe { HEAP.release(NonNull::new(ptr as *mut u8)) }
}

#[unsafe(no_mangle)]
pub extern "C" fn malloc_usable_size(ptr: *mut c_void) -> size_t {
  HEAP.usable_size(ptr as *const u8).unwrap_or(0)
}
