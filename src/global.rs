use std::{
  alloc::{GlobalAlloc, Layout},
  ptr::{self, NonNull},
  sync::{Mutex, MutexGuard},
};

use crate::{
  FirstFitAllocator, align, align_to,
  error::Result,
  grower::Sbrk,
  trace::StderrTrace,
};

type Heap = FirstFitAllocator<Sbrk, StderrTrace>;

/// Process allocator over the data segment.
///
/// One [`FirstFitAllocator`] growing the program break with `sbrk(2)` and
/// tracing to stderr when `DEBUG_MALLOC` is set, behind a mutex so it can be
/// installed as the global allocator:
///
/// ```rust,ignore
/// use brkalloc::BrkAlloc;
///
/// #[global_allocator]
/// static HEAP: BrkAlloc = BrkAlloc::new();
/// ```
///
/// Only one `BrkAlloc` may be in use per process, and nothing else may move
/// the program break while it holds memory. If something does, every
/// allocation that needs the arena to grow fails with
/// [`AllocError::ForeignBoundary`](crate::AllocError::ForeignBoundary) and
/// freed tail blocks stay in the arena instead of moving the break back.
/// Free blocks already in the arena are still handed out. Growth works again
/// once the break is back at the end of the arena; an arena that was emptied
/// starts over wherever the break is.
pub struct BrkAlloc {
  heap: Mutex<Heap>,
}

impl BrkAlloc {
  pub const fn new() -> Self {
    Self {
      heap: Mutex::new(FirstFitAllocator::with_tracer(Sbrk::new(), StderrTrace::new())),
    }
  }

  fn heap(&self) -> MutexGuard<'_, Heap> {
    // Nothing panics while holding the lock; recover the heap anyway.
    self.heap.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
  }

  /// See [`FirstFitAllocator::allocate`].
  pub fn allocate(
    &self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    self.heap().allocate(size)
  }

  /// See [`FirstFitAllocator::zero_allocate`].
  pub fn zero_allocate(
    &self,
    count: usize,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    self.heap().zero_allocate(count, size)
  }

  /// See [`FirstFitAllocator::resize`].
  ///
  /// # Safety
  ///
  /// As for [`FirstFitAllocator::resize`].
  pub unsafe fn resize(
    &self,
    ptr: Option<NonNull<u8>>,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    unsafe { self.heap().resize(ptr, size) }
  }

  /// See [`FirstFitAllocator::release`].
  ///
  /// # Safety
  ///
  /// As for [`FirstFitAllocator::release`].
  pub unsafe fn release(
    &self,
    ptr: Option<NonNull<u8>>,
  ) {
    unsafe { self.heap().release(ptr) }
  }

  pub fn usable_size(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    self.heap().usable_size(ptr)
  }

  /// Current program break.
  pub fn boundary(&self) -> Option<NonNull<u8>> {
    self.heap().boundary()
  }

  /// Serves layouts aligned above 16 by asking for enough slack to slide
  /// the pointer forward inside the block; release finds the block by
  /// containment.
  fn allocate_aligned(
    &self,
    layout: Layout,
    zeroed: bool,
  ) -> *mut u8 {
    let Some(padded) = layout.size().checked_add(layout.align() - align::ALIGNMENT) else {
      return ptr::null_mut();
    };

    let result = if zeroed {
      self.zero_allocate(1, padded)
    } else {
      self.allocate(padded)
    };

    match result {
      Ok(Some(ptr)) => {
        let addr = ptr.as_ptr();
        addr.wrapping_add(align_to!(addr as usize, layout.align()) - addr as usize)
      }
      _ => ptr::null_mut(),
    }
  }
}

impl Default for BrkAlloc {
  fn default() -> Self {
    Self::new()
  }
}

fn into_raw(result: Result<Option<NonNull<u8>>>) -> *mut u8 {
  match result {
    Ok(Some(ptr)) => ptr.as_ptr(),
    _ => ptr::null_mut(),
  }
}

unsafe impl GlobalAlloc for BrkAlloc {
  unsafe fn alloc(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() <= align::ALIGNMENT {
      into_raw(self.allocate(layout.size()))
    } else {
      self.allocate_aligned(layout, false)
    }
  }

  unsafe fn alloc_zeroed(
    &self,
    layout: Layout,
  ) -> *mut u8 {
    if layout.align() <= align::ALIGNMENT {
      into_raw(self.zero_allocate(1, layout.size()))
    } else {
      self.allocate_aligned(layout, true)
    }
  }

  unsafe fn dealloc(
    &self,
    ptr: *mut u8,
    _layout: Layout,
  ) {
    unsafe { self.release(NonNull::new(ptr)) }
  }

  unsafe fn realloc(
    &self,
    ptr: *mut u8,
    layout: Layout,
    new_size: usize,
  ) -> *mut u8 {
    if layout.align() <= align::ALIGNMENT {
      return into_raw(unsafe { self.resize(NonNull::new(ptr), new_size) });
    }

    unsafe {
      let new_layout = Layout::from_size_align_unchecked(new_size, layout.align());
      let new = self.alloc(new_layout);

      if !new.is_null() {
        ptr::copy_nonoverlapping(ptr, new, layout.size().min(new_size));
        self.dealloc(ptr, layout);
      }

      new
    }
  }
}
