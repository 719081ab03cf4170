//! Sources of arena memory.
//!
//! A [`Grower`] moves the high end of a contiguous region up or down and
//! reports where it was before. The process data segment ([`Sbrk`]) is the
//! canonical one; [`BufferGrower`] carves the same kind of region out of a
//! fixed buffer, which is what the tests run on.

use std::ptr::NonNull;

use libc::{c_void, intptr_t, sbrk};

use crate::align;

/// Moves the boundary of a contiguous memory region.
///
/// # Safety
///
/// When `request(delta)` returns `Some(prev)` for `delta > 0`, the bytes
/// `prev..prev + delta` must be readable and writable, and must stay so
/// until they are given back with a negative delta. `request(0)` must never
/// change the boundary.
pub unsafe trait Grower {
  /// Moves the boundary by `delta` bytes and returns the boundary before the
  /// move, or `None` if the region cannot move that far.
  fn request(
    &mut self,
    delta: isize,
  ) -> Option<NonNull<u8>>;
}

/// The process data segment, moved with `sbrk(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct Sbrk;

impl Sbrk {
  pub const fn new() -> Self {
    Self
  }
}

unsafe impl Grower for Sbrk {
  fn request(
    &mut self,
    delta: isize,
  ) -> Option<NonNull<u8>> {
    let previous = unsafe { sbrk(delta as intptr_t) };

    if previous == usize::MAX as *mut c_void {
      return None;
    }

    NonNull::new(previous as *mut u8)
  }
}

#[derive(Clone, Copy)]
#[repr(C, align(16))]
struct Chunk([u8; align::ALIGNMENT]);

/// A fixed-capacity region backed by an owned buffer.
///
/// The boundary starts at the (16-byte aligned) beginning of the buffer and
/// can move anywhere between the beginning and `capacity`.
pub struct BufferGrower {
  buffer: Box<[Chunk]>,
  brk: usize,
}

impl BufferGrower {
  /// Creates a region able to hold `capacity` bytes, rounded up to 16.
  pub fn with_capacity(capacity: usize) -> Self {
    let chunks = align!(capacity) / align::ALIGNMENT;

    Self {
      buffer: vec![Chunk([0; align::ALIGNMENT]); chunks].into_boxed_slice(),
      brk: 0,
    }
  }

  pub fn capacity(&self) -> usize {
    self.buffer.len() * align::ALIGNMENT
  }

  /// Bytes currently below the boundary.
  pub fn used(&self) -> usize {
    self.brk
  }

  fn base(&mut self) -> *mut u8 {
    self.buffer.as_mut_ptr() as *mut u8
  }
}

unsafe impl Grower for BufferGrower {
  fn request(
    &mut self,
    delta: isize,
  ) -> Option<NonNull<u8>> {
    let brk = self.brk.checked_add_signed(delta)?;

    if brk > self.capacity() {
      return None;
    }

    let previous = self.base().wrapping_add(self.brk);
    self.brk = brk;

    NonNull::new(previous)
  }
}
