use std::mem;

use crate::align;

/// Metadata stored in the arena in front of every payload.
#[repr(C)]
pub(crate) struct Header {
  pub size: usize,
  pub next: Option<Block>,
  pub is_free: bool,
}

impl Header {
  pub fn new(
    size: usize,
    is_free: bool,
    next: Option<Block>,
  ) -> Self {
    Self {
      size,
      next,
      is_free,
    }
  }
}

/// Bytes between a block's start and its payload.
pub const HEADER_SIZE: usize = align!(mem::size_of::<Header>());

/// A view onto one block: where its header starts, as an offset from the
/// arena base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Block {
  offset: usize,
}

impl Block {
  pub fn at(offset: usize) -> Self {
    debug_assert_eq!(0, offset % align::ALIGNMENT);
    Self { offset }
  }

  pub fn offset(self) -> usize {
    self.offset
  }

  /// Arena offset of the first payload byte.
  pub fn payload(self) -> usize {
    self.offset + HEADER_SIZE
  }

  /// Arena offset of the block that directly follows one of `size` payload
  /// bytes.
  pub fn end(
    self,
    size: usize,
  ) -> usize {
    self.payload() + size
  }
}

/// Public snapshot of one block, as reported by
/// [`FirstFitAllocator::blocks`](crate::FirstFitAllocator::blocks).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlockInfo {
  /// First payload byte.
  pub addr: *const u8,
  pub size: usize,
  pub free: bool,
}

impl BlockInfo {
  /// One past the last payload byte.
  pub fn end(&self) -> *const u8 {
    self.addr.wrapping_add(self.size)
  }
}
