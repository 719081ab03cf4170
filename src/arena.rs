use std::ptr::NonNull;

use crate::{
  align,
  block::{Block, HEADER_SIZE, Header},
  error::{AllocError, Result},
  grower::Grower,
};

/// The contiguous region handed out by a [`Grower`].
///
/// Blocks are addressed by offset from `base`. The arena only ever grows or
/// shrinks at its high end, and assumes nobody else moves the grower's
/// boundary while it holds memory; growth checks this and refuses to build
/// on a boundary it does not own.
pub(crate) struct Arena<G> {
  grower: G,
  base: Option<NonNull<u8>>,
  pad: usize,
  len: usize,
}

// The arena exclusively owns the memory between `base` and `base + len`.
unsafe impl<G: Send> Send for Arena<G> {}

impl<G> Arena<G> {
  pub const fn new(grower: G) -> Self {
    Self {
      grower,
      base: None,
      pad: 0,
      len: 0,
    }
  }

  pub fn len(&self) -> usize {
    self.len
  }

  pub fn grower(&self) -> &G {
    &self.grower
  }

  fn base_ptr(&self) -> *mut u8 {
    match self.base {
      Some(base) => base.as_ptr(),
      None => std::ptr::null_mut(),
    }
  }

  /// Address of `offset` within the arena.
  pub fn addr(
    &self,
    offset: usize,
  ) -> *mut u8 {
    self.base_ptr().wrapping_add(offset)
  }

  /// Offset of `addr` within the arena, if it lies inside it.
  pub fn offset_of(
    &self,
    addr: *const u8,
  ) -> Option<usize> {
    let base = self.base?.as_ptr() as usize;
    let offset = (addr as usize).checked_sub(base)?;

    (offset < self.len).then_some(offset)
  }

  /// Address of the first payload byte of `block`.
  pub fn payload_ptr(
    &self,
    block: Block,
  ) -> NonNull<u8> {
    debug_assert!(block.payload() <= self.len);
    // SAFETY: blocks only exist inside a non-empty arena, whose base is
    // never null.
    unsafe { NonNull::new_unchecked(self.addr(block.payload())) }
  }

  pub fn header(
    &self,
    block: Block,
  ) -> &Header {
    debug_assert!(block.offset() + HEADER_SIZE <= self.len);
    // SAFETY: the registry only hands out blocks whose header was written by
    // `write_header` and lies inside the arena.
    unsafe { &*(self.addr(block.offset()) as *const Header) }
  }

  pub fn header_mut(
    &mut self,
    block: Block,
  ) -> &mut Header {
    debug_assert!(block.offset() + HEADER_SIZE <= self.len);
    // SAFETY: as in `header`; `&mut self` makes the access exclusive.
    unsafe { &mut *(self.addr(block.offset()) as *mut Header) }
  }

  /// Places a fresh header at `block`.
  pub fn write_header(
    &mut self,
    block: Block,
    header: Header,
  ) {
    debug_assert!(block.offset() + HEADER_SIZE <= self.len);
    // SAFETY: the offset is inside the arena and 16-byte aligned.
    unsafe { (self.addr(block.offset()) as *mut Header).write(header) }
  }
}

impl<G: Grower> Arena<G> {
  /// Current boundary of the underlying region.
  pub fn boundary(&mut self) -> Option<NonNull<u8>> {
    self.grower.request(0)
  }

  /// Extends the arena by `bytes` and returns the offset of the new span.
  pub fn grow(
    &mut self,
    bytes: usize,
  ) -> Result<usize> {
    let out_of_memory = AllocError::OutOfMemory { requested: bytes };

    let (expected, pad) = match self.base {
      Some(_) => (self.addr(self.len), 0),
      None => {
        let current = self.grower.request(0).ok_or(out_of_memory)?.as_ptr();
        let aligned = align!(current as usize);
        (aligned as *mut u8, aligned - current as usize)
      }
    };

    let total = bytes.checked_add(pad).ok_or(out_of_memory)?;
    let delta = isize::try_from(total).map_err(|_| out_of_memory)?;
    let previous = self.grower.request(delta).ok_or(out_of_memory)?;

    if previous.as_ptr().wrapping_add(pad) != expected {
      // The boundary moved under us; give the span straight back.
      let returned = self.grower.request(-delta);
      debug_assert!(returned.is_some(), "grower refused to take back the span it just handed out");
      return Err(AllocError::ForeignBoundary { requested: bytes });
    }

    if self.base.is_none() {
      self.base = NonNull::new(expected);
      self.pad = pad;
    }

    let offset = self.len;
    self.len += bytes;
    Ok(offset)
  }

  /// Gives the top `bytes` of the arena back to the grower. Returns `false`
  /// and keeps the arena intact if the grower refuses, or if the boundary no
  /// longer sits at the end of the arena.
  pub fn shrink(
    &mut self,
    bytes: usize,
  ) -> bool {
    debug_assert!(bytes <= self.len);

    if self.base.is_none() || self.boundary().map(NonNull::as_ptr) != Some(self.addr(self.len)) {
      return false;
    }

    let emptied = bytes == self.len;
    let total = if emptied { bytes + self.pad } else { bytes };

    let Ok(delta) = isize::try_from(total) else {
      return false;
    };

    if self.grower.request(-delta).is_none() {
      return false;
    }

    self.len -= bytes;

    if emptied {
      self.base = None;
      self.pad = 0;
    }

    true
  }
}
