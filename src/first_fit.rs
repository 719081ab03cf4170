use std::ptr::{self, NonNull};

use crate::{
  align,
  arena::Arena,
  block::{Block, BlockInfo, HEADER_SIZE, Header},
  error::{AllocError, Result},
  grower::Grower,
  registry::Registry,
  trace::{NoTrace, TraceEvent, TraceSink},
};

/// First-fit allocator over a single growable arena.
///
/// Free blocks are found by walking every block in address order and taking
/// the first one that is large enough. Oversized blocks are split, adjacent
/// free blocks are always coalesced, and a free block at the end of the
/// arena is handed back to the [`Grower`].
///
/// The allocator is not synchronized; `&mut self` is the only lock. Wrap it
/// in a mutex (as [`BrkAlloc`](crate::BrkAlloc) does) to share it.
pub struct FirstFitAllocator<G, T = NoTrace> {
  arena: Arena<G>,
  registry: Registry,
  tracer: T,
}

impl<G> FirstFitAllocator<G, NoTrace> {
  /// Creates an empty allocator that does not trace.
  pub const fn new(grower: G) -> Self {
    Self::with_tracer(grower, NoTrace)
  }
}

impl<G, T> FirstFitAllocator<G, T> {
  /// Creates an empty allocator reporting every call to `tracer`.
  pub const fn with_tracer(
    grower: G,
    tracer: T,
  ) -> Self {
    Self {
      arena: Arena::new(grower),
      registry: Registry::new(),
      tracer,
    }
  }

  pub fn grower(&self) -> &G {
    self.arena.grower()
  }

  pub fn tracer(&self) -> &T {
    &self.tracer
  }

  /// Bytes currently taken from the grower, headers included.
  pub fn arena_len(&self) -> usize {
    self.arena.len()
  }

  /// Every block in address order.
  pub fn blocks(&self) -> impl Iterator<Item = BlockInfo> + '_ {
    self.registry.iter(&self.arena).map(|block| {
      let header = self.arena.header(block);
      BlockInfo {
        addr: self.arena.payload_ptr(block).as_ptr(),
        size: header.size,
        free: header.is_free,
      }
    })
  }

  /// Bytes usable from `ptr` to the end of the block that contains it, or
  /// `None` if `ptr` is not inside a block.
  pub fn usable_size(
    &self,
    ptr: *const u8,
  ) -> Option<usize> {
    let (_, block) = self.registry.find_owning_block(&self.arena, ptr)?;
    let end = self.arena.addr(block.end(self.arena.header(block).size));
    Some(end as usize - ptr as usize)
  }
}

impl<G: Grower, T: TraceSink> FirstFitAllocator<G, T> {
  /// Current boundary of the grower's region.
  pub fn boundary(&mut self) -> Option<NonNull<u8>> {
    self.arena.boundary()
  }

  /// Allocates at least `size` bytes, aligned to 16.
  ///
  /// Returns `Ok(None)` for a zero `size`.
  pub fn allocate(
    &mut self,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    let result = self.allocate_block(size);

    if self.tracer.enabled() {
      let (ptr, block_size) = self.describe(&result);
      self.tracer.record(&TraceEvent::Allocate {
        requested: size,
        ptr,
        size: block_size,
      });
    }

    Ok(result?.map(|block| self.arena.payload_ptr(block)))
  }

  /// Allocates room for `count` elements of `size` bytes, all zeroed.
  ///
  /// Returns `Ok(None)` when the product is zero.
  pub fn zero_allocate(
    &mut self,
    count: usize,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    let result = count
      .checked_mul(size)
      .ok_or(AllocError::Overflow { count, size })
      .and_then(|total| self.allocate_block(total));

    if let Ok(Some(block)) = result {
      let payload = self.arena.payload_ptr(block);
      let size = self.arena.header(block).size;
      unsafe { ptr::write_bytes(payload.as_ptr(), 0, size) };
    }

    if self.tracer.enabled() {
      let (ptr, block_size) = self.describe(&result);
      self.tracer.record(&TraceEvent::ZeroAllocate {
        count,
        elem_size: size,
        ptr,
        size: block_size,
      });
    }

    Ok(result?.map(|block| self.arena.payload_ptr(block)))
  }

  /// Resizes the allocation holding `ptr` to `size` bytes, in place when
  /// possible.
  ///
  /// A `None` pointer allocates, a zero `size` releases and returns
  /// `Ok(None)`, and a pointer this allocator does not know is treated as
  /// `None`. When the allocation has to move, the first `min(old, size)`
  /// bytes are copied and the old block is released; if the move fails the
  /// old pointer stays valid.
  ///
  /// # Safety
  ///
  /// If the allocation moves, `ptr` must no longer be used.
  pub unsafe fn resize(
    &mut self,
    ptr: Option<NonNull<u8>>,
    size: usize,
  ) -> Result<Option<NonNull<u8>>> {
    let Some(old) = ptr else {
      return self.allocate(size);
    };

    if size == 0 {
      unsafe { self.release(Some(old)) };
      return Ok(None);
    }

    let Some((_, block)) = self.registry.find_owning_block(&self.arena, old.as_ptr()) else {
      return self.allocate(size);
    };

    let result = unsafe { self.resize_block(block, old, size) };

    if self.tracer.enabled() {
      let (ptr, block_size) = match result {
        Ok(new) => (
          new.as_ptr() as *const u8,
          self.usable_size(new.as_ptr()).unwrap_or(0),
        ),
        Err(_) => (ptr::null(), 0),
      };
      self.tracer.record(&TraceEvent::Resize {
        old: old.as_ptr(),
        requested: size,
        ptr,
        size: block_size,
      });
    }

    result.map(Some)
  }

  /// Releases the allocation containing `ptr`.
  ///
  /// `None`, unknown pointers, and pointers into blocks that are already
  /// free are ignored.
  ///
  /// # Safety
  ///
  /// The allocation must not be used afterwards.
  pub unsafe fn release(
    &mut self,
    ptr: Option<NonNull<u8>>,
  ) {
    if self.tracer.enabled() {
      self.tracer.record(&TraceEvent::Release {
        ptr: ptr.map_or(ptr::null(), |ptr| ptr.as_ptr() as *const u8),
      });
    }

    let Some(ptr) = ptr else {
      return;
    };

    let Some((previous, block)) = self.registry.find_owning_block(&self.arena, ptr.as_ptr()) else {
      return;
    };

    if self.arena.header(block).is_free {
      return;
    }

    self.arena.header_mut(block).is_free = true;
    self.settle(previous, block);
  }

  fn describe(
    &self,
    result: &Result<Option<Block>>,
  ) -> (*const u8, usize) {
    match result {
      Ok(Some(block)) => (
        self.arena.payload_ptr(*block).as_ptr(),
        self.arena.header(*block).size,
      ),
      _ => (ptr::null(), 0),
    }
  }

  fn allocate_block(
    &mut self,
    size: usize,
  ) -> Result<Option<Block>> {
    if size == 0 {
      return Ok(None);
    }

    let aligned = align::checked_align(size).ok_or(AllocError::OutOfMemory { requested: size })?;

    if let Some(block) = self.registry.find_free_block(&self.arena, aligned) {
      self.arena.header_mut(block).is_free = false;
      self.split(block, aligned);
      return Ok(Some(block));
    }

    let total = aligned
      .checked_add(HEADER_SIZE)
      .ok_or(AllocError::OutOfMemory { requested: size })?;

    let block = Block::at(self.arena.grow(total)?);
    self.arena.write_header(block, Header::new(aligned, false, None));
    self.registry.append(&mut self.arena, block);

    Ok(Some(block))
  }

  /// Sizes are measured from `old`, which may lie past the payload start of
  /// `block`.
  unsafe fn resize_block(
    &mut self,
    block: Block,
    old: NonNull<u8>,
    size: usize,
  ) -> Result<NonNull<u8>> {
    let lead = old.as_ptr() as usize - self.arena.payload_ptr(block).as_ptr() as usize;
    let out_of_memory = AllocError::OutOfMemory { requested: size };
    let needed = lead.checked_add(size).ok_or(out_of_memory)?;
    let aligned = align::checked_align(needed).ok_or(out_of_memory)?;

    let current = self.arena.header(block).size;

    if current >= aligned {
      self.shrink_in_place(block, aligned);
      return Ok(old);
    }

    if let Some(next) = self.arena.header(block).next {
      let next = self.arena.header(next);

      if next.is_free && current + HEADER_SIZE + next.size >= aligned {
        self.registry.absorb_next(&mut self.arena, block);
        self.shrink_in_place(block, aligned);
        return Ok(old);
      }
    }

    let Some(new) = self.allocate_block(size)? else {
      return Err(out_of_memory);
    };

    let new = self.arena.payload_ptr(new);
    let copy = (current - lead).min(size);
    unsafe { ptr::copy_nonoverlapping(old.as_ptr(), new.as_ptr(), copy) };

    self.arena.header_mut(block).is_free = true;
    let previous = self.predecessor(block);
    self.settle(previous, block);

    Ok(new)
  }

  /// Splits `block` down to `aligned` bytes and frees what was cut off.
  fn shrink_in_place(
    &mut self,
    block: Block,
    aligned: usize,
  ) {
    if let Some(remainder) = self.split(block, aligned) {
      self.settle(Some(block), remainder);
    }
  }

  /// Carves a free block off the end of `block` when what is left over past
  /// `aligned` bytes can hold a header and a minimal payload.
  fn split(
    &mut self,
    block: Block,
    aligned: usize,
  ) -> Option<Block> {
    let size = self.arena.header(block).size;

    if size - aligned < HEADER_SIZE + align::ALIGNMENT {
      return None;
    }

    let remainder = Block::at(block.end(aligned));
    self.arena.write_header(remainder, Header::new(size - aligned - HEADER_SIZE, true, None));
    self.arena.header_mut(block).size = aligned;
    self.registry.insert_after(&mut self.arena, block, remainder);

    Some(remainder)
  }

  fn predecessor(
    &self,
    block: Block,
  ) -> Option<Block> {
    self.registry.iter(&self.arena).find(|&current| self.arena.header(current).next == Some(block))
  }

  /// Restores the invariants around `block`, which was just marked free:
  /// merges it with free neighbours on both sides and returns the result to
  /// the grower if it ends the arena.
  fn settle(
    &mut self,
    previous: Option<Block>,
    block: Block,
  ) {
    let mut block = block;
    self.coalesce_forward(block);

    if let Some(previous) = previous {
      if self.arena.header(previous).is_free {
        self.registry.absorb_next(&mut self.arena, previous);
        block = previous;
        self.coalesce_forward(block);
      }
    }

    if self.registry.last() != Some(block) {
      return;
    }

    let footprint = HEADER_SIZE + self.arena.header(block).size;

    if self.arena.shrink(footprint) {
      self.registry.unlink_tail(&mut self.arena, block);
    }

    debug_assert_eq!(self.registry.is_empty(), self.arena.len() == 0);
  }

  fn coalesce_forward(
    &mut self,
    block: Block,
  ) {
    while let Some(next) = self.arena.header(block).next {
      if !self.arena.header(next).is_free {
        break;
      }
      self.registry.absorb_next(&mut self.arena, block);
    }
  }
}

#[cfg(test)]
mod tests {
  use std::cell::RefCell;

  use super::*;
  use crate::grower::BufferGrower;

  fn allocator(capacity: usize) -> FirstFitAllocator<BufferGrower> {
    FirstFitAllocator::new(BufferGrower::with_capacity(capacity))
  }

  fn layout<G, T>(allocator: &FirstFitAllocator<G, T>) -> Vec<(usize, bool)> {
    allocator.blocks().map(|info| (info.size, info.free)).collect()
  }

  fn assert_no_adjacent_free<G, T>(allocator: &FirstFitAllocator<G, T>) {
    let blocks = layout(allocator);
    for pair in blocks.windows(2) {
      assert!(!(pair[0].1 && pair[1].1), "adjacent free blocks: {blocks:?}");
    }
  }

  #[test]
  fn test_alloc() {
    let mut allocator = allocator(4096);

    unsafe {
      let first_addr = allocator.allocate(size_of::<u64>()).unwrap().unwrap().as_ptr() as *mut u64;

      *first_addr = 3u64;

      assert_eq!(*first_addr, 3);

      let size: usize = 6;

      let second_addr = allocator
        .allocate(size_of::<u16>() * size)
        .unwrap()
        .unwrap()
        .as_ptr() as *mut u16;

      for i in 0..size {
        *(second_addr.add(i)) = (i + 1) as u16;
      }

      assert_eq!(*first_addr, 3);

      for i in 0..size {
        assert_eq!((i + 1) as u16, *(second_addr.add(i)))
      }

      allocator.release(NonNull::new(first_addr as *mut u8));

      let third_addr = allocator.allocate(size_of::<u32>()).unwrap().unwrap().as_ptr() as *mut u32;

      assert_eq!(first_addr as *mut u32, third_addr);

      allocator.release(NonNull::new(third_addr as *mut u8));

      let fourth_addr = allocator.allocate(size_of::<u128>()).unwrap().unwrap().as_ptr() as *mut u128;

      *fourth_addr = 25;

      assert_eq!(fourth_addr as *mut u8, third_addr as *mut u8);

      assert_eq!(*fourth_addr, 25);
    }
  }

  #[test]
  fn test_zero_size_is_none() {
    let mut allocator = allocator(256);

    assert_eq!(Ok(None), allocator.allocate(0));
    assert_eq!(Ok(None), allocator.zero_allocate(0, 8));
    assert_eq!(Ok(None), allocator.zero_allocate(8, 0));
    assert_eq!(0, allocator.arena_len());
  }

  #[test]
  fn test_allocations_are_aligned_and_rounded() {
    let mut allocator = allocator(4096);

    for size in [1, 15, 16, 17, 100] {
      let ptr = allocator.allocate(size).unwrap().unwrap();
      assert_eq!(0, ptr.as_ptr() as usize % align::ALIGNMENT);
      assert_eq!(Some(align!(size)), allocator.usable_size(ptr.as_ptr()));
    }
  }

  #[test]
  fn test_release_tail_shrinks_arena() {
    let mut allocator = allocator(8192);
    let before = allocator.boundary().unwrap();

    let ptr = allocator.allocate(4096).unwrap().unwrap();
    assert_eq!(HEADER_SIZE + 4096, allocator.arena_len());

    unsafe {
      ptr::write_bytes(ptr.as_ptr(), b'A', 10);
      allocator.release(Some(ptr));
    }

    assert_eq!(0, allocator.arena_len());
    assert_eq!(before, allocator.boundary().unwrap());
    assert_eq!(0, allocator.blocks().count());
  }

  #[test]
  fn test_release_coalesces_both_sides() {
    let mut allocator = allocator(4096);

    let a = allocator.allocate(32).unwrap();
    let b = allocator.allocate(32).unwrap();
    let c = allocator.allocate(32).unwrap();
    let _d = allocator.allocate(32).unwrap();

    unsafe {
      allocator.release(a);
      allocator.release(c);
      assert_eq!(vec![(32, true), (32, false), (32, true), (32, false)], layout(&allocator));

      allocator.release(b);
    }

    let merged = 3 * 32 + 2 * HEADER_SIZE;
    assert_eq!(vec![(merged, true), (32, false)], layout(&allocator));
    assert_no_adjacent_free(&allocator);
  }

  #[test]
  fn test_release_tail_after_backward_merge_gives_everything_back() {
    let mut allocator = allocator(4096);

    let a = allocator.allocate(64).unwrap();
    let b = allocator.allocate(64).unwrap();

    unsafe {
      allocator.release(a);
      allocator.release(b);
    }

    assert_eq!(0, allocator.arena_len());
    assert_eq!(0, allocator.grower().used());
  }

  #[test]
  fn test_split_on_reuse() {
    let mut allocator = allocator(4096);

    let big = allocator.allocate(256).unwrap();
    let _guard = allocator.allocate(16).unwrap();
    unsafe { allocator.release(big) };

    let small = allocator.allocate(32).unwrap();
    assert_eq!(big, small);
    assert_eq!(
      vec![(32, false), (256 - 32 - HEADER_SIZE, true), (16, false)],
      layout(&allocator)
    );
  }

  #[test]
  fn test_no_split_when_remainder_too_small() {
    let mut allocator = allocator(4096);

    let block = allocator.allocate(HEADER_SIZE + 32).unwrap();
    let _guard = allocator.allocate(16).unwrap();
    unsafe { allocator.release(block) };

    // Leftover would be exactly one header with a 16-byte payload: splits.
    let reused = allocator.allocate(16).unwrap();
    assert_eq!(block, reused);
    assert_eq!(vec![(16, false), (16, true), (16, false)], layout(&allocator));

    unsafe { allocator.release(reused) };

    // Leftover would be a header with no room for a payload: kept whole.
    let reused = allocator.allocate(32).unwrap();
    assert_eq!(block, reused);
    assert_eq!(vec![(HEADER_SIZE + 32, false), (16, false)], layout(&allocator));
  }

  #[test]
  fn test_double_release_and_unknown_pointers_are_ignored() {
    let mut allocator = allocator(4096);

    let a = allocator.allocate(32).unwrap();
    let _b = allocator.allocate(32).unwrap();
    let mut outside = 0u8;

    unsafe {
      allocator.release(a);
      let before = (layout(&allocator), allocator.boundary());

      allocator.release(a);
      allocator.release(None);
      allocator.release(NonNull::new(&mut outside as *mut u8));

      assert_eq!(before, (layout(&allocator), allocator.boundary()));
    }
  }

  #[test]
  fn test_interior_pointer_releases_owner() {
    let mut allocator = allocator(4096);

    let a = allocator.allocate(64).unwrap().unwrap();
    let _b = allocator.allocate(64).unwrap();

    unsafe { allocator.release(NonNull::new(a.as_ptr().add(40))) };

    assert_eq!(vec![(64, true), (64, false)], layout(&allocator));
  }

  #[test]
  fn test_out_of_memory() {
    let mut allocator = allocator(256);

    let a = allocator.allocate(128).unwrap();
    assert!(a.is_some());

    assert_eq!(
      Err(AllocError::OutOfMemory {
        requested: HEADER_SIZE + 256
      }),
      allocator.allocate(256)
    );
    assert_eq!(
      Err(AllocError::OutOfMemory { requested: usize::MAX }),
      allocator.allocate(usize::MAX)
    );
    assert_eq!(vec![(128, false)], layout(&allocator));
  }

  #[test]
  fn test_zero_allocate() {
    let mut allocator = allocator(4096);

    // Leave garbage behind, then reuse it.
    let dirty = allocator.allocate(64).unwrap().unwrap();
    let _guard = allocator.allocate(16).unwrap();
    unsafe {
      ptr::write_bytes(dirty.as_ptr(), 0xAB, 64);
      allocator.release(Some(dirty));
    }

    let array = allocator.zero_allocate(10, size_of::<i32>()).unwrap().unwrap();
    assert_eq!(dirty, array);

    let array = array.as_ptr() as *mut i32;
    unsafe {
      for i in 0..10 {
        assert_eq!(0, *array.add(i));
      }

      *array = 42;
      *array.add(9) = 99;

      assert_eq!(42, *array);
      assert_eq!(99, *array.add(9));
      for i in 1..9 {
        assert_eq!(0, *array.add(i));
      }
    }
  }

  #[test]
  fn test_zero_allocate_overflow() {
    let mut allocator = allocator(256);

    assert_eq!(
      Err(AllocError::Overflow {
        count: usize::MAX,
        size: 2
      }),
      allocator.zero_allocate(usize::MAX, 2)
    );
    assert_eq!(0, allocator.arena_len());
  }

  #[test]
  fn test_resize_grow_and_shrink_keeps_content() {
    let mut allocator = allocator(4096);
    let message = b"Hello custom realloc!";

    unsafe {
      let ptr = allocator.allocate(32).unwrap().unwrap();
      ptr::copy_nonoverlapping(message.as_ptr(), ptr.as_ptr(), message.len());

      let grown = allocator.resize(Some(ptr), 128).unwrap().unwrap();
      assert_eq!(message, std::slice::from_raw_parts(grown.as_ptr(), message.len()));

      let shrunk = allocator.resize(Some(grown), 16).unwrap().unwrap();
      assert_eq!(grown, shrunk);
      assert_eq!(b"Hello", std::slice::from_raw_parts(shrunk.as_ptr(), 5));

      allocator.release(Some(shrunk));
    }

    assert_eq!(0, allocator.arena_len());
  }

  #[test]
  fn test_resize_shrink_coalesces_remainder() {
    let mut allocator = allocator(4096);

    let a = allocator.allocate(128).unwrap();
    let b = allocator.allocate(64).unwrap();
    let _c = allocator.allocate(16).unwrap();

    unsafe {
      allocator.release(b);
      let shrunk = allocator.resize(a, 16).unwrap();
      assert_eq!(a, shrunk);
    }

    let freed = (128 - 16 - HEADER_SIZE) + HEADER_SIZE + 64;
    assert_eq!(vec![(16, false), (freed, true), (16, false)], layout(&allocator));
    assert_no_adjacent_free(&allocator);
  }

  #[test]
  fn test_resize_grows_into_free_successor() {
    let mut allocator = allocator(4096);

    let a = allocator.allocate(32).unwrap();
    let b = allocator.allocate(256).unwrap();
    let _c = allocator.allocate(16).unwrap();

    unsafe {
      allocator.release(b);
      let grown = allocator.resize(a, 64).unwrap();
      assert_eq!(a, grown);
    }

    let rest = 32 + HEADER_SIZE + 256 - 64 - HEADER_SIZE;
    assert_eq!(vec![(64, false), (rest, true), (16, false)], layout(&allocator));
  }

  #[test]
  fn test_resize_moves_when_blocked() {
    let mut allocator = allocator(4096);

    let a = allocator.allocate(32).unwrap().unwrap();
    let _b = allocator.allocate(32).unwrap();

    unsafe {
      ptr::write_bytes(a.as_ptr(), 7, 32);

      let moved = allocator.resize(Some(a), 100).unwrap().unwrap();
      assert_ne!(a, moved);
      assert!(std::slice::from_raw_parts(moved.as_ptr(), 32).iter().all(|&byte| byte == 7));
    }

    assert_eq!(vec![(32, true), (32, false), (112, false)], layout(&allocator));
  }

  #[test]
  fn test_resize_failure_keeps_original() {
    let mut allocator = allocator(256);

    unsafe {
      let a = allocator.allocate(32).unwrap().unwrap();
      ptr::write_bytes(a.as_ptr(), 9, 32);

      assert!(allocator.resize(Some(a), 1024).is_err());
      assert_eq!(vec![(32, false)], layout(&allocator));
      assert!(std::slice::from_raw_parts(a.as_ptr(), 32).iter().all(|&byte| byte == 9));
    }
  }

  #[test]
  fn test_resize_edge_cases() {
    let mut allocator = allocator(4096);
    let mut outside = 0u8;

    unsafe {
      let fresh = allocator.resize(None, 24).unwrap();
      assert!(fresh.is_some());
      assert_eq!(vec![(32, false)], layout(&allocator));

      let foreign = allocator.resize(NonNull::new(&mut outside as *mut u8), 16).unwrap();
      assert!(foreign.is_some());
      assert_eq!(2, allocator.blocks().count());

      assert_eq!(Ok(None), allocator.resize(foreign, 0));
      assert_eq!(vec![(32, false)], layout(&allocator));
    }
  }

  #[test]
  fn test_resize_from_interior_pointer() {
    let mut allocator = allocator(4096);

    unsafe {
      let base = allocator.allocate(160).unwrap().unwrap();
      let interior = NonNull::new_unchecked(base.as_ptr().add(32));

      // 32 lead bytes + 48 requested: the block is cut down to 80 bytes.
      let same = allocator.resize(Some(interior), 48).unwrap().unwrap();
      assert_eq!(interior, same);
      assert_eq!(Some(48), allocator.usable_size(same.as_ptr()));
    }

    assert_eq!(vec![(80, false)], layout(&allocator));
    assert_eq!(HEADER_SIZE + 80, allocator.arena_len());
  }

  /// Hands out space but never takes any back.
  struct NoShrink(BufferGrower);

  unsafe impl Grower for NoShrink {
    fn request(
      &mut self,
      delta: isize,
    ) -> Option<NonNull<u8>> {
      if delta < 0 {
        return None;
      }

      self.0.request(delta)
    }
  }

  #[test]
  fn test_free_tail_stays_when_shrink_is_refused() {
    let mut allocator = FirstFitAllocator::new(NoShrink(BufferGrower::with_capacity(4096)));

    let x = allocator.allocate(96).unwrap();
    let y = allocator.allocate(32).unwrap();
    let len = allocator.arena_len();
    assert_eq!(2 * HEADER_SIZE + 96 + 32, len);

    unsafe {
      allocator.release(y);
      assert_eq!(vec![(96, false), (32, true)], layout(&allocator));

      allocator.release(x);
    }

    let merged = 96 + HEADER_SIZE + 32;
    assert_eq!(vec![(merged, true)], layout(&allocator));
    assert_eq!(len, allocator.arena_len());

    // The stranded tail is reused and split like any other free block.
    let reused = allocator.allocate(100).unwrap();
    assert_eq!(x, reused);
    assert_eq!(
      vec![(112, false), (merged - 112 - HEADER_SIZE, true)],
      layout(&allocator)
    );
    assert_eq!(len, allocator.arena_len());

    unsafe { allocator.release(reused) };
    assert_eq!(vec![(merged, true)], layout(&allocator));
    assert_eq!(len, allocator.arena_len());
  }

  #[derive(Default)]
  struct Recorder {
    lines: RefCell<Vec<String>>,
  }

  impl TraceSink for Recorder {
    fn record(
      &self,
      event: &TraceEvent,
    ) {
      self.lines.borrow_mut().push(event.to_string());
    }
  }

  #[test]
  fn test_every_call_is_traced_once() {
    let mut allocator = FirstFitAllocator::with_tracer(BufferGrower::with_capacity(4096), Recorder::default());

    unsafe {
      let a = allocator.allocate(10).unwrap();
      let b = allocator.resize(a, 100).unwrap();
      let c = allocator.zero_allocate(2, 8).unwrap();
      allocator.release(b);
      allocator.release(c);
      allocator.release(None);
    }

    let lines = allocator.tracer().lines.borrow();
    assert_eq!(6, lines.len());
    assert!(lines[0].starts_with("malloc(10) => (ptr=0x"));
    assert!(lines[0].ends_with(", size=16)"));
    assert!(lines[1].starts_with("realloc(0x"));
    assert!(lines[1].ends_with(", size=112)"));
    assert!(lines[2].starts_with("calloc(2,8) => (ptr=0x"));
    assert!(lines[3].starts_with("free(0x"));
    assert_eq!("free(0x0)", lines[5]);
  }
}
