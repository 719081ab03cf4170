use crate::{
  arena::Arena,
  block::{Block, HEADER_SIZE},
};

/// Address-ordered list of every block carved from the arena.
///
/// The links themselves live in the block headers inside the arena, so
/// every operation borrows the [`Arena`] that holds them.
pub(crate) struct Registry {
  first: Option<Block>,
  last: Option<Block>,
}

impl Registry {
  pub const fn new() -> Self {
    Self {
      first: None,
      last: None,
    }
  }

  pub fn is_empty(&self) -> bool {
    self.first.is_none()
  }

  pub fn last(&self) -> Option<Block> {
    self.last
  }

  pub fn iter<'a, G>(
    &self,
    arena: &'a Arena<G>,
  ) -> Blocks<'a, G> {
    Blocks {
      arena,
      current: self.first,
    }
  }

  /// First free block, in address order, holding at least `size` bytes.
  pub fn find_free_block<G>(
    &self,
    arena: &Arena<G>,
    size: usize,
  ) -> Option<Block> {
    self.iter(arena).find(|&block| {
      let header = arena.header(block);
      header.is_free && header.size >= size
    })
  }

  /// The block whose payload contains `addr`, together with its
  /// predecessor.
  ///
  /// Containment rather than equality with the payload start: a caller may
  /// hold any address inside a block it was given.
  pub fn find_owning_block<G>(
    &self,
    arena: &Arena<G>,
    addr: *const u8,
  ) -> Option<(Option<Block>, Block)> {
    let offset = arena.offset_of(addr)?;
    let mut previous = None;

    for block in self.iter(arena) {
      let size = arena.header(block).size;

      if offset < block.payload() {
        // Inside this block's header, which no caller was ever given.
        return None;
      }
      if offset < block.end(size) {
        return Some((previous, block));
      }

      previous = Some(block);
    }

    None
  }

  pub fn append<G>(
    &mut self,
    arena: &mut Arena<G>,
    block: Block,
  ) {
    debug_assert!(arena.header(block).next.is_none());

    match self.last {
      Some(last) => arena.header_mut(last).next = Some(block),
      None => self.first = Some(block),
    }

    self.last = Some(block);
  }

  /// Removes `block`, which must be the tail.
  pub fn unlink_tail<G>(
    &mut self,
    arena: &mut Arena<G>,
    block: Block,
  ) {
    debug_assert_eq!(Some(block), self.last);

    if self.first == Some(block) {
      self.first = None;
      self.last = None;
      return;
    }

    let previous = self.iter(arena).find(|&current| arena.header(current).next == Some(block));

    if let Some(previous) = previous {
      arena.header_mut(previous).next = None;
      self.last = Some(previous);
    }
  }

  /// Links `new`, whose header is already written, directly after `block`.
  pub fn insert_after<G>(
    &mut self,
    arena: &mut Arena<G>,
    block: Block,
    new: Block,
  ) {
    let next = arena.header(block).next;
    arena.header_mut(new).next = next;
    arena.header_mut(block).next = Some(new);

    if self.last == Some(block) {
      self.last = Some(new);
    }
  }

  /// Merges the successor of `block` into it. Returns `false` if there is
  /// no successor.
  pub fn absorb_next<G>(
    &mut self,
    arena: &mut Arena<G>,
    block: Block,
  ) -> bool {
    let Some(next) = arena.header(block).next else {
      return false;
    };

    let (next_size, next_next) = {
      let header = arena.header(next);
      (header.size, header.next)
    };

    let header = arena.header_mut(block);
    header.size += HEADER_SIZE + next_size;
    header.next = next_next;

    if self.last == Some(next) {
      self.last = Some(block);
    }

    true
  }
}

/// Iterator over the blocks of a [`Registry`] in address order.
pub(crate) struct Blocks<'a, G> {
  arena: &'a Arena<G>,
  current: Option<Block>,
}

impl<G> Iterator for Blocks<'_, G> {
  type Item = Block;

  fn next(&mut self) -> Option<Block> {
    let block = self.current?;
    self.current = self.arena.header(block).next;
    Some(block)
  }
}
