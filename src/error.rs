use libc::c_int;
use thiserror::Error;

/// Reasons an allocation can fail. Every variant is an out-of-memory
/// condition from the caller's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AllocError {
  #[error("out of memory (requested: {requested} bytes)")]
  OutOfMemory { requested: usize },

  #[error("data segment boundary moved by a foreign caller (requested: {requested} bytes)")]
  ForeignBoundary { requested: usize },

  #[error("{count} elements of {size} bytes overflow the address space")]
  Overflow { count: usize, size: usize },
}

impl AllocError {
  /// The `errno` value a C caller expects for this failure.
  pub fn errno(&self) -> c_int {
    libc::ENOMEM
  }
}

pub type Result<T> = core::result::Result<T, AllocError>;
