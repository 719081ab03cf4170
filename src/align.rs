/// Alignment of every payload and every block header.
pub const ALIGNMENT: usize = 16;

/// Rounds `value` up to the next multiple of [`ALIGNMENT`].
///
/// # Examples
///
/// ```rust
/// use brkalloc::align;
///
/// assert_eq!(align!(13), 16);
/// assert_eq!(align!(32), 32);
/// assert_eq!(align!(33), 48);
/// ```
#[macro_export]
macro_rules! align {
  ($value:expr) => {
    $crate::align_to!($value, $crate::align::ALIGNMENT)
  };
}

/// Rounds `value` up to the next multiple of `align`, which must be a power
/// of two.
///
/// ```rust
/// use brkalloc::align_to;
///
/// assert_eq!(align_to!(5, 8), 8);
/// assert_eq!(align_to!(64, 64), 64);
/// ```
#[macro_export]
macro_rules! align_to {
  ($value:expr, $align:expr) => {
    ($value + $align - 1) & !($align - 1)
  };
}

/// Like [`align!`], but returns `None` instead of wrapping when `value` is
/// within [`ALIGNMENT`] of `usize::MAX`.
pub const fn checked_align(value: usize) -> Option<usize> {
  match value.checked_add(ALIGNMENT - 1) {
    Some(padded) => Some(padded & !(ALIGNMENT - 1)),
    None => None,
  }
}
