//! Diagnostic tracing of allocator calls.
//!
//! The engine reports every public call as a [`TraceEvent`] to the
//! [`TraceSink`] it was built with. Sinks only observe; nothing they do
//! feeds back into allocation.

use std::{
  ffi::CStr,
  fmt::{self, Write},
  sync::atomic::{AtomicU8, Ordering},
};

use libc::{STDERR_FILENO, c_void};

/// One allocator call and its outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TraceEvent {
  Allocate {
    requested: usize,
    ptr: *const u8,
    size: usize,
  },
  ZeroAllocate {
    count: usize,
    elem_size: usize,
    ptr: *const u8,
    size: usize,
  },
  Resize {
    old: *const u8,
    requested: usize,
    ptr: *const u8,
    size: usize,
  },
  Release {
    ptr: *const u8,
  },
}

impl fmt::Display for TraceEvent {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>,
  ) -> fmt::Result {
    match *self {
      TraceEvent::Allocate {
        requested,
        ptr,
        size,
      } => write!(f, "malloc({requested}) => (ptr={ptr:p}, size={size})"),
      TraceEvent::ZeroAllocate {
        count,
        elem_size,
        ptr,
        size,
      } => write!(f, "calloc({count},{elem_size}) => (ptr={ptr:p}, size={size})"),
      TraceEvent::Resize {
        old,
        requested,
        ptr,
        size,
      } => write!(f, "realloc({old:p},{requested}) => (ptr={ptr:p}, size={size})"),
      TraceEvent::Release { ptr } => write!(f, "free({ptr:p})"),
    }
  }
}

/// Receives the events of one allocator.
pub trait TraceSink {
  /// Whether events should be built at all.
  fn enabled(&self) -> bool {
    true
  }

  fn record(
    &self,
    event: &TraceEvent,
  );
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoTrace;

impl TraceSink for NoTrace {
  fn enabled(&self) -> bool {
    false
  }

  fn record(
    &self,
    _event: &TraceEvent,
  ) {
  }
}

/// Forwards events to the `log` facade at debug level.
///
/// Loggers allocate, so this sink is for allocators that are not the
/// process's global allocator.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogTrace;

impl TraceSink for LogTrace {
  fn enabled(&self) -> bool {
    log::log_enabled!(target: "brkalloc", log::Level::Debug)
  }

  fn record(
    &self,
    event: &TraceEvent,
  ) {
    log::debug!(target: "brkalloc", "{event}");
  }
}

/// Environment variable that switches [`StderrTrace`] on.
pub const TRACE_ENV: &CStr = c"DEBUG_MALLOC";

const UNKNOWN: u8 = 0;
const OFF: u8 = 1;
const ON: u8 = 2;

/// Writes `MALLOC: <event>` lines straight to file descriptor 2 when
/// [`TRACE_ENV`] is set.
///
/// The environment is read on the first event and cached for the life of
/// the sink. Lines are formatted on the stack, so this sink never allocates
/// and is safe to use from the global allocator.
#[derive(Debug, Default)]
pub struct StderrTrace {
  state: AtomicU8,
}

impl StderrTrace {
  pub const fn new() -> Self {
    Self {
      state: AtomicU8::new(UNKNOWN),
    }
  }

  /// A sink that is on or off regardless of the environment.
  pub const fn forced(on: bool) -> Self {
    Self {
      state: AtomicU8::new(if on { ON } else { OFF }),
    }
  }

  fn read_env() -> bool {
    // `std::env` allocates; `getenv` does not.
    !unsafe { libc::getenv(TRACE_ENV.as_ptr()) }.is_null()
  }
}

impl TraceSink for StderrTrace {
  fn enabled(&self) -> bool {
    match self.state.load(Ordering::Relaxed) {
      ON => true,
      OFF => false,
      _ => {
        let on = Self::read_env();
        self.state.store(if on { ON } else { OFF }, Ordering::Relaxed);
        on
      }
    }
  }

  fn record(
    &self,
    event: &TraceEvent,
  ) {
    let mut line = LineBuffer::new();

    if writeln!(line, "MALLOC: {event}").is_ok() {
      line.flush_to(STDERR_FILENO);
    }
  }
}

/// Fixed-size line that silently truncates.
pub(crate) struct LineBuffer {
  bytes: [u8; 200],
  len: usize,
}

impl LineBuffer {
  pub fn new() -> Self {
    Self {
      bytes: [0; 200],
      len: 0,
    }
  }

  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes[..self.len]
  }

  fn flush_to(
    &self,
    fd: libc::c_int,
  ) {
    let bytes = self.as_bytes();
    unsafe {
      libc::write(fd, bytes.as_ptr() as *const c_void, bytes.len());
    }
  }
}

impl Write for LineBuffer {
  fn write_str(
    &mut self,
    s: &str,
  ) -> fmt::Result {
    let room = self.bytes.len() - self.len;
    let take = s.len().min(room);

    self.bytes[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
    self.len += take;

    Ok(())
  }
}
