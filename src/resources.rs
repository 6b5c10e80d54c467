//! Process wide count of live pipeline resources, for leak detection.
//!
//! Sinks, subject cores and composite disposables embed a [`TraceResource`]
//! that increments the counter when constructed and decrements it when
//! dropped. A test can take [`total`] before and after a scenario and assert
//! that everything it built has been released.
//!
//! The counter is only maintained in debug builds or with the
//! `trace-resources` feature; otherwise [`TraceResource`] is a zero sized
//! no-op and [`total`] always returns `0`.

#[cfg(any(debug_assertions, feature = "trace-resources"))]
use std::sync::atomic::{AtomicIsize, Ordering};

#[cfg(any(debug_assertions, feature = "trace-resources"))]
static TOTAL: AtomicIsize = AtomicIsize::new(0);

/// Number of resources currently alive.
#[inline]
pub fn total() -> isize {
  #[cfg(any(debug_assertions, feature = "trace-resources"))]
  {
    TOTAL.load(Ordering::Acquire)
  }
  #[cfg(not(any(debug_assertions, feature = "trace-resources")))]
  {
    0
  }
}

/// Resets the counter to zero. Meant for test isolation only.
pub fn reset() {
  #[cfg(any(debug_assertions, feature = "trace-resources"))]
  TOTAL.store(0, Ordering::Release);
}

/// Counts itself as one live resource for as long as it exists.
#[derive(Debug)]
pub(crate) struct TraceResource(());

impl TraceResource {
  #[inline]
  pub(crate) fn new() -> Self {
    #[cfg(any(debug_assertions, feature = "trace-resources"))]
    TOTAL.fetch_add(1, Ordering::AcqRel);
    TraceResource(())
  }
}

impl Default for TraceResource {
  fn default() -> Self { Self::new() }
}

impl Drop for TraceResource {
  #[inline]
  fn drop(&mut self) {
    #[cfg(any(debug_assertions, feature = "trace-resources"))]
    TOTAL.fetch_sub(1, Ordering::AcqRel);
  }
}
