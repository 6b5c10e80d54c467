use std::sync::atomic::{AtomicU8, Ordering};

use parking_lot::Mutex;

use super::{BoxDisposable, Disposable};

const DISPOSED: u8 = 0b01;
const ASSIGNED: u8 = 0b10;

/// Holds an inner disposable that can be assigned exactly once.
///
/// Sinks use it for their upstream subscription, which only exists after the
/// sink has been handed to the upstream observable. If `dispose` runs before
/// the assignment, the inner disposable is disposed as soon as it arrives
/// ("disposed wins").
///
/// # Panics
///
/// Assigning a second time is a programmer error and panics.
#[derive(Default)]
pub struct SingleAssignmentDisposable {
  state: AtomicU8,
  inner: Mutex<Option<BoxDisposable>>,
}

impl SingleAssignmentDisposable {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Assigns the inner disposable.
  pub fn set(&self, disposable: BoxDisposable) {
    let prev = self.state.fetch_or(ASSIGNED, Ordering::AcqRel);
    if prev & ASSIGNED != 0 {
      tracing::error!("SingleAssignmentDisposable assigned twice");
      panic!("SingleAssignmentDisposable was already assigned");
    }
    if prev & DISPOSED != 0 {
      disposable.dispose();
      return;
    }

    *self.inner.lock() = Some(disposable);

    // A dispose that raced between the flag update and the store above found
    // no inner disposable; release it here instead.
    if self.state.load(Ordering::Acquire) & DISPOSED != 0 {
      self.take_and_dispose();
    }
  }

  /// Whether an inner disposable has been assigned.
  #[inline]
  pub fn is_assigned(&self) -> bool { self.state.load(Ordering::Acquire) & ASSIGNED != 0 }

  fn take_and_dispose(&self) {
    let inner = self.inner.lock().take();
    if let Some(inner) = inner {
      inner.dispose();
    }
  }
}

impl Disposable for SingleAssignmentDisposable {
  fn dispose(&self) {
    let prev = self.state.fetch_or(DISPOSED, Ordering::AcqRel);
    if prev & DISPOSED == 0 && prev & ASSIGNED != 0 {
      self.take_and_dispose();
    }
  }

  #[inline]
  fn is_disposed(&self) -> bool { self.state.load(Ordering::Acquire) & DISPOSED != 0 }
}
