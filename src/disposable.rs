//! Resource release handles.
//!
//! Every subscription hands back a [`Disposable`]. Calling
//! [`dispose`](Disposable::dispose) cancels the work behind it and releases
//! what it holds; calling it again has no further effect.
//!
//! | Type | Use |
//! |------|-----|
//! | [`AnonymousDisposable`] | run a closure once on dispose ([`from_fn`]) |
//! | [`BooleanDisposable`] | a plain cancellation flag |
//! | [`SingleAssignmentDisposable`] | an inner disposable that arrives later |
//! | [`CompositeDisposable`] | a dynamic group of children |
//! | [`SerialDisposable`] | a replaceable inner disposable |
//! | [`RefCountDisposable`] | released once every dependent is released |
//! | [`DisposeBag`] | bind subscriptions to an owner's scope |

use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use parking_lot::Mutex;

mod composite;
mod dispose_bag;
mod ref_count;
mod serial;
mod single_assignment;

pub use composite::CompositeDisposable;
pub use dispose_bag::DisposeBag;
pub use ref_count::RefCountDisposable;
pub use serial::SerialDisposable;
pub use single_assignment::SingleAssignmentDisposable;

/// A handle to an acquired resource that requires explicit release.
///
/// Implementations must be idempotent and callable from any thread, including
/// concurrently with events still being delivered.
pub trait Disposable: Send + Sync {
  /// Releases the resource. Calls after the first one do nothing.
  fn dispose(&self);

  /// Whether [`dispose`](Disposable::dispose) has already taken effect.
  fn is_disposed(&self) -> bool;

  /// Hands this disposable to `bag`, which disposes it when the bag is
  /// dropped or disposed.
  fn disposed_by(self, bag: &DisposeBag)
  where
    Self: Sized + 'static,
  {
    bag.insert(self);
  }
}

/// The disposable type returned by subscriptions and schedulers.
pub type BoxDisposable = Box<dyn Disposable>;

impl<D: Disposable + ?Sized> Disposable for Box<D> {
  #[inline]
  fn dispose(&self) { (**self).dispose() }

  #[inline]
  fn is_disposed(&self) -> bool { (**self).is_disposed() }
}

impl<D: Disposable + ?Sized> Disposable for Arc<D> {
  #[inline]
  fn dispose(&self) { (**self).dispose() }

  #[inline]
  fn is_disposed(&self) -> bool { (**self).is_disposed() }
}

// ============================================================================
// Trivial disposables
// ============================================================================

/// A disposable with nothing to release.
#[derive(Debug, Clone, Copy, Default)]
pub struct NopDisposable;

impl Disposable for NopDisposable {
  #[inline]
  fn dispose(&self) {}

  #[inline]
  fn is_disposed(&self) -> bool { true }
}

/// Returns a disposable that releases nothing.
#[inline]
pub fn empty() -> BoxDisposable { Box::new(NopDisposable) }

/// Runs a closure the first time it is disposed.
pub struct AnonymousDisposable {
  action: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl AnonymousDisposable {
  pub fn new(action: impl FnOnce() + Send + 'static) -> Self {
    AnonymousDisposable { action: Mutex::new(Some(Box::new(action))) }
  }
}

impl Disposable for AnonymousDisposable {
  fn dispose(&self) {
    // Take the closure under the lock, run it outside.
    let action = self.action.lock().take();
    if let Some(action) = action {
      action();
    }
  }

  fn is_disposed(&self) -> bool { self.action.lock().is_none() }
}

/// Returns a disposable that runs `action` once, on the first dispose.
pub fn from_fn(action: impl FnOnce() + Send + 'static) -> BoxDisposable {
  Box::new(AnonymousDisposable::new(action))
}

/// A cancellation flag.
#[derive(Debug, Default)]
pub struct BooleanDisposable {
  disposed: AtomicBool,
}

impl BooleanDisposable {
  #[inline]
  pub fn new() -> Self { Self::default() }
}

impl Disposable for BooleanDisposable {
  #[inline]
  fn dispose(&self) { self.disposed.store(true, Ordering::Release); }

  #[inline]
  fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

#[cfg(test)]
pub(crate) mod test_util {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use super::Disposable;

  /// Counts every call to `dispose`, including repeated ones.
  #[derive(Clone, Default)]
  pub(crate) struct CountingDisposable(pub(crate) Arc<AtomicUsize>);

  impl CountingDisposable {
    pub(crate) fn count(&self) -> usize { self.0.load(Ordering::SeqCst) }
  }

  impl Disposable for CountingDisposable {
    fn dispose(&self) { self.0.fetch_add(1, Ordering::SeqCst); }

    fn is_disposed(&self) -> bool { self.count() > 0 }
  }
}
