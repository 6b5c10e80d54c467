use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc,
};

use parking_lot::Mutex;

use super::{BoxDisposable, Disposable};

struct RefCountState {
  disposable: Option<BoxDisposable>,
  primary_disposed: bool,
  count: usize,
}

/// Disposes the underlying resource only once the primary handle and every
/// dependent obtained from [`retain`](RefCountDisposable::retain) have been
/// disposed.
pub struct RefCountDisposable {
  state: Arc<Mutex<RefCountState>>,
}

impl RefCountDisposable {
  pub fn new(disposable: BoxDisposable) -> Self {
    RefCountDisposable {
      state: Arc::new(Mutex::new(RefCountState {
        disposable: Some(disposable),
        primary_disposed: false,
        count: 0,
      })),
    }
  }

  /// Returns a dependent that keeps the underlying resource alive until it
  /// is disposed. After the resource is gone this returns a no-op.
  pub fn retain(&self) -> BoxDisposable {
    let mut state = self.state.lock();
    if state.disposable.is_none() {
      return super::empty();
    }
    let Some(count) = state.count.checked_add(1) else {
      tracing::error!("RefCountDisposable counter overflow");
      panic!("RefCountDisposable counter overflow");
    };
    state.count = count;
    Box::new(RefCountDependent { state: self.state.clone(), released: AtomicBool::new(false) })
  }
}

fn release(state: &Mutex<RefCountState>) {
  let mut guard = state.lock();
  if guard.disposable.is_none() {
    return;
  }
  guard.count -= 1;
  let disposable =
    if guard.primary_disposed && guard.count == 0 { guard.disposable.take() } else { None };
  drop(guard);
  if let Some(disposable) = disposable {
    disposable.dispose();
  }
}

impl Disposable for RefCountDisposable {
  fn dispose(&self) {
    let mut state = self.state.lock();
    if state.primary_disposed || state.disposable.is_none() {
      return;
    }
    state.primary_disposed = true;
    let disposable = if state.count == 0 { state.disposable.take() } else { None };
    drop(state);
    if let Some(disposable) = disposable {
      disposable.dispose();
    }
  }

  fn is_disposed(&self) -> bool { self.state.lock().disposable.is_none() }
}

struct RefCountDependent {
  state: Arc<Mutex<RefCountState>>,
  released: AtomicBool,
}

impl Disposable for RefCountDependent {
  fn dispose(&self) {
    if !self.released.swap(true, Ordering::AcqRel) {
      release(&self.state);
    }
  }

  fn is_disposed(&self) -> bool { self.released.load(Ordering::Acquire) }
}
