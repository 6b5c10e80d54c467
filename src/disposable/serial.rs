use parking_lot::Mutex;

use super::{BoxDisposable, Disposable};

#[derive(Default)]
struct SerialState {
  current: Option<BoxDisposable>,
  disposed: bool,
}

/// Holds one replaceable inner disposable.
///
/// Setting a new inner disposable disposes the previous one. Once the serial
/// disposable itself is disposed, every disposable set afterwards is disposed
/// immediately. Recursive and periodic scheduling keep the pending work item
/// in here.
#[derive(Default)]
pub struct SerialDisposable {
  state: Mutex<SerialState>,
}

impl SerialDisposable {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Replaces the inner disposable, disposing the previous one.
  pub fn set(&self, disposable: BoxDisposable) {
    let mut state = self.state.lock();
    if state.disposed {
      drop(state);
      disposable.dispose();
      return;
    }
    let previous = state.current.replace(disposable);
    drop(state);
    if let Some(previous) = previous {
      previous.dispose();
    }
  }
}

impl Disposable for SerialDisposable {
  fn dispose(&self) {
    let mut state = self.state.lock();
    if state.disposed {
      return;
    }
    state.disposed = true;
    let current = state.current.take();
    drop(state);
    if let Some(current) = current {
      current.dispose();
    }
  }

  fn is_disposed(&self) -> bool { self.state.lock().disposed }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::disposable::test_util::CountingDisposable;

  #[test]
  fn replacing_disposes_previous() {
    let serial = SerialDisposable::new();
    let first = CountingDisposable::default();
    let second = CountingDisposable::default();
    serial.set(Box::new(first.clone()));
    serial.set(Box::new(second.clone()));
    assert_eq!((first.count(), second.count()), (1, 0));

    serial.dispose();
    serial.dispose();
    assert_eq!((first.count(), second.count()), (1, 1));
  }

  #[test]
  fn set_after_dispose() {
    let serial = SerialDisposable::new();
    serial.dispose();
    let late = CountingDisposable::default();
    serial.set(Box::new(late.clone()));
    assert_eq!(late.count(), 1);
    assert!(serial.is_disposed());
  }
}
