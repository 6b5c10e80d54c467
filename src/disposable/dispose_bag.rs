use parking_lot::Mutex;

use super::{BoxDisposable, Disposable};

#[derive(Default)]
struct BagState {
  disposables: Vec<BoxDisposable>,
  disposed: bool,
}

/// Binds the lifetime of subscriptions to the scope of its owner.
///
/// Everything inserted is disposed, in insertion order, when the bag is
/// dropped or explicitly [`dispose`](Disposable::dispose)d. Inserting into a
/// bag that was already torn down disposes the newcomer right away.
///
/// ```rust
/// use rxrust_core::prelude::*;
///
/// struct Screen {
///   bag: DisposeBag,
/// }
///
/// let subject = PublishSubject::<i32>::new();
/// let screen = Screen { bag: DisposeBag::new() };
/// subject.as_observable().subscribe_next(|v| println!("{v}")).disposed_by(&screen.bag);
/// assert!(subject.has_observers());
///
/// drop(screen);
/// assert!(!subject.has_observers());
/// ```
#[derive(Default)]
pub struct DisposeBag {
  state: Mutex<BagState>,
}

impl DisposeBag {
  #[inline]
  pub fn new() -> Self { Self::default() }

  /// Adds a disposable to the bag.
  pub fn insert<D: Disposable + 'static>(&self, disposable: D) {
    let mut state = self.state.lock();
    if state.disposed {
      drop(state);
      disposable.dispose();
    } else {
      state.disposables.push(Box::new(disposable));
    }
  }

  /// Number of disposables held.
  pub fn len(&self) -> usize { self.state.lock().disposables.len() }

  pub fn is_empty(&self) -> bool { self.len() == 0 }
}

impl Disposable for DisposeBag {
  fn dispose(&self) {
    let disposables = {
      let mut state = self.state.lock();
      state.disposed = true;
      std::mem::take(&mut state.disposables)
    };
    for disposable in disposables {
      disposable.dispose();
    }
  }

  fn is_disposed(&self) -> bool { self.state.lock().disposed }
}

impl Drop for DisposeBag {
  fn drop(&mut self) { self.dispose() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::disposable::test_util::CountingDisposable;

  #[test]
  fn drop_releases_everything() {
    let d1 = CountingDisposable::default();
    let d2 = CountingDisposable::default();
    {
      let bag = DisposeBag::new();
      d1.clone().disposed_by(&bag);
      bag.insert(d2.clone());
      assert_eq!(bag.len(), 2);
      assert_eq!((d1.count(), d2.count()), (0, 0));
    }
    assert_eq!((d1.count(), d2.count()), (1, 1));
  }

  #[test]
  fn insert_after_teardown() {
    let bag = DisposeBag::new();
    bag.dispose();
    let late = CountingDisposable::default();
    bag.insert(late.clone());
    assert_eq!(late.count(), 1);
    assert!(bag.is_empty());
    drop(bag);
    assert_eq!(late.count(), 1);
  }
}
