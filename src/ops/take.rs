use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use crate::{
  disposable::{self, BoxDisposable},
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{impl_is_closed, run, Operator, Sink},
};

impl<T: 'static> Observable<T> {
  /// Emits only the first `count` values emitted by the source, then
  /// completes and unsubscribes from the source.
  ///
  /// If the source emits fewer than `count` values, all of them are emitted.
  /// `take(0)` completes without subscribing to the source at all.
  ///
  /// ```rust
  /// use rxrust_core::prelude::*;
  ///
  /// let first = observable::from_iter(0..).take(5).to_blocking().to_vec();
  /// assert_eq!(first, Ok(vec![0, 1, 2, 3, 4]));
  /// ```
  pub fn take(self, count: usize) -> Observable<T> {
    Observable::new(TakeOp { source: self, count })
  }
}

struct TakeOp<T> {
  source: Observable<T>,
  count: usize,
}

impl<T: 'static> Subscribable<T> for TakeOp<T> {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    if self.count == 0 {
      observer.on_completed();
      return disposable::empty();
    }
    run(
      &self.source,
      Arc::new(TakeSink { sink: Sink::new(observer), remaining: AtomicUsize::new(self.count) }),
    )
  }
}

struct TakeSink<T> {
  sink: Sink<T>,
  remaining: AtomicUsize,
}

impl<T: 'static> Operator for TakeSink<T> {
  type Output = T;

  #[inline]
  fn sink(&self) -> &Sink<T> { &self.sink }
}

impl<T: 'static> Observer<T> for TakeSink<T> {
  fn on(&self, event: Event<T>) {
    match event {
      Event::Next(v) => {
        let remaining = self.remaining.load(Ordering::Acquire);
        if remaining == 0 {
          return;
        }
        self.remaining.store(remaining - 1, Ordering::Release);
        self.sink.forward_next(v);
        if remaining == 1 {
          self.sink.forward_completed();
        }
      }
      terminal => self.sink.forward(terminal),
    }
  }

  impl_is_closed!();
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    disposable::test_util::CountingDisposable,
    observable::{create, from_iter},
    ops::test_util::{events, record},
  };

  #[test]
  fn base_function() {
    let log = record(&from_iter(0..100).take(3));
    assert_eq!(
      events(&log),
      vec![Event::Next(0), Event::Next(1), Event::Next(2), Event::Completed]
    );
  }

  #[test]
  fn take_more_than_emitted() {
    let log = record(&from_iter(0..2).take(5));
    assert_eq!(events(&log), vec![Event::Next(0), Event::Next(1), Event::Completed]);
  }

  #[test]
  fn take_zero_never_subscribes() {
    let subscribed = Arc::new(AtomicUsize::new(0));
    let c_subscribed = subscribed.clone();
    let source = create(move |observer: AnyObserver<i32>| {
      c_subscribed.fetch_add(1, Ordering::SeqCst);
      observer.on_next(1);
      disposable::empty()
    });
    assert_eq!(events(&record(&source.take(0))), vec![Event::Completed]);
    assert_eq!(subscribed.load(Ordering::SeqCst), 0);
  }

  #[test]
  fn releases_source_on_completion() {
    let teardown = CountingDisposable::default();
    let c_teardown = teardown.clone();
    let source = create(move |observer: AnyObserver<i32>| {
      observer.on_next(1);
      observer.on_next(2);
      Box::new(c_teardown.clone())
    });
    record(&source.take(1));
    assert_eq!(teardown.count(), 1);
  }
}
