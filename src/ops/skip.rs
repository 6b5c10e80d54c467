use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use crate::{
  disposable::BoxDisposable,
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{impl_is_closed, run, Operator, Sink},
};

impl<T: 'static> Observable<T> {
  /// Ignores the first `count` values emitted by the source.
  pub fn skip(self, count: usize) -> Observable<T> {
    Observable::new(SkipOp { source: self, count })
  }
}

struct SkipOp<T> {
  source: Observable<T>,
  count: usize,
}

impl<T: 'static> Subscribable<T> for SkipOp<T> {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    run(
      &self.source,
      Arc::new(SkipSink { sink: Sink::new(observer), remaining: AtomicUsize::new(self.count) }),
    )
  }
}

struct SkipSink<T> {
  sink: Sink<T>,
  remaining: AtomicUsize,
}

impl<T: 'static> Operator for SkipSink<T> {
  type Output = T;

  #[inline]
  fn sink(&self) -> &Sink<T> { &self.sink }
}

impl<T: 'static> Observer<T> for SkipSink<T> {
  fn on(&self, event: Event<T>) {
    match event {
      Event::Next(v) => {
        let remaining = self.remaining.load(Ordering::Acquire);
        if remaining > 0 {
          self.remaining.store(remaining - 1, Ordering::Release);
        } else {
          self.sink.forward_next(v);
        }
      }
      terminal => self.sink.forward(terminal),
    }
  }

  impl_is_closed!();
}
