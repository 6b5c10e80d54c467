use std::sync::{Arc, Weak};

use crate::{
  disposable::{BoxDisposable, SerialDisposable, SingleAssignmentDisposable},
  error::RxError,
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{impl_is_closed, Operator, Sink, SinkDisposable},
};

type Handler<T> = Arc<dyn Fn(RxError) -> Observable<T> + Send + Sync>;

impl<T: 'static> Observable<T> {
  /// Continues with the observable returned by `handler` when the source
  /// fails.
  ///
  /// Values the source emitted before failing are kept. The handler may
  /// return [`throw`](crate::observable::throw) to pass the error on, or
  /// a different error to translate it.
  ///
  /// ```rust
  /// use rxrust_core::prelude::*;
  ///
  /// let recovered = observable::throw::<i32>(RxError::msg("offline"))
  ///   .catch_error(|_| observable::just(0))
  ///   .to_blocking()
  ///   .to_vec();
  /// assert_eq!(recovered, Ok(vec![0]));
  /// ```
  pub fn catch_error<F>(self, handler: F) -> Observable<T>
  where
    F: Fn(RxError) -> Observable<T> + Send + Sync + 'static,
  {
    Observable::new(CatchOp { source: self, handler: Arc::new(handler) })
  }
}

struct CatchOp<T> {
  source: Observable<T>,
  handler: Handler<T>,
}

impl<T: 'static> Subscribable<T> for CatchOp<T> {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    let serial = Arc::new(SerialDisposable::new());
    let sink = Arc::new_cyclic(|me| CatchSink {
      sink: Sink::new(observer),
      handler: self.handler.clone(),
      serial: serial.clone(),
      me: me.clone(),
    });
    sink.sink.set_upstream(Box::new(serial.clone()));

    // The source subscription gets its own slot, so that a fallback
    // subscribed while the source is still subscribing is not replaced.
    let source = Arc::new(SingleAssignmentDisposable::new());
    serial.set(Box::new(source.clone()));
    source.set(self.source.subscribe(sink.clone()));
    Box::new(SinkDisposable(sink))
  }
}

struct CatchSink<T> {
  sink: Sink<T>,
  handler: Handler<T>,
  serial: Arc<SerialDisposable>,
  me: Weak<CatchSink<T>>,
}

impl<T: 'static> Operator for CatchSink<T> {
  type Output = T;

  #[inline]
  fn sink(&self) -> &Sink<T> { &self.sink }
}

impl<T: 'static> Observer<T> for CatchSink<T> {
  fn on(&self, event: Event<T>) {
    match event {
      Event::Error(err) => {
        let Some(me) = self.me.upgrade() else { return };
        if self.sink.is_stopped() {
          return;
        }
        tracing::debug!(error = %err, "source failed, switching to the fallback");
        let fallback = (self.handler)(err);
        self.serial.set(fallback.subscribe(Arc::new(Fallback(me))));
      }
      other => self.sink.forward(other),
    }
  }

  impl_is_closed!();
}

/// Forwards the fallback's events through the catching sink.
struct Fallback<T>(Arc<CatchSink<T>>);

impl<T: 'static> Observer<T> for Fallback<T> {
  #[inline]
  fn on(&self, event: Event<T>) { self.0.sink.forward(event) }

  #[inline]
  fn is_closed(&self) -> bool { self.0.sink.is_stopped() }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{
    disposable::{self, test_util::CountingDisposable, Disposable},
    observable::{create, from_iter, just, throw},
    ops::test_util::{events, record},
    subject::PublishSubject,
  };

  #[test]
  fn switches_to_fallback() {
    let source = create(|observer: AnyObserver<i32>| {
      observer.on_next(1);
      observer.on_next(2);
      observer.on_error(RxError::msg("broken"));
      disposable::empty()
    });
    let log = record(&source.catch_error(|_| from_iter(10..12)));
    assert_eq!(
      events(&log),
      vec![Event::Next(1), Event::Next(2), Event::Next(10), Event::Next(11), Event::Completed]
    );
  }

  #[test]
  fn handler_sees_the_error() {
    let log = record(&throw::<i32>(RxError::msg("code 7")).catch_error(|e| {
      let fallback: Observable<i32> = throw(RxError::msg(format!("wrapped: {e}")));
      fallback
    }));
    assert_eq!(events(&log), vec![Event::Error(RxError::msg("wrapped: code 7"))]);
  }

  #[test]
  fn completion_is_not_caught() {
    let log = record(&just(1).catch_error(|_| just(99)));
    assert_eq!(events(&log), vec![Event::Next(1), Event::Completed]);
  }

  #[test]
  fn dispose_reaches_the_fallback() {
    let source = PublishSubject::<i32>::new();
    let fallback = PublishSubject::<i32>::new();
    let c_fallback = fallback.clone();
    let d = source
      .as_observable()
      .catch_error(move |_| c_fallback.as_observable())
      .subscribe_next(|_| {});
    source.on_error(RxError::msg("switch"));
    assert!(fallback.has_observers());
    d.dispose();
    assert!(!fallback.has_observers());
  }

  #[test]
  fn releases_failed_source() {
    let teardown = CountingDisposable::default();
    let c_teardown = teardown.clone();
    let source = create(move |observer: AnyObserver<i32>| {
      observer.on_error(RxError::msg("x"));
      Box::new(c_teardown.clone())
    });
    record(&source.catch_error(|_| just(0)));
    assert_eq!(teardown.count(), 1);
  }
}
