use std::{convert::Infallible, error::Error, sync::Arc};

use crate::{
  disposable::BoxDisposable,
  error::RxError,
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{impl_is_closed, run, Operator, Sink},
};

type MapFn<T, U> = Arc<dyn Fn(T) -> Result<U, RxError> + Send + Sync>;

impl<T: 'static> Observable<T> {
  /// Creates a new observable which calls a closure on each value and emits
  /// its return value instead.
  ///
  /// ```rust
  /// use rxrust_core::prelude::*;
  ///
  /// let doubled = observable::from_iter(1..=3).map(|v| v * 2).to_blocking().to_vec();
  /// assert_eq!(doubled, Ok(vec![2, 4, 6]));
  /// ```
  pub fn map<U, F>(self, f: F) -> Observable<U>
  where
    U: 'static,
    F: Fn(T) -> U + Send + Sync + 'static,
  {
    self.try_map(move |v| Ok::<_, Infallible>(f(v)))
  }

  /// Like [`map`](Self::map), but the closure may fail. A failure ends the
  /// subscription with [`RxError::Callback`].
  pub fn try_map<U, E, F>(self, f: F) -> Observable<U>
  where
    U: 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(T) -> Result<U, E> + Send + Sync + 'static,
  {
    Observable::new(MapOp { source: self, f: Arc::new(move |v| f(v).map_err(RxError::callback)) })
  }
}

struct MapOp<T, U> {
  source: Observable<T>,
  f: MapFn<T, U>,
}

impl<T: 'static, U: 'static> Subscribable<U> for MapOp<T, U> {
  fn subscribe(&self, observer: AnyObserver<U>) -> BoxDisposable {
    run(&self.source, Arc::new(MapSink { sink: Sink::new(observer), f: self.f.clone() }))
  }
}

struct MapSink<T, U> {
  sink: Sink<U>,
  f: MapFn<T, U>,
}

impl<T: 'static, U: 'static> Operator for MapSink<T, U> {
  type Output = U;

  #[inline]
  fn sink(&self) -> &Sink<U> { &self.sink }
}

impl<T: 'static, U: 'static> Observer<T> for MapSink<T, U> {
  fn on(&self, event: Event<T>) {
    match event {
      Event::Next(v) => {
        if self.sink.is_stopped() {
          return;
        }
        match (self.f)(v) {
          Ok(u) => self.sink.forward_next(u),
          Err(err) => self.sink.fail(err),
        }
      }
      terminal => self.sink.forward_terminal(terminal),
    }
  }

  impl_is_closed!();
}

#[cfg(test)]
mod tests {
  use std::{
    fmt,
    sync::{mpsc, Mutex},
    thread,
  };

  use bencher::benchmark_group;

  use super::*;
  use crate::{
    disposable::Disposable,
    ops::test_util::{events, record},
    observable::{self, from_iter},
    subject::PublishSubject,
  };

  #[derive(Debug)]
  struct Odd(i32);

  impl fmt::Display for Odd {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{} is odd", self.0) }
  }

  impl Error for Odd {}

  #[test]
  fn primitive_type() {
    let log = record(&from_iter(100..101).map(|v| v * 2));
    assert_eq!(events(&log), vec![Event::Next(200), Event::Completed]);
  }

  #[test]
  fn map_types_mixed() {
    let log = record(&observable::of(['a', 'b', 'c']).map(|c| c.to_string()));
    assert_eq!(log.lock().unwrap().len(), 4);
  }

  #[test]
  fn callback_error_terminates() {
    let subject = PublishSubject::new();
    let even =
      subject.as_observable().try_map(|v: i32| if v % 2 == 0 { Ok(v) } else { Err(Odd(v)) });
    let log = record(&even);
    subject.on_next(2);
    subject.on_next(3);
    subject.on_next(4);
    let log = events(&log);
    assert_eq!(log.len(), 2);
    assert_eq!(log[0], Event::Next(2));
    assert!(log[1].error().is_some_and(RxError::is_callback));
    let message = log[1].error().map(ToString::to_string);
    assert_eq!(message.as_deref(), Some("callback failed: 3 is odd"));
    // The failing sink detached itself from the subject.
    assert!(!subject.has_observers());
  }

  #[test]
  fn closure_not_called_after_stop() {
    let calls = Arc::new(Mutex::new(0));
    let c_calls = calls.clone();
    from_iter(0..)
      .map(move |v| {
        *c_calls.lock().unwrap() += 1;
        v
      })
      .take(3)
      .subscribe_next(|_| {});
    assert_eq!(*calls.lock().unwrap(), 3);
  }

  #[test]
  fn dispose_from_another_thread_during_delivery() {
    let subject = PublishSubject::<i32>::new();
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel::<()>();
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let d = subject.as_observable().map(|v| v * 10).subscribe_next(move |v| {
      c_seen.lock().unwrap().push(v);
      if v == 10 {
        entered_tx.send(()).unwrap();
        release_rx.recv().unwrap();
      }
    });
    let producer = subject.clone();
    let handle = thread::spawn(move || {
      producer.on_next(1);
      producer.on_next(2);
    });
    entered_rx.recv().unwrap();
    d.dispose();
    assert!(d.is_disposed());
    release_tx.send(()).unwrap();
    handle.join().unwrap();
    subject.on_next(3);
    assert_eq!(*seen.lock().unwrap(), vec![10]);
    assert!(!subject.has_observers());
  }

  #[test]
  fn benchmark() { do_bench(); }

  benchmark_group!(do_bench, bench);

  fn bench(b: &mut bencher::Bencher) { b.iter(primitive_type); }
}
