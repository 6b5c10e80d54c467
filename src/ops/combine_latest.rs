use std::{cell::RefCell, convert::Infallible, error::Error, sync::Arc};

use parking_lot::ReentrantMutex;

use crate::{
  disposable::{BoxDisposable, CompositeDisposable, SingleAssignmentDisposable},
  error::RxError,
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{Operator, Sink, SinkDisposable},
};

type CombineFn<T, U, V> = Arc<dyn Fn(T, U) -> Result<V, RxError> + Send + Sync>;

impl<T> Observable<T>
where
  T: Clone + Send + 'static,
{
  /// Emits `f(a, b)` with the latest values of both observables whenever
  /// either of them emits, once each has emitted at least once.
  ///
  /// Completes when both sources have completed, or as soon as one of them
  /// completes without ever emitting. Fails when either source fails.
  ///
  /// ```rust
  /// use rxrust_core::prelude::*;
  ///
  /// let width = BehaviorSubject::new(2);
  /// let height = BehaviorSubject::new(3);
  /// let area = width.as_observable().combine_latest(height.as_observable(), |w, h| w * h);
  ///
  /// let _d = area.subscribe_next(|a| println!("area {a}"));
  /// width.on_next(4);
  /// ```
  pub fn combine_latest<U, V, F>(self, other: Observable<U>, f: F) -> Observable<V>
  where
    U: Clone + Send + 'static,
    V: 'static,
    F: Fn(T, U) -> V + Send + Sync + 'static,
  {
    self.try_combine_latest(other, move |a, b| Ok::<_, Infallible>(f(a, b)))
  }

  /// Like [`combine_latest`](Self::combine_latest), but the combining
  /// closure may fail. A failure ends the subscription with
  /// [`RxError::Callback`].
  pub fn try_combine_latest<U, V, E, F>(self, other: Observable<U>, f: F) -> Observable<V>
  where
    U: Clone + Send + 'static,
    V: 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(T, U) -> Result<V, E> + Send + Sync + 'static,
  {
    Observable::new(CombineLatestOp {
      left: self,
      right: other,
      f: Arc::new(move |a, b| f(a, b).map_err(RxError::callback)),
    })
  }
}

struct CombineLatestOp<T, U, V> {
  left: Observable<T>,
  right: Observable<U>,
  f: CombineFn<T, U, V>,
}

impl<T, U, V> Subscribable<V> for CombineLatestOp<T, U, V>
where
  T: Clone + Send + 'static,
  U: Clone + Send + 'static,
  V: 'static,
{
  fn subscribe(&self, observer: AnyObserver<V>) -> BoxDisposable {
    let (left, right) =
      (Arc::new(SingleAssignmentDisposable::new()), Arc::new(SingleAssignmentDisposable::new()));
    let sink = Arc::new(CombineLatestSink {
      sink: Sink::new(observer),
      f: self.f.clone(),
      latest: ReentrantMutex::new(RefCell::new(Latest::default())),
    });
    sink.sink.set_upstream(Box::new(CompositeDisposable::from_disposables([
      Box::new(left.clone()) as BoxDisposable,
      Box::new(right.clone()),
    ])));
    left.set(self.left.subscribe(Arc::new(Left(sink.clone()))));
    right.set(self.right.subscribe(Arc::new(Right(sink.clone()))));
    Box::new(SinkDisposable(sink))
  }
}

struct Latest<T, U> {
  left: Option<T>,
  right: Option<U>,
  left_done: bool,
  right_done: bool,
}

impl<T, U> Default for Latest<T, U> {
  fn default() -> Self { Latest { left: None, right: None, left_done: false, right_done: false } }
}

impl<T: Clone, U: Clone> Latest<T, U> {
  fn pair(&self) -> Option<(T, U)> {
    match (&self.left, &self.right) {
      (Some(a), Some(b)) => Some((a.clone(), b.clone())),
      _ => None,
    }
  }
}

struct CombineLatestSink<T, U, V> {
  sink: Sink<V>,
  f: CombineFn<T, U, V>,
  latest: ReentrantMutex<RefCell<Latest<T, U>>>,
}

impl<T, U, V> Operator for CombineLatestSink<T, U, V>
where
  T: Send + 'static,
  U: Send + 'static,
  V: 'static,
{
  type Output = V;

  #[inline]
  fn sink(&self) -> &Sink<V> { &self.sink }
}

impl<T, U, V> CombineLatestSink<T, U, V>
where
  T: Clone + Send + 'static,
  U: Clone + Send + 'static,
  V: 'static,
{
  /// Handles an event of either side. `store` records a value, `complete`
  /// marks the side done and reports whether the whole operator is done.
  fn on_side<X>(
    &self,
    event: Event<X>,
    store: impl FnOnce(&mut Latest<T, U>, X),
    complete: impl FnOnce(&mut Latest<T, U>) -> bool,
  ) {
    let latest = self.latest.lock();
    match event {
      Event::Next(v) => {
        if self.sink.is_stopped() {
          return;
        }
        let pair = {
          let mut latest = latest.borrow_mut();
          store(&mut latest, v);
          latest.pair()
        };
        if let Some((a, b)) = pair {
          match (self.f)(a, b) {
            Ok(v) => self.sink.forward_next(v),
            Err(err) => self.sink.fail(err),
          }
        }
      }
      Event::Error(err) => self.sink.forward_error(err),
      Event::Completed => {
        let done = complete(&mut latest.borrow_mut());
        if done {
          self.sink.forward_completed();
        }
      }
    }
  }
}

struct Left<T, U, V>(Arc<CombineLatestSink<T, U, V>>);

impl<T, U, V> Observer<T> for Left<T, U, V>
where
  T: Clone + Send + 'static,
  U: Clone + Send + 'static,
  V: 'static,
{
  fn on(&self, event: Event<T>) {
    self.0.on_side(
      event,
      |latest, v| latest.left = Some(v),
      |latest| {
        latest.left_done = true;
        latest.left.is_none() || latest.right_done
      },
    )
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.sink.is_stopped() }
}

struct Right<T, U, V>(Arc<CombineLatestSink<T, U, V>>);

impl<T, U, V> Observer<U> for Right<T, U, V>
where
  T: Clone + Send + 'static,
  U: Clone + Send + 'static,
  V: 'static,
{
  fn on(&self, event: Event<U>) {
    self.0.on_side(
      event,
      |latest, v| latest.right = Some(v),
      |latest| {
        latest.right_done = true;
        latest.right.is_none() || latest.left_done
      },
    )
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.sink.is_stopped() }
}

#[cfg(test)]
mod tests {
  use std::fmt;

  use super::*;
  use crate::{
    disposable::Disposable,
    observable::{from_iter, just},
    ops::test_util::{events, record},
    subject::PublishSubject,
  };

  #[test]
  fn combines_latest_values() {
    let (a, b) = (PublishSubject::<i32>::new(), PublishSubject::<&str>::new());
    let combined = a.as_observable().combine_latest(b.as_observable(), |n, s| format!("{n}{s}"));
    let log = record(&combined);
    a.on_next(1);
    assert!(events(&log).is_empty());
    b.on_next("a");
    a.on_next(2);
    b.on_next("b");
    assert_eq!(
      events(&log),
      ["1a", "2a", "2b"].map(|s| Event::Next(s.to_owned())).to_vec()
    );
  }

  #[test]
  fn completes_when_both_complete() {
    let (a, b) = (PublishSubject::<i32>::new(), PublishSubject::<i32>::new());
    let log = record(&a.as_observable().combine_latest(b.as_observable(), |x, y| x + y));
    a.on_next(1);
    b.on_next(10);
    a.on_completed();
    b.on_next(20);
    assert_eq!(events(&log), vec![Event::Next(11), Event::Next(21)]);
    b.on_completed();
    assert_eq!(events(&log).last(), Some(&Event::Completed));
  }

  #[test]
  fn completes_early_when_a_side_never_emitted() {
    let (a, b) = (PublishSubject::<i32>::new(), PublishSubject::<i32>::new());
    let log = record(&a.as_observable().combine_latest(b.as_observable(), |x, y| x + y));
    a.on_next(1);
    b.on_completed();
    assert_eq!(events(&log), vec![Event::Completed]);
    assert!(!a.has_observers());
  }

  #[test]
  fn synchronous_sources() {
    let log = record(&from_iter(1..=3).combine_latest(just(10), |x, y| x * y));
    // The left side finishes before the right one subscribes.
    assert_eq!(events(&log), vec![Event::Next(30), Event::Completed]);
  }

  #[test]
  fn error_from_either_side() {
    let (a, b) = (PublishSubject::<i32>::new(), PublishSubject::<i32>::new());
    let log = record(&a.as_observable().combine_latest(b.as_observable(), |x, y| x + y));
    b.on_error(RxError::msg("right failed"));
    assert_eq!(events(&log), vec![Event::Error(RxError::msg("right failed"))]);
    assert!(!a.has_observers());
  }

  #[derive(Debug)]
  struct TooLarge(i32);

  impl fmt::Display for TooLarge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{} is too large", self.0)
    }
  }

  impl std::error::Error for TooLarge {}

  #[test]
  fn failing_combiner_terminates() {
    let (a, b) = (PublishSubject::<i32>::new(), PublishSubject::<i32>::new());
    let log = record(&a.as_observable().try_combine_latest(b.as_observable(), |x, y| {
      let sum = x + y;
      if sum > 10 { Err(TooLarge(sum)) } else { Ok(sum) }
    }));
    a.on_next(1);
    b.on_next(2);
    b.on_next(20);
    b.on_next(3);
    let got = events(&log);
    assert_eq!(got.len(), 2);
    assert_eq!(got[0], Event::Next(3));
    assert_eq!(
      got[1].error().map(ToString::to_string),
      Some("callback failed: 21 is too large".to_owned())
    );
    assert!(!a.has_observers() && !b.has_observers());
  }

  #[test]
  fn dispose_releases_both() {
    let (a, b) = (PublishSubject::<i32>::new(), PublishSubject::<i32>::new());
    let d = a
      .as_observable()
      .combine_latest(b.as_observable(), |x, y| x + y)
      .subscribe_next(|_| {});
    d.dispose();
    assert!(!a.has_observers() && !b.has_observers());
  }
}
