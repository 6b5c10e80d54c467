use std::{cell::RefCell, collections::VecDeque, convert::Infallible, error::Error, sync::Arc};

use parking_lot::ReentrantMutex;

use crate::{
  disposable::{BoxDisposable, CompositeDisposable, SingleAssignmentDisposable},
  error::RxError,
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{Operator, Sink, SinkDisposable},
};

type ZipFn<T, U, V> = Arc<dyn Fn(T, U) -> Result<V, RxError> + Send + Sync>;

impl<T: Send + 'static> Observable<T> {
  /// Pairs up the values of two observables by index and emits `f(a, b)`
  /// for each pair.
  ///
  /// Values wait in a queue until the other side has a value of the same
  /// index. Completes once a completed side has no queued values left,
  /// since no further pair can be formed.
  ///
  /// ```rust
  /// use rxrust_core::prelude::*;
  ///
  /// let pairs = observable::from_iter(1..=3)
  ///   .zip(observable::of(["a", "b"]), |n, s| format!("{s}{n}"))
  ///   .to_blocking()
  ///   .to_vec();
  /// assert_eq!(pairs, Ok(vec!["a1".to_owned(), "b2".to_owned()]));
  /// ```
  pub fn zip<U, V, F>(self, other: Observable<U>, f: F) -> Observable<V>
  where
    U: Send + 'static,
    V: 'static,
    F: Fn(T, U) -> V + Send + Sync + 'static,
  {
    self.try_zip(other, move |a, b| Ok::<_, Infallible>(f(a, b)))
  }

  /// Like [`zip`](Self::zip), but the combining closure may fail. A failure
  /// ends the subscription with [`RxError::Callback`].
  pub fn try_zip<U, V, E, F>(self, other: Observable<U>, f: F) -> Observable<V>
  where
    U: Send + 'static,
    V: 'static,
    E: Error + Send + Sync + 'static,
    F: Fn(T, U) -> Result<V, E> + Send + Sync + 'static,
  {
    Observable::new(ZipOp {
      left: self,
      right: other,
      f: Arc::new(move |a, b| f(a, b).map_err(RxError::callback)),
    })
  }
}

struct ZipOp<T, U, V> {
  left: Observable<T>,
  right: Observable<U>,
  f: ZipFn<T, U, V>,
}

impl<T, U, V> Subscribable<V> for ZipOp<T, U, V>
where
  T: Send + 'static,
  U: Send + 'static,
  V: 'static,
{
  fn subscribe(&self, observer: AnyObserver<V>) -> BoxDisposable {
    let (left, right) =
      (Arc::new(SingleAssignmentDisposable::new()), Arc::new(SingleAssignmentDisposable::new()));
    let sink = Arc::new(ZipSink {
      sink: Sink::new(observer),
      f: self.f.clone(),
      queues: ReentrantMutex::new(RefCell::new(Queues::default())),
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

struct Queues<T, U> {
  left: VecDeque<T>,
  right: VecDeque<U>,
  left_done: bool,
  right_done: bool,
}

impl<T, U> Default for Queues<T, U> {
  fn default() -> Self {
    Queues { left: VecDeque::new(), right: VecDeque::new(), left_done: false, right_done: false }
  }
}

impl<T, U> Queues<T, U> {
  fn pop_pair(&mut self) -> Option<(T, U)> {
    if self.left.is_empty() || self.right.is_empty() {
      return None;
    }
    self.left.pop_front().zip(self.right.pop_front())
  }

  /// Whether a completed side has run out of values.
  fn is_exhausted(&self) -> bool {
    (self.left_done && self.left.is_empty()) || (self.right_done && self.right.is_empty())
  }
}

struct ZipSink<T, U, V> {
  sink: Sink<V>,
  f: ZipFn<T, U, V>,
  queues: ReentrantMutex<RefCell<Queues<T, U>>>,
}

impl<T, U, V> Operator for ZipSink<T, U, V>
where
  T: Send + 'static,
  U: Send + 'static,
  V: 'static,
{
  type Output = V;

  #[inline]
  fn sink(&self) -> &Sink<V> { &self.sink }
}

impl<T, U, V> ZipSink<T, U, V>
where
  T: Send + 'static,
  U: Send + 'static,
  V: 'static,
{
  fn on_side<X>(
    &self,
    event: Event<X>,
    push: impl FnOnce(&mut Queues<T, U>, X),
    complete: impl FnOnce(&mut Queues<T, U>),
  ) {
    let queues = self.queues.lock();
    match event {
      Event::Next(v) => {
        if self.sink.is_stopped() {
          return;
        }
        let pair = {
          let mut queues = queues.borrow_mut();
          push(&mut queues, v);
          queues.pop_pair()
        };
        if let Some((a, b)) = pair {
          match (self.f)(a, b) {
            Ok(v) => self.sink.forward_next(v),
            Err(err) => {
              self.sink.fail(err);
              return;
            }
          }
        }
        if queues.borrow().is_exhausted() {
          self.sink.forward_completed();
        }
      }
      Event::Error(err) => self.sink.forward_error(err),
      Event::Completed => {
        let exhausted = {
          let mut queues = queues.borrow_mut();
          complete(&mut queues);
          queues.is_exhausted()
        };
        if exhausted {
          self.sink.forward_completed();
        }
      }
    }
  }
}

struct Left<T, U, V>(Arc<ZipSink<T, U, V>>);

impl<T, U, V> Observer<T> for Left<T, U, V>
where
  T: Send + 'static,
  U: Send + 'static,
  V: 'static,
{
  fn on(&self, event: Event<T>) {
    self.0.on_side(event, |q, v| q.left.push_back(v), |q| q.left_done = true)
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.sink.is_stopped() }
}

struct Right<T, U, V>(Arc<ZipSink<T, U, V>>);

impl<T, U, V> Observer<U> for Right<T, U, V>
where
  T: Send + 'static,
  U: Send + 'static,
  V: 'static,
{
  fn on(&self, event: Event<U>) {
    self.0.on_side(event, |q, v| q.right.push_back(v), |q| q.right_done = true)
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.sink.is_stopped() }
}
