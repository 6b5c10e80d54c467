use std::{cell::RefCell, sync::Arc};

use parking_lot::ReentrantMutex;

use crate::{
  disposable::{BoxDisposable, CompositeDisposable, Disposable, SingleAssignmentDisposable},
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{impl_is_closed, Operator, Sink, SinkDisposable},
};

impl<T: Send + 'static> Observable<T> {
  /// Pairs every value of this observable with the latest value of `other`.
  ///
  /// Values arriving before `other` has emitted are dropped. Only this
  /// observable's completion completes the result; `other` completing just
  /// freezes its latest value. An error from either side is forwarded.
  ///
  /// ```rust
  /// use rxrust_core::prelude::*;
  ///
  /// let clicks = PublishSubject::<()>::new();
  /// let position = BehaviorSubject::new((0, 0));
  /// let _d = clicks
  ///   .as_observable()
  ///   .with_latest_from(position.as_observable())
  ///   .subscribe_next(|(_, (x, y))| println!("clicked at {x},{y}"));
  /// clicks.on_next(());
  /// ```
  pub fn with_latest_from<U>(self, other: Observable<U>) -> Observable<(T, U)>
  where
    U: Clone + Send + 'static,
  {
    Observable::new(WithLatestFromOp { source: self, other })
  }
}

struct WithLatestFromOp<T, U> {
  source: Observable<T>,
  other: Observable<U>,
}

impl<T, U> Subscribable<(T, U)> for WithLatestFromOp<T, U>
where
  T: Send + 'static,
  U: Clone + Send + 'static,
{
  fn subscribe(&self, observer: AnyObserver<(T, U)>) -> BoxDisposable {
    let (source, other) =
      (Arc::new(SingleAssignmentDisposable::new()), Arc::new(SingleAssignmentDisposable::new()));
    let sink = Arc::new(WithLatestFromSink {
      sink: Sink::new(observer),
      latest: ReentrantMutex::new(RefCell::new(None)),
      other: other.clone(),
    });
    sink.sink.set_upstream(Box::new(CompositeDisposable::from_disposables([
      Box::new(source.clone()) as BoxDisposable,
      Box::new(other.clone()),
    ])));
    // `other` first, so that a synchronous `other` is already known to the
    // first source value.
    other.set(self.other.subscribe(Arc::new(Other(sink.clone()))));
    source.set(self.source.subscribe(sink.clone()));
    Box::new(SinkDisposable(sink))
  }
}

struct WithLatestFromSink<T, U> {
  sink: Sink<(T, U)>,
  latest: ReentrantMutex<RefCell<Option<U>>>,
  other: Arc<SingleAssignmentDisposable>,
}

impl<T, U> Operator for WithLatestFromSink<T, U>
where
  T: Send + 'static,
  U: Send + 'static,
{
  type Output = (T, U);

  #[inline]
  fn sink(&self) -> &Sink<(T, U)> { &self.sink }
}

impl<T, U> Observer<T> for WithLatestFromSink<T, U>
where
  T: Send + 'static,
  U: Clone + Send + 'static,
{
  fn on(&self, event: Event<T>) {
    let latest = self.latest.lock();
    match event {
      Event::Next(v) => {
        if self.sink.is_stopped() {
          return;
        }
        let other = latest.borrow().clone();
        if let Some(other) = other {
          self.sink.forward_next((v, other));
        }
      }
      terminal => self.sink.forward_terminal(terminal),
    }
  }

  impl_is_closed!();
}

/// Observer of the side whose latest value is sampled.
struct Other<T, U>(Arc<WithLatestFromSink<T, U>>);

impl<T, U> Observer<U> for Other<T, U>
where
  T: Send + 'static,
  U: Clone + Send + 'static,
{
  fn on(&self, event: Event<U>) {
    let parent = &self.0;
    let latest = parent.latest.lock();
    match event {
      Event::Next(v) => *latest.borrow_mut() = Some(v),
      Event::Error(err) => parent.sink.forward_error(err),
      Event::Completed => parent.other.dispose(),
    }
  }

  #[inline]
  fn is_closed(&self) -> bool { self.0.sink.is_stopped() }
}
