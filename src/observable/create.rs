use std::sync::Arc;

use crate::{
  disposable::BoxDisposable,
  event::Event,
  observable::{Observable, Subscribable},
  observer::{AnyObserver, Observer},
  sink::{impl_is_closed, Operator, Sink, SinkDisposable},
};

/// Creates an observable from a subscribe function.
///
/// The function receives the observer of one subscription and returns the
/// disposable that tears the subscription's work down. The observer it gets
/// is guarded: events after the first terminal one are dropped, and the
/// returned disposable is released once the sequence terminates.
///
/// ```rust
/// use rxrust_core::prelude::*;
///
/// let o = observable::create(|observer: AnyObserver<i32>| {
///   observer.on_next(1);
///   observer.on_next(2);
///   observer.on_completed();
///   disposable::empty()
/// });
/// assert_eq!(o.to_blocking().to_vec().unwrap(), vec![1, 2]);
/// ```
pub fn create<T, F>(subscribe: F) -> Observable<T>
where
  T: 'static,
  F: Fn(AnyObserver<T>) -> BoxDisposable + Send + Sync + 'static,
{
  Observable::new(Create(subscribe))
}

/// Calls `factory` for every new subscription and subscribes to the
/// observable it returns.
pub fn defer<T, F>(factory: F) -> Observable<T>
where
  T: 'static,
  F: Fn() -> Observable<T> + Send + Sync + 'static,
{
  Observable::new(Defer(factory))
}

struct Create<F>(F);

impl<T, F> Subscribable<T> for Create<F>
where
  T: 'static,
  F: Fn(AnyObserver<T>) -> BoxDisposable + Send + Sync,
{
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    let sink = Arc::new(CreateSink { sink: Sink::new(observer) });
    let teardown = (self.0)(sink.clone());
    sink.sink.set_upstream(teardown);
    Box::new(SinkDisposable(sink))
  }
}

struct CreateSink<T> {
  sink: Sink<T>,
}

impl<T: 'static> Operator for CreateSink<T> {
  type Output = T;

  #[inline]
  fn sink(&self) -> &Sink<T> { &self.sink }
}

impl<T: 'static> Observer<T> for CreateSink<T> {
  #[inline]
  fn on(&self, event: Event<T>) { self.sink.forward(event) }

  impl_is_closed!();
}

struct Defer<F>(F);

impl<T, F> Subscribable<T> for Defer<F>
where
  T: 'static,
  F: Fn() -> Observable<T> + Send + Sync,
{
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    tracing::trace!("deferred observable subscribed");
    (self.0)().subscribe(observer)
  }
}
