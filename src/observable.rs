//! The producer side of the pipeline.
//!
//! An [`Observable`] is an immutable description of a computation. Nothing
//! runs until it is subscribed, and every subscription runs the computation
//! again with its own [`Disposable`](crate::disposable::Disposable) chain.
//! Subjects are the exception: they share one live computation with all
//! their observers. [`ConnectableObservable`] puts a subject in front of a
//! cold observable to share it the same way.

use std::sync::Arc;

use crate::{
  disposable::BoxDisposable,
  error::RxError,
  event::Event,
  observer::{self, AnyObserver},
};

mod blocking;
mod connectable;
mod create;
mod into_stream;
mod of;
mod timer;

pub use blocking::BlockingObservable;
pub use connectable::ConnectableObservable;
pub use create::{create, defer};
pub use into_stream::ObservableStream;
pub use of::{empty, from_iter, from_iter_on, just, never, of, throw};
pub use timer::{interval, timer};

pub use crate::ops::merge::merge;

/// Something an [`Observer`](crate::observer::Observer) can subscribe to.
///
/// This is the object safe core of [`Observable`]. Implementations must
/// honour the event grammar `Next* (Error | Completed)?` towards the
/// observer and must return a disposable that cancels the work.
pub trait Subscribable<T>: Send + Sync {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable;
}

/// A cheap, cloneable handle to a [`Subscribable`].
pub struct Observable<T> {
  source: Arc<dyn Subscribable<T>>,
}

impl<T> Clone for Observable<T> {
  fn clone(&self) -> Self { Observable { source: self.source.clone() } }
}

impl<T: 'static> Observable<T> {
  pub fn new(source: impl Subscribable<T> + 'static) -> Self {
    Observable { source: Arc::new(source) }
  }

  /// Starts a new subscription delivering to `observer`.
  #[inline]
  pub fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    self.source.subscribe(observer)
  }

  /// Subscribes with a closure receiving every event.
  pub fn subscribe_fn<F>(&self, f: F) -> BoxDisposable
  where
    F: FnMut(Event<T>) + Send + 'static,
  {
    self.subscribe(observer::from_fn(f))
  }

  /// Subscribes to the values only. Errors and completion are ignored.
  pub fn subscribe_next<N>(&self, mut next: N) -> BoxDisposable
  where
    N: FnMut(T) + Send + 'static,
  {
    self.subscribe_fn(move |event| {
      if let Event::Next(v) = event {
        next(v)
      }
    })
  }

  /// Subscribes with one handler per kind of event.
  pub fn subscribe_all<N, E, C>(&self, next: N, error: E, completed: C) -> BoxDisposable
  where
    N: FnMut(T) + Send + 'static,
    E: FnOnce(RxError) + Send + 'static,
    C: FnOnce() + Send + 'static,
  {
    self.subscribe(observer::from_handlers(next, error, completed))
  }
}

impl<T: 'static, S: Subscribable<T> + 'static> From<Arc<S>> for Observable<T> {
  fn from(source: Arc<S>) -> Self { Observable { source } }
}

impl<T> std::fmt::Debug for Observable<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str("Observable")
  }
}

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;
  use crate::disposable::{self, Disposable};

  struct Counter(i32);

  impl Subscribable<i32> for Counter {
    fn subscribe(&self, observer: AnyObserver<i32>) -> BoxDisposable {
      for i in 0..self.0 {
        observer.on_next(i);
      }
      observer.on_completed();
      disposable::empty()
    }
  }

  #[test]
  fn cold_resubscription() {
    let o = Observable::new(Counter(3));
    let sum = Arc::new(Mutex::new(0));
    let c_sum = sum.clone();
    o.subscribe_next(move |v| *c_sum.lock().unwrap() += v);
    let c_sum = sum.clone();
    o.clone().subscribe_next(move |v| *c_sum.lock().unwrap() += v);
    assert_eq!(*sum.lock().unwrap(), 6);
  }

  #[test]
  fn all_handlers() {
    let events = Arc::new(Mutex::new(vec![]));
    let (c1, c2) = (events.clone(), events.clone());
    let d = Observable::new(Counter(2)).subscribe_all(
      move |v| c1.lock().unwrap().push(format!("next {v}")),
      |_| unreachable!(),
      move || c2.lock().unwrap().push("done".to_string()),
    );
    assert!(d.is_disposed());
    assert_eq!(*events.lock().unwrap(), vec!["next 0", "next 1", "done"]);
  }
}
