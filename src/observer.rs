//! Observer trait and implementations
//!
//! The Observer is the consumer side of the pipeline. It has a single
//! capability, [`Observer::on`], which receives every [`Event`] of one
//! subscription. Closures, operator sinks and subjects all implement it and
//! are dispatched through [`AnyObserver`] with a single virtual call.

use std::{cell::RefCell, sync::Arc};

use parking_lot::ReentrantMutex;

use crate::{error::RxError, event::Event};

// ============================================================================
// Observer Trait
// ============================================================================

/// Receives the events of a subscription.
///
/// For a single subscription `on` is never called concurrently, and nothing
/// follows the first terminal event. Observers are shared between the
/// producer and the disposable chain, hence `&self` and `Send + Sync`.
pub trait Observer<T>: Send + Sync {
  /// Delivers one event.
  fn on(&self, event: Event<T>);

  #[inline]
  fn on_next(&self, value: T) { self.on(Event::Next(value)) }

  #[inline]
  fn on_error(&self, err: RxError) { self.on(Event::Error(err)) }

  #[inline]
  fn on_completed(&self) { self.on(Event::Completed) }

  /// Whether the observer will ignore everything it receives from now on.
  ///
  /// Synchronous producers such as `from_iter` poll it to stop early, for
  /// example once a downstream `take` is satisfied.
  #[inline]
  fn is_closed(&self) -> bool { false }
}

/// A type erased, shareable observer.
pub type AnyObserver<T> = Arc<dyn Observer<T>>;

impl<T, O: Observer<T> + ?Sized> Observer<T> for Arc<O> {
  #[inline]
  fn on(&self, event: Event<T>) { (**self).on(event) }

  #[inline]
  fn is_closed(&self) -> bool { (**self).is_closed() }
}

// ============================================================================
// FnObserver - Closure adapter
// ============================================================================

/// Adapts an `FnMut(Event<T>)` closure into an [`Observer`].
///
/// # Panics
///
/// Delivering an event to the closure while it is still handling a previous
/// one on the same thread breaks the event grammar and panics. Subjects queue
/// re-entrant emissions, so feeding a value back into an observed subject is
/// fine; calling the same observer directly from its own closure is not.
pub struct FnObserver<F> {
  f: ReentrantMutex<RefCell<F>>,
}

impl<F> FnObserver<F> {
  pub fn new(f: F) -> Self { FnObserver { f: ReentrantMutex::new(RefCell::new(f)) } }
}

impl<T, F> Observer<T> for FnObserver<F>
where
  F: FnMut(Event<T>) + Send,
{
  fn on(&self, event: Event<T>) {
    let guard = self.f.lock();
    let Ok(mut f) = guard.try_borrow_mut() else {
      tracing::error!("observer re-entered while handling an event");
      panic!("observer re-entered while handling an event");
    };
    f(event);
  }
}

/// Wraps a closure into an [`AnyObserver`].
pub fn from_fn<T, F>(f: F) -> AnyObserver<T>
where
  F: FnMut(Event<T>) + Send + 'static,
  T: 'static,
{
  Arc::new(FnObserver::new(f))
}

/// An observer built from separate `next`, `error` and `completed` handlers.
pub fn from_handlers<T, N, E, C>(mut next: N, error: E, completed: C) -> AnyObserver<T>
where
  T: 'static,
  N: FnMut(T) + Send + 'static,
  E: FnOnce(RxError) + Send + 'static,
  C: FnOnce() + Send + 'static,
{
  let mut error = Some(error);
  let mut completed = Some(completed);
  from_fn(move |event| match event {
    Event::Next(v) => next(v),
    Event::Error(e) => {
      if let Some(error) = error.take() {
        error(e);
      }
    }
    Event::Completed => {
      if let Some(completed) = completed.take() {
        completed();
      }
    }
  })
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
  use std::sync::Mutex;

  use super::*;

  #[test]
  fn closure_as_observer() {
    let seen = Arc::new(Mutex::new(vec![]));
    let c_seen = seen.clone();
    let observer = from_fn(move |e: Event<i32>| c_seen.lock().unwrap().push(e));
    observer.on_next(1);
    observer.on_next(2);
    observer.on_completed();
    assert_eq!(*seen.lock().unwrap(), vec![Event::Next(1), Event::Next(2), Event::Completed]);
  }

  #[test]
  fn handlers_observer() {
    let sum = Arc::new(Mutex::new(0));
    let failed = Arc::new(Mutex::new(None));
    let (c_sum, c_failed) = (sum.clone(), failed.clone());
    let observer = from_handlers(
      move |v: i32| *c_sum.lock().unwrap() += v,
      move |e| *c_failed.lock().unwrap() = Some(e),
      || {},
    );
    observer.on_next(10);
    observer.on_next(20);
    observer.on_error(RxError::msg("stop"));
    assert_eq!(*sum.lock().unwrap(), 30);
    assert_eq!(*failed.lock().unwrap(), Some(RxError::msg("stop")));
  }

  #[test]
  #[should_panic(expected = "re-entered")]
  fn reentrant_delivery_panics() {
    let slot: Arc<Mutex<Option<AnyObserver<i32>>>> = Arc::new(Mutex::new(None));
    let c_slot = slot.clone();
    let observer = from_fn(move |e: Event<i32>| {
      if let Event::Next(0) = e {
        let me = c_slot.lock().unwrap().clone().unwrap();
        me.on_next(1);
      }
    });
    *slot.lock().unwrap() = Some(observer.clone());
    observer.on_next(0);
  }
}
