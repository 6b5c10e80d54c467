//! Observables over a fixed set of values.

use std::sync::Arc;

use crate::{
  disposable::{self, BoxDisposable},
  error::RxError,
  observable::{Observable, Subscribable},
  observer::AnyObserver,
  scheduler::{self, Scheduler},
};

/// Emits `value` and completes.
pub fn just<T>(value: T) -> Observable<T>
where
  T: Clone + Send + Sync + 'static,
{
  from_iter(std::iter::once(value))
}

/// Emits every value in order and completes.
///
/// ```rust
/// use rxrust_core::prelude::*;
///
/// let sum = observable::of([1, 2, 3]).to_blocking().to_vec().unwrap().iter().sum::<i32>();
/// assert_eq!(sum, 6);
/// ```
pub fn of<T, const N: usize>(values: [T; N]) -> Observable<T>
where
  T: Clone + Send + Sync + 'static,
{
  from_iter(values)
}

/// Emits the items of `iter` synchronously, then completes.
///
/// The iterator is cloned for every subscription. Emission stops as soon as
/// the downstream observer is closed, so unbounded iterators are fine as
/// long as something downstream (such as `take`) ends the subscription.
pub fn from_iter<I>(iter: I) -> Observable<I::Item>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::Item: 'static,
{
  Observable::new(FromIter(iter))
}

/// Like [`from_iter`] but emits every item as a separate action on
/// `scheduler`.
pub fn from_iter_on<I, S>(iter: I, scheduler: S) -> Observable<I::Item>
where
  I: IntoIterator + Clone + Send + Sync + 'static,
  I::IntoIter: Send + 'static,
  I::Item: 'static,
  S: Scheduler + 'static,
{
  Observable::new(FromIterOn { iter, scheduler: Arc::new(scheduler) })
}

/// Completes right away.
pub fn empty<T: 'static>() -> Observable<T> { Observable::new(Empty) }

/// Never emits anything.
pub fn never<T: 'static>() -> Observable<T> { Observable::new(Never) }

/// Fails right away with `err`.
pub fn throw<T: 'static>(err: RxError) -> Observable<T> { Observable::new(Throw(err)) }

struct FromIter<I>(I);

impl<I> Subscribable<I::Item> for FromIter<I>
where
  I: IntoIterator + Clone + Send + Sync,
{
  fn subscribe(&self, observer: AnyObserver<I::Item>) -> BoxDisposable {
    for v in self.0.clone() {
      if observer.is_closed() {
        return disposable::empty();
      }
      observer.on_next(v);
    }
    observer.on_completed();
    disposable::empty()
  }
}

struct FromIterOn<I> {
  iter: I,
  scheduler: Arc<dyn Scheduler>,
}

impl<I> Subscribable<I::Item> for FromIterOn<I>
where
  I: IntoIterator + Clone + Send + Sync,
  I::IntoIter: Send + 'static,
  I::Item: 'static,
{
  fn subscribe(&self, observer: AnyObserver<I::Item>) -> BoxDisposable {
    let mut iter = self.iter.clone().into_iter();
    scheduler::schedule_recursive(self.scheduler.clone(), move |recurse| {
      if observer.is_closed() {
        return;
      }
      match iter.next() {
        Some(v) => {
          observer.on_next(v);
          recurse.schedule();
        }
        None => observer.on_completed(),
      }
    })
  }
}

struct Empty;

impl<T> Subscribable<T> for Empty {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    observer.on_completed();
    disposable::empty()
  }
}

struct Never;

impl<T> Subscribable<T> for Never {
  fn subscribe(&self, _: AnyObserver<T>) -> BoxDisposable { disposable::empty() }
}

struct Throw(RxError);

impl<T> Subscribable<T> for Throw {
  fn subscribe(&self, observer: AnyObserver<T>) -> BoxDisposable {
    observer.on_error(self.0.clone());
    disposable::empty()
  }
}
