//! Blocking access to an observable's values, for tests and for leaving the
//! reactive world at the edge of a program.
//!
//! The calling thread waits on a condition variable until the source
//! terminates, so the source must be producing on another thread or
//! synchronously within `subscribe`. Waiting on a source that is driven by
//! the waiting thread itself (such as a virtual time scheduler) never
//! returns unless a [`timeout`](BlockingObservable::timeout) is set.

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use parking_lot::{Condvar, Mutex};

use crate::{
  disposable::Disposable,
  error::RxError,
  event::Event,
  observable::Observable,
  observer::Observer,
};

/// An observable whose values are awaited by blocking the current thread.
pub struct BlockingObservable<T> {
  source: Observable<T>,
  timeout: Option<Duration>,
}

impl<T: Send + 'static> Observable<T> {
  /// Converts this observable into a [`BlockingObservable`].
  pub fn to_blocking(self) -> BlockingObservable<T> {
    BlockingObservable { source: self, timeout: None }
  }
}

struct Collected<T> {
  values: Vec<T>,
  done: Option<Result<(), RxError>>,
}

struct Shared<T> {
  collected: Mutex<Collected<T>>,
  ready: Condvar,
}

struct Collector<T> {
  shared: Arc<Shared<T>>,
  limit: Option<usize>,
}

impl<T: Send> Observer<T> for Collector<T> {
  fn on(&self, event: Event<T>) {
    let mut collected = self.shared.collected.lock();
    if collected.done.is_some() {
      return;
    }
    match event {
      Event::Next(v) => {
        collected.values.push(v);
        if self.limit.is_some_and(|limit| collected.values.len() >= limit) {
          collected.done = Some(Ok(()));
        }
      }
      Event::Error(e) => collected.done = Some(Err(e)),
      Event::Completed => collected.done = Some(Ok(())),
    }
    if collected.done.is_some() {
      self.shared.ready.notify_all();
    }
  }

  fn is_closed(&self) -> bool { self.shared.collected.lock().done.is_some() }
}

impl<T: Send + 'static> BlockingObservable<T> {
  /// Fails every blocking call with [`RxError::Timeout`] once `timeout`
  /// has passed without the result being known.
  pub fn timeout(mut self, timeout: Duration) -> Self {
    self.timeout = Some(timeout);
    self
  }

  /// Waits for the source to complete and returns everything it emitted.
  pub fn to_vec(&self) -> Result<Vec<T>, RxError> { self.collect(None) }

  /// Waits for the first value and unsubscribes.
  pub fn first(&self) -> Result<T, RxError> {
    self.collect(Some(1))?.into_iter().next().ok_or(RxError::NoElements)
  }

  /// Waits for the source to complete and returns its last value.
  pub fn last(&self) -> Result<T, RxError> {
    self.collect(None)?.pop().ok_or(RxError::NoElements)
  }

  /// Waits for the source to complete and returns its only value.
  pub fn single(&self) -> Result<T, RxError> {
    let mut values = self.collect(Some(2))?;
    match values.len() {
      0 => Err(RxError::NoElements),
      1 => Ok(values.remove(0)),
      _ => Err(RxError::MoreThanOneElement),
    }
  }

  /// Subscribes and waits until the source terminates or `limit` values
  /// have arrived.
  fn collect(&self, limit: Option<usize>) -> Result<Vec<T>, RxError> {
    let shared = Arc::new(Shared {
      collected: Mutex::new(Collected { values: vec![], done: None }),
      ready: Condvar::new(),
    });
    let subscription = self.source.subscribe(Arc::new(Collector { shared: shared.clone(), limit }));

    let deadline = self.timeout.map(|timeout| Instant::now() + timeout);
    let mut collected = shared.collected.lock();
    while collected.done.is_none() {
      match deadline {
        Some(deadline) => {
          if shared.ready.wait_until(&mut collected, deadline).timed_out() {
            collected.done = Some(Err(RxError::Timeout));
          }
        }
        None => shared.ready.wait(&mut collected),
      }
    }
    let done = collected.done.take().unwrap_or(Ok(()));
    let values = std::mem::take(&mut collected.values);
    drop(collected);
    subscription.dispose();
    done.map(|_| values)
  }
}
