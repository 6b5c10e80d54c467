//! Consuming an observable as a `futures::Stream`.
//!
//! ```rust
//! use futures::{executor::block_on, StreamExt};
//! use rxrust_core::prelude::*;
//!
//! let values: Vec<_> = block_on(observable::from_iter(1..=3).into_stream().collect());
//! assert_eq!(values, vec![Ok(1), Ok(2), Ok(3)]);
//! ```

use std::{
  collections::VecDeque,
  pin::Pin,
  sync::Arc,
  task::{Context, Poll, Waker},
};

use futures::Stream;
use parking_lot::Mutex;

use crate::{
  disposable::{BoxDisposable, Disposable},
  error::RxError,
  event::Event,
  observable::Observable,
  observer::Observer,
};

/// Items and wake up state shared between the subscription and the stream.
struct StreamState<T> {
  queue: VecDeque<Result<T, RxError>>,
  waker: Option<Waker>,
  is_closed: bool,
}

/// A `Stream` over the events of one subscription.
///
/// Values arrive as `Ok`, an error as a final `Err`, and completion ends the
/// stream. Values emitted before the stream is polled are buffered. Dropping
/// the stream disposes the subscription.
pub struct ObservableStream<T> {
  state: Arc<Mutex<StreamState<T>>>,
  subscription: BoxDisposable,
}

impl<T: Send + 'static> Observable<T> {
  /// Subscribes and returns the events as a [`Stream`].
  pub fn into_stream(self) -> ObservableStream<T> {
    let state =
      Arc::new(Mutex::new(StreamState { queue: VecDeque::new(), waker: None, is_closed: false }));
    let subscription = self.subscribe(Arc::new(StreamObserver { state: state.clone() }));
    ObservableStream { state, subscription }
  }
}

impl<T> Stream for ObservableStream<T> {
  type Item = Result<T, RxError>;

  fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
    let mut state = self.state.lock();
    if let Some(item) = state.queue.pop_front() {
      return Poll::Ready(Some(item));
    }
    if state.is_closed {
      return Poll::Ready(None);
    }
    state.waker = Some(cx.waker().clone());
    Poll::Pending
  }
}

impl<T> Drop for ObservableStream<T> {
  fn drop(&mut self) { self.subscription.dispose() }
}

struct StreamObserver<T> {
  state: Arc<Mutex<StreamState<T>>>,
}

impl<T: Send> Observer<T> for StreamObserver<T> {
  fn on(&self, event: Event<T>) {
    let mut state = self.state.lock();
    if state.is_closed {
      return;
    }
    match event {
      Event::Next(v) => state.queue.push_back(Ok(v)),
      Event::Error(e) => {
        state.queue.push_back(Err(e));
        state.is_closed = true;
      }
      Event::Completed => state.is_closed = true,
    }
    let waker = state.waker.take();
    drop(state);
    if let Some(waker) = waker {
      waker.wake();
    }
  }

  fn is_closed(&self) -> bool { self.state.lock().is_closed }
}

#[cfg(test)]
mod tests {
  use std::{thread, time::Duration};

  use futures::{executor::block_on, StreamExt};

  use super::*;
  use crate::{
    disposable,
    observable::{create, from_iter, throw},
    observer::AnyObserver,
  };

  #[test]
  fn receives_all_values() {
    let values: Vec<_> = block_on(from_iter(vec![1, 2, 3]).into_stream().collect());
    assert_eq!(values, vec![Ok(1), Ok(2), Ok(3)]);
  }

  #[test]
  fn error_ends_stream() {
    let mut stream = throw::<i32>(RxError::msg("error")).into_stream();
    assert_eq!(block_on(stream.next()), Some(Err(RxError::msg("error"))));
    assert_eq!(block_on(stream.next()), None);
  }

  #[test]
  fn wakes_on_values_from_another_thread() {
    let o = create(|observer: AnyObserver<&'static str>| {
      thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        observer.on_next("late");
        observer.on_completed();
      });
      disposable::empty()
    });
    let values: Vec<_> = block_on(o.into_stream().collect());
    assert_eq!(values, vec![Ok("late")]);
  }

  #[test]
  fn drop_disposes_subscription() {
    let subject = crate::subject::PublishSubject::<i32>::new();
    let stream = subject.as_observable().into_stream();
    assert!(subject.has_observers());
    drop(stream);
    assert!(!subject.has_observers());
  }
}
