use std::{
  collections::VecDeque,
  future::Future,
  pin::Pin,
  sync::Arc,
  task::{ready, Context, Poll},
  time::Duration,
};

use futures::{
  channel::oneshot,
  task::{Spawn, SpawnExt},
  FutureExt,
};
use parking_lot::Mutex;
use pin_project_lite::pin_project;

use super::{Action, ScheduledItem, Scheduler};
use crate::disposable::{BoxDisposable, Disposable};

#[derive(Default)]
struct QueueState {
  items: VecDeque<Arc<ScheduledItem>>,
  /// Set while a drain task owns the queue.
  draining: bool,
}

#[derive(Default)]
struct SerialQueue {
  state: Mutex<QueueState>,
}

impl SerialQueue {
  /// Enqueues `item`. Returns `true` when the caller became responsible for
  /// draining the queue.
  fn push(&self, item: Arc<ScheduledItem>) -> bool {
    let mut state = self.state.lock();
    state.items.push_back(item);
    !std::mem::replace(&mut state.draining, true)
  }

  fn drain(&self) {
    let _drainer = Drainer(self);
    loop {
      let item = {
        let mut state = self.state.lock();
        match state.items.pop_front() {
          Some(item) => item,
          None => {
            state.draining = false;
            return;
          }
        }
      };
      item.invoke();
    }
  }

  /// Gives the queue up after the executor refused the drain task.
  fn abandon(&self) {
    let items = {
      let mut state = self.state.lock();
      state.draining = false;
      std::mem::take(&mut state.items)
    };
    drop(items);
  }
}

/// Hands the queue back when an action unwinds out of the drain loop. The
/// remaining actions run with the next drain.
struct Drainer<'a>(&'a SerialQueue);

impl Drop for Drainer<'_> {
  fn drop(&mut self) {
    if std::thread::panicking() {
      self.0.state.lock().draining = false;
    }
  }
}

/// Runs actions one at a time, in the order they were scheduled, on a
/// supplied executor.
///
/// Actions never run concurrently with each other, whichever executor thread
/// picks them up. A single drain task owns the queue while there is work;
/// actions scheduled meanwhile join the queue rather than spawning tasks of
/// their own. Relative scheduling waits on a `futures-time` timer and then
/// joins the queue.
///
/// ```rust
/// use futures::executor::ThreadPool;
/// use rxrust_core::prelude::*;
///
/// let pool = ThreadPool::new().unwrap();
/// let scheduler = SerialQueueScheduler::new(pool);
/// let values = observable::from_iter_on(1..=3, scheduler).to_blocking().to_vec().unwrap();
/// assert_eq!(values, vec![1, 2, 3]);
/// ```
#[derive(Clone)]
pub struct SerialQueueScheduler<S> {
  spawner: S,
  queue: Arc<SerialQueue>,
}

impl<S: Spawn> SerialQueueScheduler<S> {
  pub fn new(spawner: S) -> Self { SerialQueueScheduler { spawner, queue: Arc::default() } }

  fn enqueue(&self, item: Arc<ScheduledItem>) {
    if !self.queue.push(item) {
      return;
    }
    let queue = self.queue.clone();
    if let Err(err) = self.spawner.spawn(async move { queue.drain() }) {
      tracing::warn!(%err, "executor refused the serial queue, dropping queued actions");
      self.queue.abandon();
    }
  }
}

impl<S: Spawn + Send + Sync> Scheduler for SerialQueueScheduler<S> {
  fn schedule(&self, action: Action) -> BoxDisposable {
    let item = ScheduledItem::new(action);
    self.enqueue(item.clone());
    Box::new(item)
  }

  fn schedule_relative(&self, due: Duration, action: Action) -> BoxDisposable {
    if due.is_zero() {
      return self.schedule(action);
    }
    let item = ScheduledItem::new(action);
    let (cancel_tx, cancel_rx) = oneshot::channel();
    let delayed = Delayed {
      timer: futures_time::task::sleep(due.into()),
      cancel: Some(cancel_rx),
      item: Some(item.clone()),
      queue: self.queue.clone(),
    };
    if let Err(err) = self.spawner.spawn(delayed) {
      tracing::warn!(%err, "executor refused a delayed action, dropping it");
      item.dispose();
    }
    Box::new(DelayedDisposable { item, cancel: Mutex::new(Some(cancel_tx)) })
  }
}

/// Cancels a delayed action and stops its timer task.
struct DelayedDisposable {
  item: Arc<ScheduledItem>,
  cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl Disposable for DelayedDisposable {
  fn dispose(&self) {
    self.item.dispose();
    if let Some(cancel) = self.cancel.lock().take() {
      let _ = cancel.send(());
    }
  }

  fn is_disposed(&self) -> bool { self.item.is_disposed() }
}

pin_project! {
  /// Waits for the timer, then joins the serial queue. Finishes early once
  /// cancelled.
  struct Delayed<F> {
    #[pin]
    timer: F,
    cancel: Option<oneshot::Receiver<()>>,
    item: Option<Arc<ScheduledItem>>,
    queue: Arc<SerialQueue>,
  }
}

impl<F: Future> Future for Delayed<F> {
  type Output = ();

  fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<()> {
    let this = self.project();
    if let Some(cancel) = this.cancel.as_mut() {
      match cancel.poll_unpin(cx) {
        Poll::Ready(Ok(())) => {
          this.item.take();
          return Poll::Ready(());
        }
        // The handle was dropped without cancelling.
        Poll::Ready(Err(_)) => *this.cancel = None,
        Poll::Pending => {}
      }
    }
    ready!(this.timer.poll(cx));
    if let Some(item) = this.item.take() {
      // A cancelled item would only occupy the queue.
      if !item.is_disposed() && this.queue.push(item) {
        this.queue.drain();
      }
    }
    Poll::Ready(())
  }
}
